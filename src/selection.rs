use crate::model::InstanceKey;
use crate::store::InstanceStore;
use tracing::debug;

/// Receives selection changes from the instance table.
pub trait SelectionListener {
    fn on_selection_changed(&mut self, row: usize, store: &InstanceStore);
}

/// Binds the highlighted instance row to the detail panel text.
///
/// `selected` is a display row: 0 is the header and always means an empty
/// detail panel, `n > 0` is store position `n - 1`.
#[derive(Debug, Default)]
pub struct SelectionController {
    selected: usize,
    shown: Option<InstanceKey>,
    detail: String,
    detail_scroll: u16,
}

impl SelectionListener for SelectionController {
    fn on_selection_changed(&mut self, row: usize, store: &InstanceStore) {
        self.selected = row;
        self.resolve(store);
    }
}

impl SelectionController {
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn shown(&self) -> Option<&InstanceKey> {
        self.shown.as_ref()
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    /// Re-resolves the detail text if `row` is the one being viewed.
    pub fn on_row_affected(&mut self, row: usize, store: &InstanceStore) {
        if row != 0 && row == self.selected {
            self.resolve(store);
        }
    }

    pub fn on_row_inserted(&mut self, row: usize, store: &InstanceStore) {
        if self.selected != 0 && row <= self.selected {
            self.selected += 1;
        }
        self.on_row_affected(row, store);
    }

    /// Keeps the selection on the same instance when an earlier row goes away,
    /// and re-clamps it when the selected row itself was removed.
    pub fn on_row_removed(&mut self, row: usize, store: &InstanceStore) {
        if self.selected == 0 {
            return;
        }
        if row < self.selected {
            self.selected -= 1;
        } else if row == self.selected {
            self.selected = self.selected.min(store.len());
            debug!("selected row {row} removed, re-clamped to {}", self.selected);
        }
        self.resolve(store);
    }

    /// Moves the selection by `delta` within `0..=store.len()`.
    pub fn move_by(&mut self, delta: isize, store: &InstanceStore) -> bool {
        let max_row = store.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, max_row) as usize;
        if next == self.selected {
            return false;
        }
        self.on_selection_changed(next, store);
        true
    }

    pub fn select_row(&mut self, row: usize, store: &InstanceStore) -> bool {
        let row = row.min(store.len());
        if row == self.selected {
            return false;
        }
        self.on_selection_changed(row, store);
        true
    }

    pub fn scroll_detail(&mut self, delta: isize, max_scroll: u16) {
        let next = (self.detail_scroll as isize + delta).clamp(0, max_scroll as isize);
        self.detail_scroll = next as u16;
    }

    pub fn scroll_detail_to(&mut self, offset: u16) {
        self.detail_scroll = offset;
    }

    fn resolve(&mut self, store: &InstanceStore) {
        let resolved = self
            .selected
            .checked_sub(1)
            .and_then(|index| store.get(index));

        let Some(instance) = resolved else {
            if self.selected != 0 {
                debug!("selected row {} no longer resolves", self.selected);
            }
            self.detail.clear();
            self.shown = None;
            self.detail_scroll = 0;
            return;
        };

        let key = instance.key();
        if self.shown.as_ref() != Some(&key) {
            self.detail_scroll = 0;
        }
        self.detail.clone_from(&instance.detail_text);
        self.shown = Some(key);
    }
}
