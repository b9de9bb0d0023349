use crate::input::{
    FocusController, FocusPane, InputListener, InputOutcome, MouseListener, PanelAction,
    PanelLayout, map_panel_key,
};
use crate::model::{ClusterList, RowChange, WatchEvent};
use crate::panel::PanelBinder;
use crate::selection::SelectionController;
use crate::store::InstanceStore;
use crate::ui_queue::{UiQueue, UiSender};
use chrono::{DateTime, Local};
use crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use tracing::debug;

pub type DashboardSender = UiSender<Dashboard>;
pub type DashboardQueue = UiQueue<Dashboard>;

const MAX_STATUS_LEN: usize = 180;

/// Connection facts shown in the header.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub context: String,
    pub cluster: String,
    pub namespace: String,
    pub kinds: Vec<String>,
}

/// Composition root. Owned by the UI loop; background tasks reach it only
/// through a [`DashboardSender`].
pub struct Dashboard {
    running: bool,
    target: Target,
    store: InstanceStore,
    panels: PanelBinder,
    selection: SelectionController,
    focus: FocusController,
    layout: PanelLayout,
    instance_offset: usize,
    cluster_offset: usize,
    page_size: usize,
    detail_max_scroll: u16,
    status: String,
    last_change: Option<DateTime<Local>>,
    dirty: bool,
}

impl Dashboard {
    pub fn new(target: Target, clusters: ClusterList) -> Self {
        Self {
            running: true,
            target,
            store: InstanceStore::new(),
            panels: PanelBinder::new(clusters),
            selection: SelectionController::default(),
            focus: FocusController::default(),
            layout: PanelLayout::default(),
            instance_offset: 0,
            cluster_offset: 0,
            page_size: 10,
            detail_max_scroll: 0,
            status: "Waiting for watch events…".to_string(),
            last_change: None,
            dirty: true,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
        self.status = "Exit requested".to_string();
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    #[cfg(test)]
    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn panels(&self) -> &PanelBinder {
        &self.panels
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn focus(&self) -> FocusPane {
        self.focus.focus()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_change(&self) -> Option<DateTime<Local>> {
        self.last_change
    }

    pub fn instance_offset(&self) -> usize {
        self.instance_offset
    }

    pub fn cluster_offset(&self) -> usize {
        self.cluster_offset
    }

    /// Returns and clears the redraw flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Applies one lifecycle event. Must run on the UI loop.
    pub fn apply(&mut self, event: WatchEvent) {
        let summary = event.summary();
        let Some(change) = self.store.apply(event) else {
            return;
        };
        let row = self.panels.on_change(&change);
        let inserted = matches!(change, RowChange::Inserted { .. });
        let removed = matches!(change, RowChange::Removed { .. });
        if inserted {
            self.selection.on_row_inserted(row, &self.store);
        } else if removed {
            self.selection.on_row_removed(row, &self.store);
        } else {
            self.selection.on_row_affected(row, &self.store);
        }
        debug!("applied: {summary} (row {row})");
        self.last_change = Some(Local::now());
        self.set_status(summary);
        self.dirty = true;
    }

    pub fn set_clusters(&mut self, clusters: ClusterList) {
        self.panels.clusters.set_clusters(clusters);
        self.dirty = true;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
        self.dirty = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        match self.focus.on_input(key) {
            InputOutcome::Quit => self.quit(),
            InputOutcome::Focused(pane) => debug!("focus={}", pane.label()),
            InputOutcome::Forward(pane, key) => {
                if let Some(action) = map_panel_key(key) {
                    self.apply_panel_action(pane, action);
                }
            }
        }
        self.dirty = true;
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        let Some(target) = self.focus.on_mouse(mouse, &self.layout) else {
            return;
        };
        match target.kind {
            MouseEventKind::Down(MouseButton::Left) => match (target.pane, target.line) {
                // Line 0 of the instance table is its header.
                (FocusPane::Instances, Some(line)) if line > 0 => {
                    let row = self.instance_offset + line as usize;
                    if row <= self.store.len() {
                        self.selection.select_row(row, &self.store);
                    }
                }
                (FocusPane::Clusters, Some(line)) => {
                    let row = self.cluster_offset + line as usize;
                    if row < self.panels.clusters.clusters().len() {
                        self.panels.clusters.select(row);
                    }
                }
                _ => {}
            },
            MouseEventKind::ScrollDown => self.apply_panel_action(target.pane, PanelAction::Down),
            MouseEventKind::ScrollUp => self.apply_panel_action(target.pane, PanelAction::Up),
            _ => return,
        }
        self.dirty = true;
    }

    /// Records the geometry of the frame just drawn.
    pub fn set_frame_geometry(
        &mut self,
        layout: PanelLayout,
        instance_offset: usize,
        cluster_offset: usize,
        detail_max_scroll: u16,
    ) {
        self.layout = layout;
        self.instance_offset = instance_offset;
        self.cluster_offset = cluster_offset;
        self.page_size = layout.instances.height.saturating_sub(3).max(1) as usize;
        self.detail_max_scroll = detail_max_scroll;
        if self.selection.detail_scroll() > detail_max_scroll {
            self.selection.scroll_detail_to(detail_max_scroll);
        }
    }

    fn apply_panel_action(&mut self, pane: FocusPane, action: PanelAction) {
        let page = self.page_size as isize;
        match pane {
            FocusPane::Clusters => {
                let last = self.panels.clusters.clusters().len();
                match action {
                    PanelAction::Up => self.panels.clusters.move_selection(-1),
                    PanelAction::Down => self.panels.clusters.move_selection(1),
                    PanelAction::PageUp => self.panels.clusters.move_selection(-page),
                    PanelAction::PageDown => self.panels.clusters.move_selection(page),
                    PanelAction::Top => self.panels.clusters.select(0),
                    PanelAction::Bottom => self.panels.clusters.select(last),
                };
            }
            FocusPane::Instances => {
                match action {
                    PanelAction::Up => self.selection.move_by(-1, &self.store),
                    PanelAction::Down => self.selection.move_by(1, &self.store),
                    PanelAction::PageUp => self.selection.move_by(-page, &self.store),
                    PanelAction::PageDown => self.selection.move_by(page, &self.store),
                    PanelAction::Top => self.selection.select_row(0, &self.store),
                    PanelAction::Bottom => {
                        self.selection.select_row(self.store.len(), &self.store)
                    }
                };
            }
            FocusPane::Details => {
                let max = self.detail_max_scroll;
                match action {
                    PanelAction::Up => self.selection.scroll_detail(-1, max),
                    PanelAction::Down => self.selection.scroll_detail(1, max),
                    PanelAction::PageUp => self.selection.scroll_detail(-page, max),
                    PanelAction::PageDown => self.selection.scroll_detail(page, max),
                    PanelAction::Top => self.selection.scroll_detail_to(0),
                    PanelAction::Bottom => self.selection.scroll_detail_to(max),
                }
            }
        }
    }
}

fn normalize_status_text(status: String) -> String {
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, Target};
    use crate::input::{FocusPane, PanelLayout};
    use crate::model::{ClusterList, Instance, InstanceKey, WatchEvent};
    use crate::ui_queue;
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };
    use ratatui::layout::Rect;

    fn dashboard() -> Dashboard {
        Dashboard::new(
            Target::default(),
            ClusterList::new(["cluster-1", "cluster-2"]),
        )
    }

    fn instance(name: &str, status: &str) -> Instance {
        Instance {
            name: name.to_string(),
            status: status.to_string(),
            kind: "Deployment".to_string(),
            address: "apps/v1".to_string(),
            cluster_label: "cluster-1".to_string(),
            detail_text: format!("name: {name}\nstatus: {status}\n"),
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn add_update_delete_scenario() {
        let mut dash = dashboard();
        dash.apply(WatchEvent::Added(instance("a", "Running")));
        assert_eq!(
            dash.panels().instances.rows()[0],
            [
                "a".to_string(),
                "Running".to_string(),
                "Deployment".to_string(),
                "apps/v1".to_string(),
                "cluster-1".to_string(),
            ]
        );

        dash.on_key(key(KeyCode::Down));
        assert_eq!(dash.selection().selected(), 1);
        assert_eq!(dash.selection().detail(), "name: a\nstatus: Running\n");

        let id = InstanceKey::new("Deployment", "cluster-1", "a");
        dash.apply(WatchEvent::Updated(id.clone(), instance("a", "Failed")));
        assert_eq!(dash.selection().selected(), 1);
        assert_eq!(dash.selection().detail(), "name: a\nstatus: Failed\n");
        assert_eq!(dash.panels().instances.rows()[0][1], "Failed");

        dash.apply(WatchEvent::Deleted(id));
        assert_eq!(dash.panels().instances.len(), 0);
        assert_eq!(dash.panels().instances_title(), "[2] Instances (0)");
        assert_eq!(dash.selection().selected(), 0);
        assert_eq!(dash.selection().detail(), "");
        assert_eq!(dash.status(), "Deleted Deployment cluster-1/a");
    }

    #[test]
    fn ignored_events_leave_status_untouched() {
        let mut dash = dashboard();
        let before = dash.status().to_string();
        dash.apply(WatchEvent::Deleted(InstanceKey::new("Deployment", "x", "y")));
        assert_eq!(dash.status(), before);
        assert!(dash.last_change().is_none());
    }

    #[test]
    fn escape_stops_the_dashboard() {
        let mut dash = dashboard();
        dash.on_key(key(KeyCode::Left));
        assert_eq!(dash.focus(), FocusPane::Clusters);
        dash.on_key(key(KeyCode::Esc));
        assert!(!dash.running());
    }

    #[test]
    fn forwarded_keys_drive_the_focused_panel() {
        let mut dash = dashboard();
        dash.on_key(key(KeyCode::Char('1')));
        dash.on_key(key(KeyCode::Down));
        assert_eq!(dash.panels().clusters.selected_label(), "cluster-1");
        assert_eq!(dash.panels().instances_title(), "[2] Instances (0) @ cluster-1");
        dash.on_key(key(KeyCode::End));
        assert_eq!(dash.panels().clusters.selected_label(), "cluster-2");
    }

    #[test]
    fn clicks_focus_and_select_rows() {
        let mut dash = dashboard();
        for name in ["a", "b", "c"] {
            dash.apply(WatchEvent::Added(instance(name, "Running")));
        }
        let layout = PanelLayout {
            clusters: Rect::new(0, 1, 20, 30),
            instances: Rect::new(20, 1, 80, 20),
            details: Rect::new(20, 21, 80, 10),
        };
        dash.set_frame_geometry(layout, 0, 0, 0);

        // Top border at y=1, header at y=2, first data row at y=3.
        dash.on_mouse(click(30, 4));
        assert_eq!(dash.focus(), FocusPane::Instances);
        assert_eq!(dash.selection().selected(), 2);
        assert_eq!(dash.selection().detail(), "name: b\nstatus: Running\n");

        dash.on_mouse(click(30, 2));
        assert_eq!(dash.selection().selected(), 2);

        // Cluster rows start right under the border.
        dash.on_mouse(click(5, 4));
        assert_eq!(dash.focus(), FocusPane::Clusters);
        assert_eq!(dash.panels().clusters.selected_label(), "cluster-2");

        dash.on_mouse(click(40, 25));
        assert_eq!(dash.focus(), FocusPane::Details);
    }

    #[test]
    fn border_clicks_focus_without_selecting() {
        let mut dash = dashboard();
        for index in 0..40 {
            dash.apply(WatchEvent::Added(instance(&format!("i{index}"), "Running")));
        }
        let layout = PanelLayout {
            clusters: Rect::new(0, 1, 20, 30),
            instances: Rect::new(20, 1, 80, 20),
            details: Rect::new(20, 21, 80, 10),
        };
        dash.set_frame_geometry(layout, 0, 0, 0);

        dash.on_mouse(click(30, 20));
        assert_eq!(dash.focus(), FocusPane::Instances);
        assert_eq!(dash.selection().selected(), 0);
        dash.on_mouse(click(30, 1));
        assert_eq!(dash.selection().selected(), 0);

        // Last visible data row sits just above the bottom border.
        dash.on_mouse(click(30, 19));
        assert_eq!(dash.selection().selected(), 17);

        dash.on_mouse(click(5, 1));
        assert_eq!(dash.focus(), FocusPane::Clusters);
        assert_eq!(dash.panels().clusters.selected_label(), "all");
        dash.on_mouse(click(5, 30));
        assert_eq!(dash.panels().clusters.selected_label(), "all");
    }

    #[test]
    fn concurrent_adds_land_exactly_once() {
        let (tx, mut queue) = ui_queue::channel::<Dashboard>();
        let workers = (0..16)
            .map(|worker| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for item in 0..25 {
                        let added = instance(&format!("w{worker}-{item}"), "Running");
                        tx.submit(move |dash: &mut Dashboard| {
                            dash.apply(WatchEvent::Added(added))
                        })
                        .expect("ui queue open");
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().expect("worker finished");
        }

        let mut dash = dashboard();
        assert_eq!(queue.drain(&mut dash, usize::MAX), 400);
        assert_eq!(dash.store().len(), 400);
        assert_eq!(dash.panels().instances.len(), 400);
        let mut names = dash.store().iter().map(|i| i.name.clone()).collect::<Vec<_>>();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 400);
    }

    #[test]
    fn per_sender_order_is_preserved() {
        let (tx, mut queue) = ui_queue::channel::<Dashboard>();
        let id = InstanceKey::new("Deployment", "cluster-1", "a");
        let events = vec![
            WatchEvent::Added(instance("a", "Pending")),
            WatchEvent::Updated(id.clone(), instance("a", "Running")),
            WatchEvent::Deleted(id.clone()),
            WatchEvent::Added(instance("a", "Failed")),
        ];
        for event in events {
            tx.submit(move |dash: &mut Dashboard| dash.apply(event))
                .expect("ui queue open");
        }
        let mut dash = dashboard();
        queue.drain(&mut dash, usize::MAX);
        assert_eq!(dash.store().len(), 1);
        assert_eq!(dash.store().get(0).map(|i| i.status.as_str()), Some("Failed"));
    }

    #[test]
    fn detail_scroll_is_clamped_to_frame() {
        let mut dash = dashboard();
        dash.apply(WatchEvent::Added(instance("a", "Running")));
        dash.on_key(key(KeyCode::Down));
        dash.set_frame_geometry(PanelLayout::default(), 0, 0, 3);
        dash.on_key(key(KeyCode::Char('3')));
        for _ in 0..10 {
            dash.on_key(key(KeyCode::Down));
        }
        assert_eq!(dash.selection().detail_scroll(), 3);
        dash.set_frame_geometry(PanelLayout::default(), 0, 0, 1);
        assert_eq!(dash.selection().detail_scroll(), 1);
    }
}
