use crate::model::{Instance, InstanceKey, RowChange, WatchEvent};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Authoritative, insertion-ordered collection of displayed instances.
///
/// Lives on the UI thread only. Row indices handed out in [`RowChange`] are
/// always computed from the store's own ordering.
#[derive(Debug, Default)]
pub struct InstanceStore {
    rows: Vec<Instance>,
    positions: HashMap<InstanceKey, usize>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.rows.get(index)
    }

    pub fn position(&self, key: &InstanceKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.rows.iter()
    }

    pub fn apply(&mut self, event: WatchEvent) -> Option<RowChange<'_>> {
        match event {
            WatchEvent::Added(instance) => {
                let key = instance.key();
                if let Some(index) = self.position(&key) {
                    warn!("add for existing instance {key}, refreshing in place");
                    return Some(self.replace(index, instance));
                }
                Some(self.insert(key, instance))
            }
            WatchEvent::Updated(key, instance) => match self.position(&key) {
                Some(index) => Some(self.replace(index, instance)),
                None => {
                    debug!("update before add for {key}, inserting");
                    Some(self.insert(key, instance))
                }
            },
            WatchEvent::Deleted(key) => {
                let Some(index) = self.positions.remove(&key) else {
                    debug!("delete for unknown instance {key}, ignoring");
                    return None;
                };
                self.rows.remove(index);
                for position in self.positions.values_mut() {
                    if *position > index {
                        *position -= 1;
                    }
                }
                Some(RowChange::Removed { index })
            }
        }
    }

    fn insert(&mut self, key: InstanceKey, instance: Instance) -> RowChange<'_> {
        let index = self.rows.len();
        self.positions.insert(key, index);
        self.rows.push(instance);
        RowChange::Inserted {
            index,
            instance: &self.rows[index],
        }
    }

    // The identity key is never rewritten, even if the payload disagrees.
    fn replace(&mut self, index: usize, instance: Instance) -> RowChange<'_> {
        self.rows[index] = instance;
        RowChange::Changed {
            index,
            instance: &self.rows[index],
        }
    }
}
