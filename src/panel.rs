use crate::model::{ALL_CLUSTERS, ClusterList, RowChange};
use tracing::warn;

pub const INSTANCE_HEADERS: [&str; 5] = ["Name", "Status", "Kind", "Address", "Cluster"];

/// Display-side model of the instance table. Row 0 is the header, so the
/// data row for store position `i` is `i + 1`.
#[derive(Debug, Default)]
pub struct InstancePanel {
    rows: Vec<[String; 5]>,
}

impl InstancePanel {
    /// Applies one store change and returns the affected display row.
    pub fn on_change(&mut self, change: &RowChange<'_>) -> usize {
        match *change {
            RowChange::Inserted { index, instance } => {
                if index > self.rows.len() {
                    warn!(
                        "insert at row {} beyond table length {}, appending",
                        index + 1,
                        self.rows.len()
                    );
                    self.rows.push(instance.columns());
                    return self.rows.len();
                }
                self.rows.insert(index, instance.columns());
            }
            RowChange::Changed { index, instance } => match self.rows.get_mut(index) {
                Some(row) => *row = instance.columns(),
                None => warn!("change for missing row {}", index + 1),
            },
            RowChange::Removed { index } => {
                if index < self.rows.len() {
                    self.rows.remove(index);
                } else {
                    warn!("remove for missing row {}", index + 1);
                }
            }
        }
        change.display_row()
    }

    pub fn rows(&self) -> &[[String; 5]] {
        &self.rows
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn title(&self, cluster: &str) -> String {
        if cluster == ALL_CLUSTERS {
            format!("[2] Instances ({})", self.rows.len())
        } else {
            format!("[2] Instances ({}) @ {cluster}", self.rows.len())
        }
    }
}

/// The cluster selector. Selection is a label only.
#[derive(Debug, Default)]
pub struct ClusterPanel {
    clusters: ClusterList,
    selected: usize,
}

impl ClusterPanel {
    pub fn new(clusters: ClusterList) -> Self {
        Self {
            clusters,
            selected: 0,
        }
    }

    pub fn set_clusters(&mut self, clusters: ClusterList) {
        let current = self.selected_label().to_string();
        self.selected = clusters.position(&current).unwrap_or(0);
        self.clusters = clusters;
    }

    pub fn clusters(&self) -> &ClusterList {
        &self.clusters
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_label(&self) -> &str {
        self.clusters.get(self.selected).unwrap_or(ALL_CLUSTERS)
    }

    pub fn select(&mut self, row: usize) -> bool {
        let row = row.min(self.clusters.len().saturating_sub(1));
        let changed = row != self.selected;
        self.selected = row;
        changed
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        let max_index = self.clusters.len().saturating_sub(1) as isize;
        let next = (self.selected as isize + delta).clamp(0, max_index) as usize;
        self.select(next)
    }

    pub fn title(&self) -> String {
        format!("[1] Clusters ({})", self.clusters.len())
    }
}

/// Translates store mutations into table rows and owns the cluster rows.
#[derive(Debug, Default)]
pub struct PanelBinder {
    pub instances: InstancePanel,
    pub clusters: ClusterPanel,
}

impl PanelBinder {
    pub fn new(clusters: ClusterList) -> Self {
        Self {
            instances: InstancePanel::default(),
            clusters: ClusterPanel::new(clusters),
        }
    }

    pub fn on_change(&mut self, change: &RowChange<'_>) -> usize {
        self.instances.on_change(change)
    }

    pub fn instances_title(&self) -> String {
        self.instances.title(self.clusters.selected_label())
    }
}
