use kube::core::{ApiResource, GroupVersionKind};
use std::fmt::{Display, Formatter};

pub const ALL_CLUSTERS: &str = "all";

/// Stable identity of a watched object, independent of its display row.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub kind: String,
    pub scope: String,
    pub name: String,
}

impl InstanceKey {
    pub fn new(kind: impl Into<String>, scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.scope, self.name)
    }
}

/// One observed object as the dashboard displays it.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Instance {
    pub name: String,
    pub status: String,
    pub kind: String,
    pub address: String,
    pub cluster_label: String,
    pub detail_text: String,
}

impl Instance {
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(&self.kind, &self.cluster_label, &self.name)
    }

    pub fn columns(&self) -> [String; 5] {
        [
            self.name.clone(),
            self.status.clone(),
            self.kind.clone(),
            self.address.clone(),
            self.cluster_label.clone(),
        ]
    }
}

/// Lifecycle notification handed to the store on the UI thread.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WatchEvent {
    Added(Instance),
    Updated(InstanceKey, Instance),
    Deleted(InstanceKey),
}

impl WatchEvent {
    pub fn summary(&self) -> String {
        match self {
            Self::Added(instance) => format!("Added {}", instance.key()),
            Self::Updated(key, _) => format!("Updated {key}"),
            Self::Deleted(key) => format!("Deleted {key}"),
        }
    }
}

/// Row-level effect of a successful store mutation. Indices are store positions.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowChange<'a> {
    Inserted { index: usize, instance: &'a Instance },
    Changed { index: usize, instance: &'a Instance },
    Removed { index: usize },
}

impl RowChange<'_> {
    pub fn index(&self) -> usize {
        match self {
            Self::Inserted { index, .. } | Self::Changed { index, .. } | Self::Removed { index } => {
                *index
            }
        }
    }

    /// Display row in the instance table; row 0 is the header.
    pub fn display_row(&self) -> usize {
        self.index() + 1
    }
}

/// Selectable cluster labels. `all` is always present and always first.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClusterList {
    names: Vec<String>,
}

impl ClusterList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = vec![ALL_CLUSTERS.to_string()];
        for name in names {
            let name = name.into();
            let name = name.trim();
            if name.is_empty() || list.iter().any(|existing| existing == name) {
                continue;
            }
            list.push(name.to_string());
        }
        Self { names: list }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|existing| existing == name)
    }
}

impl Default for ClusterList {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

/// A resource type the dashboard subscribes to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WatchedKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl WatchedKind {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    pub fn deployments() -> Self {
        Self::new("apps", "v1", "Deployment", "deployments", true)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token.trim().to_ascii_lowercase().as_str() {
            "deploy" | "deployment" | "deployments" | "dp" => Self::deployments(),
            "sts" | "statefulset" | "statefulsets" => {
                Self::new("apps", "v1", "StatefulSet", "statefulsets", true)
            }
            "ds" | "daemonset" | "daemonsets" | "daemon-set" | "daemon-sets" => {
                Self::new("apps", "v1", "DaemonSet", "daemonsets", true)
            }
            "rs" | "replicaset" | "replicasets" | "replica-set" | "replica-sets" => {
                Self::new("apps", "v1", "ReplicaSet", "replicasets", true)
            }
            "po" | "pod" | "pods" => Self::new("", "v1", "Pod", "pods", true),
            "svc" | "service" | "services" => Self::new("", "v1", "Service", "services", true),
            "job" | "jobs" => Self::new("batch", "v1", "Job", "jobs", true),
            "cj" | "cronjob" | "cronjobs" | "cron-job" | "cron-jobs" => {
                Self::new("batch", "v1", "CronJob", "cronjobs", true)
            }
            "node" | "nodes" | "no" => Self::new("", "v1", "Node", "nodes", false),
            "ns" | "namespace" | "namespaces" => {
                Self::new("", "v1", "Namespace", "namespaces", false)
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl Display for WatchedKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.plural)
    }
}
