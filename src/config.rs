use crate::model::WatchedKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const CONFIG_ENV: &str = "KESTREL_CONFIG";

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RuntimeConfigSnapshot {
    pub source: Option<String>,
    pub clusters: Vec<String>,
    pub resources: Vec<WatchedKind>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct KestrelConfigFile {
    #[serde(default)]
    clusters: Vec<String>,
    #[serde(default, alias = "kinds")]
    resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ResourceSpec {
    Alias(String),
    Full {
        #[serde(default)]
        group: String,
        #[serde(default = "default_version")]
        version: String,
        kind: String,
        #[serde(default)]
        plural: Option<String>,
        #[serde(default = "default_namespaced")]
        namespaced: bool,
    },
}

impl ResourceSpec {
    fn into_kind(self) -> Result<WatchedKind> {
        match self {
            Self::Alias(token) => WatchedKind::from_token(&token)
                .with_context(|| format!("unknown resource alias '{token}'")),
            Self::Full {
                group,
                version,
                kind,
                plural,
                namespaced,
            } => {
                let plural = plural.unwrap_or_else(|| format!("{}s", kind.to_ascii_lowercase()));
                Ok(WatchedKind::new(&group, &version, &kind, &plural, namespaced))
            }
        }
    }
}

impl RuntimeConfigWatcher {
    pub fn discover() -> Self {
        Self::at(discover_config_path())
    }

    pub fn at(path: Option<PathBuf>) -> Self {
        Self {
            path,
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<RuntimeConfigSnapshot> {
        let Some(path) = self.path.clone() else {
            return Ok(RuntimeConfigSnapshot::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read runtime config {}", path.display()))?;
        self.modified = modified_at(&path);
        parse_config(&raw)
            .with_context(|| format!("failed to parse runtime config {}", path.display()))
            .map(|snapshot| RuntimeConfigSnapshot {
                source: Some(path.display().to_string()),
                ..snapshot
            })
    }

    /// Returns a fresh snapshot when the file appeared, vanished or changed.
    pub fn reload_if_changed(&mut self) -> Result<Option<RuntimeConfigSnapshot>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(RuntimeConfigSnapshot::default()));
        }

        if modified_at(&current_path) != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn parse_config(raw: &str) -> Result<RuntimeConfigSnapshot> {
    if raw.trim().is_empty() {
        return Ok(RuntimeConfigSnapshot::default());
    }
    let parsed: KestrelConfigFile = serde_yaml::from_str(raw)?;
    let resources = parsed
        .resources
        .into_iter()
        .map(ResourceSpec::into_kind)
        .collect::<Result<Vec<_>>>()?;
    let clusters = parsed
        .clusters
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    Ok(RuntimeConfigSnapshot {
        source: None,
        clusters,
        resources,
    })
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|meta| meta.modified().ok())
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_namespaced() -> bool {
    true
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kestrel.yaml"),
        PathBuf::from("kestrel.yml"),
        PathBuf::from(".kestrel.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kestrel/config.yaml"),
            PathBuf::from(&home).join(".kestrel.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{RuntimeConfigWatcher, parse_config};
    use crate::model::WatchedKind;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kestrel-{}-{name}.yaml", std::process::id()))
    }

    #[test]
    fn parses_clusters_and_resources() {
        let snapshot = parse_config(
            r#"
clusters: [prod-eu, " staging ", ""]
resources:
  - sts
  - group: example.io
    version: v1alpha1
    kind: Widget
    plural: widgetries
  - kind: ConfigMap
"#,
        )
        .expect("valid config");
        assert_eq!(snapshot.clusters, vec!["prod-eu", "staging"]);
        assert_eq!(
            snapshot.resources,
            vec![
                WatchedKind::new("apps", "v1", "StatefulSet", "statefulsets", true),
                WatchedKind::new("example.io", "v1alpha1", "Widget", "widgetries", true),
                WatchedKind::new("", "v1", "ConfigMap", "configmaps", true),
            ]
        );
    }

    #[test]
    fn empty_file_is_an_empty_snapshot() {
        let snapshot = parse_config("\n").expect("empty config");
        assert!(snapshot.clusters.is_empty());
        assert!(snapshot.resources.is_empty());
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let error = parse_config("resources: [gizmos]").expect_err("unknown alias");
        assert!(error.to_string().contains("gizmos"));
    }

    #[test]
    fn watcher_reports_changes_and_removal() {
        let path = scratch_file("reload");
        fs::write(&path, "clusters: [one]\n").expect("write config");

        let mut watcher = RuntimeConfigWatcher::at(Some(path.clone()));
        let first = watcher.load_current().expect("load");
        assert_eq!(first.clusters, vec!["one"]);
        assert_eq!(first.source, Some(path.display().to_string()));
        assert_eq!(watcher.reload_if_changed().expect("unchanged"), None);

        fs::remove_file(&path).expect("remove config");
        let cleared = watcher
            .reload_if_changed()
            .expect("reload after removal")
            .expect("removal is a change");
        assert!(cleared.clusters.is_empty());
    }

    #[test]
    fn missing_path_loads_defaults() {
        let mut watcher = RuntimeConfigWatcher::at(None);
        let snapshot = watcher.load_current().expect("defaults");
        assert_eq!(snapshot.source, None);
        assert!(snapshot.clusters.is_empty());
    }
}
