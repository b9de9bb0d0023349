use anyhow::{Context, Result};
use futures::StreamExt;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::DynamicObject;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event as WatcherEvent, watcher};
use kube::{Api, Client, Config, ResourceExt};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dashboard::{Dashboard, DashboardSender};
use crate::model::{Instance, InstanceKey, WatchEvent, WatchedKind};

const KUBECONFIG_ENV: &str = "KUBECONFIG";
const CLUSTER_SCOPE_LABEL: &str = "-";

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    cluster_names: Vec<String>,
}

impl KubeGateway {
    /// Builds a client from `KUBECONFIG` when it is set, otherwise from the
    /// in-cluster environment, falling back to default inference.
    pub async fn connect(context: Option<String>) -> Result<Self> {
        let kubeconfig_path = std::env::var(KUBECONFIG_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let (config, kubeconfig) = match kubeconfig_path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(&path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
                let options = KubeConfigOptions {
                    context: context.clone(),
                    cluster: None,
                    user: None,
                };
                let config = Config::from_custom_kubeconfig(kubeconfig.clone(), &options)
                    .await
                    .context("failed to load Kubernetes configuration from kubeconfig")?;
                (config, Some(kubeconfig))
            }
            None => {
                if context.is_some() {
                    anyhow::bail!("--context requires {KUBECONFIG_ENV} to point at a kubeconfig");
                }
                let config = match Config::incluster() {
                    Ok(config) => config,
                    Err(error) => {
                        debug!("in-cluster configuration unavailable: {error}");
                        Config::infer()
                            .await
                            .context("failed to infer Kubernetes configuration")?
                    }
                };
                (config, None)
            }
        };

        let cluster = config.cluster_url.to_string();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let active_context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());
        let mut cluster_names = kubeconfig
            .as_ref()
            .map(|cfg| {
                cfg.clusters
                    .iter()
                    .map(|named| named.name.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        cluster_names.sort();
        cluster_names.dedup();

        info!("connected to {cluster} via context '{active_context}'");
        Ok(Self {
            client,
            context: active_context,
            cluster,
            cluster_names,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn cluster_names(&self) -> &[String] {
        &self.cluster_names
    }

    /// Starts one watch subscription. Its events reach the dashboard only
    /// through `ui`; the task ends once the UI stops accepting submissions.
    pub fn spawn_watch(
        &self,
        kind: WatchedKind,
        namespace: Option<String>,
        ui: DashboardSender,
    ) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            let resource = kind.api_resource();
            let api: Api<DynamicObject> = match namespace.as_deref() {
                Some(namespace) if kind.namespaced => {
                    Api::namespaced_with(client, namespace, &resource)
                }
                _ => Api::all_with(client, &resource),
            };
            let mut adapter = EventAdapter::new(kind.clone());
            let mut events = watcher(api, watcher::Config::default())
                .default_backoff()
                .boxed();
            info!("watching {kind}");

            while let Some(next) = events.next().await {
                if ui.is_closed() {
                    debug!("ui closed, stopping watch for {kind}");
                    return;
                }
                match next {
                    Ok(event) => {
                        for translated in adapter.translate(event) {
                            if ui
                                .submit(move |dash: &mut Dashboard| dash.apply(translated))
                                .is_err()
                            {
                                debug!("ui closed, stopping watch for {kind}");
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        warn!("watch stream error for {kind}: {error}");
                        let message = format!("watch {kind}: {error} (retrying)");
                        if ui
                            .submit(move |dash: &mut Dashboard| dash.set_status(message))
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            warn!("watch stream for {kind} ended");
        })
    }
}

/// Turns raw watcher events into store events and reconciles relists.
///
/// Owned by the watch task, so its bookkeeping never crosses threads.
pub struct EventAdapter {
    kind: WatchedKind,
    reported: BTreeSet<InstanceKey>,
    relist: Option<BTreeSet<InstanceKey>>,
}

impl EventAdapter {
    pub fn new(kind: WatchedKind) -> Self {
        Self {
            kind,
            reported: BTreeSet::new(),
            relist: None,
        }
    }

    pub fn translate(&mut self, event: WatcherEvent<DynamicObject>) -> Vec<WatchEvent> {
        match event {
            WatcherEvent::Init => {
                self.relist = Some(BTreeSet::new());
                Vec::new()
            }
            WatcherEvent::InitApply(object) => {
                let instance = instance_from_object(&self.kind, &object);
                let key = instance.key();
                if let Some(seen) = self.relist.as_mut() {
                    seen.insert(key.clone());
                }
                if self.reported.insert(key.clone()) {
                    vec![WatchEvent::Added(instance)]
                } else {
                    vec![WatchEvent::Updated(key, instance)]
                }
            }
            WatcherEvent::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let stale = self
                    .reported
                    .difference(&seen)
                    .cloned()
                    .map(WatchEvent::Deleted)
                    .collect::<Vec<_>>();
                if !stale.is_empty() {
                    info!("relist of {} dropped {} stale instances", self.kind, stale.len());
                }
                self.reported = seen;
                stale
            }
            WatcherEvent::Apply(object) => {
                let instance = instance_from_object(&self.kind, &object);
                let key = instance.key();
                self.reported.insert(key.clone());
                vec![WatchEvent::Updated(key, instance)]
            }
            WatcherEvent::Delete(object) => {
                let key = instance_key(&self.kind, &object);
                self.reported.remove(&key);
                vec![WatchEvent::Deleted(key)]
            }
        }
    }
}

pub fn instance_from_object(kind: &WatchedKind, object: &DynamicObject) -> Instance {
    let key = instance_key(kind, object);
    Instance {
        name: key.name,
        status: coarse_status(&object.data),
        kind: key.kind,
        address: object
            .types
            .as_ref()
            .map(|types| types.api_version.clone())
            .unwrap_or_else(|| kind.api_version()),
        cluster_label: key.scope,
        detail_text: yaml_detail(object),
    }
}

fn instance_key(kind: &WatchedKind, object: &DynamicObject) -> InstanceKey {
    let object_kind = object
        .types
        .as_ref()
        .map(|types| types.kind.clone())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| kind.kind.clone());
    let scope = object
        .namespace()
        .unwrap_or_else(|| CLUSTER_SCOPE_LABEL.to_string());
    InstanceKey::new(object_kind, scope, object.name_any())
}

/// Coarse state label from the object's `status` block.
pub fn coarse_status(data: &Value) -> String {
    let Some(status) = data.get("status") else {
        return "Unknown".to_string();
    };

    if let Some(phase) = status.get("phase").and_then(Value::as_str) {
        return phase.to_string();
    }

    if let Some(conditions) = status.get("conditions").and_then(Value::as_array) {
        let condition_true = |wanted: &str| {
            conditions.iter().any(|condition| {
                condition.get("type").and_then(Value::as_str) == Some(wanted)
                    && condition.get("status").and_then(Value::as_str) == Some("True")
            })
        };
        if conditions.iter().any(|condition| {
            condition.get("type").and_then(Value::as_str) == Some("ReplicaFailure")
                && condition.get("status").and_then(Value::as_str) == Some("True")
        }) {
            return "Failed".to_string();
        }
        if condition_true("Available") || condition_true("Ready") {
            return "Available".to_string();
        }
        if condition_true("Complete") {
            return "Complete".to_string();
        }
        if condition_true("Failed") {
            return "Failed".to_string();
        }
        if condition_true("Progressing") {
            return "Progressing".to_string();
        }
    }

    let desired = status
        .get("replicas")
        .or_else(|| data.get("spec").and_then(|spec| spec.get("replicas")))
        .and_then(Value::as_i64);
    let ready = status
        .get("readyReplicas")
        .or_else(|| status.get("numberReady"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    match desired {
        Some(0) => "ScaledDown".to_string(),
        Some(desired) if ready >= desired => "Ready".to_string(),
        Some(_) => "Pending".to_string(),
        None => "Unknown".to_string(),
    }
}

fn yaml_detail(object: &DynamicObject) -> String {
    match serde_yaml::to_string(object) {
        Ok(text) => text,
        Err(error) => {
            warn!("failed to serialize {}: {error}", object.name_any());
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventAdapter, coarse_status, instance_from_object};
    use crate::model::{InstanceKey, WatchEvent, WatchedKind};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::{DynamicObject, TypeMeta};
    use kube::runtime::watcher::Event;
    use serde_json::json;

    fn deployment(name: &str, namespace: &str, data: serde_json::Value) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "apps/v1".to_string(),
                kind: "Deployment".to_string(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            data,
        }
    }

    fn key(name: &str) -> InstanceKey {
        InstanceKey::new("Deployment", "default", name)
    }

    #[test]
    fn object_converts_to_instance() {
        let object = deployment(
            "web",
            "default",
            json!({
                "spec": { "replicas": 2 },
                "status": {
                    "replicas": 2,
                    "readyReplicas": 2,
                    "conditions": [{ "type": "Available", "status": "True" }]
                }
            }),
        );
        let instance = instance_from_object(&WatchedKind::deployments(), &object);
        assert_eq!(instance.name, "web");
        assert_eq!(instance.kind, "Deployment");
        assert_eq!(instance.address, "apps/v1");
        assert_eq!(instance.cluster_label, "default");
        assert_eq!(instance.status, "Available");
        assert!(instance.detail_text.contains("name: web"));
        assert!(instance.detail_text.contains("readyReplicas: 2"));
    }

    #[test]
    fn missing_type_meta_falls_back_to_watched_kind() {
        let mut object = deployment("web", "default", json!({}));
        object.types = None;
        object.metadata.namespace = None;
        let instance = instance_from_object(&WatchedKind::deployments(), &object);
        assert_eq!(instance.kind, "Deployment");
        assert_eq!(instance.address, "apps/v1");
        assert_eq!(instance.cluster_label, "-");
        assert_eq!(instance.status, "Unknown");
    }

    #[test]
    fn coarse_status_reads_common_shapes() {
        assert_eq!(coarse_status(&json!({"status": {"phase": "Running"}})), "Running");
        assert_eq!(
            coarse_status(&json!({"status": {"conditions": [
                {"type": "Progressing", "status": "True"},
                {"type": "Available", "status": "False"}
            ]}})),
            "Progressing"
        );
        assert_eq!(
            coarse_status(&json!({"status": {"conditions": [
                {"type": "ReplicaFailure", "status": "True"}
            ]}})),
            "Failed"
        );
        assert_eq!(
            coarse_status(&json!({"spec": {"replicas": 3}, "status": {"readyReplicas": 1}})),
            "Pending"
        );
        assert_eq!(
            coarse_status(&json!({"status": {"replicas": 0}})),
            "ScaledDown"
        );
        assert_eq!(coarse_status(&json!({"spec": {}})), "Unknown");
    }

    #[test]
    fn adapter_maps_watch_events() {
        let mut adapter = EventAdapter::new(WatchedKind::deployments());
        let web = deployment("web", "default", json!({}));

        assert!(adapter.translate(Event::Init).is_empty());
        let added = adapter.translate(Event::InitApply(web.clone()));
        assert!(matches!(added.as_slice(), [WatchEvent::Added(instance)] if instance.name == "web"));
        assert!(adapter.translate(Event::InitDone).is_empty());

        let updated = adapter.translate(Event::Apply(web.clone()));
        assert!(matches!(updated.as_slice(), [WatchEvent::Updated(k, _)] if *k == key("web")));

        assert_eq!(
            adapter.translate(Event::Delete(web)),
            vec![WatchEvent::Deleted(key("web"))]
        );
    }

    #[test]
    fn relist_deletes_objects_that_disappeared() {
        let mut adapter = EventAdapter::new(WatchedKind::deployments());
        adapter.translate(Event::Init);
        adapter.translate(Event::InitApply(deployment("a", "default", json!({}))));
        adapter.translate(Event::InitApply(deployment("b", "default", json!({}))));
        adapter.translate(Event::InitDone);
        adapter.translate(Event::Apply(deployment("c", "default", json!({}))));

        adapter.translate(Event::Init);
        let relisted = adapter.translate(Event::InitApply(deployment("b", "default", json!({}))));
        assert!(matches!(relisted.as_slice(), [WatchEvent::Updated(k, _)] if *k == key("b")));
        let stale = adapter.translate(Event::InitDone);
        assert_eq!(
            stale,
            vec![
                WatchEvent::Deleted(key("a")),
                WatchEvent::Deleted(key("c")),
            ]
        );

        adapter.translate(Event::Init);
        adapter.translate(Event::InitApply(deployment("b", "default", json!({}))));
        assert!(adapter.translate(Event::InitDone).is_empty());
    }
}
