//! In-memory [`Store`] and fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::crd::Probe;
use crate::error::{api_error, Result};
use crate::store::Store;

/// A successful mutation, keyed by `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    UpdateIngress(String),
    CreateProbe(String),
    DeleteProbe(String),
}

#[derive(Default)]
struct State {
    ingresses: BTreeMap<String, Ingress>,
    probes: BTreeMap<String, Probe>,
    config_maps: Vec<ConfigMap>,
    writes: Vec<Write>,
    version: u64,
    fail_reads: bool,
    conflict_on_next_update: bool,
    fail_probe_deletes: bool,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

/// Behaves like the API server for the calls the reconciler makes:
/// optimistic concurrency on Ingress updates, name uniqueness on Probe
/// creation, and removal of a deleting Ingress once its finalizers are gone.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl MemoryStore {
    pub fn insert_ingress(&self, ingress: impl Into<Ingress>) -> Ingress {
        let mut ingress = ingress.into();
        let mut state = self.state.lock().unwrap();
        ingress.metadata.resource_version = Some(state.next_version());
        let k = key(&ingress.namespace().unwrap(), &ingress.name_any());
        state.ingresses.insert(k, ingress.clone());
        ingress
    }

    pub fn insert_probe(&self, probe: Probe) {
        let mut state = self.state.lock().unwrap();
        let k = key(&probe.namespace().unwrap(), &probe.name_any());
        state.probes.insert(k, probe);
    }

    pub fn insert_config_map(&self, config_map: ConfigMap) {
        self.state.lock().unwrap().config_maps.push(config_map);
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.state.lock().unwrap().ingresses.get(&key(namespace, name)).cloned()
    }

    pub fn probe(&self, namespace: &str, name: &str) -> Option<Probe> {
        self.state.lock().unwrap().probes.get(&key(namespace, name)).cloned()
    }

    /// Simulates a concurrent writer bumping the Ingress.
    pub fn touch_ingress(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        if let Some(ingress) = state.ingresses.get_mut(&key(namespace, name)) {
            ingress.metadata.resource_version = Some(version);
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    pub fn conflict_on_next_update(&self) {
        self.state.lock().unwrap().conflict_on_next_update = true;
    }

    pub fn fail_probe_deletes(&self) {
        self.state.lock().unwrap().fail_probe_deletes = true;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(api_error(500, "InternalError").into());
        }
        Ok(state.ingresses.get(&key(namespace, name)).cloned())
    }

    async fn update_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        let mut state = self.state.lock().unwrap();
        let k = key(&ingress.namespace().unwrap(), &ingress.name_any());
        if std::mem::take(&mut state.conflict_on_next_update) {
            return Err(api_error(409, "Conflict").into());
        }
        let Some(current) = state.ingresses.get(&k) else {
            return Err(api_error(404, "NotFound").into());
        };
        if current.metadata.resource_version != ingress.metadata.resource_version {
            return Err(api_error(409, "Conflict").into());
        }

        let mut stored = ingress.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.writes.push(Write::UpdateIngress(k.clone()));
        if stored.metadata.deletion_timestamp.is_some() && stored.finalizers().is_empty() {
            state.ingresses.remove(&k);
        } else {
            state.ingresses.insert(k, stored.clone());
        }
        Ok(stored)
    }

    async fn get_probe(&self, namespace: &str, name: &str) -> Result<Option<Probe>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(api_error(500, "InternalError").into());
        }
        Ok(state.probes.get(&key(namespace, name)).cloned())
    }

    async fn create_probe(&self, probe: &Probe) -> Result<Probe> {
        let mut state = self.state.lock().unwrap();
        let k = key(&probe.namespace().unwrap(), &probe.name_any());
        if state.probes.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists").into());
        }
        let mut stored = probe.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.probes.insert(k.clone(), stored.clone());
        state.writes.push(Write::CreateProbe(k));
        Ok(stored)
    }

    async fn delete_probe(&self, namespace: &str, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_probe_deletes {
            return Err(api_error(503, "ServiceUnavailable").into());
        }
        let k = key(namespace, name);
        if state.probes.remove(&k).is_none() {
            return Ok(false);
        }
        state.writes.push(Write::DeleteProbe(k));
        Ok(true)
    }

    async fn list_config_maps(&self, namespace: Option<&str>) -> Result<Vec<ConfigMap>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .config_maps
            .iter()
            .filter(|cm| namespace.is_none() || cm.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }
}

pub struct IngressBuilder {
    ingress: Ingress,
}

pub fn ingress(namespace: &str, name: &str) -> IngressBuilder {
    IngressBuilder {
        ingress: Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Ingress::default()
        },
    }
}

impl IngressBuilder {
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.ingress.labels_mut().insert(key.to_string(), value.to_string());
        self
    }

    pub fn monitored(self) -> Self {
        self.label("monitor", "true")
    }

    pub fn host(mut self, host: &str) -> Self {
        self.ingress.spec = Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()),
                http: None,
            }]),
            ..IngressSpec::default()
        });
        self
    }

    pub fn finalizer(mut self, finalizer: &str) -> Self {
        self.ingress.finalizers_mut().push(finalizer.to_string());
        self
    }

    pub fn deleting(mut self) -> Self {
        let time: Time = serde_json::from_value(serde_json::json!("2024-06-01T12:00:00Z")).unwrap();
        self.ingress.metadata.deletion_timestamp = Some(time);
        self
    }
}

impl From<IngressBuilder> for Ingress {
    fn from(builder: IngressBuilder) -> Self {
        builder.ingress
    }
}

pub fn config_map(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..ConfigMap::default()
    }
}
