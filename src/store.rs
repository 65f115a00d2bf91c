use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};

use crate::crd::Probe;
use crate::error::{is_not_found, Error, Result};

/// Everything the reconciler needs from the cluster.
///
/// Lookups return `None` and deletes return `false` for a missing object;
/// a 404 never surfaces as an [`Error`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;

    /// Replaces the Ingress, guarded by its `resourceVersion`.
    async fn update_ingress(&self, ingress: &Ingress) -> Result<Ingress>;

    async fn get_probe(&self, namespace: &str, name: &str) -> Result<Option<Probe>>;

    async fn create_probe(&self, probe: &Probe) -> Result<Probe>;

    /// Returns whether a Probe was actually deleted.
    async fn delete_probe(&self, namespace: &str, name: &str) -> Result<bool>;

    /// ConfigMaps in `namespace`, or in every namespace when `None`.
    async fn list_config_maps(&self, namespace: Option<&str>) -> Result<Vec<ConfigMap>>;
}

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }
}

fn namespace_of(ingress: &Ingress) -> Result<String> {
    ingress
        .namespace()
        .ok_or_else(|| Error::InvalidIngress(format!("{} has no namespace", ingress.name_any())))
}

#[async_trait]
impl Store for KubeStore {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_ingress(&self, ingress: &Ingress) -> Result<Ingress> {
        let namespace = namespace_of(ingress)?;
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api
            .replace(&ingress.name_any(), &PostParams::default(), ingress)
            .await?)
    }

    async fn get_probe(&self, namespace: &str, name: &str) -> Result<Option<Probe>> {
        let api: Api<Probe> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_probe(&self, probe: &Probe) -> Result<Probe> {
        let namespace = probe.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<Probe> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api.create(&PostParams::default(), probe).await?)
    }

    async fn delete_probe(&self, namespace: &str, name: &str) -> Result<bool> {
        let api: Api<Probe> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_config_maps(&self, namespace: Option<&str>) -> Result<Vec<ConfigMap>> {
        let api: Api<ConfigMap> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }
}
