use kube::api::ObjectMeta;
use tracing::info;

use crate::crd::{Probe, ProbeSpec, ProbeTargetStaticConfig, ProbeTargets, ProberSpec};
use crate::error::Result;
use crate::prober_config::ProberSettings;
use crate::store::Store;

const PROBE_SUFFIX: &str = "-probe";
const PROBE_INTERVAL: &str = "30s";
const PROBE_MODULE: &str = "http_2xx";

pub fn probe_name(ingress_name: &str) -> String {
    format!("{ingress_name}{PROBE_SUFFIX}")
}

/// Inverse of [`probe_name`], used to route Probe events back to their Ingress.
pub fn ingress_name_for(probe_name: &str) -> Option<&str> {
    probe_name
        .strip_suffix(PROBE_SUFFIX)
        .filter(|name| !name.is_empty())
}

pub fn probe_target(host: &str) -> String {
    format!("https://{host}")
}

/// Builds the complete Probe for an Ingress host in one go.
pub fn build_probe(ingress_name: &str, namespace: &str, host: &str, settings: &ProberSettings) -> Probe {
    Probe {
        metadata: ObjectMeta {
            name: Some(probe_name(ingress_name)),
            namespace: Some(namespace.to_string()),
            labels: Some(settings.labels.clone()),
            ..ObjectMeta::default()
        },
        spec: ProbeSpec {
            interval: Some(PROBE_INTERVAL.to_string()),
            module: Some(PROBE_MODULE.to_string()),
            prober: Some(ProberSpec {
                url: settings.prober_url.clone(),
            }),
            targets: Some(ProbeTargets {
                static_config: Some(ProbeTargetStaticConfig {
                    targets: vec![probe_target(host)],
                    labels: None,
                }),
            }),
        },
    }
}

pub async fn probe_exists<S: Store + ?Sized>(store: &S, ingress_name: &str, namespace: &str) -> Result<bool> {
    Ok(store
        .get_probe(namespace, &probe_name(ingress_name))
        .await?
        .is_some())
}

/// Issues a single create. Callers check [`probe_exists`] first; losing a
/// creation race comes back as `Error::AlreadyExists`.
pub async fn create_probe<S: Store + ?Sized>(store: &S, probe: &Probe) -> Result<()> {
    let created = store.create_probe(probe).await?;
    info!(
        probe = ?created.metadata.name,
        namespace = ?created.metadata.namespace,
        targets = ?created.static_targets(),
        "created probe"
    );
    Ok(())
}

/// Deleting a Probe that is already gone succeeds.
pub async fn delete_probe<S: Store + ?Sized>(store: &S, ingress_name: &str, namespace: &str) -> Result<()> {
    let name = probe_name(ingress_name);
    if store.delete_probe(namespace, &name).await? {
        info!(probe = %name, namespace, "deleted probe");
    } else {
        info!(probe = %name, namespace, "probe already absent");
    }
    Ok(())
}
