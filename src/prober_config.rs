//! Resolution of the blackbox exporter settings stamped onto every Probe.
//!
//! Operators tune the Probes through a ConfigMap with two optional keys:
//! `proberURL` (the blackbox exporter address) and `labels` (a YAML mapping
//! copied onto each Probe so the right Prometheus instance selects it).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::Store;

pub const DEFAULT_CONFIG_MAP_NAME: &str = "prober-blackbox-config";
pub const DEFAULT_PROBER_URL: &str = "prober-operator-prometheus-blackbox-exporter:9115";

const PROBER_URL_KEY: &str = "proberURL";
const LABELS_KEY: &str = "labels";

#[derive(Debug, Clone, PartialEq)]
pub struct ProberSettings {
    pub labels: BTreeMap<String, String>,
    pub prober_url: String,
}

impl Default for ProberSettings {
    fn default() -> Self {
        ProberSettings {
            labels: default_labels(),
            prober_url: DEFAULT_PROBER_URL.to_string(),
        }
    }
}

pub fn default_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/instance".to_string(),
            "kube-prometheus-stack".to_string(),
        ),
        ("release".to_string(), "kube-prometheus-stack".to_string()),
    ])
}

/// Where to look for the settings ConfigMap.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    /// `None` scans every namespace.
    pub namespace: Option<String>,
}

impl Default for ConfigSource {
    fn default() -> Self {
        ConfigSource {
            name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            namespace: None,
        }
    }
}

/// Reads the settings ConfigMap fresh from the store. The first ConfigMap
/// with a matching name wins.
pub async fn resolve<S: Store + ?Sized>(store: &S, source: &ConfigSource) -> Result<ProberSettings> {
    let config_maps = store.list_config_maps(source.namespace.as_deref()).await?;
    let found = config_maps.iter().find(|cm| cm.name_any() == source.name);
    match found {
        Some(cm) => debug!(
            name = %source.name,
            namespace = ?cm.namespace(),
            "using prober ConfigMap"
        ),
        None => debug!(name = %source.name, "prober ConfigMap not found, using defaults"),
    }
    settings_from_config_map(found)
}

/// Each key falls back to its default on its own. Malformed `labels` is an
/// error rather than a fallback.
pub fn settings_from_config_map(config_map: Option<&ConfigMap>) -> Result<ProberSettings> {
    let mut settings = ProberSettings::default();
    let Some(cm) = config_map else {
        return Ok(settings);
    };
    let Some(data) = cm.data.as_ref() else {
        return Ok(settings);
    };

    if let Some(url) = data.get(PROBER_URL_KEY) {
        settings.prober_url = url.clone();
    }
    if let Some(raw) = data.get(LABELS_KEY) {
        settings.labels = decode_labels(raw).map_err(|source| Error::ConfigDecode {
            name: cm.name_any(),
            source,
        })?;
    }
    Ok(settings)
}

fn decode_labels(raw: &str) -> Result<BTreeMap<String, String>, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    // `null` and `~` mean no labels as well.
    let labels: Option<BTreeMap<String, String>> = serde_yaml::from_str(raw)?;
    Ok(labels.unwrap_or_default())
}
