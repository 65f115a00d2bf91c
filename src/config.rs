use std::time::Duration;

use clap::Parser;

use crate::prober_config::{ConfigSource, DEFAULT_CONFIG_MAP_NAME};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Only watch Ingresses and Probes in this namespace.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Name of the ConfigMap holding `proberURL` and `labels`.
    #[arg(long, env = "PROBER_CONFIG_MAP", default_value = DEFAULT_CONFIG_MAP_NAME)]
    pub config_map_name: String,

    /// Restrict the ConfigMap lookup to one namespace.
    #[arg(long, env = "PROBER_CONFIG_NAMESPACE")]
    pub config_map_namespace: Option<String>,

    /// Delay before a failed reconcile is retried.
    #[arg(long, env = "ERROR_REQUEUE_SECS", default_value_t = 5)]
    pub error_requeue_secs: u64,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Args {
    pub fn config_source(&self) -> ConfigSource {
        ConfigSource {
            name: self.config_map_name.clone(),
            namespace: self.config_map_namespace.clone(),
        }
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
