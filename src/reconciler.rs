//! Decides what an Ingress needs and drives the Probe and finalizer towards it.
//!
//! Every cycle starts from a fresh read of the Ingress and its Probe. There
//! is no cache and no retry loop: a failed step aborts the cycle and the
//! controller redelivers the key, which re-evaluates from scratch.

use k8s_openapi::api::networking::v1::Ingress;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::finalizer::{ensure_finalizer, has_finalizer, release_finalizer};
use crate::prober_config::{self, ConfigSource};
use crate::probes::{build_probe, create_probe, delete_probe, probe_exists};
use crate::store::Store;

/// Label an Ingress carries, set to `"true"`, to opt in to probing.
pub const MONITOR_LABEL: &str = "monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// Add the finalizer, then create the Probe.
    Create,
    /// The Probe exists but the finalizer does not; add it.
    Adopt,
    /// Delete the Probe, then release the finalizer.
    Cleanup,
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The Ingress is no longer in the store.
    IngressGone,
    Applied(ProbeAction),
}

pub fn is_monitored(ingress: &Ingress) -> bool {
    ingress.labels().get(MONITOR_LABEL).map(String::as_str) == Some("true")
}

pub fn is_deleting(ingress: &Ingress) -> bool {
    ingress.meta().deletion_timestamp.is_some()
}

/// Host of the first rule, the address the Probe targets.
pub fn host_rule(ingress: &Ingress) -> Option<&str> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .and_then(|rules| rules.first())
        .and_then(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty())
}

pub fn determine_action(ingress: &Ingress, probe_exists: bool) -> ProbeAction {
    let wanted = is_monitored(ingress) && !is_deleting(ingress);
    let finalized = has_finalizer(ingress);
    match (wanted, probe_exists, finalized) {
        (true, false, _) => ProbeAction::Create,
        (true, true, false) => ProbeAction::Adopt,
        (true, true, true) => ProbeAction::NoOp,
        (false, true, _) | (false, false, true) => ProbeAction::Cleanup,
        (false, false, false) => ProbeAction::NoOp,
    }
}

pub struct Reconciler<S> {
    store: S,
    config_source: ConfigSource,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, config_source: ConfigSource) -> Self {
        Reconciler {
            store,
            config_source,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome> {
        let Some(ingress) = self.store.get_ingress(namespace, name).await? else {
            debug!(name, namespace, "ingress gone");
            return Ok(Outcome::IngressGone);
        };

        let exists = probe_exists(&self.store, name, namespace).await?;
        let action = determine_action(&ingress, exists);
        debug!(
            name,
            namespace,
            probe_exists = exists,
            monitored = is_monitored(&ingress),
            deleting = is_deleting(&ingress),
            ?action,
            "determined action"
        );

        match action {
            ProbeAction::Create => self.create(&ingress, namespace, name).await?,
            ProbeAction::Adopt => {
                info!(name, namespace, "adopting existing probe");
                ensure_finalizer(&self.store, &ingress).await?;
            }
            ProbeAction::Cleanup => {
                info!(name, namespace, "cleaning up probe");
                delete_probe(&self.store, name, namespace).await?;
                release_finalizer(&self.store, &ingress).await?;
            }
            ProbeAction::NoOp => {}
        }
        Ok(Outcome::Applied(action))
    }

    async fn create(&self, ingress: &Ingress, namespace: &str, name: &str) -> Result<()> {
        let host = host_rule(ingress).ok_or_else(|| {
            Error::InvalidIngress(format!("{namespace}/{name} has no host in its first rule"))
        })?;
        let settings = prober_config::resolve(&self.store, &self.config_source).await?;
        let probe = build_probe(name, namespace, host, &settings);

        info!(name, namespace, host, "creating probe");
        ensure_finalizer(&self.store, ingress).await?;
        create_probe(&self.store, &probe).await
    }
}
