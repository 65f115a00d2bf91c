//! Finalizer bookkeeping on the Ingress.
//!
//! The finalizer is added before a Probe is created and removed only once the
//! Probe is gone, so the API server cannot finish deleting an Ingress whose
//! Probe might still exist.

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::info;

use crate::error::Result;
use crate::store::Store;

pub const PROBE_FINALIZER: &str = "prober.io/prober.finalizer";

pub fn has_finalizer(ingress: &Ingress) -> bool {
    ingress.finalizers().iter().any(|f| f == PROBE_FINALIZER)
}

/// Adds the finalizer and persists the Ingress. Returns `false` without
/// writing when it is already there.
pub async fn ensure_finalizer<S: Store + ?Sized>(store: &S, ingress: &Ingress) -> Result<bool> {
    if has_finalizer(ingress) {
        return Ok(false);
    }
    let mut updated = ingress.clone();
    updated.finalizers_mut().push(PROBE_FINALIZER.to_string());
    store.update_ingress(&updated).await?;
    info!(name = %ingress.name_any(), namespace = ?ingress.namespace(), "added finalizer");
    Ok(true)
}

/// Removes the finalizer and persists the Ingress. Only call this after the
/// Probe has been deleted.
pub async fn release_finalizer<S: Store + ?Sized>(store: &S, ingress: &Ingress) -> Result<bool> {
    if !has_finalizer(ingress) {
        return Ok(false);
    }
    let mut updated = ingress.clone();
    updated.finalizers_mut().retain(|f| f != PROBE_FINALIZER);
    store.update_ingress(&updated).await?;
    info!(name = %ingress.name_any(), namespace = ?ingress.namespace(), "removed finalizer");
    Ok(true)
}
