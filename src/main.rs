use std::sync::Arc;

use clap::Parser;
use futures::future::FutureExt;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::runtime::{controller::Action, Controller};
use kube::{client::Client, Api, ResourceExt};
use tokio::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::crd::Probe;
use crate::error::Error;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;

mod config;
pub mod crd;
mod error;
mod finalizer;
mod prober_config;
mod probes;
mod reconciler;
mod store;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let kubernetes_client: Client = Client::try_default().await?;

    let (ingress_api, probe_api): (Api<Ingress>, Api<Probe>) = match &args.namespace {
        Some(ns) => (
            Api::namespaced(kubernetes_client.clone(), ns),
            Api::namespaced(kubernetes_client.clone(), ns),
        ),
        None => (
            Api::all(kubernetes_client.clone()),
            Api::all(kubernetes_client.clone()),
        ),
    };

    let context: Arc<ContextData> = Arc::new(ContextData {
        reconciler: Reconciler::new(KubeStore::new(kubernetes_client), args.config_source()),
        error_requeue: args.error_requeue(),
    });

    info!(namespace = ?args.namespace, config_map = %args.config_map_name, "starting probe controller");

    Controller::new(ingress_api, Config::default())
        .watches(probe_api, Config::default(), |probe: Probe| ingress_for_probe(&probe))
        .graceful_shutdown_on(tokio::signal::ctrl_c().map(|_| ()))
        .run(reconcile, on_error, context)
        .for_each(|reconciliation_result| async move {
            match reconciliation_result {
                Ok((ingress, _)) => {
                    info!(name = %ingress.name, namespace = ?ingress.namespace, "reconciled");
                }
                Err(reconciliation_err) => {
                    warn!(error = %reconciliation_err, "reconcile failed");
                }
            }
        })
        .await;

    info!("controller stopped");
    Ok(())
}

struct ContextData {
    reconciler: Reconciler<KubeStore>,
    error_requeue: Duration,
}

/// Maps a `<name>-probe` Probe back to the Ingress it was made for.
fn ingress_for_probe(probe: &Probe) -> Option<ObjectRef<Ingress>> {
    let namespace = probe.namespace()?;
    let name = probes::ingress_name_for(probe.metadata.name.as_deref()?)?;
    Some(ObjectRef::new(name).within(&namespace))
}

async fn reconcile(ingress: Arc<Ingress>, context: Arc<ContextData>) -> Result<Action, Error> {
    let name = ingress.name_any();
    let namespace = ingress
        .namespace()
        .ok_or_else(|| Error::InvalidIngress(format!("{name} has no namespace")))?;

    let span = info_span!("reconcile", %name, %namespace);
    context
        .reconciler
        .reconcile(&namespace, &name)
        .instrument(span)
        .await?;
    Ok(Action::await_change())
}

fn on_error(ingress: Arc<Ingress>, error: &Error, context: Arc<ContextData>) -> Action {
    if error.is_conflict() {
        warn!(name = %ingress.name_any(), namespace = ?ingress.namespace(), %error, "conflict, retrying");
    } else {
        error!(name = %ingress.name_any(), namespace = ?ingress.namespace(), %error, "reconciliation error");
    }
    Action::requeue(context.error_requeue)
}
