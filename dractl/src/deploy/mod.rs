//! Apply and delete of a rendered resource set.

use std::fmt;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::chart::{Chart, ChartError, values};
use crate::client::{ClientError, ControlPlane};
use crate::config::DeployConfig;
use crate::manifests::{RenderedResource, ResourceIdent};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "dractl";

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("failed to ensure namespace {namespace}: {source}")]
    Namespace {
        namespace: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to apply {ident}: {source}")]
    Apply {
        ident: ResourceIdent,
        #[source]
        source: ClientError,
    },
    #[error("failed to delete {ident}: {source}")]
    Delete {
        ident: ResourceIdent,
        #[source]
        source: ClientError,
    },
}

/// Per-resource apply outcome, reported for observability only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    Created,
    Updated,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyOutcome::Unchanged => "unchanged",
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
        })
    }
}

/// Render the chart and converge the cluster toward it.
///
/// The target namespace is ensured exactly once up front, then resources
/// are applied strictly in set order: later resources may presuppose
/// earlier ones (a policy binding its policy). Re-running against a
/// converged cluster reads but never mutates.
pub async fn apply(
    client: &dyn ControlPlane,
    chart: &Chart,
    cfg: &DeployConfig,
) -> Result<Vec<(ResourceIdent, ApplyOutcome)>, DeployError> {
    info!(namespace = %cfg.namespace, chart = %chart.name(), "deploying manifests to cluster");

    ensure_namespace(client, &cfg.namespace).await?;

    let resources = chart.render(cfg)?;
    let mut results = Vec::with_capacity(resources.len());
    for resource in resources {
        let outcome =
            apply_resource(client, &resource).await.map_err(|source| {
                DeployError::Apply {
                    ident: resource.ident.clone(),
                    source,
                }
            })?;
        debug!(resource = %resource.ident, %outcome, "reconciled resource");
        results.push((resource.ident, outcome));
    }

    info!(namespace = %cfg.namespace, count = results.len(), "deployed manifests to cluster");
    Ok(results)
}

async fn ensure_namespace(
    client: &dyn ControlPlane,
    namespace: &str,
) -> Result<(), DeployError> {
    let fail = |source| DeployError::Namespace {
        namespace: namespace.to_string(),
        source,
    };
    let ident = namespace_ident(namespace);
    match client.get(&ident).await {
        Ok(_) => {
            debug!(%namespace, "namespace already exists");
            Ok(())
        }
        Err(ClientError::NotFound) => {
            let manifest = json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {
                    "name": namespace,
                    "labels": { MANAGED_BY_LABEL: MANAGER },
                },
            });
            client.create(&ident, &manifest).await.map_err(fail)?;
            info!(%namespace, "created namespace");
            Ok(())
        }
        Err(source) => Err(fail(source)),
    }
}

async fn apply_resource(
    client: &dyn ControlPlane,
    resource: &RenderedResource,
) -> Result<ApplyOutcome, ClientError> {
    match client.get(&resource.ident).await {
        Err(ClientError::NotFound) => {
            client.create(&resource.ident, &resource.manifest).await?;
            Ok(ApplyOutcome::Created)
        }
        Err(other) => Err(other),
        Ok(live) => {
            // Overlay the rendered fields onto the live object; server-side
            // metadata (resourceVersion, uid, status) stays untouched.
            let desired =
                values::coalesce(live.clone(), resource.manifest.clone());
            if desired == live {
                Ok(ApplyOutcome::Unchanged)
            } else {
                client.update(&resource.ident, &desired).await?;
                Ok(ApplyOutcome::Updated)
            }
        }
    }
}

/// Tear down a previously applied resource set.
///
/// Targets come from a fresh render of the chart. Cluster-scoped objects
/// go first, access control ahead of everything else: the policy binding
/// before the policy it references, and both before the namespace so the
/// policy never outlives the service account identity its match condition
/// names. Deleting the namespace last cascades removal of every namespaced
/// member.
pub async fn delete(
    client: &dyn ControlPlane,
    chart: &Chart,
    cfg: &DeployConfig,
) -> Result<(), DeployError> {
    info!(namespace = %cfg.namespace, chart = %chart.name(), "deleting manifests from cluster");

    let resources = chart.render(cfg)?;
    let mut cluster_scoped: Vec<&RenderedResource> = resources
        .iter()
        .filter(|r| r.ident.namespace.is_none())
        .collect();
    // Stable sort: unlisted kinds keep their set order, after the ranked
    // access-control kinds.
    cluster_scoped.sort_by_key(|r| teardown_rank(&r.ident.kind));

    for resource in cluster_scoped {
        delete_tolerant(client, &resource.ident).await?;
    }
    delete_tolerant(client, &namespace_ident(&cfg.namespace)).await?;

    info!(namespace = %cfg.namespace, "deleted manifests from cluster");
    Ok(())
}

async fn delete_tolerant(
    client: &dyn ControlPlane,
    ident: &ResourceIdent,
) -> Result<(), DeployError> {
    match client.delete(ident).await {
        Ok(()) => {
            info!(resource = %ident, "deleted resource");
            Ok(())
        }
        Err(ClientError::NotFound) => {
            debug!(resource = %ident, "resource already absent");
            Ok(())
        }
        Err(source) => Err(DeployError::Delete {
            ident: ident.clone(),
            source,
        }),
    }
}

fn teardown_rank(kind: &str) -> u8 {
    match kind {
        "ValidatingAdmissionPolicyBinding" => 0,
        "ValidatingAdmissionPolicy" => 1,
        "SecurityContextConstraints" => 2,
        "ClusterRoleBinding" => 3,
        "ClusterRole" => 4,
        _ => 5,
    }
}

fn namespace_ident(namespace: &str) -> ResourceIdent {
    ResourceIdent {
        api_version: "v1".to_string(),
        kind: "Namespace".to_string(),
        namespace: None,
        name: namespace.to_string(),
    }
}
