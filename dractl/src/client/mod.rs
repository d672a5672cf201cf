//! Control-plane access.
//!
//! The deploy logic talks to a [`ControlPlane`] trait so it stays generic
//! over resource kind and testable without a cluster. [`KubeClient`] is the
//! production implementation over a `kube::Client`; the client is built
//! once and passed in, nothing is registered process-wide.

use std::collections::HashMap;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource};
use kube::Client;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

use crate::manifests::ResourceIdent;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("resource not found")]
    NotFound,
    #[error(transparent)]
    Api(#[from] kube::Error),
    #[error("failed to encode resource: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("unexpected control plane failure: {0}")]
    Unexpected(String),
}

/// Minimal get/create/update/delete-by-identity surface of the cluster.
/// Bodies travel as generic structured documents.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get(
        &self,
        ident: &ResourceIdent,
    ) -> Result<JsonValue, ClientError>;

    async fn create(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError>;

    async fn update(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError>;

    async fn delete(
        &self,
        ident: &ResourceIdent,
    ) -> Result<(), ClientError>;
}

/// Kubernetes-backed [`ControlPlane`]. API resources are resolved through
/// discovery per group/version/kind and cached for the lifetime of the
/// client.
pub struct KubeClient {
    client: Client,
    resources: RwLock<HashMap<String, ApiResource>>,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Build a client from the usual kubeconfig/in-cluster environment.
    pub async fn try_default() -> Result<Self, ClientError> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn gvk(ident: &ResourceIdent) -> GroupVersionKind {
        // "apps/v1" carries a group, bare "v1" is the core group.
        let mut parts = ident.api_version.splitn(2, '/');
        let first = parts.next().unwrap_or("");
        match parts.next() {
            Some(version) => {
                GroupVersionKind::gvk(first, version, &ident.kind)
            }
            None => GroupVersionKind::gvk("", first, &ident.kind),
        }
    }

    async fn api_for(
        &self,
        ident: &ResourceIdent,
    ) -> Result<Api<DynamicObject>, ClientError> {
        let key = format!("{}/{}", ident.api_version, ident.kind);
        let cached = self.resources.read().await.get(&key).cloned();
        let resource = match cached {
            Some(resource) => resource,
            None => {
                let gvk = Self::gvk(ident);
                let (resource, _caps) =
                    discovery::pinned_kind(&self.client, &gvk)
                        .await
                        .map_err(to_client_error)?;
                trace!(%key, plural = %resource.plural, "discovered api resource");
                self.resources
                    .write()
                    .await
                    .insert(key, resource.clone());
                resource
            }
        };

        Ok(match &ident.namespace {
            Some(ns) => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            None => Api::all_with(self.client.clone(), &resource),
        })
    }
}

#[async_trait]
impl ControlPlane for KubeClient {
    async fn get(
        &self,
        ident: &ResourceIdent,
    ) -> Result<JsonValue, ClientError> {
        let api = self.api_for(ident).await?;
        let live =
            api.get(&ident.name).await.map_err(to_client_error)?;
        Ok(serde_json::to_value(&live)?)
    }

    async fn create(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError> {
        let api = self.api_for(ident).await?;
        let obj: DynamicObject = serde_json::from_value(manifest.clone())?;
        api.create(&PostParams::default(), &obj)
            .await
            .map_err(to_client_error)?;
        Ok(())
    }

    async fn update(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError> {
        let api = self.api_for(ident).await?;
        let obj: DynamicObject = serde_json::from_value(manifest.clone())?;
        api.replace(&ident.name, &PostParams::default(), &obj)
            .await
            .map_err(to_client_error)?;
        Ok(())
    }

    async fn delete(
        &self,
        ident: &ResourceIdent,
    ) -> Result<(), ClientError> {
        let api = self.api_for(ident).await?;
        api.delete(&ident.name, &DeleteParams::default())
            .await
            .map_err(to_client_error)?;
        Ok(())
    }
}

fn to_client_error(e: kube::Error) -> ClientError {
    match e {
        kube::Error::Api(ref response) if response.code == 404 => {
            ClientError::NotFound
        }
        other => ClientError::Api(other),
    }
}
