#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use dractl::client::{ClientError, ControlPlane};
use dractl::manifests::ResourceIdent;

/// One recorded control-plane call: (verb, "Kind/ns/name").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Get(String),
    Create(String),
    Update(String),
    Delete(String),
}

impl Op {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Op::Get(_))
    }
}

/// In-memory control plane. Stores objects verbatim, records every call,
/// and cascades namespaced members when their namespace is deleted.
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<String, JsonValue>>,
    ops: Mutex<Vec<Op>>,
    fail_create_kind: Mutex<Option<String>>,
}

fn key(ident: &ResourceIdent) -> String {
    format!(
        "{}/{}/{}",
        ident.kind,
        ident.namespace.as_deref().unwrap_or(""),
        ident.name
    )
}

impl FakeCluster {
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, ident: &ResourceIdent) -> bool {
        self.objects.lock().unwrap().contains_key(&key(ident))
    }

    pub fn object(&self, ident: &ResourceIdent) -> Option<JsonValue> {
        self.objects.lock().unwrap().get(&key(ident)).cloned()
    }

    pub fn insert(&self, ident: &ResourceIdent, manifest: JsonValue) {
        self.objects.lock().unwrap().insert(key(ident), manifest);
    }

    /// Make every create of the given kind fail.
    pub fn fail_creates_of(&self, kind: &str) {
        *self.fail_create_kind.lock().unwrap() = Some(kind.to_string());
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ControlPlane for FakeCluster {
    async fn get(
        &self,
        ident: &ResourceIdent,
    ) -> Result<JsonValue, ClientError> {
        self.record(Op::Get(key(ident)));
        self.objects
            .lock()
            .unwrap()
            .get(&key(ident))
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn create(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError> {
        self.record(Op::Create(key(ident)));
        if self.fail_create_kind.lock().unwrap().as_deref()
            == Some(ident.kind.as_str())
        {
            return Err(ClientError::Unexpected(format!(
                "injected create failure for {ident}"
            )));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key(ident)) {
            return Err(ClientError::Unexpected(format!(
                "{ident} already exists"
            )));
        }
        objects.insert(key(ident), manifest.clone());
        Ok(())
    }

    async fn update(
        &self,
        ident: &ResourceIdent,
        manifest: &JsonValue,
    ) -> Result<(), ClientError> {
        self.record(Op::Update(key(ident)));
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&key(ident)) {
            return Err(ClientError::Unexpected(format!(
                "{ident} does not exist"
            )));
        }
        objects.insert(key(ident), manifest.clone());
        Ok(())
    }

    async fn delete(
        &self,
        ident: &ResourceIdent,
    ) -> Result<(), ClientError> {
        self.record(Op::Delete(key(ident)));
        let mut objects = self.objects.lock().unwrap();
        if objects.remove(&key(ident)).is_none() {
            return Err(ClientError::NotFound);
        }
        // The control plane owns cascade semantics: removing a namespace
        // removes its members.
        if ident.kind == "Namespace" {
            let prefix_owner = ident.name.clone();
            objects.retain(|_, v| {
                v.get("metadata")
                    .and_then(|m| m.get("namespace"))
                    .and_then(|n| n.as_str())
                    != Some(prefix_owner.as_str())
            });
        }
        Ok(())
    }
}
