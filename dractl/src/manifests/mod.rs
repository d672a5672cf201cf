//! Extraction of typed resources from rendered chart output.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to parse rendered output {output}: {source}")]
    Parse {
        output: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("rendered output {output} is missing {field}")]
    MissingField {
        output: String,
        field: &'static str,
    },
}

/// Identity of one resource: kind plus namespace/name. A resource without a
/// namespace is cluster-scoped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceIdent {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for ResourceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One rendered resource document plus its parsed identity.
#[derive(Clone, Debug)]
pub struct RenderedResource {
    pub ident: ResourceIdent,
    pub manifest: JsonValue,
}

/// Turn rendered template outputs into an ordered resource list.
///
/// Outputs without a manifest extension (NOTES.txt and friends) and outputs
/// that render to nothing are skipped; everything else is split into
/// documents and decoded. Output names arrive in a sorted map, so the
/// resulting order is stable for identical input.
pub fn extract(
    outputs: &BTreeMap<String, String>,
) -> Result<Vec<RenderedResource>, ExtractError> {
    let mut resources = Vec::new();

    for (name, content) in outputs {
        if !is_manifest_source(name) {
            trace!(output = %name, "skipping non-manifest output");
            continue;
        }
        let content = content.trim();
        if content.is_empty() {
            trace!(output = %name, "skipping empty output");
            continue;
        }

        let mut count = 0;
        for document in split_documents(content) {
            let manifest: JsonValue = serde_yaml::from_str(&document)
                .map_err(|source| ExtractError::Parse {
                    output: name.clone(),
                    source,
                })?;
            // Stray separators decode to nothing; skip them.
            let empty = match &manifest {
                JsonValue::Null => true,
                JsonValue::Object(map) => map.is_empty(),
                _ => false,
            };
            if empty {
                continue;
            }
            resources.push(resource_from(name, manifest)?);
            count += 1;
        }
        debug!(output = %name, resources = count, "parsed rendered output");
    }

    Ok(resources)
}

fn is_manifest_source(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

/// Split multi-document YAML on `---` separator lines.
fn split_documents(content: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        if line.trim_end() == "---" {
            documents.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents.push(current);
    documents.retain(|d| !d.trim().is_empty());
    documents
}

fn resource_from(
    output: &str,
    manifest: JsonValue,
) -> Result<RenderedResource, ExtractError> {
    let missing = |field| ExtractError::MissingField {
        output: output.to_string(),
        field,
    };

    let api_version = manifest
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("apiVersion"))?
        .to_string();
    let kind = manifest
        .get("kind")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("kind"))?
        .to_string();
    let metadata = manifest.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("metadata.name"))?
        .to_string();
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(|n| n.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(RenderedResource {
        ident: ResourceIdent {
            api_version,
            kind,
            namespace,
            name,
        },
        manifest,
    })
}
