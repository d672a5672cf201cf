//! Template value construction and merging.
//!
//! Values reaching the template engine are layered: chart defaults are
//! overlaid by values derived from the [`DeployConfig`], which in turn are
//! overlaid by explicit caller overrides.

use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

use crate::config::{DeployConfig, Platform};
use crate::image::{ImageError, Reference};

/// Deep, table-aware union of two value trees. Mappings merge key by key,
/// recursively; any other pair is settled in favor of `over`. Sequences are
/// replaced outright, never concatenated.
pub fn coalesce(base: JsonValue, over: JsonValue) -> JsonValue {
    match (base, over) {
        (JsonValue::Object(mut base), JsonValue::Object(over)) => {
            for (key, value) in over {
                let merged = match base.remove(&key) {
                    Some(existing) => coalesce(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            JsonValue::Object(base)
        }
        (_, over) => over,
    }
}

/// Build the values derived from a deploy config.
///
/// Every clause is gated on its source field being set, except the
/// `openshift.enabled` toggle which is always emitted so templates never
/// see it undefined.
pub fn from_config(cfg: &DeployConfig) -> Result<JsonValue, ImageError> {
    let mut values = Map::new();

    if let Some(image) = cfg.image.as_deref().filter(|s| !s.is_empty()) {
        let reference = Reference::parse(image)?;
        debug!(
            %image,
            repository = %reference.repository,
            tag = %reference.tag,
            "set image reference from config"
        );
        values.insert(
            "image".to_string(),
            json!({
                "repository": reference.repository,
                "tag": reference.tag,
            }),
        );
    }

    values.insert(
        "openshift".to_string(),
        json!({ "enabled": cfg.platform == Platform::OpenShift }),
    );

    let mut daemonset = Map::new();
    if let Some(command) = cfg.command.as_deref().filter(|s| !s.is_empty()) {
        daemonset.insert("command".to_string(), json!([command]));
    }
    if let Some(selector) =
        cfg.node_selector.as_ref().filter(|m| !m.is_empty())
    {
        daemonset.insert("nodeSelector".to_string(), json!(selector));
    }
    // An empty daemonset table is never emitted.
    if !daemonset.is_empty() {
        values
            .insert("daemonset".to_string(), JsonValue::Object(daemonset));
    }

    Ok(JsonValue::Object(values))
}
