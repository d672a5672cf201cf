use std::collections::BTreeMap;

use envconfig::Envconfig;
use serde_json::Value as JsonValue;

pub const DEFAULT_NAMESPACE: &str = "dra-driver";
pub const DEFAULT_IMAGE: &str = "quay.io/dra/dra-memory-driver:v0.1.0";

/// Target cluster flavor. OpenShift additionally gets the
/// SecurityContextConstraints object the driver needs there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Platform {
    #[default]
    Kubernetes,
    OpenShift,
}

/// Parameters of one render/apply/delete invocation.
///
/// Constructed by the CLI (or a test) and treated as immutable for the
/// duration of the operation.
#[derive(Clone, Debug, Default)]
pub struct DeployConfig {
    pub namespace: String,
    pub image: Option<String>,
    pub command: Option<String>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub platform: Platform,
    /// Free-form value overrides, highest merge precedence.
    pub values: Option<JsonValue>,
}

/// Environment fallbacks for the CLI flags of the same name.
#[derive(Envconfig, Clone, Debug, Default)]
pub struct EnvOverrides {
    /// Env: DRACTL_NAMESPACE
    #[envconfig(from = "DRACTL_NAMESPACE")]
    pub namespace: Option<String>,

    /// Env: DRACTL_IMAGE
    #[envconfig(from = "DRACTL_IMAGE")]
    pub image: Option<String>,

    /// Env: DRACTL_COMMAND
    #[envconfig(from = "DRACTL_COMMAND")]
    pub command: Option<String>,

    /// Env: DRACTL_CHART_DIR, overrides the embedded chart
    #[envconfig(from = "DRACTL_CHART_DIR")]
    pub chart_dir: Option<String>,
}
