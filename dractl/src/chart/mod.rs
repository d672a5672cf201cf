//! The deployment chart: named templates, default values and metadata.

mod assets;
pub mod render;
pub mod values;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::debug;

use crate::config::DeployConfig;
use crate::image::ImageError;
use crate::manifests::{self, ExtractError, RenderedResource};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("failed to read chart from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid chart file {file}: {source}")]
    Meta {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("failed to render chart {chart}: {source}")]
    Render {
        chart: String,
        #[source]
        source: minijinja::Error,
    },
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(rename = "appVersion")]
    pub app_version: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TemplateFile {
    pub name: String,
    pub data: String,
}

/// An immutable chart, loaded once and shared across renders.
#[derive(Clone, Debug)]
pub struct Chart {
    meta: ChartMetadata,
    default_values: JsonValue,
    templates: Vec<TemplateFile>,
}

impl Chart {
    /// The chart bundled into the binary.
    pub fn embedded() -> Result<Self, ChartError> {
        let meta = parse_metadata("Chart.yaml", assets::CHART_YAML)?;
        let default_values =
            parse_values("values.yaml", assets::VALUES_YAML)?;
        let templates = assets::TEMPLATES
            .iter()
            .map(|(name, data)| TemplateFile {
                name: (*name).to_string(),
                data: (*data).to_string(),
            })
            .collect();
        debug!(chart = %meta.name, version = %meta.version, "loaded embedded chart");
        Ok(Self::assemble(meta, default_values, templates))
    }

    /// Load a chart from a directory laid out as
    /// `Chart.yaml` + `values.yaml` + `templates/*`.
    pub fn from_dir(path: &Path) -> Result<Self, ChartError> {
        let read = |p: &Path| {
            fs::read_to_string(p).map_err(|source| ChartError::Load {
                path: p.to_path_buf(),
                source,
            })
        };

        let meta =
            parse_metadata("Chart.yaml", &read(&path.join("Chart.yaml"))?)?;
        let values_path = path.join("values.yaml");
        let default_values = if values_path.is_file() {
            parse_values("values.yaml", &read(&values_path)?)?
        } else {
            json!({})
        };

        let templates_dir = path.join("templates");
        let entries = fs::read_dir(&templates_dir).map_err(|source| {
            ChartError::Load {
                path: templates_dir.clone(),
                source,
            }
        })?;
        let mut templates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ChartError::Load {
                path: templates_dir.clone(),
                source,
            })?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            templates.push(TemplateFile {
                name: format!("templates/{file_name}"),
                data: read(&file_path)?,
            });
        }
        // Directory enumeration order is not defined; make it stable.
        templates.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(chart = %meta.name, version = %meta.version, path = %path.display(), "loaded chart");
        Ok(Self::assemble(meta, default_values, templates))
    }

    pub(crate) fn assemble(
        meta: ChartMetadata,
        default_values: JsonValue,
        templates: Vec<TemplateFile>,
    ) -> Self {
        Self {
            meta,
            default_values,
            templates,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    pub fn app_version(&self) -> &str {
        &self.meta.app_version
    }

    pub fn default_values(&self) -> &JsonValue {
        &self.default_values
    }

    pub(crate) fn templates(&self) -> &[TemplateFile] {
        &self.templates
    }

    /// Render the chart for one deploy config and extract the resource
    /// list. Pure: no control-plane I/O.
    pub fn render(
        &self,
        cfg: &DeployConfig,
    ) -> Result<Vec<RenderedResource>, ChartError> {
        let mut merged = self.default_values.clone();
        merged = values::coalesce(merged, values::from_config(cfg)?);
        if let Some(overrides) = &cfg.values {
            merged = values::coalesce(merged, overrides.clone());
        }

        let release = render::ReleaseOptions {
            name: &self.meta.app_version,
            namespace: &cfg.namespace,
            is_install: true,
        };
        debug!(
            chart = %self.meta.name,
            release = %release.name,
            namespace = %cfg.namespace,
            "rendering chart"
        );
        let outputs = render::render(self, &merged, &release)?;
        let resources = manifests::extract(&outputs)?;
        debug!(count = resources.len(), "extracted rendered resources");
        Ok(resources)
    }
}

fn parse_metadata(
    file: &str,
    data: &str,
) -> Result<ChartMetadata, ChartError> {
    serde_yaml::from_str(data).map_err(|source| ChartError::Meta {
        file: file.to_string(),
        source,
    })
}

fn parse_values(file: &str, data: &str) -> Result<JsonValue, ChartError> {
    serde_yaml::from_str(data).map_err(|source| ChartError::Meta {
        file: file.to_string(),
        source,
    })
}
