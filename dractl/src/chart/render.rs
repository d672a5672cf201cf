//! Adapter over the minijinja template engine.

use std::collections::BTreeMap;

use minijinja::value::Value as TemplateValue;
use minijinja::{Environment, ErrorKind, context};
use serde_json::Value as JsonValue;
use tracing::trace;

use super::{Chart, ChartError};

/// Release identity handed to templates alongside the merged values.
#[derive(Clone, Copy, Debug)]
pub struct ReleaseOptions<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub is_install: bool,
}

/// Execute every template of the chart with the given values and release
/// context. Returns output name → rendered text, keyed in sorted order so
/// downstream extraction is reproducible.
///
/// Rendering is pure; a failure is a chart defect and is never retried.
pub fn render(
    chart: &Chart,
    values: &JsonValue,
    release: &ReleaseOptions<'_>,
) -> Result<BTreeMap<String, String>, ChartError> {
    let fail = |source| ChartError::Render {
        chart: chart.name().to_string(),
        source,
    };

    let mut env = Environment::new();
    env.add_filter("to_json", to_json);
    for template in chart.templates() {
        env.add_template(&template.name, &template.data).map_err(fail)?;
    }

    let ctx = context! {
        values => values,
        chart => context! {
            name => chart.name(),
            version => chart.version(),
            app_version => chart.app_version(),
        },
        release => context! {
            name => release.name,
            namespace => release.namespace,
            is_install => release.is_install,
        },
    };

    let mut rendered = BTreeMap::new();
    for template in chart.templates() {
        let text = env
            .get_template(&template.name)
            .and_then(|t| t.render(&ctx))
            .map_err(fail)?;
        trace!(template = %template.name, bytes = text.len(), "rendered template");
        rendered.insert(template.name.clone(), text);
    }
    Ok(rendered)
}

/// `to_json` template filter. JSON is a subset of YAML, so templates use it
/// to splice structured values (lists, mappings) into manifest bodies.
fn to_json(value: TemplateValue) -> Result<String, minijinja::Error> {
    serde_json::to_string(&value).map_err(|e| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("value is not JSON-serializable: {e}"),
        )
    })
}
