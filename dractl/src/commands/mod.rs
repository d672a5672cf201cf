//! CLI surface: thin shell over the chart/deploy library.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use envconfig::Envconfig;
use tracing::info;

use crate::chart::Chart;
use crate::client::KubeClient;
use crate::config::{
    DEFAULT_IMAGE, DEFAULT_NAMESPACE, DeployConfig, EnvOverrides, Platform,
};
use crate::deploy;

#[derive(Parser, Debug)]
#[command(
    name = "dractl",
    version,
    about = "Deploy DRA driver manifests to Kubernetes clusters"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the driver manifests as YAML to stdout
    Render(DeployArgs),
    /// Apply the driver manifests to a cluster
    Apply(DeployArgs),
    /// Delete the driver manifests from a cluster
    Delete(DeployArgs),
}

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Namespace for namespaced resources
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Container image for the DRA driver
    #[arg(short = 'i', long)]
    pub image: Option<String>,

    /// Command to run inside the driver container
    #[arg(long)]
    pub command: Option<String>,

    /// Node selector for driver pods, repeatable
    #[arg(long = "node-selector", value_name = "KEY=VALUE")]
    pub node_selector: Vec<String>,

    /// Target platform
    #[arg(long, value_enum, default_value_t = PlatformArg::Kubernetes)]
    pub platform: PlatformArg,

    /// YAML file with extra value overrides
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// Render a chart directory instead of the embedded chart
    #[arg(long, value_name = "DIR")]
    pub chart_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlatformArg {
    #[default]
    Kubernetes,
    Openshift,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Kubernetes => Platform::Kubernetes,
            PlatformArg::Openshift => Platform::OpenShift,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Render(args) => run_render(args).await,
        Commands::Apply(args) => run_apply(args).await,
        Commands::Delete(args) => run_delete(args).await,
    }
}

async fn run_render(args: DeployArgs) -> anyhow::Result<()> {
    let (chart, cfg) = prepare(args)?;
    let resources = chart.render(&cfg)?;
    for (i, resource) in resources.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        print!("{}", serde_yaml::to_string(&resource.manifest)?);
    }
    Ok(())
}

async fn run_apply(args: DeployArgs) -> anyhow::Result<()> {
    let (chart, cfg) = prepare(args)?;
    let client = KubeClient::try_default()
        .await
        .context("failed to build cluster client")?;
    let results = deploy::apply(&client, &chart, &cfg).await?;
    for (ident, outcome) in results {
        info!(resource = %ident, %outcome, "applied");
    }
    Ok(())
}

async fn run_delete(args: DeployArgs) -> anyhow::Result<()> {
    let (chart, cfg) = prepare(args)?;
    let client = KubeClient::try_default()
        .await
        .context("failed to build cluster client")?;
    deploy::delete(&client, &chart, &cfg).await?;
    Ok(())
}

/// Resolve flags, environment fallbacks and defaults into a chart plus
/// deploy config. Flags win over environment, environment over defaults.
fn prepare(args: DeployArgs) -> anyhow::Result<(Chart, DeployConfig)> {
    let env = EnvOverrides::init_from_env()
        .context("failed to read environment configuration")?;

    let chart_dir = args
        .chart_dir
        .or_else(|| env.chart_dir.as_deref().map(PathBuf::from));
    let chart = match &chart_dir {
        Some(dir) => Chart::from_dir(dir)?,
        None => Chart::embedded()?,
    };

    let values = match &args.values {
        Some(path) => {
            let data = std::fs::read_to_string(path).with_context(|| {
                format!("failed to read values file {}", path.display())
            })?;
            Some(serde_yaml::from_str(&data).with_context(|| {
                format!("failed to parse values file {}", path.display())
            })?)
        }
        None => None,
    };

    let cfg = DeployConfig {
        namespace: args
            .namespace
            .or(env.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        image: args
            .image
            .or(env.image)
            .or_else(|| Some(DEFAULT_IMAGE.to_string())),
        command: args.command.or(env.command),
        node_selector: parse_selectors(&args.node_selector)?,
        platform: args.platform.into(),
        values,
    };
    Ok((chart, cfg))
}

fn parse_selectors(
    pairs: &[String],
) -> anyhow::Result<Option<BTreeMap<String, String>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut selector = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').with_context(|| {
            format!("invalid node selector {pair:?}, expected KEY=VALUE")
        })?;
        selector.insert(key.to_string(), value.to_string());
    }
    Ok(Some(selector))
}
