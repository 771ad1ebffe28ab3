//! authz-eval
//!
//! Loads a route policy configuration, evaluates one request against it, and
//! prints the verdict as JSON. With `--print-rules` it prints the generated
//! rule programs instead.

use anyhow::{Context as _, Result};
use authz_core::{Context, PolicyInput, PolicyOutput};
use authz_evaluator::{telemetry, PolicyConfig, PolicyEvaluator, ProgramCompiler};
use authz_rules::MemoryStore;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "authz-eval")]
#[command(about = "Evaluate a request against an authorization policy", long_about = None)]
struct Cli {
    /// Policy configuration file
    #[arg(short, long, env = "AUTHZ_POLICY_CONFIG", default_value = "policy.yaml")]
    config: PathBuf,

    /// Request input document (JSON); an empty request when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Reference data document (JSON) served under `data`
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Print the generated rule programs and exit
    #[arg(long)]
    print_rules: bool,

    /// Abandon evaluation after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print Prometheus metrics after evaluating
    #[arg(long)]
    metrics: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = PolicyConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load policy configuration {}", cli.config.display()))?;
    info!(
        config = %cli.config.display(),
        rules = config.to_ppl().rules.len(),
        sub_policies = config.sub_policies.len(),
        "Configuration loaded"
    );

    if cli.print_rules {
        for script in ProgramCompiler::default().scripts(&config)? {
            println!("# {}\n{}", script.origin, script.source);
        }
        return Ok(());
    }

    let metrics = if cli.metrics { Some(init_metrics()?) } else { None };

    let store = match &cli.data {
        Some(path) => MemoryStore::from_value(read_json(path)?),
        None => MemoryStore::new(),
    };
    let input: PolicyInput = match &cli.input {
        Some(path) => serde_json::from_value(read_json(path)?)
            .with_context(|| format!("invalid request input {}", path.display()))?,
        None => PolicyInput::default(),
    };

    let token = CancellationToken::new();
    let mut ctx = Context::background().with_cancellation(token.clone());
    if let Some(ms) = cli.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling evaluation");
            token.cancel();
        }
    });

    let output = tokio::task::spawn_blocking(move || evaluate(&ctx, &config, store, &input)).await??;

    info!(allow = output.allow, denied = output.deny.is_some(), "Evaluation complete");
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(handle) = metrics {
        println!("\n{}", handle.render());
    }
    Ok(())
}

fn evaluate(ctx: &Context, config: &PolicyConfig, store: MemoryStore, input: &PolicyInput) -> Result<PolicyOutput> {
    let evaluator = PolicyEvaluator::new(ctx, config, Arc::new(store)).context("failed to load policy")?;
    let output = evaluator.evaluate(ctx, input).context("policy evaluation failed")?;
    Ok(output)
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Initialize tracing/logging on stderr, leaving stdout for the verdict
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("authz=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("authz=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install a Prometheus recorder and describe the evaluator metrics
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;
    telemetry::describe_metrics();

    info!("Metrics recorder installed");
    Ok(handle)
}
