//! Conjur Operator - mirrors Conjur variables into Kubernetes Secrets

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser};
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, ResourceExt};

use conjur_operator::controller::{error_policy, reconcile, Context};
use conjur_operator::crd::Conjur;
use conjur_operator::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use conjur_operator::vault::{ConjurClient, DEFAULT_REQUEST_TIMEOUT};
use conjur_operator::FIELD_MANAGER;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Conjur Operator - sync Conjur variables into Kubernetes Secrets
#[derive(Parser, Debug)]
#[command(name = "conjur-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,
}

/// Controller mode arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch Conjur resources in this namespace (default: all namespaces)
    #[arg(long, env = "CONJUR_OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Timeout for each request to Conjur, in seconds
    #[arg(
        long,
        env = "CONJUR_VAULT_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs()
    )]
    vault_timeout_secs: u64,

    /// Log output format
    #[arg(
        long,
        env = "CONJUR_OPERATOR_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json
    )]
    log_format: LogFormat,

    /// Do not install the Conjur CRD on startup
    #[arg(long, env = "CONJUR_OPERATOR_SKIP_CRD_INSTALL")]
    skip_crd_install: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube and reqwest both pull in rustls; pick the provider explicitly
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: failed to install rustls crypto provider: {e:?}");
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Conjur::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.controller.log_format,
    })?;

    run_controller(cli.controller).await
}

/// Ensure the Conjur CRD is installed
///
/// Applied with server-side apply so the CRD version always matches the
/// operator version.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = Conjur::crd();
    let name = crd.name_any();

    tracing::info!(crd = %name, "installing CRD");
    crds.patch(&name, &params, &Patch::Apply(&crd))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install Conjur CRD: {}", e))?;
    Ok(())
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("Conjur operator starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.skip_crd_install {
        tracing::debug!("skipping CRD installation");
    } else {
        ensure_crd_installed(&client).await?;
    }

    let vault = ConjurClient::new(Duration::from_secs(args.vault_timeout_secs))
        .map_err(|e| anyhow::anyhow!("Failed to create Conjur client: {}", e))?;

    let conjurs: Api<Conjur> = match &args.namespace {
        Some(ns) => {
            tracing::info!(namespace = %ns, "watching a single namespace");
            Api::namespaced(client.clone(), ns)
        }
        None => Api::all(client.clone()),
    };

    let ctx = Arc::new(Context::new(client, vault));

    tracing::info!("Starting Conjur controller...");
    Controller::new(
        conjurs,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result)
    .await;

    tracing::info!("Conjur operator shutting down");
    Ok(())
}

async fn log_reconcile_result<E: std::fmt::Debug>(result: Result<(ObjectRef<Conjur>, Action), E>) {
    match result {
        Ok((obj, action)) => {
            tracing::debug!(conjur = %obj.name, ?action, "reconciliation completed");
        }
        Err(e) => {
            tracing::error!(error = ?e, "reconciliation error");
        }
    }
}
