//! cluster-doctor CLI.
//!
//! Connects to a Kubernetes cluster, runs the health probes once and prints
//! the report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cluster_doctor::render::render;
use cluster_doctor::{Doctor, DoctorConfig, KubeClusterApi, OutputFormat, ProbeKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Diagnose the health of a Kubernetes cluster.
#[derive(Parser)]
#[command(
    name = "cluster-doctor",
    version,
    about = "Read-only Kubernetes cluster health diagnostics",
    long_about = "Inspect API connectivity, node conditions, control plane components\n\
                  and cluster DNS, and print one severity-classified report.\n\n\
                  Nothing in the cluster is modified."
)]
struct Cli {
    /// Kubeconfig file, or a list of files to merge separated like KUBECONFIG.
    /// Defaults to KUBECONFIG, then in-cluster config, then ~/.kube/config.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use.
    #[arg(long)]
    context: Option<String>,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Run probes concurrently.
    #[arg(long)]
    parallel: bool,

    /// Timeout for each API call, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Deadline for the whole run, in seconds.
    #[arg(long)]
    deadline: Option<u64>,

    /// Namespace hosting control plane and DNS pods.
    #[arg(long)]
    namespace: Option<String>,

    /// Probe to skip (repeatable).
    #[arg(long, value_enum)]
    skip: Vec<ProbeKind>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// File configuration with command line overrides applied.
    fn doctor_config(&self) -> Result<DoctorConfig> {
        let mut config = match &self.config {
            Some(path) => DoctorConfig::from_file(path)?,
            None => DoctorConfig::default(),
        };

        if self.parallel {
            config.parallel = true;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(deadline) = self.deadline {
            config.deadline_secs = Some(deadline);
        }
        if let Some(namespace) = &self.namespace {
            config.system_namespace.clone_from(namespace);
        }
        for kind in &self.skip {
            if !config.skip.contains(kind) {
                config.skip.push(*kind);
            }
        }

        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid configuration: {reason}"))?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON/YAML on stdout stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,cluster_doctor=debug")
        } else {
            EnvFilter::new("warn,cluster_doctor=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.doctor_config()?;

    let api = KubeClusterApi::connect(cli.kubeconfig.as_deref(), cli.context.as_deref())
        .await
        .context("Failed to connect to the cluster")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight checks");
            ctrl_c.cancel();
        }
    });

    let doctor = Doctor::new(config);
    let report = doctor
        .run(&api, &api.target(), cancel)
        .await
        .context("Cluster diagnostics failed")?;

    let rendered = render(&report, cli.output)?;
    print!("{rendered}");
    if cli.output != OutputFormat::Text && !rendered.ends_with('\n') {
        println!();
    }

    if report.has_failures() {
        anyhow::bail!("Diagnostics found {} failing checks", report.summary.failed);
    }

    info!("No failing checks");
    Ok(())
}
