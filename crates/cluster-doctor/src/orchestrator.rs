//! Diagnostic run orchestration.
//!
//! Fetches cluster identity, runs the probes and assembles the report. The
//! cluster info fetch is the only step that can fail the run; everything a
//! probe encounters ends up in the report.

use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::ClusterApi;
use crate::config::{DoctorConfig, ProbeKind};
use crate::error::{ApiError, DoctorError, DoctorResult};
use crate::probes::{probe_for, Probe, ProbeContext};
use crate::report::{CheckResult, DiagnosticReport, Summary};

/// Runs every configured probe against a cluster.
pub struct Doctor {
    config: DoctorConfig,
    probes: Vec<Box<dyn Probe>>,
}

impl Doctor {
    /// Build a doctor with the probes enabled in `config`.
    pub fn new(config: DoctorConfig) -> Self {
        let probes = ProbeKind::ALL
            .into_iter()
            .filter(|kind| !config.is_skipped(*kind))
            .map(|kind| probe_for(kind, &config))
            .collect();
        Self { config, probes }
    }

    /// Produce one report for the cluster behind `api`.
    ///
    /// Cancelling `cancel` aborts in-flight API calls; probes report the
    /// abort as failed checks, so a report is still returned as long as the
    /// cluster info was fetched.
    pub async fn run(
        &self,
        api: &dyn ClusterApi,
        target: &str,
        cancel: CancellationToken,
    ) -> DoctorResult<DiagnosticReport> {
        let started = Instant::now();
        let deadline = self
            .config
            .deadline()
            .map(|d| tokio::time::Instant::now() + d);
        let ctx = ProbeContext::new(cancel, self.config.request_timeout(), deadline);

        info!(cluster = %target, "Starting cluster diagnostics");

        let cluster_info = fetch_cluster_info(api, &ctx)
            .await
            .map_err(DoctorError::ClusterInfo)?;

        let checks = if self.config.parallel {
            // join_all yields in input order, whatever order the probes finish in
            let sections = join_all(
                ProbeKind::ALL
                    .into_iter()
                    .map(|kind| self.section(kind, api, &ctx)),
            )
            .await;
            sections.into_iter().flatten().collect()
        } else {
            let mut checks = Vec::new();
            for kind in ProbeKind::ALL {
                checks.extend(self.section(kind, api, &ctx).await);
            }
            checks
        };

        let summary = Summary::from_checks(&checks);
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            total = summary.total,
            passed = summary.passed,
            warnings = summary.warnings,
            failed = summary.failed,
            duration_ms,
            "Cluster diagnostics complete"
        );

        Ok(DiagnosticReport {
            target: target.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            cluster_info,
            checks,
            summary,
            metadata: self.metadata(duration_ms),
        })
    }

    /// Results for one report section, in section order.
    async fn section(
        &self,
        kind: ProbeKind,
        api: &dyn ClusterApi,
        ctx: &ProbeContext,
    ) -> Vec<CheckResult> {
        match self.probes.iter().find(|p| p.kind() == kind) {
            Some(probe) => {
                debug!(probe = %kind, "Running probe");
                probe.run(api, ctx).await
            }
            None => {
                debug!(probe = %kind, "Probe skipped by configuration");
                vec![CheckResult::skipped(kind.as_str(), "Check skipped by configuration")]
            }
        }
    }

    fn metadata(&self, duration_ms: u64) -> BTreeMap<String, serde_json::Value> {
        let mode = if self.config.parallel {
            "parallel"
        } else {
            "sequential"
        };
        BTreeMap::from([
            ("engineVersion".to_string(), json!(env!("CARGO_PKG_VERSION"))),
            ("durationMs".to_string(), json!(duration_ms)),
            ("executionMode".to_string(), json!(mode)),
            (
                "systemNamespace".to_string(),
                json!(self.config.system_namespace),
            ),
            ("skippedProbes".to_string(), json!(self.config.skip)),
        ])
    }
}

/// Cluster identity and version metadata.
pub async fn fetch_cluster_info(
    api: &dyn ClusterApi,
    ctx: &ProbeContext,
) -> Result<BTreeMap<String, String>, ApiError> {
    let version = ctx.call(api.server_version()).await?;

    let mut info = BTreeMap::from([
        ("server".to_string(), api.server_address()),
        ("version".to_string(), version.git_version),
        ("major".to_string(), version.major),
        ("minor".to_string(), version.minor),
        ("platform".to_string(), version.platform),
    ]);
    if !version.go_version.is_empty() {
        info.insert("goVersion".to_string(), version.go_version);
    }
    if !version.build_date.is_empty() {
        info.insert("buildDate".to_string(), version.build_date);
    }

    debug!(version = %info["version"], "Fetched cluster info");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::fixtures::{node, pod, ready_node, MockCluster};
    use crate::report::Status;

    fn healthy_cluster() -> MockCluster {
        MockCluster {
            nodes: vec![ready_node("cp-1"), ready_node("worker-1")],
            pods: vec![
                pod("etcd-cp-1", &[("component", "etcd")], "Running"),
                pod("kube-apiserver-cp-1", &[("component", "kube-apiserver")], "Running"),
                pod("coredns-1", &[("k8s-app", "kube-dns")], "Running"),
            ],
            ..MockCluster::default()
        }
    }

    #[tokio::test]
    async fn test_healthy_cluster_report() {
        let doctor = Doctor::new(DoctorConfig::default());
        let report = doctor
            .run(&healthy_cluster(), "test", CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<&str> = report.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "connectivity",
                "nodes",
                "control-plane",
                "control-plane/etcd",
                "control-plane/kube-apiserver",
                "dns"
            ]
        );
        assert_eq!(report.summary.total, report.checks.len());
        assert_eq!(report.summary.passed, report.checks.len());
        assert_eq!(report.cluster_info["version"], "v1.31.2");
        assert_eq!(report.metadata["executionMode"], "sequential");
    }

    #[tokio::test]
    async fn test_cluster_info_failure_is_fatal() {
        let cluster = MockCluster {
            version_error: Some("connection refused".to_string()),
            ..healthy_cluster()
        };
        let err = Doctor::new(DoctorConfig::default())
            .run(&cluster, "test", CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DoctorError::ClusterInfo(_)));
    }

    #[tokio::test]
    async fn test_broken_probe_does_not_hide_others() {
        let cluster = MockCluster {
            nodes_error: Some("nodes is forbidden".to_string()),
            ..healthy_cluster()
        };
        let report = Doctor::new(DoctorConfig::default())
            .run(&cluster, "test", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.check("nodes").unwrap().status, Status::Failed);
        assert_eq!(report.check("dns").unwrap().status, Status::Passed);
        assert_eq!(report.check("connectivity").unwrap().status, Status::Passed);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_parallel_keeps_section_order() {
        let mut cluster = healthy_cluster();
        cluster.nodes.push(node("worker-2", &[("Ready", "False")]));

        let sequential = Doctor::new(DoctorConfig::default())
            .run(&cluster, "test", CancellationToken::new())
            .await
            .unwrap();
        let parallel = Doctor::new(DoctorConfig {
            parallel: true,
            ..DoctorConfig::default()
        })
        .run(&cluster, "test", CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(sequential.checks, parallel.checks);
        assert_eq!(parallel.metadata["executionMode"], "parallel");
    }

    #[tokio::test]
    async fn test_skipped_probes() {
        let config = DoctorConfig {
            skip: vec![ProbeKind::ControlPlane, ProbeKind::Dns],
            ..DoctorConfig::default()
        };
        let report = Doctor::new(config)
            .run(&healthy_cluster(), "test", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.check("control-plane").unwrap().status, Status::Skipped);
        assert_eq!(report.check("dns").unwrap().status, Status::Skipped);
        assert_eq!(report.metadata["skippedProbes"], json!(["control-plane", "dns"]));
    }
}
