//! Cluster DNS health.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tracing::{info, warn};

use super::{aborted, is_running, Probe, ProbeContext};
use crate::client::ClusterApi;
use crate::config::ProbeKind;
use crate::report::CheckResult;
use crate::suggest;

const CHECK_NAME: &str = "dns";

/// Matches both kube-dns and CoreDNS deployments.
pub const DNS_SELECTOR: &str = "k8s-app in (kube-dns,coredns)";

/// Classify the DNS pods found in `namespace`.
pub fn classify_dns(namespace: &str, pods: &[Pod]) -> CheckResult {
    let total = pods.len();
    let running = pods.iter().filter(|p| is_running(p)).count();

    let check = if total == 0 {
        CheckResult::failed(CHECK_NAME, "No DNS pods found")
    } else if running == 0 {
        CheckResult::failed(
            CHECK_NAME,
            format!("DNS is not functional: 0/{total} pods running"),
        )
    } else if running < total {
        CheckResult::warning(
            CHECK_NAME,
            format!("DNS partially functional: {running}/{total} pods running"),
        )
    } else {
        CheckResult::passed(
            CHECK_NAME,
            format!("DNS is healthy: {running}/{total} pods running"),
        )
    };

    check
        .with_detail("running", running.to_string())
        .with_detail("total", total.to_string())
        .with_detail("namespace", namespace)
        .with_optional_suggestion(suggest::for_dns(namespace, running, total))
}

/// Checks kube-dns / CoreDNS pods.
pub struct DnsProbe {
    namespace: String,
}

impl DnsProbe {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Dns
    }

    async fn run(&self, api: &dyn ClusterApi, ctx: &ProbeContext) -> Vec<CheckResult> {
        let check = match ctx.call(api.list_pods(&self.namespace, DNS_SELECTOR)).await {
            Ok(pods) => {
                info!(namespace = %self.namespace, pods = pods.len(), "DNS health evaluated");
                classify_dns(&self.namespace, &pods)
            }
            Err(err) if err.is_abort() => aborted(CHECK_NAME, &err),
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "Cannot list DNS pods");
                CheckResult::failed(CHECK_NAME, "Failed to list DNS pods")
                    .with_error(&err)
                    .with_detail("namespace", &self.namespace)
                    .with_suggestion(suggest::DNS_LIST_FAILURE)
            }
        };
        vec![check]
    }
}
