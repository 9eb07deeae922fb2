//! Health probes.
//!
//! Each probe inspects one part of the cluster and turns what it sees into
//! one or more [`CheckResult`]s. A probe never returns an error: API failures,
//! empty listings and aborted calls are all reported as results, so one broken
//! subsystem does not hide the others.

pub mod connectivity;
pub mod control_plane;
pub mod dns;
pub mod nodes;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::ClusterApi;
use crate::config::{DoctorConfig, ProbeKind};
use crate::error::ApiError;
use crate::report::CheckResult;

pub use connectivity::ConnectivityProbe;
pub use control_plane::ControlPlaneProbe;
pub use dns::DnsProbe;
pub use nodes::NodeProbe;

/// Cancellation and time limits shared by every probe in a run.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    cancel: CancellationToken,
    request_timeout: Duration,
    deadline: Option<Instant>,
}

impl ProbeContext {
    pub fn new(cancel: CancellationToken, request_timeout: Duration, deadline: Option<Instant>) -> Self {
        Self {
            cancel,
            request_timeout,
            deadline,
        }
    }

    /// Run one API call under the shared limits.
    ///
    /// The call is dropped (aborting the request) as soon as the token is
    /// cancelled, the run deadline passes, or the per-call timeout elapses.
    /// Calls are single-shot; nothing is retried.
    pub async fn call<T, F>(&self, request: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let call_limit = Instant::now() + self.request_timeout;
        let (limit, run_deadline) = match self.deadline {
            Some(deadline) if deadline <= call_limit => (deadline, true),
            _ => (call_limit, false),
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = tokio::time::timeout_at(limit, request) => match result {
                Ok(result) => result,
                Err(_) if run_deadline => Err(ApiError::DeadlineExceeded),
                Err(_) => Err(ApiError::Timeout(self.request_timeout)),
            },
        }
    }
}

/// A single health probe.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Which report section this probe fills.
    fn kind(&self) -> ProbeKind;

    /// Inspect the cluster and classify the result.
    async fn run(&self, api: &dyn ClusterApi, ctx: &ProbeContext) -> Vec<CheckResult>;
}

/// Build the probe for a section.
pub fn probe_for(kind: ProbeKind, config: &DoctorConfig) -> Box<dyn Probe> {
    match kind {
        ProbeKind::Connectivity => Box::new(ConnectivityProbe::new(config.slow_response_threshold())),
        ProbeKind::Nodes => Box::new(NodeProbe),
        ProbeKind::ControlPlane => Box::new(ControlPlaneProbe::new(&config.system_namespace)),
        ProbeKind::Dns => Box::new(DnsProbe::new(&config.system_namespace)),
    }
}

/// Result for a probe whose API call was cancelled or ran past the deadline.
pub(crate) fn aborted(name: &str, err: &ApiError) -> CheckResult {
    CheckResult::failed(name, format!("Check aborted before completion: {err}")).with_error(err)
}

pub(crate) fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running")
}

pub(crate) fn pod_label<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_passes_result_through() {
        let ctx = ProbeContext::new(CancellationToken::new(), Duration::from_secs(5), None);
        let value = ctx.call(async { Ok::<_, ApiError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_call_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ProbeContext::new(token, Duration::from_secs(5), None);

        let err = ctx.call(async { Ok::<_, ApiError>(()) }).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let ctx = ProbeContext::new(CancellationToken::new(), Duration::from_secs(2), None);
        let err = ctx
            .call(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ApiError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_run_deadline() {
        let deadline = Instant::now() + Duration::from_secs(1);
        let ctx = ProbeContext::new(CancellationToken::new(), Duration::from_secs(30), Some(deadline));
        let err = ctx
            .call(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ApiError>(())
            })
            .await
            .unwrap_err();
        assert!(err.is_abort());
    }

    #[test]
    fn test_pod_helpers() {
        let running = fixtures::pod("coredns-1", &[("k8s-app", "kube-dns")], "Running");
        let pending = fixtures::pod("coredns-2", &[("k8s-app", "kube-dns")], "Pending");
        assert!(is_running(&running));
        assert!(!is_running(&pending));
        assert_eq!(pod_label(&running, "k8s-app"), Some("kube-dns"));
        assert_eq!(pod_label(&running, "component"), None);
    }
}
