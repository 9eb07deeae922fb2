//! API server connectivity and latency.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{aborted, Probe, ProbeContext};
use crate::client::ClusterApi;
use crate::config::ProbeKind;
use crate::report::CheckResult;
use crate::suggest;

const CHECK_NAME: &str = "connectivity";

/// Times a single version query against the API server.
pub struct ConnectivityProbe {
    slow_threshold: Duration,
}

impl ConnectivityProbe {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }
}

#[async_trait]
impl Probe for ConnectivityProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Connectivity
    }

    async fn run(&self, api: &dyn ClusterApi, ctx: &ProbeContext) -> Vec<CheckResult> {
        let server = api.server_address();
        let started = Instant::now();
        let result = ctx.call(api.server_version()).await;
        let elapsed = started.elapsed();

        let check = match result {
            Err(err) if err.is_abort() => aborted(CHECK_NAME, &err),
            Err(err) => {
                warn!(server = %server, error = %err, "API server unreachable");
                let message = err.to_string();
                CheckResult::failed(
                    CHECK_NAME,
                    "Unable to establish a connection to the Kubernetes API server",
                )
                .with_error(&message)
                .with_detail("server", &server)
                .with_suggestion(suggest::for_connection_failure(&message))
            }
            Ok(_) if elapsed > self.slow_threshold => {
                warn!(latency_ms = elapsed.as_millis() as u64, "API server responding slowly");
                CheckResult::warning(
                    CHECK_NAME,
                    format!(
                        "API server responded slowly ({})",
                        format_duration(elapsed)
                    ),
                )
                .with_detail("duration", format_duration(elapsed))
                .with_detail("threshold", format_duration(self.slow_threshold))
                .with_detail("server", &server)
                .with_suggestion(suggest::SLOW_RESPONSE)
            }
            Ok(_) => {
                debug!(latency_ms = elapsed.as_millis() as u64, "API server reachable");
                CheckResult::passed(CHECK_NAME, "Successfully connected to the Kubernetes API server")
                    .with_detail("duration", format_duration(elapsed))
                    .with_detail("server", &server)
            }
        };

        vec![check]
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}
