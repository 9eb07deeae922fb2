//! Control plane component health.
//!
//! Looks for the static control plane pods in the system namespace and groups
//! them by their `component` label. On managed clusters these pods are usually
//! invisible, so listing problems are warnings here rather than failures.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tracing::{info, warn};

use super::{aborted, is_running, pod_label, Probe, ProbeContext};
use crate::client::ClusterApi;
use crate::config::ProbeKind;
use crate::report::{CheckResult, Status};
use crate::suggest;

const OVERVIEW_NAME: &str = "control-plane";

/// Label that identifies the control plane component of a pod.
pub const COMPONENT_LABEL: &str = "component";

/// Components looked for.
pub const COMPONENTS: [&str; 4] = [
    "etcd",
    "kube-apiserver",
    "kube-controller-manager",
    "kube-scheduler",
];

/// Label selector matching every known component.
pub fn component_selector() -> String {
    format!("{COMPONENT_LABEL} in ({})", COMPONENTS.join(","))
}

/// Running and total pod counts for one component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentCounts {
    pub running: usize,
    pub total: usize,
}

impl ComponentCounts {
    pub fn status(self) -> Status {
        if self.running == 0 {
            Status::Failed
        } else if self.running < self.total {
            Status::Warning
        } else {
            Status::Passed
        }
    }
}

/// Group pods by component. The map keeps components sorted by name.
pub fn group_by_component(pods: &[Pod]) -> BTreeMap<String, ComponentCounts> {
    let mut groups: BTreeMap<String, ComponentCounts> = BTreeMap::new();
    for pod in pods {
        let Some(component) = pod_label(pod, COMPONENT_LABEL) else {
            continue;
        };
        let counts = groups.entry(component.to_string()).or_default();
        counts.total += 1;
        if is_running(pod) {
            counts.running += 1;
        }
    }
    groups
}

/// Classify component groups. Overview first, then one record per component.
pub fn classify_components(groups: &BTreeMap<String, ComponentCounts>) -> Vec<CheckResult> {
    let components: Vec<CheckResult> = groups
        .iter()
        .map(|(component, counts)| {
            let message = format!(
                "{component}: {}/{} pods running",
                counts.running, counts.total
            );
            CheckResult::new(format!("control-plane/{component}"), counts.status(), message)
                .with_detail("running", counts.running.to_string())
                .with_detail("total", counts.total.to_string())
                .with_optional_suggestion(suggest::for_component(
                    component,
                    counts.running,
                    counts.total,
                ))
        })
        .collect();

    let healthy = components
        .iter()
        .filter(|c| c.status == Status::Passed)
        .count();
    let total = components.len();

    let overview = if healthy == total {
        CheckResult::passed(
            OVERVIEW_NAME,
            format!("All {total} control plane components are healthy"),
        )
    } else {
        CheckResult::warning(
            OVERVIEW_NAME,
            format!("{healthy}/{total} control plane components are healthy"),
        )
    };
    let overview = overview
        .with_detail("components", total.to_string())
        .with_detail("healthyComponents", healthy.to_string());

    std::iter::once(overview).chain(components).collect()
}

/// Checks control plane pods in the system namespace.
pub struct ControlPlaneProbe {
    namespace: String,
}

impl ControlPlaneProbe {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Probe for ControlPlaneProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::ControlPlane
    }

    async fn run(&self, api: &dyn ClusterApi, ctx: &ProbeContext) -> Vec<CheckResult> {
        let selector = component_selector();
        let pods = match ctx.call(api.list_pods(&self.namespace, &selector)).await {
            Ok(pods) => pods,
            Err(err) if err.is_abort() => return vec![aborted(OVERVIEW_NAME, &err)],
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "Cannot list control plane pods");
                return vec![CheckResult::warning(
                    OVERVIEW_NAME,
                    "Unable to inspect control plane pods",
                )
                .with_error(&err)
                .with_detail("namespace", &self.namespace)
                .with_suggestion(suggest::CONTROL_PLANE_ACCESS)];
            }
        };

        // Pods without a component label count as no control plane pods
        let groups = group_by_component(&pods);
        if groups.is_empty() {
            info!(namespace = %self.namespace, pods = pods.len(), "No control plane pods visible");
            return vec![CheckResult::warning(
                OVERVIEW_NAME,
                format!("No control plane pods found in {}", self.namespace),
            )
            .with_detail("namespace", &self.namespace)
            .with_suggestion(suggest::MANAGED_CONTROL_PLANE)];
        }

        info!(
            pods = pods.len(),
            components = groups.len(),
            "Control plane health evaluated"
        );
        classify_components(&groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::probes::fixtures::{pod, MockCluster};
    use k8s_openapi::api::core::v1::Node;
    use k8s_openapi::apimachinery::pkg::version::Info;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ProbeContext {
        ProbeContext::new(CancellationToken::new(), Duration::from_secs(5), None)
    }

    fn component_pod(name: &str, component: &str, phase: &str) -> Pod {
        pod(name, &[(COMPONENT_LABEL, component), ("tier", "control-plane")], phase)
    }

    #[test]
    fn test_selector() {
        assert_eq!(
            component_selector(),
            "component in (etcd,kube-apiserver,kube-controller-manager,kube-scheduler)"
        );
    }

    #[test]
    fn test_component_status() {
        assert_eq!(ComponentCounts { running: 0, total: 2 }.status(), Status::Failed);
        assert_eq!(ComponentCounts { running: 1, total: 2 }.status(), Status::Warning);
        assert_eq!(ComponentCounts { running: 2, total: 2 }.status(), Status::Passed);
    }

    #[test]
    fn test_mixed_components() {
        let pods = vec![
            component_pod("kube-scheduler-cp1", "kube-scheduler", "Pending"),
            component_pod("etcd-cp1", "etcd", "Running"),
            component_pod("etcd-cp2", "etcd", "Running"),
            component_pod("etcd-cp3", "etcd", "Running"),
        ];
        let results = classify_components(&group_by_component(&pods));

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "control-plane");
        assert_eq!(results[0].status, Status::Warning);

        assert_eq!(results[1].name, "control-plane/etcd");
        assert_eq!(results[1].status, Status::Passed);
        assert_eq!(results[1].message, "etcd: 3/3 pods running");
        assert!(results[1].suggestion.is_none());

        assert_eq!(results[2].name, "control-plane/kube-scheduler");
        assert_eq!(results[2].status, Status::Failed);
        assert!(results[2].suggestion.is_some());
    }

    #[test]
    fn test_all_healthy() {
        let pods: Vec<Pod> = COMPONENTS
            .iter()
            .map(|c| component_pod(&format!("{c}-cp1"), c, "Running"))
            .collect();
        let results = classify_components(&group_by_component(&pods));

        assert_eq!(results[0].status, Status::Passed);
        assert!(results.iter().all(|r| r.status == Status::Passed));
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn test_no_pods_suggests_managed_cluster() {
        let results = ControlPlaneProbe::new("kube-system")
            .run(&MockCluster::default(), &ctx())
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Warning);
        assert_eq!(results[0].suggestion.as_deref(), Some(suggest::MANAGED_CONTROL_PLANE));
    }

    /// Returns its pods for any selector.
    struct UnfilteredPods(Vec<Pod>);

    #[async_trait]
    impl ClusterApi for UnfilteredPods {
        fn server_address(&self) -> String {
            "https://127.0.0.1:6443".to_string()
        }

        async fn server_version(&self) -> Result<Info, ApiError> {
            Ok(Info::default())
        }

        async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
            Ok(Vec::new())
        }

        async fn list_pods(&self, _namespace: &str, _selector: &str) -> Result<Vec<Pod>, ApiError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_unlabelled_pods_treated_as_none() {
        let cluster = UnfilteredPods(vec![pod("static-web", &[("tier", "control-plane")], "Running")]);
        let results = ControlPlaneProbe::new("kube-system").run(&cluster, &ctx()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Warning);
        assert_eq!(results[0].message, "No control plane pods found in kube-system");
        assert_eq!(results[0].suggestion.as_deref(), Some(suggest::MANAGED_CONTROL_PLANE));
    }

    #[tokio::test]
    async fn test_list_error_is_warning() {
        let cluster = MockCluster {
            pods_error: Some("pods is forbidden".to_string()),
            ..MockCluster::default()
        };
        let results = ControlPlaneProbe::new("kube-system").run(&cluster, &ctx()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Warning);
        assert_eq!(results[0].error.as_deref(), Some("pods is forbidden"));
    }

    #[tokio::test]
    async fn test_cancelled_is_failure() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ProbeContext::new(token, Duration::from_secs(5), None);
        let results = ControlPlaneProbe::new("kube-system")
            .run(&MockCluster::default(), &ctx)
            .await;

        assert_eq!(results[0].status, Status::Failed);
    }
}
