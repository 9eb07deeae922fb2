//! Node readiness and pressure conditions.
//!
//! Emits an overview record followed by one record per node that carries at
//! least one issue tag. Healthy nodes get no record of their own.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use tracing::{info, warn};

use super::{aborted, Probe, ProbeContext};
use crate::client::ClusterApi;
use crate::config::ProbeKind;
use crate::report::CheckResult;
use crate::suggest::{self, NodeIssue};

const OVERVIEW_NAME: &str = "nodes";

/// What the probe learned about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAssessment {
    pub name: String,
    pub ready: bool,
    /// Issue tags in priority order.
    pub issues: Vec<NodeIssue>,
    pub kubelet_version: Option<String>,
}

impl NodeAssessment {
    /// Inspect `Ready`, `MemoryPressure`, `DiskPressure`, `PIDPressure` and
    /// `NetworkUnavailable`. A node without a `Ready=True` condition is not
    /// ready.
    pub fn from_node(node: &Node) -> Self {
        let name = node
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());

        let conditions = node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_deref())
            .unwrap_or_default();

        let mut ready = false;
        let mut issues = Vec::new();
        for condition in conditions {
            let is_true = condition.status == "True";
            if condition.type_ == "Ready" {
                ready = is_true;
            } else if is_true {
                if let Some(issue) = NodeIssue::from_pressure_condition(&condition.type_) {
                    issues.push(issue);
                }
            }
        }
        if !ready {
            issues.push(NodeIssue::NotReady);
        }
        issues.sort_unstable();
        issues.dedup();

        let kubelet_version = node
            .status
            .as_ref()
            .and_then(|s| s.node_info.as_ref())
            .map(|info| info.kubelet_version.clone());

        Self {
            name,
            ready,
            issues,
            kubelet_version,
        }
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    fn to_check(&self) -> CheckResult {
        let tags = self
            .issues
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let check = if self.ready {
            CheckResult::warning(
                format!("node/{}", self.name),
                format!("Node {} is ready but reports: {tags}", self.name),
            )
        } else {
            CheckResult::failed(
                format!("node/{}", self.name),
                format!("Node {} has issues: {tags}", self.name),
            )
        };

        let check = check
            .with_detail("issues", tags)
            .with_detail("ready", self.ready.to_string())
            .with_optional_suggestion(suggest::for_node_issues(&self.issues).map(str::to_string));

        match &self.kubelet_version {
            Some(version) => check.with_detail("kubeletVersion", version),
            None => check,
        }
    }
}

/// Classify a node listing. Overview first, then per-node records sorted by
/// node name.
pub fn classify_nodes(nodes: &[Node]) -> Vec<CheckResult> {
    if nodes.is_empty() {
        return vec![CheckResult::failed(OVERVIEW_NAME, "No nodes found")
            .with_detail("totalNodes", "0")
            .with_suggestion(suggest::NO_NODES)];
    }

    let mut assessments: Vec<NodeAssessment> = nodes.iter().map(NodeAssessment::from_node).collect();
    assessments.sort_by(|a, b| a.name.cmp(&b.name));

    let total = assessments.len();
    let ready = assessments.iter().filter(|a| a.ready).count();
    let problematic: Vec<&NodeAssessment> = assessments.iter().filter(|a| a.has_issues()).collect();

    let overview = if ready == total && problematic.is_empty() {
        CheckResult::passed(OVERVIEW_NAME, format!("All {total} nodes are ready and healthy"))
    } else if ready == 0 {
        CheckResult::failed(OVERVIEW_NAME, format!("No nodes are ready (0/{total})"))
            .with_suggestion(NodeIssue::NotReady.suggestion())
    } else {
        CheckResult::warning(
            OVERVIEW_NAME,
            format!(
                "{ready}/{total} nodes ready, {} nodes with issues",
                problematic.len()
            ),
        )
    };

    let overview = overview
        .with_detail("totalNodes", total.to_string())
        .with_detail("readyNodes", ready.to_string())
        .with_detail("nodesWithIssues", problematic.len().to_string());

    std::iter::once(overview)
        .chain(problematic.into_iter().map(NodeAssessment::to_check))
        .collect()
}

/// Lists nodes and checks their conditions.
pub struct NodeProbe;

#[async_trait]
impl Probe for NodeProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Nodes
    }

    async fn run(&self, api: &dyn ClusterApi, ctx: &ProbeContext) -> Vec<CheckResult> {
        match ctx.call(api.list_nodes()).await {
            Ok(nodes) => {
                let results = classify_nodes(&nodes);
                info!(
                    nodes = nodes.len(),
                    records = results.len(),
                    "Node health evaluated"
                );
                results
            }
            Err(err) if err.is_abort() => vec![aborted(OVERVIEW_NAME, &err)],
            Err(err) => {
                warn!(error = %err, "Failed to list nodes");
                vec![CheckResult::failed(OVERVIEW_NAME, "Failed to list nodes")
                    .with_error(&err)
                    .with_suggestion(suggest::NODE_LIST_PERMISSION)]
            }
        }
    }
}
