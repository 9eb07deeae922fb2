//! Remediation suggestions.
//!
//! Every remediation sentence in a report comes from here. Each observation
//! gets at most one suggestion; when a node carries several issue tags the
//! highest-priority tag wins and the full tag list stays in the check details.

/// Adverse condition detected on a node.
///
/// Variant order is the suggestion priority: the first variant present wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeIssue {
    NotReady,
    MemoryPressure,
    DiskPressure,
    PIDPressure,
    NetworkUnavailable,
}

impl NodeIssue {
    /// Issue tag raised when the named node condition is `True`.
    /// `Ready` is inverted and handled by the caller.
    pub fn from_pressure_condition(condition_type: &str) -> Option<Self> {
        match condition_type {
            "MemoryPressure" => Some(Self::MemoryPressure),
            "DiskPressure" => Some(Self::DiskPressure),
            "PIDPressure" => Some(Self::PIDPressure),
            "NetworkUnavailable" => Some(Self::NetworkUnavailable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "NotReady",
            Self::MemoryPressure => "MemoryPressure",
            Self::DiskPressure => "DiskPressure",
            Self::PIDPressure => "PIDPressure",
            Self::NetworkUnavailable => "NetworkUnavailable",
        }
    }

    pub fn suggestion(self) -> &'static str {
        match self {
            Self::NotReady => {
                "Check kubelet status and logs on the node (journalctl -u kubelet) and verify it can reach the API server"
            }
            Self::MemoryPressure => {
                "Free up memory on the node, lower pod memory requests, or add memory capacity"
            }
            Self::DiskPressure => {
                "Clean up unused images and logs on the node or expand its disk"
            }
            Self::PIDPressure => {
                "Reduce the number of processes on the node or raise the kernel pid limit"
            }
            Self::NetworkUnavailable => {
                "Check the CNI plugin pods and network configuration on the node"
            }
        }
    }
}

/// Pick the single suggestion for a set of node issue tags.
pub fn for_node_issues(issues: &[NodeIssue]) -> Option<&'static str> {
    issues.iter().min().map(|issue| issue.suggestion())
}

/// Suggestion when nodes cannot be listed at all.
pub const NODE_LIST_PERMISSION: &str =
    "Verify that your credentials are allowed to list nodes (kubectl auth can-i list nodes)";

/// Suggestion when no nodes are registered.
pub const NO_NODES: &str =
    "Check that worker nodes have joined the cluster and that kubelet is running on them";

/// Suggestion when no control plane pods are visible.
pub const MANAGED_CONTROL_PLANE: &str =
    "This may be a managed cluster (EKS, GKE, AKS) whose control plane is not visible to users";

/// Suggestion when control plane pods cannot be listed.
pub const CONTROL_PLANE_ACCESS: &str =
    "Verify read access to the system namespace; managed clusters often hide control plane pods";

/// Suggestion for a control plane component with `running` of `total` pods up.
/// Returns `None` when the component is fully healthy.
pub fn for_component(component: &str, running: usize, total: usize) -> Option<String> {
    if total > 0 && running == total {
        return None;
    }

    let hint = match component {
        "etcd" => "check etcd member health and disk latency on control plane nodes",
        "kube-apiserver" => "check API server logs and its connection to etcd",
        "kube-controller-manager" => "check controller manager logs and leader election",
        "kube-scheduler" => "check scheduler logs and leader election",
        _ => "check the component logs",
    };

    if running == 0 {
        Some(format!(
            "{component} has no running pods; inspect the static pod manifests and kubelet logs on control plane nodes, then {hint}"
        ))
    } else {
        Some(format!(
            "{component} has {running}/{total} pods running; {hint}"
        ))
    }
}

/// Suggestion for the cluster DNS deployment in `namespace`.
pub fn for_dns(namespace: &str, running: usize, total: usize) -> Option<String> {
    if total == 0 {
        Some("Install a cluster DNS add-on such as CoreDNS".to_string())
    } else if running == 0 {
        Some(format!(
            "Check CoreDNS pod events and logs (kubectl logs -n {namespace} -l k8s-app=kube-dns)"
        ))
    } else if running < total {
        Some("Some DNS pods are not running; check their events and node placement".to_string())
    } else {
        None
    }
}

/// Suggestion when DNS pods cannot be listed.
pub const DNS_LIST_FAILURE: &str =
    "Verify read access to pods in the system namespace";

/// Broad category of a connection failure, derived from the error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Credentials,
    Network,
    Unknown,
}

const CREDENTIAL_MARKERS: &[&str] = &[
    "credentials",
    "unauthorized",
    "401",
    "token",
    "certificate",
];

const NETWORK_MARKERS: &[&str] = &[
    "connection refused",
    "no such host",
    "timed out",
    "timeout",
    "dial tcp",
    "network is unreachable",
    "connection reset",
];

/// Classify an error message. Matching is case-insensitive on fixed
/// substrings; credential markers are checked before network markers.
pub fn classify_failure(message: &str) -> FailureKind {
    let message = message.to_lowercase();
    if CREDENTIAL_MARKERS.iter().any(|m| message.contains(m)) {
        FailureKind::Credentials
    } else if NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    }
}

/// Suggestion for a failed connection attempt.
pub fn for_connection_failure(message: &str) -> &'static str {
    match classify_failure(message) {
        FailureKind::Credentials => {
            "Check your kubeconfig credentials; the token or client certificate may be invalid or expired"
        }
        FailureKind::Network => {
            "Check that the API server address is reachable from this machine and not blocked by a firewall or VPN"
        }
        FailureKind::Unknown => {
            "Check your kubeconfig and cluster status with 'kubectl cluster-info'"
        }
    }
}

/// Suggestion for a slow API server.
pub const SLOW_RESPONSE: &str =
    "The API server is responding slowly; check control plane load and network latency";
