//! Diagnostic run configuration.
//!
//! Settings can come from a YAML file and are then overridden by command
//! line flags. Every field has a default, so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DoctorError, DoctorResult};

/// Namespace that hosts control plane and DNS pods.
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "kube-system";

/// Identifies one probe section of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    Connectivity,
    Nodes,
    ControlPlane,
    Dns,
}

impl ProbeKind {
    /// All probes, in report section order.
    pub const ALL: [Self; 4] = [Self::Connectivity, Self::Nodes, Self::ControlPlane, Self::Dns];

    /// Section name, also used as the overview check name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Nodes => "nodes",
            Self::ControlPlane => "control-plane",
            Self::Dns => "dns",
        }
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a diagnostic run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorConfig {
    /// Namespace searched for control plane and DNS pods.
    pub system_namespace: String,
    /// API latency above this is reported as a warning.
    pub slow_response_threshold_secs: u64,
    /// Upper bound for any single API call.
    pub request_timeout_secs: u64,
    /// Overall deadline for the run; unset means no deadline.
    pub deadline_secs: Option<u64>,
    /// Run probes concurrently.
    pub parallel: bool,
    /// Probes to leave out of the run.
    pub skip: Vec<ProbeKind>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            system_namespace: DEFAULT_SYSTEM_NAMESPACE.to_string(),
            slow_response_threshold_secs: 5,
            request_timeout_secs: 30,
            deadline_secs: None,
            parallel: false,
            skip: Vec::new(),
        }
    }
}

impl DoctorConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> DoctorResult<Self> {
        let config_error = |reason: String| DoctorError::Config {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| config_error(e.to_string()))?
        };

        config.validate().map_err(config_error)?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.system_namespace.trim().is_empty() {
            return Err("system_namespace must not be empty".to_string());
        }
        if self.slow_response_threshold_secs == 0 {
            return Err("slow_response_threshold_secs must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.deadline_secs == Some(0) {
            return Err("deadline_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn slow_response_threshold(&self) -> Duration {
        Duration::from_secs(self.slow_response_threshold_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn is_skipped(&self, kind: ProbeKind) -> bool {
        self.skip.contains(&kind)
    }
}
