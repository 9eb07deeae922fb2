//! Report data model: check results, summary counts and the final report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Verdict of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Warning,
    Failed,
    Skipped,
}

impl Status {
    /// Display severity. Skipped ranks below Passed since it says nothing
    /// about cluster health.
    pub fn severity(self) -> u8 {
        match self {
            Self::Skipped => 0,
            Self::Passed => 1,
            Self::Warning => 2,
            Self::Failed => 3,
        }
    }
}

/// One classified observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            error: None,
            details: BTreeMap::new(),
            suggestion: None,
        }
    }

    pub fn passed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Passed, message)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Warning, message)
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Failed, message)
    }

    pub fn skipped(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Skipped, message)
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a suggestion only when one was resolved.
    pub fn with_optional_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

/// Status counts over a full check sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
    pub skipped: usize,
}

impl Summary {
    /// Tally statuses in one pass. Pure, so calling it twice on the same
    /// checks gives the same summary.
    pub fn from_checks(checks: &[CheckResult]) -> Self {
        checks.iter().fold(Self::default(), |mut summary, check| {
            summary.total += 1;
            match check.status {
                Status::Passed => summary.passed += 1,
                Status::Warning => summary.warnings += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
            }
            summary
        })
    }
}

/// The complete diagnostic report for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub target: String,
    pub timestamp: String,
    pub cluster_info: BTreeMap<String, String>,
    pub checks: Vec<CheckResult>,
    pub summary: Summary,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DiagnosticReport {
    /// Most severe status present in the report.
    #[must_use]
    pub fn overall_status(&self) -> Status {
        self.checks
            .iter()
            .map(|c| c.status)
            .filter(|s| *s != Status::Skipped)
            .max_by_key(|s| s.severity())
            .unwrap_or(Status::Passed)
    }

    /// True if any check failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Look up a check by name.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}
