//! Report rendering for the CLI.

use std::fmt::Write;

use colored::{ColoredString, Colorize};

use crate::error::{DoctorError, DoctorResult};
use crate::report::{CheckResult, DiagnosticReport, Status};

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Render a report in the requested format.
pub fn render(report: &DiagnosticReport, format: OutputFormat) -> DoctorResult<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).map_err(|e| DoctorError::Render(e.to_string()))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| DoctorError::Render(e.to_string()))
        }
    }
}

fn status_icon(status: Status) -> ColoredString {
    match status {
        Status::Passed => "✓".green().bold(),
        Status::Warning => "⚠".yellow().bold(),
        Status::Failed => "✗".red().bold(),
        Status::Skipped => "⏭".bright_black(),
    }
}

fn write_check(out: &mut String, check: &CheckResult) {
    // Per-item records (node/..., control-plane/...) are indented under
    // their overview.
    let indent = if check.name.contains('/') { "    " } else { "  " };
    let _ = writeln!(
        out,
        "{indent}{} {:<32} {}",
        status_icon(check.status),
        check.name.bold(),
        check.message
    );
    if let Some(error) = &check.error {
        let _ = writeln!(out, "{indent}    {} {}", "error:".bright_black(), error.red());
    }
    if let Some(suggestion) = &check.suggestion {
        let _ = writeln!(out, "{indent}    {} {}", "→".cyan(), suggestion.bright_black());
    }
}

/// Human-readable rendering for terminals.
pub fn render_text(report: &DiagnosticReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "═".repeat(70).bright_black());
    let _ = writeln!(out, "{}", "CLUSTER DIAGNOSTICS".cyan().bold());
    let _ = writeln!(out, "{}", "═".repeat(70).bright_black());
    let _ = writeln!(out, "  {} {}", "Target:".bright_black(), report.target);
    if let Some(version) = report.cluster_info.get("version") {
        let _ = writeln!(out, "  {} {}", "Version:".bright_black(), version);
    }
    let _ = writeln!(out, "  {} {}", "Time:".bright_black(), report.timestamp);
    let _ = writeln!(out);

    for check in &report.checks {
        write_check(&mut out, check);
    }

    let summary = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "─".repeat(70).bright_black());
    let _ = writeln!(
        out,
        "  {} checks: {} passed, {} warnings, {} failed, {} skipped",
        summary.total,
        summary.passed.to_string().green(),
        summary.warnings.to_string().yellow(),
        summary.failed.to_string().red(),
        summary.skipped
    );

    let verdict = match report.overall_status() {
        Status::Failed => "CLUSTER HAS FAILING CHECKS".red().bold(),
        Status::Warning => "CLUSTER IS DEGRADED".yellow().bold(),
        Status::Passed | Status::Skipped => "CLUSTER IS HEALTHY".green().bold(),
    };
    let _ = writeln!(out, "  {verdict}");
    let _ = writeln!(out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Summary;
    use std::collections::BTreeMap;

    fn report() -> DiagnosticReport {
        let checks = vec![
            CheckResult::passed("connectivity", "Successfully connected"),
            CheckResult::warning("nodes", "2/3 nodes ready, 1 nodes with issues"),
            CheckResult::failed("node/worker-2", "Node worker-2 has issues: NotReady")
                .with_suggestion("Check kubelet status"),
        ];
        DiagnosticReport {
            target: "prod".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            cluster_info: BTreeMap::from([("version".to_string(), "v1.31.2".to_string())]),
            summary: Summary::from_checks(&checks),
            checks,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_text_contains_checks() {
        let text = render_text(&report());
        assert!(text.contains("2/3 nodes ready, 1 nodes with issues"));
        assert!(text.contains("Check kubelet status"));
        assert!(text.contains("v1.31.2"));
        assert!(text.contains("CLUSTER HAS FAILING CHECKS"));
    }

    #[test]
    fn test_json_output() {
        let json = render(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"], "prod");
        assert_eq!(value["checks"][2]["status"], "failed");
        assert_eq!(value["summary"]["failed"], 1);
    }

    #[test]
    fn test_yaml_output() {
        let yaml = render(&report(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("clusterInfo:"));
        assert!(yaml.contains("status: warning"));
    }
}
