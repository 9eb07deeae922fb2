//! Read-only Kubernetes cluster diagnostics.
//!
//! Runs a fixed set of health probes (API connectivity, nodes, control plane,
//! DNS) once against a cluster and returns a severity-classified report.
//!
//! # Example
//!
//! ```ignore
//! use cluster_doctor::{Doctor, DoctorConfig, KubeClusterApi};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = KubeClusterApi::connect(None, None).await?;
//!     let doctor = Doctor::new(DoctorConfig::default());
//!     let report = doctor.run(&api, &api.target(), CancellationToken::new()).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod probes;
pub mod render;
pub mod report;
pub mod suggest;

// Re-export commonly used types at the crate root
pub use client::{ClusterApi, KubeClusterApi};
pub use config::{DoctorConfig, ProbeKind};
pub use error::{ApiError, DoctorError, DoctorResult};
pub use orchestrator::Doctor;
pub use render::OutputFormat;
pub use report::{CheckResult, DiagnosticReport, Status, Summary};
