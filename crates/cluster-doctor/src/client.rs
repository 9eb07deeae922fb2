//! Cluster API access.
//!
//! Probes only see the [`ClusterApi`] trait. [`KubeClusterApi`] is the real
//! implementation on top of a `kube::Client`; tests plug in an in-memory one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::error::{ApiError, DoctorError, DoctorResult};

/// Read-only view of the cluster needed by the probes.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// API server address, for reporting only.
    fn server_address(&self) -> String;

    /// Server version query. Doubles as the cheapest round trip to the API
    /// server.
    async fn server_version(&self) -> Result<Info, ApiError>;

    /// All nodes in the cluster.
    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError>;

    /// Pods in `namespace` matching `label_selector`.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, ApiError>;
}

/// [`ClusterApi`] backed by a live Kubernetes client.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    server: String,
    context: Option<String>,
}

impl KubeClusterApi {
    /// Create a client from a kubeconfig file list, or infer one when no
    /// path is given (`KUBECONFIG`, in-cluster service account, then
    /// `~/.kube/config`).
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> DoctorResult<Self> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..KubeConfigOptions::default()
        };

        let config = match kubeconfig {
            Some(paths) => {
                let kubeconfig = read_kubeconfig(paths)?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| DoctorError::Client(e.to_string()))?
            }
            None if context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| DoctorError::Client(e.to_string()))?,
            None => Config::infer()
                .await
                .map_err(|e| DoctorError::Client(e.to_string()))?,
        };

        let server = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(|e| DoctorError::Client(e.to_string()))?;

        debug!(server = %server, context = ?context, "Created Kubernetes client");

        Ok(Self {
            client,
            server,
            context: context.map(str::to_string),
        })
    }

    /// Name used as the report target: the kubeconfig context if one was
    /// chosen, otherwise the server address.
    pub fn target(&self) -> String {
        self.context.clone().unwrap_or_else(|| self.server.clone())
    }
}

/// Read and merge a kubeconfig path list, separated the same way as
/// `KUBECONFIG` (`:` on Unix). Empty entries are ignored and the first file
/// to set a value wins.
pub fn read_kubeconfig(paths: &Path) -> DoctorResult<Kubeconfig> {
    let files: Vec<PathBuf> = std::env::split_paths(paths.as_os_str())
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    if files.is_empty() {
        return Err(DoctorError::Client("empty kubeconfig path".to_string()));
    }

    files.iter().try_fold(Kubeconfig::default(), |merged, path| {
        let next = Kubeconfig::read_from(path).map_err(|e| {
            DoctorError::Client(format!(
                "failed to read kubeconfig from {}: {e}",
                path.display()
            ))
        })?;
        merged
            .merge(next)
            .map_err(|e| DoctorError::Client(format!("failed to merge {}: {e}", path.display())))
    })
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    fn server_address(&self) -> String {
        self.server.clone()
    }

    async fn server_version(&self) -> Result<Info, ApiError> {
        debug!("Querying API server version");
        Ok(self.client.apiserver_version().await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        debug!("Listing nodes");
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, ApiError> {
        debug!(namespace = %namespace, selector = %label_selector, "Listing pods");
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        Ok(pods.list(&params).await?.items)
    }
}
