// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::client::{ClusterClient, ClusterClientImpl};
use super::manifest::Manifest;
use crate::shared::error::{Result, StackError};
use k8s_openapi::api::networking::v1::Ingress;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::sync::Arc;
use tracing::info;

/// Access handle for one cluster, built from one decoded kubeconfig.
///
/// Every in-cluster resource is applied through a provider that is passed
/// in explicitly; there is no process-wide default cluster.
#[derive(Clone)]
pub struct ClusterProvider {
    name: String,
    client: Arc<dyn ClusterClient>,
}

impl std::fmt::Debug for ClusterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterProvider")
            .field("name", &self.name)
            .finish()
    }
}

impl ClusterProvider {
    pub fn new(name: impl Into<String>, client: Arc<dyn ClusterClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> Arc<dyn ClusterClient> {
        self.client.clone()
    }

    pub async fn apply(&self, manifest: &Manifest) -> Result<()> {
        info!(provider = %self.name, object = %manifest.display_name(), "applying");
        self.client.apply(manifest).await
    }

    pub async fn apply_all(&self, manifests: &[Manifest]) -> Result<()> {
        for manifest in manifests {
            self.apply(manifest).await?;
        }
        Ok(())
    }

    pub async fn delete(&self, manifest: &Manifest) -> Result<()> {
        info!(provider = %self.name, object = %manifest.display_name(), "deleting");
        self.client.delete(manifest).await
    }

    pub async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        self.client.get_ingress(namespace, name).await
    }
}

#[async_trait::async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, name: &str, kubeconfig: &str) -> Result<ClusterProvider>;
}

/// Builds a `kube::Client` from kubeconfig text.
pub struct KubeConnector;

#[async_trait::async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, name: &str, kubeconfig: &str) -> Result<ClusterProvider> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig)
            .map_err(|e| StackError::InvalidKubeconfig(e.to_string()))?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                StackError::InvalidKubeconfig(format!("Failed to create Kubernetes config: {}", e))
            })?;

        let client = Client::try_from(config).map_err(|e| {
            StackError::Kube(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(ClusterProvider::new(
            name,
            Arc::new(ClusterClientImpl::new(client)),
        ))
    }
}
