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

use super::auth::{non_empty_env, AzureCredential, TokenProvider};
use super::credentials::{CredentialResults, KubeconfigEntry};
use super::models::{ArmResource, ArmResourceId};
use crate::shared::error::{Result, StackError};
use backon::{BackoffBuilder, ExponentialBuilder};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
const SERVICE: &str = "Azure";

#[async_trait::async_trait]
pub trait AzureApi: Send + Sync {
    fn subscription_id(&self) -> Result<String>;

    /// Create-or-update. Returns once provisioning has succeeded.
    async fn put_resource(&self, id: &ArmResourceId, body: &Value) -> Result<ArmResource>;

    async fn get_resource(&self, id: &ArmResourceId) -> Result<Option<ArmResource>>;

    /// Deletes and waits until the resource is gone. Missing is not an error.
    async fn delete_resource(&self, id: &ArmResourceId) -> Result<()>;

    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Vec<KubeconfigEntry>>;
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_times: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        // cluster creation routinely takes 5-10 minutes
        Self {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            max_times: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct AzureRestClient {
    http: Client,
    endpoint: String,
    subscription_id: Option<String>,
    tokens: TokenProvider,
    poll: PollSettings,
}

impl AzureRestClient {
    pub fn new(subscription_id: Option<String>, credential: AzureCredential) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            tokens: TokenProvider::new(http.clone(), credential),
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id,
            poll: PollSettings::default(),
        })
    }

    /// Subscription and credentials from the environment. Nothing is
    /// checked until the first call that needs them.
    pub fn from_env() -> Result<Self> {
        Self::new(non_empty_env(ENV_SUBSCRIPTION_ID), AzureCredential::from_env())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<reqwest::Response> {
        let token = self.tokens.token().await?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn poller(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.poll.min_delay)
            .with_max_delay(self.poll.max_delay)
            .with_max_times(self.poll.max_times)
            .build()
    }

    async fn wait_for_provisioning(&self, id: &ArmResourceId) -> Result<ArmResource> {
        let mut backoff = self.poller();
        loop {
            let current = self.get_resource(id).await?.ok_or_else(|| {
                StackError::provisioning(&id.name, "resource disappeared while provisioning")
            })?;
            match current.provisioning_state() {
                None | Some("Succeeded") => return Ok(current),
                Some(state @ ("Failed" | "Canceled")) => {
                    return Err(StackError::provisioning(
                        &id.name,
                        format!("provisioning state is {}", state),
                    ))
                }
                Some(state) => match backoff.next() {
                    Some(delay) => {
                        debug!(resource = %id.name, state, ?delay, "waiting for provisioning");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(StackError::Timeout(format!(
                            "'{}' still {} after {} polls",
                            id.name, state, self.poll.max_times
                        )))
                    }
                },
            }
        }
    }

    async fn wait_for_deletion(&self, id: &ArmResourceId) -> Result<()> {
        let mut backoff = self.poller();
        while self.get_resource(id).await?.is_some() {
            match backoff.next() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    return Err(StackError::Timeout(format!(
                        "'{}' was not deleted after {} polls",
                        id.name, self.poll.max_times
                    )))
                }
            }
        }
        Ok(())
    }
}

async fn api_error(response: reqwest::Response) -> StackError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ArmErrorBody>(&text) {
        Ok(body) => format!("{}: {}", body.error.code, body.error.message),
        Err(_) => text,
    };
    StackError::Api {
        service: SERVICE.to_string(),
        status,
        message,
    }
}

#[async_trait::async_trait]
impl AzureApi for AzureRestClient {
    fn subscription_id(&self) -> Result<String> {
        self.subscription_id.clone().ok_or_else(|| {
            StackError::config_error(format!("{} is not set", ENV_SUBSCRIPTION_ID))
        })
    }

    async fn put_resource(&self, id: &ArmResourceId, body: &Value) -> Result<ArmResource> {
        let url = self.url(&id.path(), id.api_version());
        info!(resource = %id.name, "PUT {}", id);
        let response = self.send(Method::PUT, &url, Some(body)).await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let resource: ArmResource = response.json().await?;
        match resource.provisioning_state() {
            None | Some("Succeeded") => Ok(resource),
            Some(_) => self.wait_for_provisioning(id).await,
        }
    }

    async fn get_resource(&self, id: &ArmResourceId) -> Result<Option<ArmResource>> {
        let url = self.url(&id.path(), id.api_version());
        let response = self.send(Method::GET, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn delete_resource(&self, id: &ArmResourceId) -> Result<()> {
        let url = self.url(&id.path(), id.api_version());
        info!(resource = %id.name, "DELETE {}", id);
        let response = self.send(Method::DELETE, &url, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(()),
            status if status.is_success() => self.wait_for_deletion(id).await,
            _ => Err(api_error(response).await),
        }
    }

    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Vec<KubeconfigEntry>> {
        let id = ArmResourceId::managed_cluster(&self.subscription_id()?, resource_group, cluster_name);
        let url = self.url(
            &format!("{}/listClusterUserCredential", id.path()),
            id.api_version(),
        );
        let response = self.send(Method::POST, &url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StackError::not_found(
                "ManagedCluster",
                cluster_name,
                resource_group,
            ));
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let results: CredentialResults = response.json().await?;
        Ok(results.kubeconfigs)
    }
}
