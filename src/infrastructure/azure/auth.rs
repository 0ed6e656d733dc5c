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

use crate::shared::error::{Result, StackError};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
// refresh a little before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub enum AzureCredential {
    StaticToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    Missing,
}

impl AzureCredential {
    pub fn from_env() -> Self {
        if let Some(token) = non_empty_env(ENV_ACCESS_TOKEN) {
            return AzureCredential::StaticToken(token);
        }
        match (
            non_empty_env(ENV_TENANT_ID),
            non_empty_env(ENV_CLIENT_ID),
            non_empty_env(ENV_CLIENT_SECRET),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                AzureCredential::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                }
            }
            _ => AzureCredential::Missing,
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Hands out management-plane bearer tokens, fetching a fresh one only
/// when the cached token is about to expire.
pub struct TokenProvider {
    http: Client,
    credential: AzureCredential,
    authority: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: Client, credential: AzureCredential) -> Self {
        Self {
            http,
            credential,
            authority: DEFAULT_AUTHORITY.to_string(),
            cached: RwLock::new(None),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub async fn token(&self) -> Result<String> {
        let (tenant_id, client_id, client_secret) = match &self.credential {
            AzureCredential::StaticToken(token) => return Ok(token.clone()),
            AzureCredential::Missing => {
                return Err(StackError::config_error(format!(
                    "no Azure credentials: set {} or {}/{}/{}",
                    ENV_ACCESS_TOKEN, ENV_TENANT_ID, ENV_CLIENT_ID, ENV_CLIENT_SECRET
                )))
            }
            AzureCredential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
        };

        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        debug!(tenant = %tenant_id, "requesting Azure management token");
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StackError::Api {
                service: "Azure AD".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let provider = TokenProvider::new(
            Client::new(),
            AzureCredential::StaticToken("abc".to_string()),
        );
        assert_eq!(provider.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let provider = TokenProvider::new(Client::new(), AzureCredential::Missing);
        let err = provider.token().await.unwrap_err();
        assert!(matches!(err, StackError::ConfigError(_)));
    }
}
