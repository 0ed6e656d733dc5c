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

use super::record::{DnsRecord, DnsRecordSpec};
use crate::shared::error::{Result, StackError};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

pub const ENV_API_TOKEN: &str = "CLOUDFLARE_API_TOKEN";
const DEFAULT_ENDPOINT: &str = "https://api.cloudflare.com/client/v4";
const SERVICE: &str = "Cloudflare";

#[async_trait::async_trait]
pub trait DnsApi: Send + Sync {
    async fn find_record(&self, zone_id: &str, record_type: &str, name: &str)
        -> Result<Option<DnsRecord>>;

    async fn create_record(&self, zone_id: &str, spec: &DnsRecordSpec) -> Result<DnsRecord>;

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &DnsRecordSpec,
    ) -> Result<DnsRecord>;

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<EnvelopeError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct CloudflareClient {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl CloudflareClient {
    pub fn new(api_token: Option<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(
            std::env::var(ENV_API_TOKEN)
                .ok()
                .filter(|t| !t.trim().is_empty()),
        )
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.endpoint, zone_id)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .api_token
            .as_ref()
            .ok_or_else(|| StackError::config_error(format!("{} is not set", ENV_API_TOKEN)))?;
        Ok(request.bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = self.authorized(request)?.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(StackError::Api {
                    service: SERVICE.to_string(),
                    status: status.as_u16(),
                    message: text,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !envelope.success {
            let message = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StackError::Api {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(envelope.result)
    }
}

#[async_trait::async_trait]
impl DnsApi for CloudflareClient {
    async fn find_record(
        &self,
        zone_id: &str,
        record_type: &str,
        name: &str,
    ) -> Result<Option<DnsRecord>> {
        let request = self
            .http
            .get(self.records_url(zone_id))
            .query(&[("type", record_type), ("name", name)]);
        let records: Vec<DnsRecord> = self.execute(request).await?.unwrap_or_default();
        Ok(records.into_iter().find(|r| r.name == name))
    }

    async fn create_record(&self, zone_id: &str, spec: &DnsRecordSpec) -> Result<DnsRecord> {
        info!(zone = zone_id, name = %spec.name, content = %spec.content, "creating DNS record");
        let request = self.http.post(self.records_url(zone_id)).json(spec);
        self.execute(request)
            .await?
            .ok_or_else(|| StackError::provisioning(&spec.name, "Cloudflare returned no record"))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &DnsRecordSpec,
    ) -> Result<DnsRecord> {
        info!(zone = zone_id, name = %spec.name, content = %spec.content, "updating DNS record");
        let url = format!("{}/{}", self.records_url(zone_id), record_id);
        let request = self.http.put(url).json(spec);
        self.execute(request)
            .await?
            .ok_or_else(|| StackError::provisioning(&spec.name, "Cloudflare returned no record"))
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.records_url(zone_id), record_id);
        let request = self.http.delete(url);
        match self.execute::<serde_json::Value>(request).await {
            Ok(_) => Ok(()),
            Err(StackError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_list_result() {
        let body = r#"{
            "success": true,
            "errors": [],
            "result": [{"id": "r1", "type": "A", "name": "api.car-care.xyz",
                        "content": "20.1.2.3", "ttl": 1, "proxied": true}]
        }"#;
        let envelope: Envelope<Vec<DnsRecord>> = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.result.unwrap()[0].id, "r1");
    }

    #[tokio::test]
    async fn test_missing_token_is_config_error() {
        let client = CloudflareClient::new(None).unwrap();
        let err = client
            .find_record("zone", "A", "api.car-care.xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::ConfigError(_)));
    }
}
