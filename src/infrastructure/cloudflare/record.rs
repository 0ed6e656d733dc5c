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

use crate::infrastructure::constants::{DNS_RECORD_PROXIED, DNS_RECORD_TTL_AUTO, DNS_RECORD_TYPE_A};
use crate::shared::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Body of a create/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl DnsRecordSpec {
    /// Proxied `A` record with automatic TTL. The address must be a
    /// non-empty IPv4 literal.
    pub fn a_record(name: &str, ip: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(StackError::ValidationError(
                "DNS record name must not be empty".to_string(),
            ));
        }
        if ip.trim().is_empty() {
            return Err(StackError::ValidationError(format!(
                "refusing to point '{}' at an empty address",
                name
            )));
        }
        ip.parse::<Ipv4Addr>().map_err(|_| {
            StackError::ValidationError(format!("'{}' is not an IPv4 address", ip))
        })?;

        Ok(Self {
            record_type: DNS_RECORD_TYPE_A.to_string(),
            name: name.to_string(),
            content: ip.to_string(),
            ttl: DNS_RECORD_TTL_AUTO,
            proxied: DNS_RECORD_PROXIED,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

impl DnsRecord {
    pub fn matches(&self, spec: &DnsRecordSpec) -> bool {
        self.record_type == spec.record_type
            && self.name == spec.name
            && self.content == spec.content
            && self.ttl == spec.ttl
            && self.proxied == spec.proxied
    }
}
