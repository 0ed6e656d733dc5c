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

use super::stack::StackConfig;
use crate::domain::stack::StackIdentifier;
use crate::infrastructure::constants::{
    DEFAULT_APP_NAMESPACE, DEFAULT_BASE_DOMAIN, DEFAULT_DNS_ZONE_ID, DEFAULT_FOUNDATION_STACK,
    DEFAULT_INGRESS_IP_POLL_SECS, DEFAULT_INGRESS_IP_TIMEOUT_SECS,
};
use crate::shared::error::{Result, StackError};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

pub const KEY_FOUNDATION_STACK: &str = "foundation-stack";
pub const KEY_BASE_DOMAIN: &str = "base-domain";
pub const KEY_DNS_ZONE_ID: &str = "dns-zone-id";
pub const KEY_NAMESPACE: &str = "namespace";
pub const KEY_INGRESS_IP_TIMEOUT: &str = "ingress-ip-timeout-secs";
pub const KEY_INGRESS_IP_POLL: &str = "ingress-ip-poll-secs";

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationConfig {
    /// The stack name doubles as the application name.
    pub app_name: String,
    pub foundation_stack: StackIdentifier,
    pub base_domain: String,
    pub dns_zone_id: String,
    pub namespace: String,
    pub ingress_ip_timeout: Duration,
    pub ingress_ip_poll: Duration,
}

fn dns_label() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("dns label pattern is valid")
    })
}

impl ApplicationConfig {
    pub fn from_stack_config(conf: &StackConfig, app_name: &str) -> Result<Self> {
        let foundation_stack = conf
            .get(KEY_FOUNDATION_STACK)
            .unwrap_or(DEFAULT_FOUNDATION_STACK)
            .parse::<StackIdentifier>()?;

        let timeout = conf
            .get_number::<u64>(KEY_INGRESS_IP_TIMEOUT)?
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_INGRESS_IP_TIMEOUT_SECS);
        let poll = conf
            .get_number::<u64>(KEY_INGRESS_IP_POLL)?
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_INGRESS_IP_POLL_SECS);

        let config = Self {
            app_name: app_name.to_string(),
            foundation_stack,
            base_domain: conf
                .get(KEY_BASE_DOMAIN)
                .unwrap_or(DEFAULT_BASE_DOMAIN)
                .to_string(),
            dns_zone_id: conf
                .get(KEY_DNS_ZONE_ID)
                .unwrap_or(DEFAULT_DNS_ZONE_ID)
                .to_string(),
            namespace: conf
                .get(KEY_NAMESPACE)
                .unwrap_or(DEFAULT_APP_NAMESPACE)
                .to_string(),
            ingress_ip_timeout: Duration::from_secs(timeout),
            ingress_ip_poll: Duration::from_secs(poll),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !dns_label().is_match(&self.app_name) {
            return Err(StackError::ValidationError(format!(
                "application name '{}' must be a lowercase DNS label",
                self.app_name
            )));
        }
        if self.base_domain.is_empty() || self.base_domain.starts_with('.') {
            return Err(StackError::ValidationError(format!(
                "invalid {} '{}'",
                KEY_BASE_DOMAIN, self.base_domain
            )));
        }
        if !dns_label().is_match(&self.namespace) {
            return Err(StackError::ValidationError(format!(
                "invalid {} '{}'",
                KEY_NAMESPACE, self.namespace
            )));
        }
        if self.ingress_ip_poll > self.ingress_ip_timeout {
            return Err(StackError::ValidationError(format!(
                "{} must not exceed {}",
                KEY_INGRESS_IP_POLL, KEY_INGRESS_IP_TIMEOUT
            )));
        }
        Ok(())
    }

    pub fn hostname(&self) -> String {
        crate::infrastructure::kubernetes::resources::hostname(&self.app_name, &self.base_domain)
    }

    /// Number of load-balancer polls that fit into the timeout.
    pub fn ingress_ip_attempts(&self) -> usize {
        let poll = self.ingress_ip_poll.as_secs().max(1);
        (self.ingress_ip_timeout.as_secs() / poll).max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = StackConfig::new("aks-ingress");
        let app = ApplicationConfig::from_stack_config(&conf, "api").unwrap();
        assert_eq!(
            app.foundation_stack.to_string(),
            "wijayasena/cluster-general/dev"
        );
        assert_eq!(app.hostname(), "api.car-care.xyz");
        assert_eq!(app.dns_zone_id, "9e65ba651133f5a0ffe8ac8745a51834");
        assert_eq!(app.ingress_ip_attempts(), 60);
    }

    #[test]
    fn test_invalid_app_name() {
        let conf = StackConfig::new("aks-ingress");
        for name in ["", "API", "-api", "api_v2"] {
            assert!(
                ApplicationConfig::from_stack_config(&conf, name).is_err(),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_malformed_foundation_reference() {
        let mut conf = StackConfig::new("aks-ingress");
        conf.set(KEY_FOUNDATION_STACK, "only/two");
        let err = ApplicationConfig::from_stack_config(&conf, "api").unwrap_err();
        assert!(err.is_declaration_error());
    }
}
