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
use crate::infrastructure::constants::{
    DEFAULT_KUBERNETES_VERSION, DEFAULT_LOCATION, DEFAULT_MAX_PODS, DEFAULT_NODE_COUNT,
    DEFAULT_NODE_VM_SIZE, DEFAULT_OS_DISK_SIZE_GB, DEFAULT_POOL_MODE, DEFAULT_POOL_NAME,
};
use crate::shared::error::{Result, StackError};
use regex::Regex;
use std::sync::OnceLock;

pub const KEY_NODE_COUNT: &str = "cluster-node-count";
pub const KEY_MAX_PODS: &str = "cluster-max-pods";
pub const KEY_MODE: &str = "cluster-mode";
pub const KEY_POOL_NAME: &str = "cluster-pool-name";
pub const KEY_OS_DISK_SIZE: &str = "cluster-os-disk-size";
pub const KEY_NODE_SIZE: &str = "cluster-nodeSize";
pub const KEY_VERSION: &str = "cluster-version";
pub const KEY_ADMIN: &str = "cluster-admin";
pub const KEY_PUBLIC_KEY: &str = "cluster-publicKey";
pub const KEY_LOCATION: &str = "location";
const KEY_PROVIDER_LOCATION: &str = "azure-native:location";

/// Cluster settings of the foundation stack. Every field has a default so
/// an empty configuration still declares a valid cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundationConfig {
    pub node_count: i32,
    pub max_pods: i32,
    pub mode: String,
    pub pool_name: String,
    pub os_disk_size_gb: i32,
    pub node_vm_size: String,
    pub kubernetes_version: String,
    pub admin_username: String,
    /// `None` means use the generated key pair.
    pub public_key: Option<String>,
    pub location: String,
}

/// Zero counts as unset.
fn number_or(conf: &StackConfig, key: &str, default: i32) -> Result<i32> {
    Ok(conf
        .get_number::<i32>(key)?
        .filter(|v| *v != 0)
        .unwrap_or(default))
}

fn string_or(conf: &StackConfig, key: &str, default: &str) -> String {
    conf.get(key).unwrap_or(default).to_string()
}

impl FoundationConfig {
    pub fn defaults(stack: &str) -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            max_pods: DEFAULT_MAX_PODS,
            mode: DEFAULT_POOL_MODE.to_string(),
            pool_name: DEFAULT_POOL_NAME.to_string(),
            os_disk_size_gb: DEFAULT_OS_DISK_SIZE_GB,
            node_vm_size: DEFAULT_NODE_VM_SIZE.to_string(),
            kubernetes_version: DEFAULT_KUBERNETES_VERSION.to_string(),
            admin_username: default_admin(stack),
            public_key: None,
            location: DEFAULT_LOCATION.to_string(),
        }
    }

    pub fn from_stack_config(conf: &StackConfig, stack: &str) -> Result<Self> {
        let admin = default_admin(stack);
        let location = conf
            .get(KEY_LOCATION)
            .or_else(|| conf.get(KEY_PROVIDER_LOCATION))
            .unwrap_or(DEFAULT_LOCATION)
            .to_string();

        let config = Self {
            node_count: number_or(conf, KEY_NODE_COUNT, DEFAULT_NODE_COUNT)?,
            max_pods: number_or(conf, KEY_MAX_PODS, DEFAULT_MAX_PODS)?,
            mode: string_or(conf, KEY_MODE, DEFAULT_POOL_MODE),
            pool_name: string_or(conf, KEY_POOL_NAME, DEFAULT_POOL_NAME),
            os_disk_size_gb: number_or(conf, KEY_OS_DISK_SIZE, DEFAULT_OS_DISK_SIZE_GB)?,
            node_vm_size: string_or(conf, KEY_NODE_SIZE, DEFAULT_NODE_VM_SIZE),
            kubernetes_version: string_or(conf, KEY_VERSION, DEFAULT_KUBERNETES_VERSION),
            admin_username: string_or(conf, KEY_ADMIN, &admin),
            public_key: conf.get(KEY_PUBLIC_KEY).map(str::to_string),
            location,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.node_count) {
            return Err(StackError::ValidationError(format!(
                "{} must be between 1 and 1000, got {}",
                KEY_NODE_COUNT, self.node_count
            )));
        }
        if !(10..=250).contains(&self.max_pods) {
            return Err(StackError::ValidationError(format!(
                "{} must be between 10 and 250, got {}",
                KEY_MAX_PODS, self.max_pods
            )));
        }
        if !(1..=2048).contains(&self.os_disk_size_gb) {
            return Err(StackError::ValidationError(format!(
                "{} must be between 1 and 2048 GB, got {}",
                KEY_OS_DISK_SIZE, self.os_disk_size_gb
            )));
        }
        if self.mode != "System" && self.mode != "User" {
            return Err(StackError::ValidationError(format!(
                "{} must be 'System' or 'User', got '{}'",
                KEY_MODE, self.mode
            )));
        }

        static POOL_NAME: OnceLock<Regex> = OnceLock::new();
        let pool_name = POOL_NAME.get_or_init(|| {
            Regex::new(r"^[a-z][a-z0-9]{0,11}$").expect("pool name pattern is valid")
        });
        if !pool_name.is_match(&self.pool_name) {
            return Err(StackError::ValidationError(format!(
                "{} must be 1-12 lowercase alphanumerics starting with a letter, got '{}'",
                KEY_POOL_NAME, self.pool_name
            )));
        }

        if self.admin_username.is_empty() {
            return Err(StackError::ValidationError(format!(
                "{} must not be empty",
                KEY_ADMIN
            )));
        }
        if let Some(key) = &self.public_key {
            if !key.starts_with("ssh-") && !key.starts_with("ecdsa-") {
                return Err(StackError::ValidationError(format!(
                    "{} must be an OpenSSH public key",
                    KEY_PUBLIC_KEY
                )));
            }
        }
        Ok(())
    }
}

fn default_admin(stack: &str) -> String {
    format!("cluster_{}_admin", stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let conf = StackConfig::new("cluster-general");
        let foundation = FoundationConfig::from_stack_config(&conf, "dev").unwrap();
        assert_eq!(foundation, FoundationConfig::defaults("dev"));
        assert_eq!(foundation.admin_username, "cluster_dev_admin");
        assert_eq!(foundation.node_vm_size, "Standard_D2s_v3");
        assert_eq!(foundation.kubernetes_version, "1.21.7");
    }

    #[test]
    fn test_zero_falls_back_to_default() {
        let mut conf = StackConfig::new("cluster-general");
        conf.set(KEY_NODE_COUNT, "0");
        conf.set(KEY_OS_DISK_SIZE, "0");
        conf.set(KEY_MAX_PODS, "50");
        let foundation = FoundationConfig::from_stack_config(&conf, "dev").unwrap();
        assert_eq!(foundation.node_count, 1);
        assert_eq!(foundation.os_disk_size_gb, 30);
        assert_eq!(foundation.max_pods, 50);
    }

    #[test]
    fn test_validation_failures() {
        let mut conf = StackConfig::new("cluster-general");
        conf.set(KEY_MODE, "Spot");
        assert!(FoundationConfig::from_stack_config(&conf, "dev").is_err());

        let mut conf = StackConfig::new("cluster-general");
        conf.set(KEY_POOL_NAME, "Node-Pool");
        assert!(FoundationConfig::from_stack_config(&conf, "dev").is_err());

        let mut conf = StackConfig::new("cluster-general");
        conf.set(KEY_NODE_COUNT, "-3");
        assert!(FoundationConfig::from_stack_config(&conf, "dev").is_err());

        let mut foundation = FoundationConfig::defaults("dev");
        foundation.os_disk_size_gb = 0;
        assert!(foundation.validate().is_err());
        foundation.os_disk_size_gb = 1;
        assert!(foundation.validate().is_ok());
    }
}
