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
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::read_to_string;
use std::str::FromStr;

#[derive(Debug, Default, Deserialize)]
struct StackConfigFile {
    #[serde(default)]
    config: BTreeMap<String, toml::Value>,
}

/// Flat key/value configuration of one stack.
///
/// Keys in the file may carry the owning project as a prefix
/// (`cluster-general:cluster-node-count`); the prefix of the stack's own
/// project is stripped, keys of other namespaces are kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    project: String,
    values: BTreeMap<String, String>,
}

impl StackConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            values: BTreeMap::new(),
        }
    }

    /// Load configuration from TOML file
    pub fn from_file(project: &str, path: &str) -> Result<Self> {
        let content = read_to_string(path).map_err(|e| {
            StackError::config_error(format!("Failed to read config file {}: {}", path, e))
        })?;
        Self::from_toml_str(project, &content)
    }

    pub fn from_toml_str(project: &str, content: &str) -> Result<Self> {
        let file: StackConfigFile = toml::from_str(content)?;
        let mut conf = Self::new(project);
        for (key, value) in file.config {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(StackError::config_error(format!(
                        "config key '{}' must be a scalar, got {}",
                        key,
                        other.type_str()
                    )))
                }
            };
            conf.set(&key, value);
        }
        Ok(conf)
    }

    /// `-D key=value` overrides win over file values.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (key, value) in overrides {
            self.set(key, value.clone());
        }
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = match key.split_once(':') {
            Some((prefix, rest)) if prefix == self.project => rest,
            _ => key,
        };
        self.values.insert(key.to_string(), value.into());
    }

    /// Value of `key`; empty strings read as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_number<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                StackError::config_error(format!("config key '{}' is not a valid number: '{}'", key, raw))
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(StackError::config_error(format!(
                    "config key '{}' is not a boolean: '{}'",
                    key, raw
                ))),
            },
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Parse dynamic configuration properties from -D key=value format
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for config in configs {
        let (key, value) = config.split_once('=').ok_or_else(|| {
            StackError::config_error(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            ))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StackError::config_error(format!(
                "Empty key in config: '{}'",
                config
            )));
        }

        map.insert(key.to_string(), value.trim().to_string());
    }

    Ok(map)
}
