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

//! Cluster user credentials as returned by `listClusterUserCredential`.

use crate::shared::error::{Result, StackError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::Kubeconfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigEntry {
    pub name: String,
    /// Base64 encoded kubeconfig document.
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialResults {
    #[serde(default)]
    pub kubeconfigs: Vec<KubeconfigEntry>,
}

/// Decodes the first entry into kubeconfig text.
///
/// Bad base64, non UTF-8 bytes or a document that is not a kubeconfig are
/// errors. An empty config is never returned.
pub fn decode_kubeconfig(entries: &[KubeconfigEntry]) -> Result<String> {
    let first = entries.first().ok_or_else(|| {
        StackError::CredentialDecode("credential result contains no kubeconfig entries".into())
    })?;

    let bytes = STANDARD.decode(first.value.trim()).map_err(|e| {
        StackError::CredentialDecode(format!(
            "entry '{}' is not valid base64: {}",
            first.name, e
        ))
    })?;
    let text = String::from_utf8(bytes).map_err(|e| {
        StackError::CredentialDecode(format!("entry '{}' is not UTF-8: {}", first.name, e))
    })?;

    if text.trim().is_empty() {
        return Err(StackError::InvalidKubeconfig(format!(
            "entry '{}' decodes to an empty document",
            first.name
        )));
    }

    let parsed =
        Kubeconfig::from_yaml(&text).map_err(|e| StackError::InvalidKubeconfig(e.to_string()))?;
    if parsed.clusters.is_empty() {
        return Err(StackError::InvalidKubeconfig(format!(
            "entry '{}' defines no clusters",
            first.name
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: ccc-dev-cluster
  cluster:
    server: https://ccc-dev-1234.hcp.eastus.azmk8s.io:443
contexts:
- name: ccc-dev-cluster
  context:
    cluster: ccc-dev-cluster
    user: clusterUser_ccc-dev_ccc-dev-cluster
current-context: ccc-dev-cluster
users:
- name: clusterUser_ccc-dev_ccc-dev-cluster
  user:
    token: secret
"#;

    fn entry(value: String) -> KubeconfigEntry {
        KubeconfigEntry {
            name: "clusterUser".to_string(),
            value,
        }
    }

    #[test]
    fn test_decode_first_entry() {
        let entries = vec![
            entry(STANDARD.encode(KUBECONFIG)),
            entry("ignored".to_string()),
        ];
        let text = decode_kubeconfig(&entries).unwrap();
        assert!(text.contains("ccc-dev-cluster"));
    }

    #[test]
    fn test_malformed_base64_is_an_error() {
        let err = decode_kubeconfig(&[entry("not base64 !!".to_string())]).unwrap_err();
        assert!(matches!(err, StackError::CredentialDecode(_)));
    }

    #[test]
    fn test_empty_and_missing_entries_are_errors() {
        assert!(matches!(
            decode_kubeconfig(&[]).unwrap_err(),
            StackError::CredentialDecode(_)
        ));
        assert!(matches!(
            decode_kubeconfig(&[entry(String::new())]).unwrap_err(),
            StackError::InvalidKubeconfig(_)
        ));
    }

    #[test]
    fn test_non_kubeconfig_yaml_is_rejected() {
        let err = decode_kubeconfig(&[entry(STANDARD.encode("- just\n- a list\n"))]).unwrap_err();
        assert!(matches!(err, StackError::InvalidKubeconfig(_)));
    }
}
