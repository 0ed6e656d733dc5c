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

//! Read-only handle on another stack's published outputs.

use super::identifier::StackIdentifier;
use crate::domain::output::Output;
use crate::infrastructure::state::{StackState, StateBackend};
use crate::shared::error::{Result, StackError};
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct StackReference {
    identifier: StackIdentifier,
    state: StackState,
}

impl StackReference {
    /// Resolves the producer's outputs as of now. A producer that has never
    /// been deployed is an error, not an empty set of outputs.
    pub async fn resolve(backend: &dyn StateBackend, identifier: StackIdentifier) -> Result<Self> {
        let state = backend
            .load(&identifier)
            .await?
            .ok_or_else(|| StackError::not_found("Stack", identifier.to_string(), "state backend"))?;
        debug!(stack = %identifier, outputs = state.outputs.len(), "resolved stack reference");
        Ok(Self { identifier, state })
    }

    pub fn identifier(&self) -> &StackIdentifier {
        &self.identifier
    }

    /// When the producer stack was last applied.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.updated_at
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.state.outputs.keys().map(String::as_str).collect()
    }

    pub fn get_output(&self, name: &str) -> Result<Output<serde_json::Value>> {
        let value = self
            .state
            .outputs
            .get(name)
            .cloned()
            .ok_or_else(|| StackError::MissingOutput {
                stack: self.identifier.to_string(),
                output: name.to_string(),
            })?;
        Ok(Output::known(value).with_dependency(self.identifier.to_string()))
    }

    pub fn get_string(&self, name: &str) -> Result<Output<String>> {
        let output = self.get_output(name)?;
        let stack = self.identifier.to_string();
        output.try_apply(|value| match value {
            serde_json::Value::String(s) if !s.is_empty() => Ok(s),
            other => Err(StackError::config_error(format!(
                "Output '{}' of stack '{}' is not a non-empty string: {}",
                name, stack, other
            ))),
        })
    }

    /// True when the producer was redeployed after the consumer last read it.
    pub fn is_newer_than(&self, last_seen: Option<&DateTime<Utc>>) -> bool {
        match last_seen {
            Some(seen) => self.state.updated_at > *seen,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::state::FileStateBackend;

    #[tokio::test]
    async fn test_missing_stack_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        let id: StackIdentifier = "wijayasena/cluster-general/dev".parse().unwrap();
        let err = StackReference::resolve(&backend, id).await.err().unwrap();
        assert!(matches!(err, StackError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_string_and_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        let id: StackIdentifier = "wijayasena/cluster-general/dev".parse().unwrap();

        let mut state = StackState::default();
        state
            .outputs
            .insert("rgName".to_string(), serde_json::json!("ccc-dev"));
        backend.save(&id, &state).await.unwrap();

        let reference = StackReference::resolve(&backend, id).await.unwrap();
        let rg = reference.get_string("rgName").unwrap();
        assert_eq!(rg.value().map(String::as_str), Some("ccc-dev"));
        assert!(rg.dependencies().contains("wijayasena/cluster-general/dev"));

        assert!(matches!(
            reference.get_string("aksClusterName"),
            Err(StackError::MissingOutput { .. })
        ));
    }
}
