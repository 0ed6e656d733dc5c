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

use super::model::StackState;
use crate::domain::stack::StackIdentifier;
use crate::infrastructure::constants::{DEFAULT_STATE_DIR, STATE_DIR_ENV};
use crate::shared::error::{Result, StackError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct StackSummary {
    pub identifier: StackIdentifier,
    pub updated_at: DateTime<Utc>,
    pub resource_count: usize,
    pub output_count: usize,
}

#[async_trait::async_trait]
pub trait StateBackend: Send + Sync {
    async fn load(&self, stack: &StackIdentifier) -> Result<Option<StackState>>;

    async fn save(&self, stack: &StackIdentifier, state: &StackState) -> Result<()>;

    async fn delete(&self, stack: &StackIdentifier) -> Result<()>;

    async fn list(&self) -> Result<Vec<StackSummary>>;

    /// Exclusive per-stack lock held for the duration of an apply.
    async fn lock(&self, stack: &StackIdentifier) -> Result<StackLock>;
}

/// Released when dropped.
#[derive(Debug)]
pub struct StackLock {
    path: PathBuf,
}

impl Drop for StackLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release stack lock");
        }
    }
}

/// Stores each stack as `<root>/<org>/<project>/<stack>.json`.
pub struct FileStateBackend {
    root: PathBuf,
}

impl FileStateBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `--state-dir` > `AKS_STACKS_STATE_DIR` > `./.aks-stacks`
    pub fn from_env(state_dir: Option<String>) -> Self {
        let root = state_dir
            .or_else(|| std::env::var(STATE_DIR_ENV).ok())
            .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stack_dir(&self, stack: &StackIdentifier) -> PathBuf {
        self.root.join(&stack.organization).join(&stack.project)
    }

    fn state_path(&self, stack: &StackIdentifier) -> PathBuf {
        self.stack_dir(stack).join(format!("{}.json", stack.stack))
    }

    fn lock_path(&self, stack: &StackIdentifier) -> PathBuf {
        self.stack_dir(stack).join(format!("{}.lock", stack.stack))
    }
}

#[async_trait::async_trait]
impl StateBackend for FileStateBackend {
    async fn load(&self, stack: &StackIdentifier) -> Result<Option<StackState>> {
        let path = self.state_path(stack);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let state: StackState = serde_json::from_str(&content)?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, stack: &StackIdentifier, state: &StackState) -> Result<()> {
        let dir = self.stack_dir(stack);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.state_path(stack);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(stack = %stack, path = %path.display(), "checkpointed stack state");
        Ok(())
    }

    async fn delete(&self, stack: &StackIdentifier) -> Result<()> {
        match tokio::fs::remove_file(self.state_path(stack)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<StackSummary>> {
        let mut summaries = Vec::new();
        if !self.root.exists() {
            return Ok(summaries);
        }

        for org in read_dirs(&self.root)? {
            for project in read_dirs(&org)? {
                for entry in std::fs::read_dir(&project)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    let Some(identifier) = identifier_from_path(&path) else {
                        continue;
                    };
                    let content = tokio::fs::read_to_string(&path).await?;
                    let state: StackState = serde_json::from_str(&content)?;
                    summaries.push(StackSummary {
                        identifier,
                        updated_at: state.updated_at,
                        resource_count: state.resources.len(),
                        output_count: state.outputs.len(),
                    });
                }
            }
        }

        summaries.sort_by(|a, b| a.identifier.to_string().cmp(&b.identifier.to_string()));
        Ok(summaries)
    }

    async fn lock(&self, stack: &StackIdentifier) -> Result<StackLock> {
        tokio::fs::create_dir_all(self.stack_dir(stack)).await?;
        let path = self.lock_path(stack);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(StackLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StackError::StateLocked(stack.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn read_dirs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn identifier_from_path(path: &Path) -> Option<StackIdentifier> {
    let stack = path.file_stem()?.to_str()?;
    let project_dir = path.parent()?;
    let project = project_dir.file_name()?.to_str()?;
    let org = project_dir.parent()?.file_name()?.to_str()?;
    StackIdentifier::new(org, project, stack).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> StackIdentifier {
        "wijayasena/cluster-general/dev".parse().unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        assert!(backend.load(&dev()).await.unwrap().is_none());

        let mut state = StackState::default();
        state
            .outputs
            .insert("rgName".to_string(), serde_json::json!("ccc-dev"));
        backend.save(&dev(), &state).await.unwrap();

        let loaded = backend.load(&dev()).await.unwrap().unwrap();
        assert_eq!(loaded.output_str("rgName"), Some("ccc-dev"));

        let listed = backend.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identifier, dev());
        assert_eq!(listed[0].output_count, 1);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());

        let guard = backend.lock(&dev()).await.unwrap();
        assert!(matches!(
            backend.lock(&dev()).await,
            Err(StackError::StateLocked(_))
        ));
        drop(guard);
        assert!(backend.lock(&dev()).await.is_ok());
    }
}
