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

//! Bookkeeping for a single apply of one stack.

use super::identifier::StackIdentifier;
use crate::domain::graph::{ResourceDeclaration, ResourceGraph};
use crate::domain::plan::{diff_fields, forces_replacement, StepOp};
use crate::infrastructure::state::{ResourceRecord, StackState, StateBackend};
use crate::shared::error::{Result, StackError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub same: usize,
}

impl ApplySummary {
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.replaced
    }
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub outputs: BTreeMap<String, Value>,
    pub summary: ApplySummary,
    pub warnings: Vec<String>,
}

pub struct ApplyContext<'a> {
    identifier: StackIdentifier,
    graph: &'a ResourceGraph,
    backend: &'a dyn StateBackend,
    prior: Option<StackState>,
    state: StackState,
    outputs: BTreeMap<String, Value>,
    completed: BTreeSet<String>,
    replaced: BTreeSet<String>,
    summary: ApplySummary,
    warnings: Vec<String>,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        identifier: StackIdentifier,
        graph: &'a ResourceGraph,
        backend: &'a dyn StateBackend,
        prior: Option<StackState>,
    ) -> Self {
        let state = prior.clone().unwrap_or_default();
        Self {
            identifier,
            graph,
            backend,
            prior,
            state,
            outputs: BTreeMap::new(),
            completed: BTreeSet::new(),
            replaced: BTreeSet::new(),
            summary: ApplySummary::default(),
            warnings: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &StackIdentifier {
        &self.identifier
    }

    /// Starts work on a declared resource. Every dependency edge must have
    /// completed earlier in this apply.
    pub fn begin(&self, name: &str) -> Result<&'a ResourceDeclaration> {
        let decl = self.graph.get(name).ok_or_else(|| {
            StackError::declaration(format!("resource '{}' is not declared", name))
        })?;
        for dep in &decl.depends_on {
            if !self.completed.contains(dep) {
                return Err(StackError::unresolved(name, dep));
            }
        }
        Ok(decl)
    }

    pub fn prior_record(&self, name: &str) -> Option<&ResourceRecord> {
        self.prior.as_ref().and_then(|p| p.resource(name))
    }

    pub fn prior_state(&self) -> Option<&StackState> {
        self.prior.as_ref()
    }

    /// Inputs match the last apply and nothing upstream was replaced.
    pub fn is_unchanged(&self, name: &str, inputs: &Value) -> bool {
        let Some(record) = self.prior_record(name) else {
            return false;
        };
        let upstream_replaced = self
            .graph
            .get(name)
            .map(|d| d.depends_on.iter().any(|dep| self.replaced.contains(dep)))
            .unwrap_or(false);
        record.inputs == *inputs && !upstream_replaced
    }

    /// A recorded resource whose changed inputs touch a replace-on path.
    pub fn needs_replacement(&self, name: &str, inputs: &Value) -> bool {
        self.prior_record(name)
            .map(|r| forces_replacement(r.kind, &diff_fields(&r.inputs, inputs)))
            .unwrap_or(false)
    }

    pub fn operation_for(&self, name: &str, inputs: &Value) -> StepOp {
        if self.prior_record(name).is_none() {
            StepOp::Create
        } else if self.is_unchanged(name, inputs) {
            StepOp::Same
        } else if self.needs_replacement(name, inputs) {
            StepOp::Replace
        } else {
            StepOp::Update
        }
    }

    /// Marks an unchanged resource as done and hands back its recorded
    /// outputs.
    pub fn reuse(&mut self, name: &str) -> Result<Value> {
        let outputs = self
            .prior_record(name)
            .map(|r| r.outputs.clone())
            .ok_or_else(|| StackError::unresolved(name, "outputs"))?;
        self.completed.insert(name.to_string());
        self.summary.same += 1;
        println!("  {} {} unchanged", StepOp::Same.symbol(), name);
        Ok(outputs)
    }

    /// Records an applied resource and checkpoints the state file, so a
    /// later failure leaves this resource recorded.
    pub async fn complete(
        &mut self,
        name: &str,
        op: StepOp,
        inputs: Value,
        outputs: Value,
    ) -> Result<()> {
        let decl = self.begin(name)?;
        self.state.resources.insert(
            name.to_string(),
            ResourceRecord {
                kind: decl.kind,
                inputs,
                outputs,
                depends_on: decl.depends_on.clone(),
                updated_at: Utc::now(),
            },
        );
        self.completed.insert(name.to_string());
        match op {
            StepOp::Create => self.summary.created += 1,
            StepOp::Update => self.summary.updated += 1,
            StepOp::Replace => {
                self.summary.replaced += 1;
                self.replaced.insert(name.to_string());
            }
            StepOp::Same => self.summary.same += 1,
            StepOp::Delete => {}
        }
        info!(stack = %self.identifier, resource = name, op = op.as_str(), "resource applied");
        println!("  {} {} ({})", op.symbol(), name, decl.kind);
        self.checkpoint().await
    }

    pub fn secret(&self, key: &str) -> Option<&str> {
        self.state.secrets.get(key).map(String::as_str)
    }

    pub fn set_secret(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.secrets.insert(key.into(), value.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        warn!(stack = %self.identifier, "{}", warning);
        println!("⚠️  {}", warning);
        self.warnings.push(warning);
    }

    pub fn set_output(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    pub fn record_reference(&mut self, producer: &StackIdentifier, updated_at: DateTime<Utc>) {
        self.state
            .references
            .insert(producer.to_string(), updated_at);
    }

    pub fn summary(&self) -> &ApplySummary {
        &self.summary
    }

    async fn checkpoint(&mut self) -> Result<()> {
        self.state.updated_at = Utc::now();
        self.backend.save(&self.identifier, &self.state).await
    }

    /// Publishes the outputs collected during this apply and persists the
    /// final state.
    pub async fn finish(mut self) -> Result<ApplyResult> {
        let stale: Vec<String> = self
            .state
            .resources
            .keys()
            .filter(|name| !self.graph.contains(name))
            .cloned()
            .collect();
        for name in stale {
            warn!(stack = %self.identifier, resource = %name, "dropping record of resource no longer declared");
            self.state.resources.remove(&name);
        }

        self.state.outputs = self.outputs.clone();
        self.checkpoint().await?;
        Ok(ApplyResult {
            outputs: self.outputs,
            summary: self.summary,
            warnings: self.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::ResourceKind;
    use crate::infrastructure::state::FileStateBackend;
    use serde_json::json;

    fn graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph
            .add(ResourceDeclaration::new(
                "svc",
                ResourceKind::Service,
                json!({"a": 1}),
            ))
            .unwrap();
        graph
            .add(
                ResourceDeclaration::new("ingress", ResourceKind::Ingress, json!({"b": 1}))
                    .depends_on("svc"),
            )
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn test_begin_enforces_dependency_order() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        let graph = graph();
        let id: StackIdentifier = "o/aks-ingress/api".parse().unwrap();
        let mut ctx = ApplyContext::new(id.clone(), &graph, &backend, None);

        let err = ctx.begin("ingress").unwrap_err();
        assert!(matches!(err, StackError::Unresolved { .. }));

        ctx.complete("svc", StepOp::Create, json!({"a": 1}), json!({}))
            .await
            .unwrap();
        assert!(ctx.begin("ingress").is_ok());

        // checkpoint written after each resource
        let saved = backend.load(&id).await.unwrap().unwrap();
        assert!(saved.resources.contains_key("svc"));
    }

    #[tokio::test]
    async fn test_unchanged_detection_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStateBackend::new(dir.path());
        let graph = graph();
        let id: StackIdentifier = "o/aks-ingress/api".parse().unwrap();

        let mut ctx = ApplyContext::new(id.clone(), &graph, &backend, None);
        ctx.complete("svc", StepOp::Create, json!({"a": 1}), json!({"x": 1}))
            .await
            .unwrap();
        ctx.complete("ingress", StepOp::Create, json!({"b": 1}), json!({}))
            .await
            .unwrap();
        ctx.set_output("hostname", json!("api.car-care.xyz"));
        let result = ctx.finish().await.unwrap();
        assert_eq!(result.summary.created, 2);

        let prior = backend.load(&id).await.unwrap();
        let mut ctx = ApplyContext::new(id, &graph, &backend, prior);
        assert!(ctx.is_unchanged("svc", &json!({"a": 1})));
        assert_eq!(ctx.operation_for("svc", &json!({"a": 2})), StepOp::Update);
        assert_eq!(ctx.reuse("svc").unwrap(), json!({"x": 1}));

        let renamed = json!({"a": 1, "metadata": {"name": "other"}});
        assert!(ctx.needs_replacement("svc", &renamed));
        assert!(!ctx.needs_replacement("svc", &json!({"a": 3})));
        assert_eq!(ctx.operation_for("svc", &renamed), StepOp::Replace);
    }
}
