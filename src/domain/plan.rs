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

//! Preview of what an apply would change.

use crate::domain::graph::{ResourceGraph, ResourceKind};
use crate::domain::output::UNKNOWN;
use crate::domain::stack::StackIdentifier;
use crate::infrastructure::state::StackState;
use crate::shared::error::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    Create,
    Update,
    Replace,
    Delete,
    Same,
}

impl StepOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOp::Create => "create",
            StepOp::Update => "update",
            StepOp::Replace => "replace",
            StepOp::Delete => "delete",
            StepOp::Same => "same",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StepOp::Create => "+",
            StepOp::Update => "~",
            StepOp::Replace => "+-",
            StepOp::Delete => "-",
            StepOp::Same => "=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub name: String,
    pub kind: ResourceKind,
    pub op: StepOp,
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub stack: StackIdentifier,
    pub steps: Vec<PlanStep>,
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn compute(
        stack: &StackIdentifier,
        graph: &ResourceGraph,
        prior: Option<&StackState>,
    ) -> Result<Self> {
        let mut steps = Vec::new();

        for decl in graph.topological_order()? {
            let record = prior.and_then(|p| p.resource(&decl.name));
            let step = match record {
                None => PlanStep {
                    name: decl.name.clone(),
                    kind: decl.kind,
                    op: StepOp::Create,
                    changed_fields: Vec::new(),
                },
                Some(record) => {
                    let changed = diff_fields(&record.inputs, &decl.inputs);
                    let op = if changed.is_empty() {
                        StepOp::Same
                    } else if forces_replacement(decl.kind, &changed) {
                        StepOp::Replace
                    } else {
                        StepOp::Update
                    };
                    PlanStep {
                        name: decl.name.clone(),
                        kind: decl.kind,
                        op,
                        changed_fields: changed,
                    }
                }
            };
            steps.push(step);
        }

        if let Some(prior) = prior {
            let recorded = prior.recorded_graph()?;
            for decl in recorded.reverse_order()? {
                if !graph.contains(&decl.name) {
                    steps.push(PlanStep {
                        name: decl.name.clone(),
                        kind: decl.kind,
                        op: StepOp::Delete,
                        changed_fields: Vec::new(),
                    });
                }
            }
        }

        Ok(Self {
            stack: stack.clone(),
            steps,
            warnings: Vec::new(),
        })
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn count(&self, op: StepOp) -> usize {
        self.steps.iter().filter(|s| s.op == op).count()
    }

    pub fn has_changes(&self) -> bool {
        self.steps.iter().any(|s| s.op != StepOp::Same)
    }
}

/// True when one of the changed paths sits at or below a replacement path,
/// or is an added/removed subtree containing one.
pub fn forces_replacement(kind: ResourceKind, changed: &[String]) -> bool {
    kind.replace_on().iter().any(|path| {
        changed.iter().any(|c| {
            c == path
                || c.starts_with(&format!("{}/", path))
                || path.starts_with(&format!("{}/", c))
        })
    })
}

/// JSON-pointer paths of the leaves that differ between `old` and `new`.
/// An unknown value in `new` always counts as a difference.
pub fn diff_fields(old: &Value, new: &Value) -> Vec<String> {
    let mut changed = Vec::new();
    diff_into(old, new, String::new(), &mut changed);
    changed
}

fn diff_into(old: &Value, new: &Value, path: String, changed: &mut Vec<String>) {
    if new.as_str() == Some(UNKNOWN) {
        changed.push(path);
        return;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let child = format!("{}/{}", path, escape_pointer(key));
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_into(x, y, child, changed),
                    _ => changed.push(child),
                }
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                diff_into(x, y, format!("{}/{}", path, i), changed);
            }
        }
        _ => {
            if old != new {
                changed.push(path);
            }
        }
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::ResourceDeclaration;
    use crate::infrastructure::state::ResourceRecord;
    use chrono::Utc;
    use serde_json::json;

    fn record(kind: ResourceKind, inputs: Value) -> ResourceRecord {
        ResourceRecord {
            kind,
            inputs,
            outputs: json!({}),
            depends_on: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_diff_fields_reports_leaf_paths() {
        let old = json!({"name": "a", "body": {"count": 1, "tags": ["x"]}});
        let new = json!({"name": "a", "body": {"count": 3, "tags": ["x"]}});
        assert_eq!(diff_fields(&old, &new), vec!["/body/count".to_string()]);
        assert!(diff_fields(&old, &old).is_empty());
    }

    #[test]
    fn test_unknown_counts_as_changed() {
        let old = json!({"value": "1.2.3.4"});
        let new = json!({"value": UNKNOWN});
        assert_eq!(diff_fields(&old, &new), vec!["/value".to_string()]);
    }

    #[test]
    fn test_replace_only_on_replacement_paths() {
        assert!(forces_replacement(
            ResourceKind::ResourceGroup,
            &["/location".to_string()]
        ));
        assert!(!forces_replacement(
            ResourceKind::ManagedCluster,
            &["/body/properties/agentPoolProfiles/0/count".to_string()]
        ));
        assert!(forces_replacement(
            ResourceKind::ManagedCluster,
            &["/body/properties/networkProfile/serviceCidr".to_string()]
        ));
        // prefix match must stop at a segment boundary
        assert!(!forces_replacement(
            ResourceKind::ResourceGroup,
            &["/names".to_string()]
        ));
        assert!(forces_replacement(
            ResourceKind::Deployment,
            &["/spec".to_string()]
        ));
    }

    #[test]
    fn test_plan_ops() {
        let stack: StackIdentifier = "o/p/s".parse().unwrap();
        let mut graph = ResourceGraph::new();
        graph
            .add(ResourceDeclaration::new(
                "rg",
                ResourceKind::ResourceGroup,
                json!({"name": "rg", "location": "eastus"}),
            ))
            .unwrap();
        graph
            .add(
                ResourceDeclaration::new(
                    "svc",
                    ResourceKind::Service,
                    json!({"metadata": {"name": "svc"}, "spec": {"type": "ClusterIP"}}),
                )
                .depends_on("rg"),
            )
            .unwrap();
        graph
            .add(ResourceDeclaration::new(
                "new",
                ResourceKind::DnsRecord,
                json!({"name": "x"}),
            ))
            .unwrap();

        let mut prior = StackState::default();
        prior.resources.insert(
            "rg".to_string(),
            record(
                ResourceKind::ResourceGroup,
                json!({"name": "rg", "location": "westus"}),
            ),
        );
        prior.resources.insert(
            "svc".to_string(),
            record(
                ResourceKind::Service,
                json!({"metadata": {"name": "svc"}, "spec": {"type": "ClusterIP"}}),
            ),
        );
        prior.resources.insert(
            "gone".to_string(),
            record(ResourceKind::Ingress, json!({})),
        );

        let plan = Plan::compute(&stack, &graph, Some(&prior)).unwrap();
        assert_eq!(plan.step("rg").unwrap().op, StepOp::Replace);
        assert_eq!(plan.step("svc").unwrap().op, StepOp::Same);
        assert_eq!(plan.step("new").unwrap().op, StepOp::Create);
        assert_eq!(plan.step("gone").unwrap().op, StepOp::Delete);
        assert!(plan.has_changes());
        assert_eq!(plan.count(StepOp::Same), 1);
    }
}
