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

use crate::domain::graph::{ResourceDeclaration, ResourceGraph, ResourceKind};
use crate::infrastructure::constants::STATE_FILE_VERSION;
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last applied state of one stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StackState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub resources: BTreeMap<String, ResourceRecord>,
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub secrets: BTreeMap<String, String>,
    /// Producer stack -> its `updated_at` when this stack last read it.
    pub references: BTreeMap<String, DateTime<Utc>>,
}

impl Default for StackState {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            secrets: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub outputs: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl StackState {
    pub fn resource(&self, name: &str) -> Option<&ResourceRecord> {
        self.resources.get(name)
    }

    /// Output field recorded for a resource, e.g. the public key of a
    /// generated key pair.
    pub fn resource_output(&self, name: &str, field: &str) -> Option<&serde_json::Value> {
        self.resources
            .get(name)
            .and_then(|r| r.outputs.get(field))
            .filter(|v| !v.is_null())
    }

    pub fn output_str(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).and_then(|v| v.as_str())
    }

    /// Rebuilds the dependency graph of the recorded resources, used to
    /// tear a stack down in reverse order.
    pub fn recorded_graph(&self) -> Result<ResourceGraph> {
        let mut graph = ResourceGraph::new();
        for (name, record) in &self.resources {
            let mut decl = ResourceDeclaration::new(name.clone(), record.kind, record.inputs.clone());
            decl.depends_on = record
                .depends_on
                .iter()
                .filter(|d| self.resources.contains_key(*d))
                .cloned()
                .collect();
            graph.add(decl)?;
        }
        Ok(graph)
    }
}
