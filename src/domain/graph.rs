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

//! Resource declarations and the dependency edges between them.

use crate::shared::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    SshKey,
    ManagedCluster,
    ClusterProvider,
    IngressController,
    Service,
    Deployment,
    Ingress,
    DnsRecord,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "azure:ResourceGroup",
            ResourceKind::VirtualNetwork => "azure:VirtualNetwork",
            ResourceKind::Subnet => "azure:Subnet",
            ResourceKind::SshKey => "tls:PrivateKey",
            ResourceKind::ManagedCluster => "azure:ManagedCluster",
            ResourceKind::ClusterProvider => "kubernetes:Provider",
            ResourceKind::IngressController => "kubernetes:IngressController",
            ResourceKind::Service => "kubernetes:Service",
            ResourceKind::Deployment => "kubernetes:Deployment",
            ResourceKind::Ingress => "kubernetes:Ingress",
            ResourceKind::DnsRecord => "cloudflare:Record",
        }
    }

    /// Input paths (JSON pointers) whose change forces delete-then-create.
    pub fn replace_on(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ResourceGroup => &["/name", "/location"],
            ResourceKind::VirtualNetwork => &["/name", "/resourceGroup", "/location"],
            ResourceKind::Subnet => &["/name", "/resourceGroup", "/virtualNetwork"],
            ResourceKind::SshKey => &["/algorithm", "/rsaBits"],
            ResourceKind::ManagedCluster => &[
                "/name",
                "/resourceGroup",
                "/location",
                "/body/properties/dnsPrefix",
                "/body/properties/nodeResourceGroup",
                "/body/properties/linuxProfile/adminUsername",
                "/body/properties/networkProfile",
            ],
            ResourceKind::ClusterProvider => &[],
            ResourceKind::IngressController => &["/namespace"],
            ResourceKind::Service | ResourceKind::Ingress => {
                &["/metadata/name", "/metadata/namespace"]
            }
            ResourceKind::Deployment => &[
                "/metadata/name",
                "/metadata/namespace",
                "/spec/selector",
            ],
            ResourceKind::DnsRecord => &["/zoneId", "/type", "/name"],
        }
    }

    /// Resources that live inside the Kubernetes cluster and are applied
    /// through a provider handle.
    pub fn in_cluster(&self) -> bool {
        matches!(
            self,
            ResourceKind::IngressController
                | ResourceKind::Service
                | ResourceKind::Deployment
                | ResourceKind::Ingress
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDeclaration {
    pub name: String,
    pub kind: ResourceKind,
    pub depends_on: Vec<String>,
    pub inputs: serde_json::Value,
}

impl ResourceDeclaration {
    pub fn new(name: impl Into<String>, kind: ResourceKind, inputs: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            inputs,
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

/// Declarations of one stack, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    declarations: Vec<ResourceDeclaration>,
    index: BTreeMap<String, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, declaration: ResourceDeclaration) -> Result<()> {
        if self.index.contains_key(&declaration.name) {
            return Err(StackError::declaration(format!(
                "resource '{}' is declared more than once",
                declaration.name
            )));
        }
        self.index
            .insert(declaration.name.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declarations(&self) -> &[ResourceDeclaration] {
        &self.declarations
    }

    pub fn validate(&self) -> Result<()> {
        for decl in &self.declarations {
            for dep in &decl.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(StackError::declaration(format!(
                        "resource '{}' depends on undeclared resource '{}'",
                        decl.name, dep
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Dependencies before dependents; ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<&ResourceDeclaration>> {
        let mut in_degree: Vec<usize> = self
            .declarations
            .iter()
            .map(|d| d.depends_on.iter().filter(|dep| self.contains(dep)).count())
            .collect();

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.declarations.len()];
        for (i, decl) in self.declarations.iter().enumerate() {
            for dep in &decl.depends_on {
                if let Some(&j) = self.index.get(dep) {
                    dependents[j].push(i);
                }
            }
        }

        // Ordered by declaration index, so the earliest declared ready node
        // always goes next.
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.declarations.len());

        while let Some(i) = ready.pop_first() {
            order.push(&self.declarations[i]);
            for &k in &dependents[i] {
                in_degree[k] -= 1;
                if in_degree[k] == 0 {
                    ready.insert(k);
                }
            }
        }

        if order.len() != self.declarations.len() {
            let stuck: Vec<&str> = self
                .declarations
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, d)| d.name.as_str())
                .collect();
            return Err(StackError::declaration(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }

    pub fn reverse_order(&self) -> Result<Vec<&ResourceDeclaration>> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    /// Every resource that transitively depends on `name`.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            for decl in &self.declarations {
                if decl.depends_on.iter().any(|d| d == &current) && found.insert(decl.name.clone())
                {
                    queue.push_back(decl.name.clone());
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(name: &str, deps: &[&str]) -> ResourceDeclaration {
        let mut d = ResourceDeclaration::new(name, ResourceKind::Service, json!({}));
        for dep in deps {
            d = d.depends_on(*dep);
        }
        d
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("cluster", &["subnet", "key"])).unwrap();
        graph.add(decl("rg", &[])).unwrap();
        graph.add(decl("subnet", &["vnet"])).unwrap();
        graph.add(decl("vnet", &["rg"])).unwrap();
        graph.add(decl("key", &[])).unwrap();

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("rg") < pos("vnet"));
        assert!(pos("vnet") < pos("subnet"));
        assert!(pos("subnet") < pos("cluster"));
        assert!(pos("key") < pos("cluster"));
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("rg", &[])).unwrap();
        graph.add(decl("vnet", &["rg"])).unwrap();
        graph.add(decl("key", &[])).unwrap();
        graph.add(decl("subnet", &["vnet"])).unwrap();

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        // vnet is released by rg and was declared before key
        assert_eq!(order, vec!["rg", "vnet", "key", "subnet"]);
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("a", &[])).unwrap();
        assert!(matches!(
            graph.add(decl("a", &[])),
            Err(StackError::Declaration(_))
        ));
    }

    #[test]
    fn test_undeclared_dependency_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("ingress", &["svc"])).unwrap();
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("svc"));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("a", &["b"])).unwrap();
        graph.add(decl("b", &["a"])).unwrap();
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_dependents_of_is_transitive() {
        let mut graph = ResourceGraph::new();
        graph.add(decl("provider", &[])).unwrap();
        graph.add(decl("svc", &["provider"])).unwrap();
        graph.add(decl("ingress", &["svc"])).unwrap();
        graph.add(decl("dns", &["ingress"])).unwrap();
        let deps = graph.dependents_of("provider");
        assert_eq!(deps.len(), 3);
        assert!(deps.contains("dns"));
    }
}
