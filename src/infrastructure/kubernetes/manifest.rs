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
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

/// Every object kind the stacks apply to a cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    IngressClass(IngressClass),
    Service(Service),
    Deployment(Deployment),
    Ingress(Ingress),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Namespace(_) => "Namespace",
            Manifest::ServiceAccount(_) => "ServiceAccount",
            Manifest::ClusterRole(_) => "ClusterRole",
            Manifest::ClusterRoleBinding(_) => "ClusterRoleBinding",
            Manifest::IngressClass(_) => "IngressClass",
            Manifest::Service(_) => "Service",
            Manifest::Deployment(_) => "Deployment",
            Manifest::Ingress(_) => "Ingress",
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Namespace(r) => &r.metadata,
            Manifest::ServiceAccount(r) => &r.metadata,
            Manifest::ClusterRole(r) => &r.metadata,
            Manifest::ClusterRoleBinding(r) => &r.metadata,
            Manifest::IngressClass(r) => &r.metadata,
            Manifest::Service(r) => &r.metadata,
            Manifest::Deployment(r) => &r.metadata,
            Manifest::Ingress(r) => &r.metadata,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata().name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// `Kind/namespace/name`, used in log lines and error messages.
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", self.kind(), ns, self.name().unwrap_or("")),
            None => format!("{}/{}", self.kind(), self.name().unwrap_or("")),
        }
    }

    /// Full object as JSON, including `apiVersion` and `kind`.
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Manifest::Namespace(r) => serde_json::to_value(r)?,
            Manifest::ServiceAccount(r) => serde_json::to_value(r)?,
            Manifest::ClusterRole(r) => serde_json::to_value(r)?,
            Manifest::ClusterRoleBinding(r) => serde_json::to_value(r)?,
            Manifest::IngressClass(r) => serde_json::to_value(r)?,
            Manifest::Service(r) => serde_json::to_value(r)?,
            Manifest::Deployment(r) => serde_json::to_value(r)?,
            Manifest::Ingress(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_value()?)?)
    }

    /// Rebuilds a manifest from its recorded JSON form, dispatching on `kind`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        let value = value.clone();
        let manifest = match kind {
            "Namespace" => Manifest::Namespace(serde_json::from_value(value)?),
            "ServiceAccount" => Manifest::ServiceAccount(serde_json::from_value(value)?),
            "ClusterRole" => Manifest::ClusterRole(serde_json::from_value(value)?),
            "ClusterRoleBinding" => Manifest::ClusterRoleBinding(serde_json::from_value(value)?),
            "IngressClass" => Manifest::IngressClass(serde_json::from_value(value)?),
            "Service" => Manifest::Service(serde_json::from_value(value)?),
            "Deployment" => Manifest::Deployment(serde_json::from_value(value)?),
            "Ingress" => Manifest::Ingress(serde_json::from_value(value)?),
            other => {
                return Err(StackError::declaration(format!(
                    "unsupported manifest kind '{}'",
                    other
                )))
            }
        };
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kubernetes::resources::ServiceBuilder;

    #[test]
    fn test_manifest_value_carries_type_meta() {
        let manifest = Manifest::Service(ServiceBuilder::new("api", "default").build().unwrap());
        let value = manifest.to_value().unwrap();
        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Service");
        assert_eq!(value["metadata"]["name"], "api");
        assert_eq!(manifest.display_name(), "Service/default/api");
        assert!(manifest.to_yaml().unwrap().contains("ClusterIP"));
    }

    #[test]
    fn test_manifest_from_recorded_value() {
        let manifest = Manifest::Service(ServiceBuilder::new("api", "default").build().unwrap());
        let restored = Manifest::from_value(&manifest.to_value().unwrap()).unwrap();
        assert_eq!(restored.display_name(), "Service/default/api");

        let err = Manifest::from_value(&serde_json::json!({"kind": "Secret"})).unwrap_err();
        assert!(err.is_declaration_error());
    }
}
