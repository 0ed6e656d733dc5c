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

use super::traits::LabeledResourceBuilder;
use crate::infrastructure::constants::{
    APP_CONTAINER_PORT, APP_SERVICE_PORT, SERVICE_TYPE_CLUSTER_IP,
};
use crate::shared::error::{Result, StackError};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// ClusterIP service in front of the application pods.
pub struct ServiceBuilder {
    app_name: String,
    namespace: String,
    port: i32,
    target_port: i32,
}

impl ServiceBuilder {
    pub fn new(app_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            namespace: namespace.into(),
            port: APP_SERVICE_PORT,
            target_port: APP_CONTAINER_PORT,
        }
    }

    pub fn build(&self) -> Result<Service> {
        if self.app_name.is_empty() {
            return Err(StackError::ValidationError(
                "Service name is required".to_string(),
            ));
        }

        Ok(Service {
            metadata: ObjectMeta {
                name: Some(self.app_name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(SERVICE_TYPE_CLUSTER_IP.to_string()),
                ports: Some(vec![ServicePort {
                    port: self.port,
                    target_port: Some(IntOrString::Int(self.target_port)),
                    ..Default::default()
                }]),
                selector: Some(self.get_selector_labels()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

impl LabeledResourceBuilder for ServiceBuilder {
    fn app_name(&self) -> &str {
        &self.app_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_shape() {
        let svc = ServiceBuilder::new("api", "default").build().unwrap();
        assert_eq!(svc.metadata.name.as_deref(), Some("api"));

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 80);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(spec.selector.unwrap().get("app").map(String::as_str), Some("api"));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ServiceBuilder::new("", "default").build().is_err());
    }
}
