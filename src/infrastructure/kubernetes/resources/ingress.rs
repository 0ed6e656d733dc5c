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

use crate::infrastructure::constants::{
    APP_SERVICE_PORT, INGRESS_CLASS_ANNOTATION, INGRESS_CLASS_NGINX, INGRESS_PATH,
    INGRESS_PATH_TYPE_PREFIX,
};
use crate::shared::error::{Result, StackError};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Public host name of an application: `<app>.<domain>`.
pub fn hostname(app_name: &str, base_domain: &str) -> String {
    format!("{}.{}", app_name, base_domain)
}

pub fn ingress_name(app_name: &str) -> String {
    format!("hello-k8s-{}-ingress", app_name)
}

/// Routes every path of the application's host to its service.
pub struct IngressBuilder {
    app_name: String,
    namespace: String,
    host: String,
}

impl IngressBuilder {
    pub fn new(
        app_name: impl Into<String>,
        namespace: impl Into<String>,
        base_domain: &str,
    ) -> Self {
        let app_name = app_name.into();
        Self {
            host: hostname(&app_name, base_domain),
            app_name,
            namespace: namespace.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn build(&self) -> Result<Ingress> {
        if self.app_name.is_empty() {
            return Err(StackError::ValidationError(
                "Ingress requires an application name".to_string(),
            ));
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(
            INGRESS_CLASS_ANNOTATION.to_string(),
            INGRESS_CLASS_NGINX.to_string(),
        );

        let path = HTTPIngressPath {
            path: Some(INGRESS_PATH.to_string()),
            path_type: INGRESS_PATH_TYPE_PREFIX.to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: self.app_name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(APP_SERVICE_PORT),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            },
        };

        Ok(Ingress {
            metadata: ObjectMeta {
                name: Some(ingress_name(&self.app_name)),
                namespace: Some(self.namespace.clone()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(self.host.clone()),
                    http: Some(HTTPIngressRuleValue { paths: vec![path] }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

/// IP of the first load-balancer entry, once the controller has published
/// one. Empty strings count as not assigned.
pub fn load_balancer_ip(ingress: &Ingress) -> Option<String> {
    ingress
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()?
        .ip
        .clone()
        .filter(|ip| !ip.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{
        IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
    };

    fn with_status(ip: Option<&str>) -> Ingress {
        let mut ingress = IngressBuilder::new("api", "default", "car-care.xyz")
            .build()
            .unwrap();
        ingress.status = Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus {
                ingress: Some(vec![IngressLoadBalancerIngress {
                    ip: ip.map(str::to_string),
                    ..Default::default()
                }]),
            }),
        });
        ingress
    }

    #[test]
    fn test_ingress_routes_host_to_service() {
        let builder = IngressBuilder::new("api", "default", "car-care.xyz");
        assert_eq!(builder.host(), "api.car-care.xyz");

        let ingress = builder.build().unwrap();
        assert_eq!(
            ingress.metadata.name.as_deref(),
            Some("hello-k8s-api-ingress")
        );
        assert_eq!(
            ingress
                .metadata
                .annotations
                .as_ref()
                .unwrap()
                .get("kubernetes.io/ingress.class")
                .map(String::as_str),
            Some("nginx")
        );

        let rule = &ingress.spec.unwrap().rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("api.car-care.xyz"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "api");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(80));
    }

    #[test]
    fn test_load_balancer_ip() {
        assert_eq!(
            load_balancer_ip(&with_status(Some("20.1.2.3"))),
            Some("20.1.2.3".to_string())
        );
        assert_eq!(load_balancer_ip(&with_status(Some(""))), None);
        assert_eq!(load_balancer_ip(&with_status(None)), None);

        let pending = IngressBuilder::new("api", "default", "car-care.xyz")
            .build()
            .unwrap();
        assert_eq!(load_balancer_ip(&pending), None);
    }
}
