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

//! ingress-nginx controller manifests.
//!
//! The controller publishes its own LoadBalancer service
//! (`--publish-service`), which is what fills in the load-balancer address
//! on every Ingress it serves.

use crate::infrastructure::kubernetes::manifest::Manifest;
use crate::infrastructure::constants::{
    INGRESS_CLASS_NGINX, NGINX_CONTROLLER_CLASS, NGINX_CONTROLLER_IMAGE, NGINX_CONTROLLER_NAME,
    NGINX_ELECTION_ID, NGINX_NAME, NGINX_NAMESPACE, NGINX_RUN_AS_USER, SERVICE_TYPE_LOAD_BALANCER,
};
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, Namespace,
    ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe, SecurityContext, Service,
    ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{IngressClass, IngressClassSpec};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

const HEALTH_PORT: i32 = 10254;

pub struct IngressControllerBuilder {
    namespace: String,
    image: String,
}

impl Default for IngressControllerBuilder {
    fn default() -> Self {
        Self::new(NGINX_NAMESPACE)
    }
}

impl IngressControllerBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            image: NGINX_CONTROLLER_IMAGE.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Manifests in apply order. Deletion should walk them backwards.
    pub fn build(&self) -> Result<Vec<Manifest>> {
        Ok(vec![
            Manifest::Namespace(self.build_namespace()),
            Manifest::ServiceAccount(self.build_service_account()),
            Manifest::ClusterRole(self.build_cluster_role()),
            Manifest::ClusterRoleBinding(self.build_cluster_role_binding()),
            Manifest::IngressClass(self.build_ingress_class()),
            Manifest::Deployment(self.build_deployment()),
            Manifest::Service(self.build_service()),
        ])
    }

    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(
            "app.kubernetes.io/name".to_string(),
            NGINX_NAME.to_string(),
        );
        labels.insert(
            "app.kubernetes.io/component".to_string(),
            "controller".to_string(),
        );
        labels
    }

    fn metadata(&self, name: &str, namespaced: bool) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespaced.then(|| self.namespace.clone()),
            labels: Some(self.labels()),
            ..Default::default()
        }
    }

    fn build_namespace(&self) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn build_service_account(&self) -> ServiceAccount {
        ServiceAccount {
            metadata: self.metadata(NGINX_NAME, true),
            ..Default::default()
        }
    }

    fn build_cluster_role(&self) -> ClusterRole {
        let rule = |groups: &[&str], resources: &[&str], verbs: &[&str]| PolicyRule {
            api_groups: Some(groups.iter().map(|s| s.to_string()).collect()),
            resources: Some(resources.iter().map(|s| s.to_string()).collect()),
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        ClusterRole {
            metadata: self.metadata(NGINX_NAME, false),
            rules: Some(vec![
                rule(
                    &[""],
                    &["configmaps", "endpoints", "nodes", "pods", "secrets", "namespaces"],
                    &["get", "list", "watch"],
                ),
                rule(&[""], &["services"], &["get", "list", "watch"]),
                rule(&[""], &["events"], &["create", "patch"]),
                rule(&["networking.k8s.io"], &["ingresses", "ingressclasses"], &["get", "list", "watch"]),
                rule(&["networking.k8s.io"], &["ingresses/status"], &["update"]),
                rule(&["discovery.k8s.io"], &["endpointslices"], &["get", "list", "watch"]),
                rule(&["coordination.k8s.io"], &["leases"], &["get", "create", "update"]),
            ]),
            ..Default::default()
        }
    }

    fn build_cluster_role_binding(&self) -> ClusterRoleBinding {
        ClusterRoleBinding {
            metadata: self.metadata(NGINX_NAME, false),
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: NGINX_NAME.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: NGINX_NAME.to_string(),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            }]),
        }
    }

    fn build_ingress_class(&self) -> IngressClass {
        IngressClass {
            metadata: self.metadata(INGRESS_CLASS_NGINX, false),
            spec: Some(IngressClassSpec {
                controller: Some(NGINX_CONTROLLER_CLASS.to_string()),
                ..Default::default()
            }),
        }
    }

    fn build_deployment(&self) -> Deployment {
        let field_env = |name: &str, path: &str| EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: path.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let args = vec![
            "/nginx-ingress-controller".to_string(),
            format!("--publish-service=$(POD_NAMESPACE)/{}", NGINX_CONTROLLER_NAME),
            format!("--election-id={}", NGINX_ELECTION_ID),
            format!("--controller-class={}", NGINX_CONTROLLER_CLASS),
            format!("--ingress-class={}", INGRESS_CLASS_NGINX),
            "--watch-ingress-without-class=true".to_string(),
        ];

        let container = Container {
            name: "controller".to_string(),
            image: Some(self.image.clone()),
            args: Some(args),
            env: Some(vec![
                field_env("POD_NAME", "metadata.name"),
                field_env("POD_NAMESPACE", "metadata.namespace"),
            ]),
            ports: Some(vec![
                named_port("http", 80),
                named_port("https", 443),
                named_port("metrics", HEALTH_PORT),
            ]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    path: Some("/healthz".to_string()),
                    port: IntOrString::Int(HEALTH_PORT),
                    scheme: Some("HTTP".to_string()),
                    ..Default::default()
                }),
                initial_delay_seconds: Some(10),
                period_seconds: Some(10),
                ..Default::default()
            }),
            security_context: Some(SecurityContext {
                run_as_user: Some(NGINX_RUN_AS_USER),
                allow_privilege_escalation: Some(true),
                capabilities: Some(Capabilities {
                    add: Some(vec!["NET_BIND_SERVICE".to_string()]),
                    drop: Some(vec!["ALL".to_string()]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        Deployment {
            metadata: self.metadata(NGINX_CONTROLLER_NAME, true),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(self.labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(NGINX_NAME.to_string()),
                        containers: vec![container],
                        node_selector: Some(BTreeMap::from([(
                            "kubernetes.io/os".to_string(),
                            "linux".to_string(),
                        )])),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_service(&self) -> Service {
        let port = |name: &str, number: i32| ServicePort {
            name: Some(name.to_string()),
            port: number,
            target_port: Some(IntOrString::String(name.to_string())),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        };

        Service {
            metadata: self.metadata(NGINX_CONTROLLER_NAME, true),
            spec: Some(ServiceSpec {
                type_: Some(SERVICE_TYPE_LOAD_BALANCER.to_string()),
                external_traffic_policy: Some("Local".to_string()),
                ports: Some(vec![port("http", 80), port("https", 443)]),
                selector: Some(self.labels()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn named_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_publishes_load_balancer_service() {
        let manifests = IngressControllerBuilder::default().build().unwrap();
        assert_eq!(manifests.len(), 7);
        assert_eq!(manifests[0].kind(), "Namespace");

        let service = manifests
            .iter()
            .find_map(|m| match m {
                Manifest::Service(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            service.spec.as_ref().unwrap().type_.as_deref(),
            Some("LoadBalancer")
        );

        let deployment = manifests
            .iter()
            .find_map(|m| match m {
                Manifest::Deployment(d) => Some(d),
                _ => None,
            })
            .unwrap();
        let args = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .args
            .clone()
            .unwrap();
        assert!(args
            .iter()
            .any(|a| a == "--publish-service=$(POD_NAMESPACE)/ingress-nginx-controller"));
    }

    #[test]
    fn test_ingress_class_is_nginx() {
        let manifests = IngressControllerBuilder::default().build().unwrap();
        let class = manifests
            .iter()
            .find_map(|m| match m {
                Manifest::IngressClass(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(class.metadata.name.as_deref(), Some("nginx"));
        assert_eq!(
            class.spec.as_ref().unwrap().controller.as_deref(),
            Some("k8s.io/ingress-nginx")
        );
    }
}
