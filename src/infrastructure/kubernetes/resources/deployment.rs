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
    APP_CONTAINER_PORT, APP_IMAGE, APP_MESSAGE_ENV, APP_MESSAGE_VALUE, APP_REPLICAS,
};
use crate::shared::error::{Result, StackError};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

pub struct DeploymentBuilder {
    app_name: String,
    namespace: String,
    image: String,
    replicas: i32,
    message: String,
}

impl DeploymentBuilder {
    pub fn new(app_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            namespace: namespace.into(),
            image: APP_IMAGE.to_string(),
            replicas: APP_REPLICAS,
            message: APP_MESSAGE_VALUE.to_string(),
        }
    }

    pub fn build(&self) -> Result<Deployment> {
        if self.app_name.is_empty() {
            return Err(StackError::ValidationError(
                "Deployment name is required".to_string(),
            ));
        }

        let container = Container {
            name: self.app_name.clone(),
            image: Some(self.image.clone()),
            ports: Some(vec![ContainerPort {
                container_port: APP_CONTAINER_PORT,
                ..Default::default()
            }]),
            env: Some(vec![EnvVar {
                name: APP_MESSAGE_ENV.to_string(),
                value: Some(self.message.clone()),
                ..Default::default()
            }]),
            ..Default::default()
        };

        Ok(Deployment {
            metadata: ObjectMeta {
                name: Some(self.app_name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.replicas),
                selector: LabelSelector {
                    match_labels: Some(self.get_selector_labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.get_labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

impl LabeledResourceBuilder for DeploymentBuilder {
    fn app_name(&self) -> &str {
        &self.app_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_shape() {
        let dep = DeploymentBuilder::new("api", "default").build().unwrap();
        let spec = dep.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(
            spec.selector.match_labels.unwrap().get("app").map(String::as_str),
            Some("api")
        );

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers.len(), 1);
        let container = &pod.containers[0];
        assert_eq!(container.name, "api");
        assert_eq!(
            container.image.as_deref(),
            Some("paulbouwer/hello-kubernetes:1.8")
        );
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 8080);
        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "MESSAGE");
        assert_eq!(env[0].value.as_deref(), Some("Hello K8s!"));
    }
}
