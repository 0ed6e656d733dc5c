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

use super::manifest::Manifest;
use crate::infrastructure::constants::{DEFAULT_APP_NAMESPACE, FIELD_MANAGER};
use crate::shared::error::{Result, StackError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Server-side apply; creates the object or takes ownership of the
    /// fields it declares.
    async fn apply(&self, manifest: &Manifest) -> Result<()>;

    /// Deletes the object. Already gone is not an error.
    async fn delete(&self, manifest: &Manifest) -> Result<()>;

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;
}

pub struct ClusterClientImpl {
    client: Client,
}

impl ClusterClientImpl {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn get_client(&self) -> Client {
        self.client.clone()
    }

    fn namespaced<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(
            self.client.clone(),
            namespace.unwrap_or(DEFAULT_APP_NAMESPACE),
        )
    }

    fn cluster<K>(&self) -> Api<K>
    where
        K: Resource,
        <K as Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }
}

fn required_name<K: Resource>(resource: &K, kind: &str) -> Result<String> {
    resource
        .meta()
        .name
        .clone()
        .ok_or_else(|| StackError::ValidationError(format!("{} name is required", kind)))
}

async fn apply_resource<K>(api: Api<K>, resource: &K, kind: &str) -> Result<()>
where
    K: Resource + Serialize + DeserializeOwned + Clone + Debug,
{
    let name = required_name(resource, kind)?;
    let patch_params = PatchParams::apply(FIELD_MANAGER).force();
    api.patch(&name, &patch_params, &Patch::Apply(resource))
        .await
        .map_err(|e| StackError::Kube(format!("Failed to apply {} '{}': {}", kind, name, e)))?;
    debug!(kind, name = %name, "applied");
    Ok(())
}

async fn delete_resource<K>(api: Api<K>, resource: &K, kind: &str) -> Result<()>
where
    K: Resource + DeserializeOwned + Clone + Debug,
{
    let name = required_name(resource, kind)?;
    match api.delete(&name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(StackError::Kube(format!(
            "Failed to delete {} '{}': {}",
            kind, name, e
        ))),
    }
}

#[async_trait::async_trait]
impl ClusterClient for ClusterClientImpl {
    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        let kind = manifest.kind();
        let ns = manifest.namespace();
        match manifest {
            Manifest::Namespace(r) => apply_resource(self.cluster::<Namespace>(), r, kind).await,
            Manifest::ServiceAccount(r) => {
                apply_resource(self.namespaced::<ServiceAccount>(ns), r, kind).await
            }
            Manifest::ClusterRole(r) => apply_resource(self.cluster::<ClusterRole>(), r, kind).await,
            Manifest::ClusterRoleBinding(r) => {
                apply_resource(self.cluster::<ClusterRoleBinding>(), r, kind).await
            }
            Manifest::IngressClass(r) => {
                apply_resource(self.cluster::<IngressClass>(), r, kind).await
            }
            Manifest::Service(r) => apply_resource(self.namespaced::<Service>(ns), r, kind).await,
            Manifest::Deployment(r) => {
                apply_resource(self.namespaced::<Deployment>(ns), r, kind).await
            }
            Manifest::Ingress(r) => apply_resource(self.namespaced::<Ingress>(ns), r, kind).await,
        }
    }

    async fn delete(&self, manifest: &Manifest) -> Result<()> {
        let kind = manifest.kind();
        let ns = manifest.namespace();
        match manifest {
            Manifest::Namespace(r) => delete_resource(self.cluster::<Namespace>(), r, kind).await,
            Manifest::ServiceAccount(r) => {
                delete_resource(self.namespaced::<ServiceAccount>(ns), r, kind).await
            }
            Manifest::ClusterRole(r) => {
                delete_resource(self.cluster::<ClusterRole>(), r, kind).await
            }
            Manifest::ClusterRoleBinding(r) => {
                delete_resource(self.cluster::<ClusterRoleBinding>(), r, kind).await
            }
            Manifest::IngressClass(r) => {
                delete_resource(self.cluster::<IngressClass>(), r, kind).await
            }
            Manifest::Service(r) => delete_resource(self.namespaced::<Service>(ns), r, kind).await,
            Manifest::Deployment(r) => {
                delete_resource(self.namespaced::<Deployment>(ns), r, kind).await
            }
            Manifest::Ingress(r) => delete_resource(self.namespaced::<Ingress>(ns), r, kind).await,
        }
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(ingress) => Ok(Some(ingress)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(StackError::Kube(e.to_string())),
        }
    }
}
