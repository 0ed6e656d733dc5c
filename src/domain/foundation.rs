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

//! Foundation stack: resource group, network, node key, managed cluster
//! and the cluster-wide ingress controller.
//!
//! Publishes `rgName` and `aksClusterName` for application stacks.

use crate::domain::config::FoundationConfig;
use crate::domain::graph::{ResourceDeclaration, ResourceGraph, ResourceKind};
use crate::domain::output::Output;
use crate::domain::plan::{Plan, StepOp};
use crate::domain::stack::{ApplyContext, ApplyResult, Providers, StackIdentifier};
use crate::infrastructure::azure::models::{
    AgentPoolProfile, ClusterIdentity, LinuxProfile, ManagedClusterProperties, ManagedClusterSpec,
    NetworkProfile, ResourceGroupSpec, SshConfiguration, SshPublicKey, SubnetSpec,
    VirtualNetworkSpec,
};
use crate::infrastructure::azure::{decode_kubeconfig, ArmResourceId, AzureApi};
use crate::infrastructure::constants::*;
use crate::infrastructure::kubernetes::resources::IngressControllerBuilder;
use crate::infrastructure::kubernetes::{ClusterProvider, Manifest};
use crate::infrastructure::state::StackState;
use crate::shared::error::{Result, StackError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

const SECRET_PRIVATE_KEY: &str = "sshPrivateKeyPem";
const KEY_OUTPUT_PUBLIC: &str = "publicKeyOpenssh";

/// Logical and cloud names of everything the foundation stack declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundationNames {
    pub resource_group: String,
    pub virtual_network: String,
    pub subnet: String,
    pub ssh_key: String,
    pub cluster: String,
    pub node_resource_group: String,
    pub provider: String,
    pub ingress_controller: String,
}

impl FoundationNames {
    pub fn new(stack: &str) -> Self {
        let base = format!("{}-{}", RESOURCE_PREFIX, stack);
        Self {
            resource_group: base.clone(),
            virtual_network: VNET_NAME.to_string(),
            subnet: SUBNET_NAME.to_string(),
            ssh_key: format!("{}-key", base),
            cluster: format!("{}-cluster", base),
            node_resource_group: format!("{}-node-rg", base),
            provider: FOUNDATION_PROVIDER_NAME.to_string(),
            ingress_controller: INGRESS_CONTROLLER_NAME.to_string(),
        }
    }
}

pub struct FoundationStack {
    identifier: StackIdentifier,
    config: FoundationConfig,
    names: FoundationNames,
}

impl FoundationStack {
    pub fn new(identifier: StackIdentifier, config: FoundationConfig) -> Result<Self> {
        config.validate()?;
        let names = FoundationNames::new(&identifier.stack);
        Ok(Self {
            identifier,
            config,
            names,
        })
    }

    pub fn identifier(&self) -> &StackIdentifier {
        &self.identifier
    }

    pub fn names(&self) -> &FoundationNames {
        &self.names
    }

    pub fn config(&self) -> &FoundationConfig {
        &self.config
    }

    fn resource_group_inputs(&self) -> Result<Value> {
        Ok(json!({
            "name": self.names.resource_group,
            "location": self.config.location,
            "body": serde_json::to_value(ResourceGroupSpec {
                location: self.config.location.clone(),
            })?,
        }))
    }

    fn virtual_network_inputs(&self) -> Result<Value> {
        Ok(json!({
            "name": self.names.virtual_network,
            "resourceGroup": self.names.resource_group,
            "location": self.config.location,
            "body": serde_json::to_value(VirtualNetworkSpec::new(
                &self.config.location,
                VNET_ADDRESS_PREFIX,
            ))?,
        }))
    }

    fn subnet_inputs(&self) -> Result<Value> {
        Ok(json!({
            "name": self.names.subnet,
            "resourceGroup": self.names.resource_group,
            "virtualNetwork": self.names.virtual_network,
            "body": serde_json::to_value(SubnetSpec::new(SUBNET_ADDRESS_PREFIX))?,
        }))
    }

    fn ssh_key_inputs(&self) -> Value {
        json!({
            "algorithm": SSH_KEY_ALGORITHM,
            "rsaBits": SSH_KEY_RSA_BITS,
        })
    }

    pub fn cluster_spec(&self, subscription_id: &str, public_key: &str) -> ManagedClusterSpec {
        let subnet_id = ArmResourceId::subnet(
            subscription_id,
            &self.names.resource_group,
            &self.names.virtual_network,
            &self.names.subnet,
        );

        ManagedClusterSpec {
            location: self.config.location.clone(),
            identity: ClusterIdentity {
                type_: CLUSTER_IDENTITY_TYPE.to_string(),
            },
            properties: ManagedClusterProperties {
                agent_pool_profiles: vec![AgentPoolProfile {
                    availability_zones: Vec::new(),
                    count: self.config.node_count,
                    max_pods: self.config.max_pods,
                    mode: self.config.mode.clone(),
                    name: self.config.pool_name.clone(),
                    node_labels: BTreeMap::new(),
                    os_disk_size_gb: self.config.os_disk_size_gb,
                    os_type: NODE_OS_TYPE.to_string(),
                    type_: AGENT_POOL_TYPE.to_string(),
                    vm_size: self.config.node_vm_size.clone(),
                    vnet_subnet_id: subnet_id.path(),
                }],
                dns_prefix: self.names.resource_group.clone(),
                enable_rbac: true,
                kubernetes_version: self.config.kubernetes_version.clone(),
                linux_profile: LinuxProfile {
                    admin_username: self.config.admin_username.clone(),
                    ssh: SshConfiguration {
                        public_keys: vec![SshPublicKey {
                            key_data: public_key.to_string(),
                        }],
                    },
                },
                node_resource_group: self.names.node_resource_group.clone(),
                network_profile: NetworkProfile {
                    network_plugin: NETWORK_PLUGIN.to_string(),
                    network_policy: NETWORK_POLICY.to_string(),
                    service_cidr: SERVICE_CIDR.to_string(),
                    dns_service_ip: DNS_SERVICE_IP.to_string(),
                    docker_bridge_cidr: DOCKER_BRIDGE_CIDR.to_string(),
                },
            },
        }
    }

    fn cluster_inputs(&self, subscription_id: &str, public_key: &Output<String>) -> Result<Value> {
        let mut body = serde_json::to_value(self.cluster_spec(subscription_id, ""))?;
        body["properties"]["linuxProfile"]["ssh"]["publicKeys"][0]["keyData"] = public_key.to_input();
        Ok(json!({
            "name": self.names.cluster,
            "resourceGroup": self.names.resource_group,
            "location": self.config.location,
            "body": body,
        }))
    }

    fn provider_inputs(&self, subscription_id: &str) -> Value {
        let cluster = ArmResourceId::managed_cluster(
            subscription_id,
            &self.names.resource_group,
            &self.names.cluster,
        );
        json!({ "cluster": cluster.path() })
    }

    fn ingress_controller_inputs(&self, builder: &IngressControllerBuilder) -> Result<Value> {
        let manifests = builder
            .build()?
            .iter()
            .map(Manifest::to_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({
            "namespace": builder.namespace(),
            "manifests": manifests,
        }))
    }

    /// Public key the cluster is declared with: configured, recorded by an
    /// earlier apply, or not known until the key is generated.
    fn public_key(&self, prior: Option<&StackState>) -> Output<String> {
        if let Some(key) = &self.config.public_key {
            return Output::known(key.clone());
        }
        Output::from_option(
            prior
                .and_then(|p| p.resource_output(&self.names.ssh_key, KEY_OUTPUT_PUBLIC))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        )
        .with_dependency(self.names.ssh_key.clone())
    }

    /// Builds the resource graph. Names are deterministic, so every ARM id
    /// is known before anything exists.
    pub fn declare(&self, subscription_id: &str, prior: Option<&StackState>) -> Result<ResourceGraph> {
        let n = &self.names;
        let mut graph = ResourceGraph::new();

        graph.add(ResourceDeclaration::new(
            &n.resource_group,
            ResourceKind::ResourceGroup,
            self.resource_group_inputs()?,
        ))?;
        graph.add(
            ResourceDeclaration::new(
                &n.virtual_network,
                ResourceKind::VirtualNetwork,
                self.virtual_network_inputs()?,
            )
            .depends_on(&n.resource_group),
        )?;
        graph.add(ResourceDeclaration::new(
            &n.ssh_key,
            ResourceKind::SshKey,
            self.ssh_key_inputs(),
        ))?;
        graph.add(
            ResourceDeclaration::new(&n.subnet, ResourceKind::Subnet, self.subnet_inputs()?)
                .depends_on(&n.virtual_network),
        )?;
        graph.add(
            ResourceDeclaration::new(
                &n.cluster,
                ResourceKind::ManagedCluster,
                self.cluster_inputs(subscription_id, &self.public_key(prior))?,
            )
            .depends_on(&n.subnet)
            .depends_on(&n.ssh_key)
            .depends_on(&n.resource_group),
        )?;
        graph.add(
            ResourceDeclaration::new(
                &n.provider,
                ResourceKind::ClusterProvider,
                self.provider_inputs(subscription_id),
            )
            .depends_on(&n.cluster),
        )?;
        graph.add(
            ResourceDeclaration::new(
                &n.ingress_controller,
                ResourceKind::IngressController,
                self.ingress_controller_inputs(&IngressControllerBuilder::default())?,
            )
            .depends_on(&n.provider),
        )?;

        graph.validate()?;
        Ok(graph)
    }

    pub async fn preview(&self, providers: &Providers) -> Result<Plan> {
        let subscription_id = providers.azure.subscription_id()?;
        let prior = providers.state.load(&self.identifier).await?;
        let graph = self.declare(&subscription_id, prior.as_ref())?;
        Plan::compute(&self.identifier, &graph, prior.as_ref())
    }

    pub async fn up(&self, providers: &Providers) -> Result<ApplyResult> {
        let subscription_id = providers.azure.subscription_id()?;
        let _lock = providers.state.lock(&self.identifier).await?;
        let prior = providers.state.load(&self.identifier).await?;
        let graph = self.declare(&subscription_id, prior.as_ref())?;
        let azure = providers.azure.as_ref();
        let n = &self.names;

        info!(stack = %self.identifier, resources = graph.len(), "applying foundation stack");
        let mut ctx = ApplyContext::new(
            self.identifier.clone(),
            &graph,
            providers.state.as_ref(),
            prior,
        );

        let rg_id = ArmResourceId::resource_group(&subscription_id, &n.resource_group);
        let rg_inputs = self.resource_group_inputs()?;
        let rg_body = rg_inputs["body"].clone();
        apply_arm(&mut ctx, azure, &n.resource_group, &rg_id, rg_inputs, rg_body).await?;

        let vnet_id =
            ArmResourceId::virtual_network(&subscription_id, &n.resource_group, &n.virtual_network);
        let existing = azure.get_resource(&vnet_id).await?;
        let vnet_body = serde_json::to_value(
            VirtualNetworkSpec::new(&self.config.location, VNET_ADDRESS_PREFIX)
                .preserving_subnets(existing.as_ref()),
        )?;
        apply_arm(
            &mut ctx,
            azure,
            &n.virtual_network,
            &vnet_id,
            self.virtual_network_inputs()?,
            vnet_body,
        )
        .await?;

        let public_key = match &self.config.public_key {
            Some(key) => {
                self.apply_ssh_key(&mut ctx, providers).await?;
                key.clone()
            }
            None => self.apply_ssh_key(&mut ctx, providers).await?,
        };

        let subnet_id = ArmResourceId::subnet(
            &subscription_id,
            &n.resource_group,
            &n.virtual_network,
            &n.subnet,
        );
        let subnet_inputs = self.subnet_inputs()?;
        let subnet_body = subnet_inputs["body"].clone();
        apply_arm(&mut ctx, azure, &n.subnet, &subnet_id, subnet_inputs, subnet_body).await?;

        let cluster_id =
            ArmResourceId::managed_cluster(&subscription_id, &n.resource_group, &n.cluster);
        let cluster_inputs =
            self.cluster_inputs(&subscription_id, &Output::known(public_key.clone()))?;
        let cluster_body = serde_json::to_value(self.cluster_spec(&subscription_id, &public_key))?;
        apply_arm(&mut ctx, azure, &n.cluster, &cluster_id, cluster_inputs, cluster_body).await?;

        let provider = self.apply_provider(&mut ctx, providers, &subscription_id).await?;
        self.apply_ingress_controller(&mut ctx, &provider).await?;

        ctx.set_output(OUTPUT_CLUSTER_NAME, json!(n.cluster));
        ctx.set_output(OUTPUT_RG_NAME, json!(n.resource_group));
        ctx.finish().await
    }

    /// Generates the node key once; later applies reuse the recorded pair.
    async fn apply_ssh_key(&self, ctx: &mut ApplyContext<'_>, providers: &Providers) -> Result<String> {
        let name = &self.names.ssh_key;
        ctx.begin(name)?;
        let inputs = self.ssh_key_inputs();

        if ctx.is_unchanged(name, &inputs) && ctx.secret(SECRET_PRIVATE_KEY).is_some() {
            let outputs = ctx.reuse(name)?;
            return outputs
                .get(KEY_OUTPUT_PUBLIC)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| StackError::unresolved(name, KEY_OUTPUT_PUBLIC));
        }

        let op = match ctx.operation_for(name, &inputs) {
            // recorded but the private key was lost
            StepOp::Same => StepOp::Replace,
            op => op,
        };
        let pair = providers.keys.generate(SSH_KEY_RSA_BITS).await?;
        ctx.set_secret(SECRET_PRIVATE_KEY, pair.private_key_pem);
        ctx.complete(
            name,
            op,
            inputs,
            json!({ KEY_OUTPUT_PUBLIC: pair.public_key_openssh.clone() }),
        )
        .await?;
        Ok(pair.public_key_openssh)
    }

    /// Fetches live cluster credentials and builds the provider handle the
    /// ingress controller is installed through.
    async fn apply_provider(
        &self,
        ctx: &mut ApplyContext<'_>,
        providers: &Providers,
        subscription_id: &str,
    ) -> Result<ClusterProvider> {
        let name = &self.names.provider;
        ctx.begin(name)?;

        let entries = providers
            .azure
            .list_cluster_user_credentials(&self.names.resource_group, &self.names.cluster)
            .await?;
        let kubeconfig = Output::known(entries)
            .with_dependency(self.names.cluster.clone())
            .try_apply(|entries| decode_kubeconfig(&entries))?;
        let provider = providers
            .clusters
            .connect(name, kubeconfig.require(name, "kubeconfig")?)
            .await?;

        let inputs = self.provider_inputs(subscription_id);
        let op = ctx.operation_for(name, &inputs);
        ctx.complete(name, op, inputs, json!({})).await?;
        Ok(provider)
    }

    async fn apply_ingress_controller(
        &self,
        ctx: &mut ApplyContext<'_>,
        provider: &ClusterProvider,
    ) -> Result<()> {
        let name = &self.names.ingress_controller;
        ctx.begin(name)?;
        let builder = IngressControllerBuilder::default();
        let inputs = self.ingress_controller_inputs(&builder)?;
        let op = ctx.operation_for(name, &inputs);

        // server-side apply is idempotent, so the manifests are always sent
        provider.apply_all(&builder.build()?).await?;
        ctx.complete(
            name,
            op,
            inputs,
            json!({
                "namespace": builder.namespace(),
                "service": NGINX_CONTROLLER_NAME,
            }),
        )
        .await
    }

    /// Deletes recorded cloud resources in reverse dependency order and
    /// removes the stack's state.
    pub async fn destroy(&self, providers: &Providers) -> Result<()> {
        let _lock = providers.state.lock(&self.identifier).await?;
        let Some(mut state) = providers.state.load(&self.identifier).await? else {
            println!("ℹ️  Stack {} has no recorded resources", self.identifier);
            return Ok(());
        };
        let subscription_id = providers.azure.subscription_id()?;

        let recorded = state.recorded_graph()?;
        for decl in recorded.reverse_order()? {
            if decl.kind.in_cluster() || decl.kind == ResourceKind::ClusterProvider {
                // removed together with the cluster
            } else if let Some(id) = arm_id_from_inputs(&subscription_id, decl.kind, &decl.inputs) {
                providers.azure.delete_resource(&id).await?;
            }
            println!("  {} {} ({})", StepOp::Delete.symbol(), decl.name, decl.kind);
            state.resources.remove(&decl.name);
            providers.state.save(&self.identifier, &state).await?;
        }

        providers.state.delete(&self.identifier).await
    }
}

/// Create, update or replace one ARM resource unless its inputs are
/// unchanged since the last apply.
async fn apply_arm(
    ctx: &mut ApplyContext<'_>,
    azure: &dyn AzureApi,
    name: &str,
    id: &ArmResourceId,
    inputs: Value,
    body: Value,
) -> Result<Value> {
    let decl = ctx.begin(name)?;
    let op = ctx.operation_for(name, &inputs);
    if op == StepOp::Same {
        return ctx.reuse(name);
    }

    if op == StepOp::Replace {
        let old = ctx
            .prior_record(name)
            .and_then(|r| arm_id_from_inputs(&id.subscription_id, decl.kind, &r.inputs));
        if let Some(old) = old {
            warn!(resource = name, old = %old, "replacing resource");
            azure.delete_resource(&old).await?;
        }
    }

    let resource = azure.put_resource(id, &body).await?;
    let outputs = json!({
        "id": resource.id.clone().unwrap_or_else(|| id.path()),
        "provisioningState": resource.provisioning_state(),
    });
    ctx.complete(name, op, inputs, outputs.clone()).await?;
    Ok(outputs)
}

/// ARM id of a recorded resource, rebuilt from its recorded inputs.
fn arm_id_from_inputs(subscription_id: &str, kind: ResourceKind, inputs: &Value) -> Option<ArmResourceId> {
    let field = |key: &str| inputs.get(key).and_then(|v| v.as_str());
    match kind {
        ResourceKind::ResourceGroup => Some(ArmResourceId::resource_group(subscription_id, field("name")?)),
        ResourceKind::VirtualNetwork => Some(ArmResourceId::virtual_network(
            subscription_id,
            field("resourceGroup")?,
            field("name")?,
        )),
        ResourceKind::Subnet => Some(ArmResourceId::subnet(
            subscription_id,
            field("resourceGroup")?,
            field("virtualNetwork")?,
            field("name")?,
        )),
        ResourceKind::ManagedCluster => Some(ArmResourceId::managed_cluster(
            subscription_id,
            field("resourceGroup")?,
            field("name")?,
        )),
        _ => None,
    }
}
