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

//! Azure Resource Manager ids and request bodies

use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_VERSION_RESOURCES: &str = "2021-04-01";
const API_VERSION_NETWORK: &str = "2023-05-01";
const API_VERSION_CONTAINER_SERVICE: &str = "2022-09-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmResourceType {
    ResourceGroup,
    VirtualNetwork,
    Subnet { virtual_network: String },
    ManagedCluster,
}

/// Deterministic ARM id. Names are fixed by the stacks, so ids are known
/// before anything is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub resource_type: ArmResourceType,
    pub name: String,
}

impl ArmResourceId {
    pub fn resource_group(subscription_id: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: name.to_string(),
            resource_type: ArmResourceType::ResourceGroup,
            name: name.to_string(),
        }
    }

    pub fn virtual_network(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            resource_type: ArmResourceType::VirtualNetwork,
            name: name.to_string(),
        }
    }

    pub fn subnet(
        subscription_id: &str,
        resource_group: &str,
        virtual_network: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            resource_type: ArmResourceType::Subnet {
                virtual_network: virtual_network.to_string(),
            },
            name: name.to_string(),
        }
    }

    pub fn managed_cluster(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            resource_type: ArmResourceType::ManagedCluster,
            name: name.to_string(),
        }
    }

    pub fn path(&self) -> String {
        let group = format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        );
        match &self.resource_type {
            ArmResourceType::ResourceGroup => group,
            ArmResourceType::VirtualNetwork => format!(
                "{}/providers/Microsoft.Network/virtualNetworks/{}",
                group, self.name
            ),
            ArmResourceType::Subnet { virtual_network } => format!(
                "{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
                group, virtual_network, self.name
            ),
            ArmResourceType::ManagedCluster => format!(
                "{}/providers/Microsoft.ContainerService/managedClusters/{}",
                group, self.name
            ),
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self.resource_type {
            ArmResourceType::ResourceGroup => API_VERSION_RESOURCES,
            ArmResourceType::VirtualNetwork | ArmResourceType::Subnet { .. } => API_VERSION_NETWORK,
            ArmResourceType::ManagedCluster => API_VERSION_CONTAINER_SERVICE,
        }
    }
}

impl std::fmt::Display for ArmResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Subset of an ARM resource read back from the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArmResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

impl ArmResource {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .get("provisioningState")
            .and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceGroupSpec {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualNetworkSpec {
    pub location: String,
    pub properties: VirtualNetworkProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    pub address_space: AddressSpace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    pub address_prefixes: Vec<String>,
}

impl VirtualNetworkSpec {
    pub fn new(location: &str, address_prefix: &str) -> Self {
        Self {
            location: location.to_string(),
            properties: VirtualNetworkProperties {
                address_space: AddressSpace {
                    address_prefixes: vec![address_prefix.to_string()],
                },
                subnets: None,
            },
        }
    }

    /// A PUT without `subnets` drops the existing ones, so carry them over
    /// from the live resource.
    pub fn preserving_subnets(mut self, existing: Option<&ArmResource>) -> Self {
        if let Some(subnets) = existing
            .and_then(|r| r.properties.get("subnets"))
            .and_then(|s| s.as_array())
        {
            self.properties.subnets = Some(subnets.clone());
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetSpec {
    pub properties: SubnetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    pub address_prefix: String,
}

impl SubnetSpec {
    pub fn new(address_prefix: &str) -> Self {
        Self {
            properties: SubnetProperties {
                address_prefix: address_prefix.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagedClusterSpec {
    pub location: String,
    pub identity: ClusterIdentity,
    pub properties: ManagedClusterProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterIdentity {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterProperties {
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
    pub dns_prefix: String,
    #[serde(rename = "enableRBAC")]
    pub enable_rbac: bool,
    pub kubernetes_version: String,
    pub linux_profile: LinuxProfile,
    pub node_resource_group: String,
    pub network_profile: NetworkProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    pub availability_zones: Vec<String>,
    pub count: i32,
    pub max_pods: i32,
    pub mode: String,
    pub name: String,
    pub node_labels: std::collections::BTreeMap<String, String>,
    #[serde(rename = "osDiskSizeGB")]
    pub os_disk_size_gb: i32,
    pub os_type: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub vm_size: String,
    #[serde(rename = "vnetSubnetID")]
    pub vnet_subnet_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinuxProfile {
    pub admin_username: String,
    pub ssh: SshConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshConfiguration {
    pub public_keys: Vec<SshPublicKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKey {
    pub key_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network_plugin: String,
    pub network_policy: String,
    pub service_cidr: String,
    #[serde(rename = "dnsServiceIP")]
    pub dns_service_ip: String,
    pub docker_bridge_cidr: String,
}
