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

/// Stack projects
pub const FOUNDATION_PROJECT: &str = "cluster-general";
pub const APPLICATION_PROJECT: &str = "aks-ingress";
pub const DEFAULT_ORGANIZATION: &str = "wijayasena";
pub const DEFAULT_FOUNDATION_STACK: &str = "wijayasena/cluster-general/dev";

/// Output names published by the foundation stack
pub const OUTPUT_RG_NAME: &str = "rgName";
pub const OUTPUT_CLUSTER_NAME: &str = "aksClusterName";

/// Output names published by the application stack
pub const OUTPUT_APP_INGRESS: &str = "appIngress";
pub const OUTPUT_HOSTNAME: &str = "hostname";
pub const OUTPUT_LOAD_BALANCER_IP: &str = "loadBalancerIp";

/// Naming prefix shared by the foundation resources
pub const RESOURCE_PREFIX: &str = "ccc";

/// Network layout
pub const VNET_NAME: &str = "ccc-vnet";
pub const VNET_ADDRESS_PREFIX: &str = "10.0.0.0/8";
pub const SUBNET_NAME: &str = "cluster-subnet";
pub const SUBNET_ADDRESS_PREFIX: &str = "10.245.0.0/16";
pub const NETWORK_PLUGIN: &str = "azure";
pub const NETWORK_POLICY: &str = "calico";
pub const SERVICE_CIDR: &str = "10.2.0.0/16";
pub const DNS_SERVICE_IP: &str = "10.2.0.10";
pub const DOCKER_BRIDGE_CIDR: &str = "172.17.0.1/16";

/// Managed cluster defaults
pub const DEFAULT_NODE_COUNT: i32 = 1;
pub const DEFAULT_MAX_PODS: i32 = 110;
pub const DEFAULT_POOL_MODE: &str = "System";
pub const DEFAULT_POOL_NAME: &str = "nodepool";
pub const DEFAULT_OS_DISK_SIZE_GB: i32 = 30;
pub const DEFAULT_NODE_VM_SIZE: &str = "Standard_D2s_v3";
pub const DEFAULT_KUBERNETES_VERSION: &str = "1.21.7";
pub const DEFAULT_LOCATION: &str = "eastus";
pub const NODE_OS_TYPE: &str = "Linux";
pub const AGENT_POOL_TYPE: &str = "VirtualMachineScaleSets";
pub const CLUSTER_IDENTITY_TYPE: &str = "SystemAssigned";

/// Node access key
pub const SSH_KEY_ALGORITHM: &str = "RSA";
pub const SSH_KEY_RSA_BITS: u32 = 4096;

/// Provider handle names
pub const FOUNDATION_PROVIDER_NAME: &str = "k8s-provider";
pub const INGRESS_CONTROLLER_NAME: &str = "ingress-ctrl";

/// Workload shape
pub const APP_IMAGE: &str = "paulbouwer/hello-kubernetes:1.8";
pub const APP_REPLICAS: i32 = 2;
pub const APP_SERVICE_PORT: i32 = 80;
pub const APP_CONTAINER_PORT: i32 = 8080;
pub const APP_MESSAGE_ENV: &str = "MESSAGE";
pub const APP_MESSAGE_VALUE: &str = "Hello K8s!";
pub const DEFAULT_APP_NAMESPACE: &str = "default";

/// Resource labels
pub const LABEL_APP: &str = "app";

/// Service types
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

/// Ingress routing
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
pub const INGRESS_CLASS_NGINX: &str = "nginx";
pub const INGRESS_PATH: &str = "/";
pub const INGRESS_PATH_TYPE_PREFIX: &str = "Prefix";

/// ingress-nginx controller
pub const NGINX_NAMESPACE: &str = "ingress-nginx";
pub const NGINX_NAME: &str = "ingress-nginx";
pub const NGINX_CONTROLLER_NAME: &str = "ingress-nginx-controller";
pub const NGINX_CONTROLLER_CLASS: &str = "k8s.io/ingress-nginx";
pub const NGINX_CONTROLLER_IMAGE: &str = "registry.k8s.io/ingress-nginx/controller:v1.9.4";
pub const NGINX_ELECTION_ID: &str = "ingress-nginx-leader";
pub const NGINX_RUN_AS_USER: i64 = 101;

/// DNS
pub const DEFAULT_BASE_DOMAIN: &str = "car-care.xyz";
pub const DEFAULT_DNS_ZONE_ID: &str = "9e65ba651133f5a0ffe8ac8745a51834";
pub const DNS_RECORD_TYPE_A: &str = "A";
pub const DNS_RECORD_TTL_AUTO: u32 = 1;
pub const DNS_RECORD_PROXIED: bool = true;

/// Load balancer IP wait
pub const DEFAULT_INGRESS_IP_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_INGRESS_IP_POLL_SECS: u64 = 10;

/// Server-side apply field manager
pub const FIELD_MANAGER: &str = "aks-stacks";

/// State backend
pub const STATE_DIR_ENV: &str = "AKS_STACKS_STATE_DIR";
pub const DEFAULT_STATE_DIR: &str = ".aks-stacks";
pub const STATE_FILE_VERSION: u32 = 1;
