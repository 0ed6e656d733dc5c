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

//! Application stack: one web application behind the foundation's ingress
//! controller, published under `<app>.<domain>` through a Cloudflare record.

use crate::domain::config::ApplicationConfig;
use crate::domain::graph::{ResourceDeclaration, ResourceGraph, ResourceKind};
use crate::domain::output::Output;
use crate::domain::plan::{Plan, StepOp};
use crate::domain::stack::{ApplyContext, ApplyResult, Providers, StackIdentifier, StackReference};
use crate::infrastructure::azure::decode_kubeconfig;
use crate::infrastructure::cloudflare::DnsRecordSpec;
use crate::infrastructure::constants::*;
use crate::infrastructure::kubernetes::resources::{
    ingress_name, load_balancer_ip, DeploymentBuilder, IngressBuilder, ServiceBuilder,
};
use crate::infrastructure::kubernetes::{ClusterProvider, Manifest};
use crate::infrastructure::state::StackState;
use crate::shared::error::{Result, StackError};
use backon::{BackoffBuilder, ConstantBuilder};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const IP_FIELD: &str = "status.loadBalancer.ingress[0].ip";

/// Outputs of the foundation stack this application is deployed onto.
#[derive(Debug, Clone)]
pub struct FoundationOutputs {
    pub rg_name: Output<String>,
    pub cluster_name: Output<String>,
}

impl FoundationOutputs {
    /// Reads only `rgName` and `aksClusterName`; anything else the
    /// foundation publishes is ignored.
    pub fn from_reference(reference: &StackReference) -> Result<Self> {
        Ok(Self {
            rg_name: reference.get_string(OUTPUT_RG_NAME)?,
            cluster_name: reference.get_string(OUTPUT_CLUSTER_NAME)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationNames {
    pub provider: String,
    pub service: String,
    pub deployment: String,
    pub ingress: String,
    pub dns_record: String,
}

impl ApplicationNames {
    pub fn new(app: &str) -> Self {
        Self {
            provider: format!("{}-k8s-provider", app),
            service: format!("{}-svc", app),
            deployment: format!("{}-dep", app),
            ingress: format!("{}-ingress", app),
            dns_record: format!("cloudflare-{}-dns", app),
        }
    }
}

pub struct ApplicationStack {
    identifier: StackIdentifier,
    config: ApplicationConfig,
    names: ApplicationNames,
}

impl ApplicationStack {
    pub fn new(identifier: StackIdentifier, config: ApplicationConfig) -> Result<Self> {
        config.validate()?;
        let names = ApplicationNames::new(&config.app_name);
        Ok(Self {
            identifier,
            config,
            names,
        })
    }

    pub fn identifier(&self) -> &StackIdentifier {
        &self.identifier
    }

    pub fn names(&self) -> &ApplicationNames {
        &self.names
    }

    pub fn service(&self) -> Result<Manifest> {
        Ok(Manifest::Service(
            ServiceBuilder::new(&self.config.app_name, &self.config.namespace).build()?,
        ))
    }

    pub fn deployment(&self) -> Result<Manifest> {
        Ok(Manifest::Deployment(
            DeploymentBuilder::new(&self.config.app_name, &self.config.namespace).build()?,
        ))
    }

    pub fn ingress(&self) -> Result<Manifest> {
        Ok(Manifest::Ingress(
            IngressBuilder::new(
                &self.config.app_name,
                &self.config.namespace,
                &self.config.base_domain,
            )
            .build()?,
        ))
    }

    fn provider_inputs(&self, foundation: &FoundationOutputs) -> Value {
        json!({
            "stack": self.config.foundation_stack.to_string(),
            "resourceGroup": foundation.rg_name.to_input(),
            "cluster": foundation.cluster_name.to_input(),
        })
    }

    fn dns_inputs(&self, content: &Output<String>) -> Value {
        json!({
            "zoneId": self.config.dns_zone_id,
            "type": DNS_RECORD_TYPE_A,
            "name": self.config.hostname(),
            "content": content.to_input(),
            "ttl": DNS_RECORD_TTL_AUTO,
            "proxied": DNS_RECORD_PROXIED,
        })
    }

    /// The load balancer IP is only known ahead of an apply when the
    /// ingress is unchanged and an earlier apply recorded it.
    fn planned_ip(&self, ingress_inputs: &Value, prior: Option<&StackState>) -> Output<String> {
        let ip = prior
            .and_then(|p| p.resource(&self.names.ingress))
            .filter(|record| record.inputs == *ingress_inputs)
            .and_then(|record| record.outputs.get(OUTPUT_LOAD_BALANCER_IP))
            .and_then(Value::as_str)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);
        Output::from_option(ip).with_dependency(self.names.ingress.clone())
    }

    pub fn declare(
        &self,
        foundation: &FoundationOutputs,
        prior: Option<&StackState>,
    ) -> Result<ResourceGraph> {
        let n = &self.names;
        let mut graph = ResourceGraph::new();

        graph.add(ResourceDeclaration::new(
            &n.provider,
            ResourceKind::ClusterProvider,
            self.provider_inputs(foundation),
        ))?;
        graph.add(
            ResourceDeclaration::new(&n.service, ResourceKind::Service, self.service()?.to_value()?)
                .depends_on(&n.provider),
        )?;
        graph.add(
            ResourceDeclaration::new(
                &n.deployment,
                ResourceKind::Deployment,
                self.deployment()?.to_value()?,
            )
            .depends_on(&n.provider),
        )?;

        let ingress_inputs = self.ingress()?.to_value()?;
        let ip = self.planned_ip(&ingress_inputs, prior);
        graph.add(
            ResourceDeclaration::new(&n.ingress, ResourceKind::Ingress, ingress_inputs)
                .depends_on(&n.provider)
                .depends_on(&n.service)
                .depends_on(&n.deployment),
        )?;
        graph.add(
            ResourceDeclaration::new(&n.dns_record, ResourceKind::DnsRecord, self.dns_inputs(&ip))
                .depends_on(&n.ingress),
        )?;

        graph.validate()?;
        Ok(graph)
    }

    pub async fn preview(&self, providers: &Providers) -> Result<Plan> {
        let prior = providers.state.load(&self.identifier).await?;
        let reference = StackReference::resolve(
            providers.state.as_ref(),
            self.config.foundation_stack.clone(),
        )
        .await?;
        let foundation = FoundationOutputs::from_reference(&reference)?;
        let graph = self.declare(&foundation, prior.as_ref())?;
        let plan = Plan::compute(&self.identifier, &graph, prior.as_ref())?;

        match stale_reference(&reference, prior.as_ref()) {
            Some(stale) => Ok(plan.with_warning(format!("{}; run up to pick up its outputs", stale))),
            None => Ok(plan),
        }
    }

    pub async fn up(&self, providers: &Providers) -> Result<ApplyResult> {
        let _lock = providers.state.lock(&self.identifier).await?;
        let prior = providers.state.load(&self.identifier).await?;
        let reference = StackReference::resolve(
            providers.state.as_ref(),
            self.config.foundation_stack.clone(),
        )
        .await?;
        let foundation = FoundationOutputs::from_reference(&reference)?;
        let graph = self.declare(&foundation, prior.as_ref())?;

        info!(stack = %self.identifier, foundation = %reference.identifier(), "applying application stack");
        let mut ctx = ApplyContext::new(
            self.identifier.clone(),
            &graph,
            providers.state.as_ref(),
            prior,
        );
        let stale = stale_reference(&reference, ctx.prior_state());
        if let Some(stale) = stale {
            ctx.add_warning(format!("{}; re-reading its outputs and the ingress address", stale));
        }
        ctx.record_reference(reference.identifier(), reference.updated_at());

        let provider = self.apply_provider(&mut ctx, providers, &foundation).await?;
        self.apply_workload(&mut ctx, &provider).await?;
        let ip = self.apply_ingress(&mut ctx, &provider).await?;
        self.apply_dns_record(&mut ctx, providers, ip).await?;

        ctx.set_output(OUTPUT_APP_INGRESS, json!(ingress_name(&self.config.app_name)));
        ctx.set_output(OUTPUT_HOSTNAME, json!(self.config.hostname()));
        ctx.finish().await
    }

    async fn apply_provider(
        &self,
        ctx: &mut ApplyContext<'_>,
        providers: &Providers,
        foundation: &FoundationOutputs,
    ) -> Result<ClusterProvider> {
        let name = &self.names.provider;
        ctx.begin(name)?;

        let rg_name = foundation.rg_name.require(name, OUTPUT_RG_NAME)?;
        let cluster_name = foundation.cluster_name.require(name, OUTPUT_CLUSTER_NAME)?;
        let entries = providers
            .azure
            .list_cluster_user_credentials(rg_name, cluster_name)
            .await?;
        let kubeconfig = Output::known(entries)
            .with_dependency(self.config.foundation_stack.to_string())
            .try_apply(|entries| decode_kubeconfig(&entries))?;
        let provider = providers
            .clusters
            .connect(name, kubeconfig.require(name, "kubeconfig")?)
            .await?;

        let inputs = self.provider_inputs(foundation);
        let op = ctx.operation_for(name, &inputs);
        ctx.complete(name, op, inputs, json!({})).await?;
        Ok(provider)
    }

    /// Service and deployment do not depend on each other and are applied
    /// concurrently.
    async fn apply_workload(&self, ctx: &mut ApplyContext<'_>, provider: &ClusterProvider) -> Result<()> {
        let service = self.service()?;
        let deployment = self.deployment()?;
        let (svc_name, dep_name) = (&self.names.service, &self.names.deployment);
        let svc_inputs = service.to_value()?;
        let dep_inputs = deployment.to_value()?;

        ctx.begin(svc_name)?;
        ctx.begin(dep_name)?;
        let svc_op = ctx.operation_for(svc_name, &svc_inputs);
        let dep_op = ctx.operation_for(dep_name, &dep_inputs);
        let svc_old = replaced_manifest(ctx, svc_name, svc_op)?;
        let dep_old = replaced_manifest(ctx, dep_name, dep_op)?;

        futures::try_join!(
            sync_manifest(provider, svc_op, &service, svc_old.as_ref()),
            sync_manifest(provider, dep_op, &deployment, dep_old.as_ref()),
        )?;

        record_manifest(ctx, svc_name, svc_op, svc_inputs, &service).await?;
        record_manifest(ctx, dep_name, dep_op, dep_inputs, &deployment).await
    }

    /// Applies the ingress when it changed, then reads the address the
    /// controller currently publishes for it on every apply.
    async fn apply_ingress(&self, ctx: &mut ApplyContext<'_>, provider: &ClusterProvider) -> Result<Output<String>> {
        let name = &self.names.ingress;
        ctx.begin(name)?;
        let ingress = self.ingress()?;
        let inputs = ingress.to_value()?;
        let op = ctx.operation_for(name, &inputs);

        let old = replaced_manifest(ctx, name, op)?;
        sync_manifest(provider, op, &ingress, old.as_ref()).await?;
        let ip = self.wait_for_load_balancer_ip(provider).await?;

        let recorded = self.planned_ip(&inputs, ctx.prior_state());
        if op == StepOp::Same && recorded.value() == Some(&ip) {
            ctx.reuse(name)?;
            return Ok(recorded);
        }
        if let Some(previous) = recorded.value().filter(|previous| **previous != ip) {
            info!(ingress = %name, from = %previous, to = %ip, "load balancer address changed");
        }

        ctx.complete(
            name,
            op,
            inputs,
            json!({
                "name": ingress.name(),
                OUTPUT_LOAD_BALANCER_IP: ip.clone(),
            }),
        )
        .await?;
        Ok(Output::known(ip).with_dependency(name.clone()))
    }

    /// Polls the ingress status until the controller publishes an address.
    async fn wait_for_load_balancer_ip(&self, provider: &ClusterProvider) -> Result<String> {
        let name = ingress_name(&self.config.app_name);
        let mut backoff = ConstantBuilder::default()
            .with_delay(self.config.ingress_ip_poll)
            .with_max_times(self.config.ingress_ip_attempts())
            .build();

        loop {
            let ingress = provider.get_ingress(&self.config.namespace, &name).await?;
            if let Some(ip) = ingress.as_ref().and_then(load_balancer_ip) {
                info!(ingress = %name, ip = %ip, "load balancer address assigned");
                return Ok(ip);
            }
            match backoff.next() {
                Some(delay) => {
                    debug!(ingress = %name, "waiting for load balancer address");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(StackError::unresolved(&self.names.ingress, IP_FIELD)),
            }
        }
    }

    async fn apply_dns_record(
        &self,
        ctx: &mut ApplyContext<'_>,
        providers: &Providers,
        ip: Output<String>,
    ) -> Result<()> {
        let name = &self.names.dns_record;
        ctx.begin(name)?;
        let inputs = self.dns_inputs(&ip);
        let content = ip.require(name, OUTPUT_LOAD_BALANCER_IP)?.clone();
        ctx.set_output(OUTPUT_LOAD_BALANCER_IP, json!(content));

        let op = ctx.operation_for(name, &inputs);
        if op == StepOp::Same {
            ctx.reuse(name)?;
            return Ok(());
        }

        let zone = &self.config.dns_zone_id;
        if op == StepOp::Replace {
            if let Some(record) = ctx.prior_record(name) {
                let old_zone = record.inputs.get("zoneId").and_then(Value::as_str);
                let old_id = record.outputs.get("id").and_then(Value::as_str);
                if let (Some(old_zone), Some(old_id)) = (old_zone, old_id) {
                    providers.dns.delete_record(old_zone, old_id).await?;
                }
            }
        }

        let spec = DnsRecordSpec::a_record(&self.config.hostname(), &content)?;
        let record = match providers
            .dns
            .find_record(zone, DNS_RECORD_TYPE_A, &spec.name)
            .await?
        {
            Some(existing) if existing.matches(&spec) => existing,
            Some(existing) => providers.dns.update_record(zone, &existing.id, &spec).await?,
            None => providers.dns.create_record(zone, &spec).await?,
        };

        ctx.complete(
            name,
            op,
            inputs,
            json!({ "id": record.id, "content": record.content }),
        )
        .await
    }

    /// Removes the DNS record, then the in-cluster objects, then the
    /// stack's state.
    pub async fn destroy(&self, providers: &Providers) -> Result<()> {
        let _lock = providers.state.lock(&self.identifier).await?;
        let Some(mut state) = providers.state.load(&self.identifier).await? else {
            println!("ℹ️  Stack {} has no recorded resources", self.identifier);
            return Ok(());
        };

        if let Some(record) = state.resource(&self.names.dns_record) {
            let zone = record.inputs.get("zoneId").and_then(Value::as_str);
            let id = record.outputs.get("id").and_then(Value::as_str);
            if let (Some(zone), Some(id)) = (zone, id) {
                providers.dns.delete_record(zone, id).await?;
            }
            println!("  {} {} ({})", StepOp::Delete.symbol(), self.names.dns_record, ResourceKind::DnsRecord);
            state.resources.remove(&self.names.dns_record);
            providers.state.save(&self.identifier, &state).await?;
        }

        let provider = match self.connect_recorded(providers, &state).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                warn!(stack = %self.identifier, error = %e, "cluster unreachable, dropping in-cluster records");
                None
            }
        };

        let recorded = state.recorded_graph()?;
        for decl in recorded.reverse_order()? {
            if decl.kind.in_cluster() {
                if let Some(provider) = &provider {
                    provider.delete(&Manifest::from_value(&decl.inputs)?).await?;
                }
            }
            println!("  {} {} ({})", StepOp::Delete.symbol(), decl.name, decl.kind);
            state.resources.remove(&decl.name);
            providers.state.save(&self.identifier, &state).await?;
        }

        providers.state.delete(&self.identifier).await
    }

    /// Provider for the cluster recorded by the last apply.
    async fn connect_recorded(&self, providers: &Providers, state: &StackState) -> Result<ClusterProvider> {
        let name = &self.names.provider;
        let record = state
            .resource(name)
            .ok_or_else(|| StackError::unresolved(name, "cluster"))?;
        let field = |key: &str| -> Result<String> {
            record
                .inputs
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| StackError::unresolved(name, key))
        };
        let entries = providers
            .azure
            .list_cluster_user_credentials(&field("resourceGroup")?, &field("cluster")?)
            .await?;
        providers
            .clusters
            .connect(name, &decode_kubeconfig(&entries)?)
            .await
    }
}

/// Describes the referenced stack when it was redeployed after this stack
/// last read it.
fn stale_reference(reference: &StackReference, prior: Option<&StackState>) -> Option<String> {
    let last_seen = prior.and_then(|p| p.references.get(&reference.identifier().to_string()));
    reference.is_newer_than(last_seen).then(|| {
        format!(
            "stack {} was updated at {} after this stack last read it",
            reference.identifier(),
            reference.updated_at()
        )
    })
}

/// Recorded manifest to delete first when `op` is a replacement.
fn replaced_manifest(ctx: &ApplyContext<'_>, name: &str, op: StepOp) -> Result<Option<Manifest>> {
    if op != StepOp::Replace {
        return Ok(None);
    }
    ctx.prior_record(name)
        .map(|record| Manifest::from_value(&record.inputs))
        .transpose()
}

async fn sync_manifest(
    provider: &ClusterProvider,
    op: StepOp,
    manifest: &Manifest,
    replaced: Option<&Manifest>,
) -> Result<()> {
    if op == StepOp::Same {
        return Ok(());
    }
    if let Some(old) = replaced {
        provider.delete(old).await?;
    }
    provider.apply(manifest).await
}

async fn record_manifest(
    ctx: &mut ApplyContext<'_>,
    name: &str,
    op: StepOp,
    inputs: Value,
    manifest: &Manifest,
) -> Result<()> {
    if op == StepOp::Same {
        ctx.reuse(name)?;
        return Ok(());
    }
    ctx.complete(
        name,
        op,
        inputs,
        json!({ "name": manifest.name(), "namespace": manifest.namespace() }),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::output::UNKNOWN;

    fn stack() -> ApplicationStack {
        let conf = crate::domain::config::StackConfig::new(APPLICATION_PROJECT);
        let config = ApplicationConfig::from_stack_config(&conf, "api").unwrap();
        ApplicationStack::new("wijayasena/aks-ingress/api".parse().unwrap(), config).unwrap()
    }

    fn foundation() -> FoundationOutputs {
        FoundationOutputs {
            rg_name: Output::known("ccc-dev".to_string()),
            cluster_name: Output::known("ccc-dev-cluster".to_string()),
        }
    }

    #[test]
    fn test_names_follow_app() {
        let names = ApplicationNames::new("api");
        assert_eq!(names.provider, "api-k8s-provider");
        assert_eq!(names.ingress, "api-ingress");
        assert_eq!(names.dns_record, "cloudflare-api-dns");
    }

    #[test]
    fn test_declared_graph() {
        let graph = stack().declare(&foundation(), None).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(
            graph.get("api-ingress").unwrap().depends_on,
            vec!["api-k8s-provider", "api-svc", "api-dep"]
        );

        let ingress = &graph.get("api-ingress").unwrap().inputs;
        assert_eq!(ingress["metadata"]["name"], "hello-k8s-api-ingress");
        assert_eq!(ingress["spec"]["rules"][0]["host"], "api.car-care.xyz");

        let dns = &graph.get("cloudflare-api-dns").unwrap().inputs;
        assert_eq!(dns["content"], UNKNOWN);
        assert_eq!(dns["name"], "api.car-care.xyz");
        assert_eq!(dns["ttl"], 1);
        assert_eq!(dns["proxied"], true);
    }

    #[test]
    fn test_planned_ip_requires_unchanged_ingress() {
        let s = stack();
        let inputs = s.ingress().unwrap().to_value().unwrap();
        let mut state = StackState::default();
        state.resources.insert(
            "api-ingress".to_string(),
            crate::infrastructure::state::ResourceRecord {
                kind: ResourceKind::Ingress,
                inputs: inputs.clone(),
                outputs: json!({ "loadBalancerIp": "20.1.2.3" }),
                depends_on: Vec::new(),
                updated_at: chrono::Utc::now(),
            },
        );
        assert_eq!(s.planned_ip(&inputs, Some(&state)).value().map(String::as_str), Some("20.1.2.3"));
        assert!(!s.planned_ip(&json!({}), Some(&state)).is_known());
    }
}
