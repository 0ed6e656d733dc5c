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

#[cfg(test)]
mod tests {
    use aks_stacks::domain::config::parse_dynamic_configs;
    use aks_stacks::infrastructure::kubernetes::resources::{
        hostname, DeploymentBuilder, IngressBuilder, IngressControllerBuilder, ServiceBuilder,
    };
    use aks_stacks::infrastructure::kubernetes::Manifest;
    use aks_stacks::*;
    use std::io::Write;

    // ========================================================================
    // Configuration
    // ========================================================================

    #[test]
    fn test_stack_config_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[config]
"cluster-general:cluster-node-count" = 2
"cluster-general:cluster-nodeSize" = "Standard_D4s_v3"
"azure-native:location" = "westeurope"
"#
        )
        .unwrap();

        let overrides = parse_dynamic_configs(&["cluster-node-count=4".to_string()]).unwrap();
        let conf = StackConfig::from_file("cluster-general", file.path().to_str().unwrap())
            .unwrap()
            .with_overrides(&overrides);
        let foundation = FoundationConfig::from_stack_config(&conf, "dev").unwrap();

        assert_eq!(foundation.node_count, 4);
        assert_eq!(foundation.node_vm_size, "Standard_D4s_v3");
        assert_eq!(foundation.location, "westeurope");
        assert_eq!(foundation.max_pods, 110);
    }

    #[test]
    fn test_missing_config_file() {
        let err = StackConfig::from_file("cluster-general", "/nonexistent/stack.toml").unwrap_err();
        assert!(err.is_declaration_error());
    }

    #[test]
    fn test_application_config_overrides() {
        let mut conf = StackConfig::new("aks-ingress");
        conf.set("aks-ingress:base-domain", "example.org");
        conf.set("foundation-stack", "acme/cluster-general/prod");
        let app = ApplicationConfig::from_stack_config(&conf, "shop").unwrap();

        assert_eq!(app.hostname(), "shop.example.org");
        assert_eq!(app.foundation_stack.organization, "acme");
        assert_eq!(app.foundation_stack.stack, "prod");
    }

    // ========================================================================
    // Workload manifests
    // ========================================================================

    #[test]
    fn test_workload_manifests_share_selector() {
        let service = ServiceBuilder::new("api", "default").build().unwrap();
        let deployment = DeploymentBuilder::new("api", "default").build().unwrap();

        let selector = service.spec.as_ref().unwrap().selector.clone().unwrap();
        let match_labels = deployment
            .spec
            .as_ref()
            .unwrap()
            .selector
            .match_labels
            .clone()
            .unwrap();
        assert_eq!(selector, match_labels);
        assert_eq!(selector.get("app").map(String::as_str), Some("api"));
    }

    #[test]
    fn test_ingress_backend_matches_service() {
        let service = ServiceBuilder::new("api", "default").build().unwrap();
        let ingress = IngressBuilder::new("api", "default", "car-care.xyz")
            .build()
            .unwrap();

        let rule = &ingress.spec.as_ref().unwrap().rules.as_ref().unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some(hostname("api", "car-care.xyz").as_str()));

        let backend = rule.http.as_ref().unwrap().paths[0]
            .backend
            .service
            .as_ref()
            .unwrap();
        assert_eq!(Some(backend.name.as_str()), service.metadata.name.as_deref());
        let service_port = service.spec.as_ref().unwrap().ports.as_ref().unwrap()[0].port;
        assert_eq!(backend.port.as_ref().unwrap().number, Some(service_port));
    }

    #[test]
    fn test_ingress_controller_publishes_its_service() {
        let manifests = IngressControllerBuilder::default().build().unwrap();
        let kinds: Vec<&str> = manifests.iter().map(Manifest::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "Namespace",
                "ServiceAccount",
                "ClusterRole",
                "ClusterRoleBinding",
                "IngressClass",
                "Deployment",
                "Service"
            ]
        );

        let yaml = manifests
            .iter()
            .map(|m| m.to_yaml().unwrap())
            .collect::<Vec<_>>()
            .join("---\n");
        assert!(yaml.contains("--publish-service=$(POD_NAMESPACE)/ingress-nginx-controller"));
        assert!(yaml.contains("LoadBalancer"));
    }

    // ========================================================================
    // Stack identifiers
    // ========================================================================

    #[test]
    fn test_stack_identifier_round_trip() {
        let id: StackIdentifier = "wijayasena/cluster-general/dev".parse().unwrap();
        assert_eq!(id.project, "cluster-general");
        assert_eq!(id.to_string(), "wijayasena/cluster-general/dev");

        assert!("wijayasena/cluster-general".parse::<StackIdentifier>().is_err());
        assert!("a/b/c d".parse::<StackIdentifier>().is_err());
    }
}
