//! Stack commands

use super::display::{StatusIcon, TableRenderer};
use crate::domain::application::ApplicationStack;
use crate::domain::config::{parse_dynamic_configs, ApplicationConfig, FoundationConfig, StackConfig};
use crate::domain::foundation::FoundationStack;
use crate::domain::plan::Plan;
use crate::domain::stack::{ApplyResult, Providers, StackIdentifier};
use crate::infrastructure::azure::AzureRestClient;
use crate::infrastructure::cloudflare::CloudflareClient;
use crate::infrastructure::constants::{APPLICATION_PROJECT, DEFAULT_ORGANIZATION, FOUNDATION_PROJECT};
use crate::infrastructure::kubernetes::resources::IngressControllerBuilder;
use crate::infrastructure::kubernetes::{KubeConnector, Manifest};
use crate::infrastructure::ssh::RsaKeyGenerator;
use crate::infrastructure::state::{FileStateBackend, StateBackend};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// The two deployable programs
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Shared AKS cluster, network and ingress controller
    ClusterGeneral,
    /// One application behind the shared ingress controller
    AksIngress,
}

impl Program {
    pub fn project(&self) -> &'static str {
        match self {
            Program::ClusterGeneral => FOUNDATION_PROJECT,
            Program::AksIngress => APPLICATION_PROJECT,
        }
    }
}

/// Arguments shared by up, preview and destroy
#[derive(Parser, Debug, Clone)]
pub struct StackArgs {
    /// Program to run
    #[arg(long, short = 'p', value_enum)]
    pub program: Program,

    /// Stack name. For aks-ingress the stack name is the application name
    #[arg(long, short = 's')]
    pub stack: String,

    /// Organization owning the stack
    #[arg(long, default_value = DEFAULT_ORGANIZATION)]
    pub org: String,

    /// Stack configuration file (TOML with a [config] table).
    /// Defaults to <project>.<stack>.toml when that file exists
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Configuration overrides (-D key=value), e.g. -Dcluster-node-count=3
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// State directory (default: AKS_STACKS_STATE_DIR or ./.aks-stacks)
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<String>,
}

/// A loaded program ready to preview, apply or destroy
pub enum LoadedStack {
    Foundation(FoundationStack),
    Application(ApplicationStack),
}

impl LoadedStack {
    pub fn identifier(&self) -> &StackIdentifier {
        match self {
            LoadedStack::Foundation(s) => s.identifier(),
            LoadedStack::Application(s) => s.identifier(),
        }
    }

    pub async fn preview(&self, providers: &Providers) -> crate::shared::Result<Plan> {
        match self {
            LoadedStack::Foundation(s) => s.preview(providers).await,
            LoadedStack::Application(s) => s.preview(providers).await,
        }
    }

    pub async fn up(&self, providers: &Providers) -> crate::shared::Result<ApplyResult> {
        match self {
            LoadedStack::Foundation(s) => s.up(providers).await,
            LoadedStack::Application(s) => s.up(providers).await,
        }
    }

    pub async fn destroy(&self, providers: &Providers) -> crate::shared::Result<()> {
        match self {
            LoadedStack::Foundation(s) => s.destroy(providers).await,
            LoadedStack::Application(s) => s.destroy(providers).await,
        }
    }

    /// Kubernetes objects the program applies
    pub fn manifests(&self) -> crate::shared::Result<Vec<Manifest>> {
        match self {
            LoadedStack::Foundation(_) => IngressControllerBuilder::default().build(),
            LoadedStack::Application(s) => Ok(vec![s.service()?, s.deployment()?, s.ingress()?]),
        }
    }
}

impl StackArgs {
    pub fn identifier(&self) -> anyhow::Result<StackIdentifier> {
        Ok(StackIdentifier::new(
            &self.org,
            self.program.project(),
            &self.stack,
        )?)
    }

    fn stack_config(&self) -> anyhow::Result<StackConfig> {
        let project = self.program.project();
        let default_file = format!("{}.{}.toml", project, self.stack);

        // Priority: --config-file > <project>.<stack>.toml > defaults
        let conf = if let Some(ref path) = self.config_file {
            StackConfig::from_file(project, path)?
        } else if Path::new(&default_file).exists() {
            println!("ℹ️  Using configuration file {}", default_file);
            StackConfig::from_file(project, &default_file)?
        } else {
            println!("ℹ️  No configuration file specified, using default settings");
            StackConfig::new(project)
        };

        let overrides = parse_dynamic_configs(&self.properties)
            .map_err(|e| anyhow::anyhow!("Failed to parse dynamic configs: {}", e))?;
        Ok(conf.with_overrides(&overrides))
    }

    pub fn load(&self) -> anyhow::Result<LoadedStack> {
        let identifier = self.identifier()?;
        let conf = self.stack_config()?;
        let stack = match self.program {
            Program::ClusterGeneral => {
                let config = FoundationConfig::from_stack_config(&conf, &self.stack)?;
                LoadedStack::Foundation(FoundationStack::new(identifier, config)?)
            }
            Program::AksIngress => {
                let config = ApplicationConfig::from_stack_config(&conf, &self.stack)?;
                LoadedStack::Application(ApplicationStack::new(identifier, config)?)
            }
        };
        Ok(stack)
    }

    pub fn providers(&self) -> anyhow::Result<Providers> {
        build_providers(self.state_dir.clone())
    }
}

/// Real collaborators. Credentials are read from the environment and only
/// checked when a call needs them.
pub fn build_providers(state_dir: Option<String>) -> anyhow::Result<Providers> {
    Ok(Providers {
        azure: Arc::new(AzureRestClient::from_env()?),
        dns: Arc::new(CloudflareClient::from_env()?),
        clusters: Arc::new(KubeConnector),
        keys: Arc::new(RsaKeyGenerator),
        state: Arc::new(FileStateBackend::from_env(state_dir)),
    })
}

#[derive(Parser, Debug, Clone)]
pub struct UpCommand {
    #[command(flatten)]
    pub args: StackArgs,
}

impl UpCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let stack = self.args.load()?;
        let providers = self.args.providers()?;
        let renderer = TableRenderer::new();

        println!("Updating stack {}", stack.identifier().to_string().bold());
        let result = stack.up(&providers).await.map_err(|e| {
            anyhow::anyhow!("{} Update of {} failed: {}", StatusIcon::ERROR, stack.identifier(), e)
        })?;

        println!("{}", renderer.render_summary(&result.summary));
        if let Some(state) = providers.state.load(stack.identifier()).await? {
            println!(
                "{}",
                renderer.render_outputs(&stack.identifier().to_string(), &state, false)
            );
        }
        println!("Stack {} updated successfully!", stack.identifier());
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    #[command(flatten)]
    pub args: StackArgs,

    /// Print the Kubernetes objects the program applies as YAML
    #[arg(long)]
    pub show_manifests: bool,
}

impl PreviewCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let stack = self.args.load()?;
        let providers = self.args.providers()?;

        let plan = stack.preview(&providers).await?;
        println!("{}", TableRenderer::new().render_plan(&plan));

        if self.show_manifests {
            for manifest in stack.manifests()? {
                println!("---\n{}", manifest.to_yaml()?);
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct DestroyCommand {
    #[command(flatten)]
    pub args: StackArgs,

    /// Confirm deletion of every recorded resource
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl DestroyCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let stack = self.args.load()?;
        if !self.yes {
            anyhow::bail!(
                "Refusing to destroy {} without --yes",
                stack.identifier()
            );
        }
        let providers = self.args.providers()?;

        println!("Destroying stack {}", stack.identifier().to_string().bold());
        stack.destroy(&providers).await?;
        println!("Stack {} destroyed successfully!", stack.identifier());
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct OutputsCommand {
    /// Stack identifier (organization/project/stack)
    #[arg(value_name = "ORG/PROJECT/STACK")]
    pub stack: String,

    /// Print secret values instead of masking them
    #[arg(long)]
    pub show_secrets: bool,

    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<String>,
}

impl OutputsCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let identifier: StackIdentifier = self.stack.parse()?;
        let backend = FileStateBackend::from_env(self.state_dir.clone());
        let state = backend
            .load(&identifier)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Stack {} has not been deployed", identifier))?;

        let output = TableRenderer::new().render_outputs(
            &identifier.to_string(),
            &state,
            self.show_secrets,
        );
        println!("{}", output);
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct ListCommand {
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<String>,
}

impl ListCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let backend = FileStateBackend::from_env(self.state_dir.clone());
        let stacks = backend.list().await?;
        println!("{}", TableRenderer::new().render_stacks(&stacks));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        args: StackArgs,
    }

    #[test]
    fn test_cli_definition_is_valid() {
        TestCli::command().debug_assert();
    }

    #[test]
    fn test_parse_stack_args() {
        let cli = TestCli::try_parse_from([
            "aks-stacks",
            "--program",
            "aks-ingress",
            "--stack",
            "api",
            "-Dbase-domain=example.org",
        ])
        .unwrap();
        assert_eq!(cli.args.program, Program::AksIngress);
        assert_eq!(cli.args.org, "wijayasena");
        assert_eq!(
            cli.args.identifier().unwrap().to_string(),
            "wijayasena/aks-ingress/api"
        );

        let LoadedStack::Application(stack) = cli.args.load().unwrap() else {
            panic!("expected the application program");
        };
        assert_eq!(stack.names().dns_record, "cloudflare-api-dns");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = TestCli::try_parse_from([
            "aks-stacks",
            "-p",
            "cluster-general",
            "-s",
            "dev",
            "-Dcluster-node-count=many",
        ])
        .unwrap();
        assert!(cli.args.load().is_err());
    }
}
