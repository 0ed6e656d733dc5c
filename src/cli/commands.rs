// CLI command definitions

use super::stack::{DestroyCommand, ListCommand, OutputsCommand, PreviewCommand, UpCommand};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "aks-stacks",
    version,
    about = "Deploys a shared AKS cluster and per-application ingress stacks",
    long_about = "Deploys the cluster-general foundation stack (AKS cluster, network, ingress controller) \
                  and aks-ingress application stacks that read its outputs through stack references"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Create or update every resource of a stack
    Up(UpCommand),

    /// Show what up would change without touching anything
    Preview(PreviewCommand),

    /// Delete every resource recorded for a stack
    Destroy(DestroyCommand),

    /// Show the outputs a stack published
    Outputs(OutputsCommand),

    /// List stacks in the state directory
    List(ListCommand),
}
