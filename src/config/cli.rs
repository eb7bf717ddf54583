use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the contextualizer binary.
#[derive(Debug, Parser)]
#[command(
    name = "contextualizer",
    version,
    about = "Context-menu command visibility engine"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CONTEXTUALIZER_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Decide whether commands are visible for a selected node.
    Evaluate(EvaluateArgs),
    /// Evaluate every registered command for a selected node.
    Menu(MenuArgs),
    /// List the registered commands and their filters.
    Registry(RegistryArgs),
    /// Report whether saving an item would invalidate cached registries.
    Saved(SavedArgs),
}

impl Command {
    pub fn overrides(&self) -> &RuntimeOverrides {
        match self {
            Command::Evaluate(args) => &args.overrides,
            Command::Menu(args) => &args.overrides,
            Command::Registry(args) => &args.overrides,
            Command::Saved(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Command name to evaluate; may be repeated.
    #[arg(long = "command", value_name = "NAME", required = true)]
    pub commands: Vec<String>,

    /// Id of the selected node.
    #[arg(long = "node", value_name = "ID")]
    pub node: String,
}

#[derive(Debug, Args, Clone)]
pub struct MenuArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Id of the selected node.
    #[arg(long = "node", value_name = "ID")]
    pub node: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RegistryArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct SavedArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Id of the saved item.
    #[arg(long = "item", value_name = "ID")]
    pub item: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the content tree file.
    #[arg(long = "content-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub content_file: Option<PathBuf>,

    /// Enable or disable the registry cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache namespace.
    #[arg(long = "cache-namespace", value_name = "NAME")]
    pub cache_namespace: Option<String>,

    /// Override the registry lifetime; zero keeps registries until invalidated.
    #[arg(long = "registry-ttl-seconds", value_name = "SECONDS")]
    pub registry_ttl_seconds: Option<u64>,

    /// Override the id of the commands parent folder.
    #[arg(long = "commands-parent", value_name = "ID")]
    pub commands_parent: Option<String>,
}
