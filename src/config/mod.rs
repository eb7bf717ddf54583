//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::DEFAULT_NAMESPACE;
use crate::domain::types::{NodeId, TemplateId};

pub use cli::{
    CliArgs, Command, EvaluateArgs, MenuArgs, RegistryArgs, RuntimeOverrides, SavedArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "contextualizer";
const ENV_PREFIX: &str = "CONTEXTUALIZER";
const DEFAULT_CACHE_CAPACITY: u64 = 256;
const DEFAULT_REGISTRY_TTL_SECS: u64 = 8 * 60;
const DEFAULT_COMMANDS_PARENT: &str = "{3C16B828-9F51-422B-9A02-B87F49C05C6A}";
const DEFAULT_COMMAND_TEMPLATE: &str = "{AEE09A03-6B16-4731-BD16-E158AF6209BF}";
const DEFAULT_GENERIC_FILTER_TEMPLATE: &str = "{CD422DF6-C5A0-4966-A772-14628CC6D106}";
const DEFAULT_HIERARCHY_FILTER_TEMPLATE: &str = "{0CB6AF49-4E30-4CBD-94D2-24D352BA7097}";
const DEFAULT_TEMPLATE_FILTER_TEMPLATE: &str = "{3D471FDB-8FFA-4E65-8A26-0AF5D326217C}";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub commands: CommandsSettings,
    pub content: ContentSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub namespace: String,
    pub capacity: usize,
    pub registry_ttl: Duration,
}

/// Where command configuration lives and which templates identify it.
#[derive(Debug, Clone, Copy)]
pub struct CommandsSettings {
    pub parent_id: NodeId,
    pub command_template: TemplateId,
    pub generic_filter_template: TemplateId,
    pub hierarchy_filter_template: TemplateId,
    pub template_filter_template: TemplateId,
}

#[derive(Debug, Clone, Default)]
pub struct ContentSettings {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    commands: RawCommandsSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.content_file.as_ref() {
            self.content.file = Some(path.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(namespace) = overrides.cache_namespace.as_ref() {
            self.cache.namespace = Some(namespace.clone());
        }
        if let Some(ttl) = overrides.registry_ttl_seconds {
            self.cache.registry_ttl_seconds = Some(ttl);
        }
        if let Some(parent) = overrides.commands_parent.as_ref() {
            self.commands.parent_id = Some(parent.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            commands,
            content,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            commands: build_commands_settings(commands)?,
            content: build_content_settings(content),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let namespace = cache
        .namespace
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let namespace = namespace.trim().trim_end_matches('.').to_string();
    if namespace.is_empty() {
        return Err(LoadError::invalid(
            "cache.namespace",
            "namespace must not be empty",
        ));
    }

    let capacity = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY).max(1);
    let capacity = usize::try_from(capacity).map_err(|_| {
        LoadError::invalid(
            "cache.capacity",
            "value exceeds supported range for usize",
        )
    })?;

    let ttl_seconds = cache
        .registry_ttl_seconds
        .unwrap_or(DEFAULT_REGISTRY_TTL_SECS);

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        namespace,
        capacity,
        registry_ttl: Duration::from_secs(ttl_seconds),
    })
}

fn build_commands_settings(commands: RawCommandsSettings) -> Result<CommandsSettings, LoadError> {
    Ok(CommandsSettings {
        parent_id: parse_id(
            commands.parent_id,
            DEFAULT_COMMANDS_PARENT,
            "commands.parent_id",
            NodeId::parse,
        )?,
        command_template: parse_id(
            commands.command_template,
            DEFAULT_COMMAND_TEMPLATE,
            "commands.command_template",
            TemplateId::parse,
        )?,
        generic_filter_template: parse_id(
            commands.generic_filter_template,
            DEFAULT_GENERIC_FILTER_TEMPLATE,
            "commands.generic_filter_template",
            TemplateId::parse,
        )?,
        hierarchy_filter_template: parse_id(
            commands.hierarchy_filter_template,
            DEFAULT_HIERARCHY_FILTER_TEMPLATE,
            "commands.hierarchy_filter_template",
            TemplateId::parse,
        )?,
        template_filter_template: parse_id(
            commands.template_filter_template,
            DEFAULT_TEMPLATE_FILTER_TEMPLATE,
            "commands.template_filter_template",
            TemplateId::parse,
        )?,
    })
}

fn build_content_settings(content: RawContentSettings) -> ContentSettings {
    let file = content
        .file
        .filter(|path| !path.as_os_str().is_empty());
    ContentSettings { file }
}

fn parse_id<T, E: std::fmt::Display>(
    value: Option<String>,
    default: &str,
    key: &'static str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, LoadError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    parse(raw.as_str()).map_err(|err| LoadError::invalid(key, err.to_string()))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    namespace: Option<String>,
    capacity: Option<u64>,
    registry_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommandsSettings {
    parent_id: Option<String>,
    command_template: Option<String>,
    generic_filter_template: Option<String>,
    hierarchy_filter_template: Option<String>,
    template_filter_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    file: Option<PathBuf>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
