use std::{process::ExitCode, sync::Arc};

use contextualizer::{
    application::{
        engine::{EngineSettings, FilterChainEngine, MenuEntry},
        error::{AppError, ErrorReport},
        filters::StrategyTable,
        invalidation::InvalidationListener,
        registry_loader::CommandSchema,
        repos::ContentRepository,
    },
    cache::{CacheConfig, NamespacedCache},
    config::{self, Command, EvaluateArgs, MenuArgs, SavedArgs, Settings},
    domain::{
        commands::{CommandDefinition, Visibility},
        error::DomainError,
        filters::FilterConfig,
        types::NodeId,
    },
    infra::{content_store::MemoryRepository, error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("contextualizer::main", error);
    if dispatcher::has_been_set() {
        error!(source = report.source, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, chain = ?report.messages, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    telemetry::init(&settings.logging)?;
    let runtime = Runtime::build(&settings)?;

    match cli_args.command {
        Command::Evaluate(args) => run_evaluate(&runtime, args),
        Command::Menu(args) => run_menu(&runtime, args),
        Command::Registry(_) => run_registry(&runtime),
        Command::Saved(args) => run_saved(&runtime, args),
    }
}

/// Services wired from settings for a single invocation.
struct Runtime {
    repository: Arc<dyn ContentRepository>,
    engine: FilterChainEngine,
    listener: InvalidationListener,
}

impl Runtime {
    fn build(settings: &Settings) -> Result<Self, AppError> {
        let path = settings.content.file.as_ref().ok_or_else(|| {
            AppError::from(InfraError::configuration(
                "`content.file` must point at a content tree (use --content-file)",
            ))
        })?;
        let repository: Arc<dyn ContentRepository> = Arc::new(MemoryRepository::load(path)?);

        let cache_config = CacheConfig::from(&settings.cache);
        let cache = Arc::new(NamespacedCache::from_config(&cache_config));
        let schema = CommandSchema::from(&settings.commands);

        let engine = FilterChainEngine::new(
            repository.clone(),
            cache.clone(),
            schema,
            StrategyTable::with_builtin(),
            EngineSettings {
                commands_parent: settings.commands.parent_id,
                registry_ttl: cache_config.registry_ttl(),
            },
        );
        let listener = InvalidationListener::new(cache, repository.clone(), schema);

        info!(
            target = "contextualizer::main",
            namespace = %cache_config.namespace,
            cache_enabled = cache_config.enabled,
            parent = %settings.commands.parent_id,
            "runtime ready"
        );

        Ok(Self {
            repository,
            engine,
            listener,
        })
    }
}

#[derive(Serialize)]
struct Decision {
    command: String,
    visibility: Visibility,
}

#[derive(Serialize)]
struct EvaluateOutput {
    node: NodeId,
    decisions: Vec<Decision>,
}

#[derive(Serialize)]
struct MenuOutput {
    node: NodeId,
    commands: Vec<MenuEntry>,
}

#[derive(Serialize)]
struct FilterView<'a> {
    id: NodeId,
    config: Option<&'a FilterConfig>,
}

#[derive(Serialize)]
struct CommandView<'a> {
    #[serde(flatten)]
    definition: &'a CommandDefinition,
    filters: Vec<FilterView<'a>>,
}

#[derive(Serialize)]
struct RegistryOutput<'a> {
    parent: Option<NodeId>,
    commands: Vec<CommandView<'a>>,
}

#[derive(Serialize)]
struct SavedOutput {
    item: NodeId,
    configuration: bool,
    cleared: usize,
}

fn run_evaluate(runtime: &Runtime, args: EvaluateArgs) -> Result<(), AppError> {
    let node = NodeId::parse(&args.node)?;
    if args.commands.iter().any(|command| command.trim().is_empty()) {
        return Err(AppError::validation("`--command` must not be blank"));
    }
    let decisions = args
        .commands
        .into_iter()
        .map(|command| {
            let visibility = runtime.engine.evaluate_visibility(&command, &node)?;
            Ok::<_, AppError>(Decision {
                command,
                visibility,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    print_json(&EvaluateOutput { node, decisions })
}

fn run_menu(runtime: &Runtime, args: MenuArgs) -> Result<(), AppError> {
    let node = NodeId::parse(&args.node)?;
    let commands = runtime.engine.evaluate_menu(&node)?;
    print_json(&MenuOutput { node, commands })
}

fn run_registry(runtime: &Runtime) -> Result<(), AppError> {
    let registry = runtime
        .engine
        .registry()?
        .ok_or(AppError::Domain(DomainError::not_found("commands parent")))?;

    let commands = registry
        .commands()
        .into_iter()
        .map(|definition| CommandView {
            definition,
            filters: definition
                .filter_refs
                .iter()
                .map(|id| FilterView {
                    id: *id,
                    config: registry.filter(id),
                })
                .collect(),
        })
        .collect();

    print_json(&RegistryOutput {
        parent: registry.parent(),
        commands,
    })
}

fn run_saved(runtime: &Runtime, args: SavedArgs) -> Result<(), AppError> {
    let item = NodeId::parse(&args.item)?;
    let saved = runtime
        .repository
        .get_item(&item)?
        .ok_or(AppError::Domain(DomainError::not_found("item")))?;

    // Warm the cache so the report reflects what a long-running host would drop.
    runtime.engine.registry()?;
    let configuration = runtime.listener.is_configuration(&saved);
    let cleared = runtime.listener.on_item_saved(Some(&saved));

    print_json(&SavedOutput {
        item,
        configuration,
        cleared,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let encoded = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{encoded}");
    Ok(())
}
