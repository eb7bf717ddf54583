//! Filter-chain evaluation: decides whether a command is shown for a selected node.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::filters::{StrategyTable, VisibilityContext};
use crate::application::registry_loader::{CommandRegistryLoader, CommandSchema, RegistryError};
use crate::application::repos::ContentRepository;
use crate::cache::NamespacedCache;
use crate::domain::commands::{CommandRegistry, Visibility, normalize_command_name};
use crate::domain::content::ContentNode;
use crate::domain::types::NodeId;

const METRIC_VISIBILITY_TOTAL: &str = "contextualizer_visibility_total";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load command registry: {0}")]
    Registry(#[from] RegistryError),
}

/// A render request: the command being drawn and the nodes it applies to.
///
/// The first item is the selected node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandContext {
    pub command_name: String,
    pub items: Vec<NodeId>,
}

impl CommandContext {
    pub fn new(command_name: impl Into<String>, items: Vec<NodeId>) -> Self {
        Self {
            command_name: command_name.into(),
            items,
        }
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.items.first()
    }
}

/// Visibility of one registered command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub command: String,
    pub command_text: String,
    pub visibility: Visibility,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Folder holding the command configuration records.
    pub commands_parent: NodeId,
    /// Lifetime of a cached registry; zero keeps it until invalidated.
    pub registry_ttl: Duration,
}

pub struct FilterChainEngine {
    repository: Arc<dyn ContentRepository>,
    cache: Arc<NamespacedCache>,
    loader: CommandRegistryLoader,
    strategies: StrategyTable,
    settings: EngineSettings,
}

impl FilterChainEngine {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        cache: Arc<NamespacedCache>,
        schema: CommandSchema,
        strategies: StrategyTable,
        settings: EngineSettings,
    ) -> Self {
        let loader = CommandRegistryLoader::new(repository.clone(), schema);
        Self {
            repository,
            cache,
            loader,
            strategies,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<NamespacedCache> {
        &self.cache
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Host entry point. A missing context or an empty selection shows the command.
    pub fn evaluate(&self, context: Option<&CommandContext>) -> Result<Visibility, EngineError> {
        let Some(context) = context else {
            debug!("no command context; showing command");
            return Ok(Visibility::Visible);
        };
        let Some(selected) = context.selected() else {
            debug!(command = %context.command_name, "no selected item; showing command");
            return Ok(Visibility::Visible);
        };
        self.evaluate_visibility(&context.command_name, selected)
    }

    /// Decide whether `command_name` is shown for `selected`.
    ///
    /// Filters run in configured order and the first one that hides wins.
    /// Anything that cannot be resolved leaves the command visible; only a
    /// failing registry load is reported as an error.
    pub fn evaluate_visibility(
        &self,
        command_name: &str,
        selected: &NodeId,
    ) -> Result<Visibility, EngineError> {
        let Some(registry) = self.registry()? else {
            return Ok(self.record(command_name, Visibility::Visible));
        };
        let visibility = self.decide(&registry, command_name, selected);
        Ok(self.record(command_name, visibility))
    }

    /// Visibility of every registered command for `selected`, sorted by command name.
    pub fn evaluate_menu(&self, selected: &NodeId) -> Result<Vec<MenuEntry>, EngineError> {
        let Some(registry) = self.registry()? else {
            return Ok(Vec::new());
        };

        Ok(registry
            .commands()
            .into_iter()
            .map(|definition| {
                let visibility = self.decide(&registry, &definition.name, selected);
                MenuEntry {
                    command: definition.name.clone(),
                    command_text: definition.command_text.clone(),
                    visibility: self.record(&definition.name, visibility),
                }
            })
            .collect())
    }

    /// The command registry, served from the cache and loaded on a miss.
    ///
    /// `None` when the commands parent cannot be resolved.
    pub fn registry(&self) -> Result<Option<Arc<CommandRegistry>>, EngineError> {
        let parent_id = self.settings.commands_parent;
        let parent = match self.repository.get_item(&parent_id) {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                debug!(parent = %parent_id, "commands parent not found");
                return Ok(None);
            }
            Err(err) => {
                warn!(parent = %parent_id, error = %err, "failed to resolve commands parent");
                return Ok(None);
            }
        };

        let loaded = self.cache.get_with_args(
            &parent.name,
            self.settings.registry_ttl,
            |parent: &ContentNode| {
                self.loader
                    .load(&parent.id)?
                    .map(Arc::new)
                    .ok_or(RegistryError::ParentMissing(parent.id))
            },
            &parent,
        );

        match loaded {
            Ok(registry) => Ok(Some(registry)),
            Err(RegistryError::ParentMissing(parent)) => {
                debug!(parent = %parent, "commands parent disappeared while loading");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drop every cached registry. Returns the number of entries removed.
    pub fn invalidate(&self) -> usize {
        self.cache.clear_all()
    }

    fn decide(
        &self,
        registry: &CommandRegistry,
        command_name: &str,
        selected: &NodeId,
    ) -> Visibility {
        if normalize_command_name(command_name).is_empty() {
            debug!("empty command name; showing command");
            return Visibility::Visible;
        }
        let Some(definition) = registry.command(command_name) else {
            debug!(command = command_name, "command not registered");
            return Visibility::Visible;
        };
        if definition.filter_refs.is_empty() {
            return Visibility::Visible;
        }

        let selected_node = match self.repository.get_item(selected) {
            Ok(Some(node)) => node,
            Ok(None) => {
                debug!(node = %selected, "selected node not found");
                return Visibility::Visible;
            }
            Err(err) => {
                warn!(node = %selected, error = %err, "failed to resolve selected node");
                return Visibility::Visible;
            }
        };

        for filter_ref in &definition.filter_refs {
            let Some(config) = registry.filter(filter_ref) else {
                debug!(
                    command = %definition.name,
                    filter = %filter_ref,
                    "skipping unresolved filter reference"
                );
                continue;
            };
            let Some(strategy) = self.strategies.resolve(config.kind()) else {
                warn!(
                    command = %definition.name,
                    filter = %filter_ref,
                    kind = config.kind(),
                    "no strategy registered for filter kind; skipping"
                );
                continue;
            };

            let mut context =
                VisibilityContext::new(&selected_node, config, self.repository.as_ref());
            strategy.evaluate(&mut context);
            debug!(
                command = %definition.name,
                filter = %filter_ref,
                kind = config.kind(),
                hide = context.hide,
                "evaluated filter"
            );
            if context.hide {
                return Visibility::Hidden;
            }
        }

        Visibility::Visible
    }

    fn record(&self, command_name: &str, visibility: Visibility) -> Visibility {
        counter!(METRIC_VISIBILITY_TOTAL, "decision" => visibility.as_str()).increment(1);
        debug!(
            command = command_name,
            decision = visibility.as_str(),
            "visibility decided"
        );
        visibility
    }
}
