//! Builds command registries from the configuration folder in the content tree.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::repos::{ContentRepository, RepoError};
use crate::domain::commands::{CommandRegistry, as_command_definition};
use crate::domain::content::ContentNode;
use crate::domain::filters::{FilterConfig, FilterSchema, as_filter_config};
use crate::domain::types::{NodeId, TemplateId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("commands parent `{0}` could not be resolved")]
    ParentMissing(NodeId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Templates that identify configuration records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSchema {
    pub command: TemplateId,
    pub filters: FilterSchema,
}

impl From<&crate::config::CommandsSettings> for CommandSchema {
    fn from(settings: &crate::config::CommandsSettings) -> Self {
        Self {
            command: settings.command_template,
            filters: FilterSchema {
                generic: settings.generic_filter_template,
                hierarchy: settings.hierarchy_filter_template,
                template: settings.template_filter_template,
            },
        }
    }
}

#[derive(Clone)]
pub struct CommandRegistryLoader {
    repository: Arc<dyn ContentRepository>,
    schema: CommandSchema,
}

impl CommandRegistryLoader {
    pub fn new(repository: Arc<dyn ContentRepository>, schema: CommandSchema) -> Self {
        Self { repository, schema }
    }

    pub fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    /// Load the registry under `parent`, or `None` when the parent does not exist.
    pub fn load(&self, parent: &NodeId) -> Result<Option<CommandRegistry>, RepoError> {
        match self.repository.get_item(parent)? {
            Some(parent) => self.load_from(&parent).map(Some),
            None => {
                debug!(
                    target = "application::registry_loader::load",
                    parent = %parent,
                    "commands parent not found"
                );
                Ok(None)
            }
        }
    }

    /// Build the registry from the direct children of `parent`.
    ///
    /// Children that are not commands or carry no command text are skipped.
    /// When two children share a name the later one wins.
    pub fn load_from(&self, parent: &ContentNode) -> Result<CommandRegistry, RepoError> {
        let mut registry = CommandRegistry::new(parent.id);

        for child in self.repository.get_children(parent)? {
            if !self.repository.matches_template(&child, self.schema.command) {
                continue;
            }
            let Some(definition) = as_command_definition(&child) else {
                debug!(node = %child.id, "skipping command without command text");
                continue;
            };

            for filter_ref in &definition.filter_refs {
                if registry.filter(filter_ref).is_some() {
                    continue;
                }
                if let Some(config) = self.resolve_filter(filter_ref)? {
                    registry.insert_filter(*filter_ref, config);
                }
            }

            let name = definition.name.clone();
            let node = definition.node;
            if let Some(replaced) = registry.insert_command(definition) {
                warn!(
                    target = "application::registry_loader::load_from",
                    command = %name,
                    replaced = %replaced.node,
                    winner = %node,
                    "duplicate command name; later definition wins"
                );
            }
        }

        info!(
            target = "application::registry_loader::load_from",
            parent = %parent.id,
            commands = registry.len(),
            "loaded command registry"
        );
        Ok(registry)
    }

    /// Read the filter configuration stored on `node`, if it is a filter record.
    pub fn as_filter_config(&self, node: &ContentNode) -> Option<FilterConfig> {
        as_filter_config(node, &self.schema.filters, |template| {
            self.repository.matches_template(node, template)
        })
    }

    fn resolve_filter(&self, filter_ref: &NodeId) -> Result<Option<FilterConfig>, RepoError> {
        let Some(node) = self.repository.get_item(filter_ref)? else {
            debug!(filter = %filter_ref, "filter reference points to a missing node");
            return Ok(None);
        };
        let config = self.as_filter_config(&node);
        if config.is_none() {
            debug!(filter = %filter_ref, "filter reference is not a filter record");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::commands::{COMMAND_NAME_FIELD, FILTERS_FIELD};
    use crate::domain::filters::{ROOT_ITEM_FIELD, TYPE_FIELD};
    use crate::infra::content_store::{ContentDocument, MemoryRepository, TemplateDefinition};

    const FOLDER: u128 = 0x100;
    const COMMAND: u128 = 0x101;
    const GENERIC: u128 = 0x102;
    const HIERARCHY: u128 = 0x103;
    const TEMPLATE_FILTER: u128 = 0x104;

    fn template(id: u128) -> TemplateId {
        TemplateId::from_uuid(Uuid::from_u128(id))
    }

    fn id(id: u128) -> NodeId {
        NodeId::from_uuid(Uuid::from_u128(id))
    }

    fn schema() -> CommandSchema {
        CommandSchema {
            command: template(COMMAND),
            filters: FilterSchema {
                generic: template(GENERIC),
                hierarchy: template(HIERARCHY),
                template: template(TEMPLATE_FILTER),
            },
        }
    }

    fn command(node: u128, text: &str, filters: &[u128]) -> ContentNode {
        let refs: Vec<String> = filters.iter().map(|f| id(*f).to_string()).collect();
        ContentNode::new(id(node), format!("cmd-{node}"), Some(id(1)), template(COMMAND))
            .with_field(COMMAND_NAME_FIELD, text)
            .with_field(FILTERS_FIELD, refs.join("|"))
    }

    fn document() -> ContentDocument {
        ContentDocument::default()
            .with_template(TemplateDefinition::new(template(FOLDER), "Folder"))
            .with_template(TemplateDefinition::new(template(COMMAND), "Command"))
            .with_template(TemplateDefinition::new(template(GENERIC), "Filter"))
            .with_template(
                TemplateDefinition::new(template(HIERARCHY), "Hierarchy Filter")
                    .with_base(template(GENERIC)),
            )
            .with_template(
                TemplateDefinition::new(template(TEMPLATE_FILTER), "Template Filter")
                    .with_base(template(GENERIC)),
            )
            .with_item(ContentNode::new(id(1), "Commands", None, template(FOLDER)))
            .with_item(
                ContentNode::new(id(50), "Under Home", Some(id(1)), template(HIERARCHY))
                    .with_field(ROOT_ITEM_FIELD, id(1).to_string()),
            )
            .with_item(
                ContentNode::new(id(51), "Workflow", Some(id(1)), template(GENERIC))
                    .with_field(TYPE_FIELD, "workflow"),
            )
    }

    fn loader(document: ContentDocument) -> CommandRegistryLoader {
        let repo = MemoryRepository::from_document(document).expect("valid document");
        CommandRegistryLoader::new(Arc::new(repo), schema())
    }

    #[test]
    fn loads_commands_and_their_filters() {
        let loader = loader(
            document()
                .with_item(command(10, "item:Edit(id=$Target)", &[50, 51]))
                .with_item(command(11, "item:delete", &[])),
        );

        let registry = loader.load(&id(1)).expect("load").expect("parent exists");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.parent(), Some(id(1)));

        let edit = registry.command("ITEM:EDIT").expect("edit registered");
        assert_eq!(edit.filter_refs, vec![id(50), id(51)]);
        assert_eq!(registry.filter(&id(50)).map(FilterConfig::kind), Some("hierarchy"));
        assert_eq!(registry.filter(&id(51)).map(FilterConfig::kind), Some("workflow"));
    }

    #[test]
    fn skips_non_commands_and_empty_command_text() {
        let loader = loader(
            document()
                .with_item(command(10, "", &[]))
                .with_item(command(11, "item:open", &[])),
        );

        let registry = loader.load(&id(1)).expect("load").expect("parent exists");
        let names: Vec<&str> = registry.commands().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["item:open"]);
    }

    #[test]
    fn duplicate_names_keep_the_later_definition() {
        let loader = loader(
            document()
                .with_item(command(10, "item:edit", &[50]))
                .with_item(command(11, "Item:Edit(x)", &[])),
        );

        let registry = loader.load(&id(1)).expect("load").expect("parent exists");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.command("item:edit").map(|c| c.node), Some(id(11)));
    }

    #[test]
    fn dangling_filter_refs_are_left_unresolved() {
        let loader = loader(document().with_item(command(10, "item:edit", &[999])));

        let registry = loader.load(&id(1)).expect("load").expect("parent exists");
        assert!(registry.filter(&id(999)).is_none());
        assert_eq!(
            registry.command("item:edit").map(|c| c.filter_refs.clone()),
            Some(vec![id(999)])
        );
    }

    #[test]
    fn missing_parent_loads_nothing() {
        let loader = loader(document());
        assert!(loader.load(&id(404)).expect("load").is_none());
    }

    #[test]
    fn empty_parent_loads_an_empty_registry() {
        let loader = loader(document());
        let registry = loader.load(&id(50)).expect("load").expect("parent exists");
        assert!(registry.is_empty());
    }
}
