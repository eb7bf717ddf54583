//! Command definitions and the registry snapshot built from the commands folder.

use std::collections::HashMap;

use serde::Serialize;

use super::content::ContentNode;
use super::filters::FilterConfig;
use super::types::NodeId;

/// Field holding the raw command text, e.g. `item:addfromtemplate(id=$Target)`.
pub const COMMAND_NAME_FIELD: &str = "Command Name";
/// Multi-value field holding the ordered filter references of a command.
pub const FILTERS_FIELD: &str = "Filters";

/// Render state decided for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        }
    }

    pub fn is_hidden(self) -> bool {
        matches!(self, Visibility::Hidden)
    }
}

/// A configured command and the filters attached to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    /// The configuration node this definition was read from.
    pub node: NodeId,
    /// Normalized lookup key (lower-case, parameters stripped).
    pub name: String,
    /// Command text as configured.
    pub command_text: String,
    /// Filter references in configured order.
    pub filter_refs: Vec<NodeId>,
}

/// Derive the lookup key for raw command text.
///
/// Everything from the first `(` on is parameter syntax and is dropped; the
/// rest is trimmed and lower-cased.
pub fn normalize_command_name(raw: &str) -> String {
    let name = match raw.find('(') {
        Some(index) => &raw[..index],
        None => raw,
    };
    name.trim().to_lowercase()
}

/// Read a command definition from a node already known to be of the command schema.
///
/// Returns `None` when the node carries no command text.
pub fn as_command_definition(node: &ContentNode) -> Option<CommandDefinition> {
    let command_text = node.read_field(COMMAND_NAME_FIELD);
    if command_text.is_empty() {
        return None;
    }

    let name = normalize_command_name(command_text);
    if name.is_empty() {
        return None;
    }

    Some(CommandDefinition {
        node: node.id,
        name,
        command_text: command_text.to_string(),
        filter_refs: node.read_multi_value_field(FILTERS_FIELD),
    })
}

/// Immutable snapshot of the commands known under one parent folder.
///
/// Filter configurations referenced by the commands are resolved while the
/// snapshot is built and owned by it.
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    parent: Option<NodeId>,
    commands: HashMap<String, CommandDefinition>,
    filters: HashMap<NodeId, FilterConfig>,
}

impl CommandRegistry {
    pub fn new(parent: NodeId) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Add a command, returning the definition it replaced under the same name.
    pub fn insert_command(&mut self, definition: CommandDefinition) -> Option<CommandDefinition> {
        self.commands.insert(definition.name.clone(), definition)
    }

    pub fn insert_filter(&mut self, node: NodeId, config: FilterConfig) {
        self.filters.insert(node, config);
    }

    /// Look up a command by its incoming name (matched case-insensitively).
    pub fn command(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(&normalize_command_name(name))
    }

    pub fn filter(&self, node: &NodeId) -> Option<&FilterConfig> {
        self.filters.get(node)
    }

    /// Commands sorted by name.
    pub fn commands(&self) -> Vec<&CommandDefinition> {
        let mut commands: Vec<_> = self.commands.values().collect();
        commands.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;
    use crate::domain::types::TemplateId;

    fn command_node(text: &str) -> ContentNode {
        ContentNode {
            id: NodeId::from_uuid(Uuid::new_v4()),
            name: "cmd".to_string(),
            parent: None,
            template: TemplateId::from_uuid(Uuid::nil()),
            fields: BTreeMap::from([(COMMAND_NAME_FIELD.to_string(), text.to_string())]),
        }
    }

    #[test]
    fn strips_parameter_suffix() {
        assert_eq!(
            normalize_command_name("contextmenu:addfromtemplate(template=foo)"),
            "contextmenu:addfromtemplate"
        );
    }

    #[test]
    fn lower_cases_plain_names() {
        assert_eq!(normalize_command_name("Item:Delete"), "item:delete");
    }

    #[test]
    fn empty_command_text_is_not_a_command() {
        assert!(as_command_definition(&command_node("")).is_none());
        assert!(as_command_definition(&command_node("(id=1)")).is_none());
    }

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let node = command_node("Item:Edit(id=$Target)");
        let definition = as_command_definition(&node).expect("definition");
        let mut registry = CommandRegistry::new(NodeId::from_uuid(Uuid::new_v4()));
        assert!(registry.insert_command(definition).is_none());

        let found = registry.command("ITEM:EDIT").expect("case-insensitive hit");
        assert_eq!(found.command_text, "Item:Edit(id=$Target)");
        assert!(registry.command("item:delete").is_none());
    }

    #[test]
    fn insert_reports_replaced_definition() {
        let mut registry = CommandRegistry::default();
        let first = as_command_definition(&command_node("edit")).expect("first");
        let second = as_command_definition(&command_node("EDIT(x=1)")).expect("second");
        let second_node = second.node;

        registry.insert_command(first.clone());
        let replaced = registry.insert_command(second).expect("duplicate replaced");
        assert_eq!(replaced.node, first.node);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.command("edit").map(|c| c.node), Some(second_node));
    }
}
