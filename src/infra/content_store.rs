//! In-memory content tree loaded from a TOML document.
//!
//! ```toml
//! [[templates]]
//! id = "{AEE09A03-6B16-4731-BD16-E158AF6209BF}"
//! name = "Command"
//! base_templates = []
//!
//! [[items]]
//! id = "{...}"
//! name = "Edit"
//! parent = "{...}"
//! template = "{AEE09A03-6B16-4731-BD16-E158AF6209BF}"
//!
//! [items.fields]
//! "Command Name" = "item:edit(id=$Target)"
//! "Filters" = "{...}|{...}"
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::repos::{ContentRepository, RepoError};
use crate::domain::content::ContentNode;
use crate::domain::types::{NodeId, TemplateId};

use super::error::InfraError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: TemplateId,
    pub name: String,
    /// Direct base templates, nearest first.
    #[serde(default)]
    pub base_templates: Vec<TemplateId>,
}

impl TemplateDefinition {
    pub fn new(id: TemplateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_templates: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: TemplateId) -> Self {
        self.base_templates.push(base);
        self
    }
}

/// Serialized form of a content tree. Items are listed in tree order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDocument {
    #[serde(default)]
    pub templates: Vec<TemplateDefinition>,
    #[serde(default)]
    pub items: Vec<ContentNode>,
}

impl ContentDocument {
    pub fn from_toml_str(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw)
            .map_err(|err| InfraError::content_store(format!("invalid content document: {err}")))
    }

    pub fn with_template(mut self, template: TemplateDefinition) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_item(mut self, item: ContentNode) -> Self {
        self.items.push(item);
        self
    }
}

/// Read-only [`ContentRepository`] over a validated [`ContentDocument`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: HashMap<NodeId, ContentNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    templates: HashMap<TemplateId, TemplateDefinition>,
}

impl MemoryRepository {
    /// Build the tree, rejecting duplicate ids, dangling parents and parent cycles.
    pub fn from_document(document: ContentDocument) -> Result<Self, InfraError> {
        let mut templates = HashMap::with_capacity(document.templates.len());
        for template in document.templates {
            let id = template.id;
            if templates.insert(id, template).is_some() {
                return Err(InfraError::content_store(format!(
                    "duplicate template id `{id}`"
                )));
            }
        }

        let mut items = HashMap::with_capacity(document.items.len());
        let mut order = Vec::with_capacity(document.items.len());
        for item in document.items {
            let id = item.id;
            order.push(id);
            if items.insert(id, item).is_some() {
                return Err(InfraError::content_store(format!("duplicate item id `{id}`")));
            }
        }

        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in &order {
            let Some(parent) = items.get(id).and_then(|item| item.parent) else {
                continue;
            };
            if !items.contains_key(&parent) {
                return Err(InfraError::content_store(format!(
                    "item `{id}` references missing parent `{parent}`"
                )));
            }
            children.entry(parent).or_default().push(*id);
        }

        let repository = Self {
            items,
            children,
            templates,
        };
        repository.ensure_acyclic(&order)?;
        Ok(repository)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, InfraError> {
        Self::from_document(ContentDocument::from_toml_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = fs::read_to_string(path)?;
        let repository = Self::from_toml_str(&raw)?;
        info!(
            target = "infra::content_store::load",
            path = %path.display(),
            items = repository.len(),
            templates = repository.templates.len(),
            "loaded content tree"
        );
        Ok(repository)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn template(&self, id: &TemplateId) -> Option<&TemplateDefinition> {
        self.templates.get(id)
    }

    fn ensure_acyclic(&self, order: &[NodeId]) -> Result<(), InfraError> {
        for id in order {
            let mut current = self.items.get(id).and_then(|item| item.parent);
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if parent == *id || steps > self.items.len() {
                    return Err(InfraError::content_store(format!(
                        "item `{id}` is its own ancestor"
                    )));
                }
                current = self.items.get(&parent).and_then(|item| item.parent);
            }
        }
        Ok(())
    }
}

impl ContentRepository for MemoryRepository {
    fn get_item(&self, id: &NodeId) -> Result<Option<ContentNode>, RepoError> {
        Ok(self.items.get(id).cloned())
    }

    fn get_children(&self, node: &ContentNode) -> Result<Vec<ContentNode>, RepoError> {
        let Some(children) = self.children.get(&node.id) else {
            return Ok(Vec::new());
        };
        children
            .iter()
            .map(|id| {
                self.items.get(id).cloned().ok_or_else(|| {
                    RepoError::integrity(format!("child `{id}` of `{}` is missing", node.id))
                })
            })
            .collect()
    }

    fn is_descendant_of(&self, node: &ContentNode, ancestor: &ContentNode) -> bool {
        if node.id == ancestor.id {
            return true;
        }
        let mut current = node.parent;
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor.id {
                return true;
            }
            steps += 1;
            if steps > self.items.len() {
                return false;
            }
            current = self.items.get(&id).and_then(|item| item.parent);
        }
        false
    }

    fn matches_template_within(
        &self,
        node: &ContentNode,
        template: TemplateId,
        max_depth: usize,
    ) -> bool {
        let mut visited = HashSet::from([node.template]);
        let mut frontier = vec![node.template];
        let mut depth = 0;

        loop {
            if frontier.contains(&template) {
                return true;
            }
            if depth == max_depth {
                return false;
            }

            let next: Vec<TemplateId> = frontier
                .iter()
                .filter_map(|id| self.templates.get(id))
                .flat_map(|definition| definition.base_templates.iter().copied())
                .filter(|base| visited.insert(*base))
                .collect();
            if next.is_empty() {
                return false;
            }
            frontier = next;
            depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn node_id(id: u128) -> NodeId {
        NodeId::from_uuid(Uuid::from_u128(id))
    }

    fn template(id: u128) -> TemplateId {
        TemplateId::from_uuid(Uuid::from_u128(id))
    }

    const DOCUMENT: &str = r#"
[[templates]]
id = "{00000000-0000-0000-0000-0000000000a1}"
name = "Base"

[[templates]]
id = "{00000000-0000-0000-0000-0000000000a2}"
name = "Derived"
base_templates = ["00000000-0000-0000-0000-0000000000a1"]

[[items]]
id = "{00000000-0000-0000-0000-000000000001}"
name = "root"
template = "{00000000-0000-0000-0000-0000000000a1}"

[[items]]
id = "{00000000-0000-0000-0000-000000000002}"
name = "child"
parent = "{00000000-0000-0000-0000-000000000001}"
template = "{00000000-0000-0000-0000-0000000000a2}"

[items.fields]
"Command Name" = "item:edit"

[[items]]
id = "{00000000-0000-0000-0000-000000000003}"
name = "sibling"
parent = "{00000000-0000-0000-0000-000000000001}"
template = "{00000000-0000-0000-0000-0000000000a1}"
"#;

    #[test]
    fn parses_the_toml_layout() {
        let repo = MemoryRepository::from_toml_str(DOCUMENT).expect("valid document");
        assert_eq!(repo.len(), 3);

        let child = repo.get_item(&node_id(2)).expect("lookup").expect("child");
        assert_eq!(child.read_field("Command Name"), "item:edit");
        assert_eq!(
            repo.template(&template(0xa2)).map(|t| t.name.as_str()),
            Some("Derived")
        );
    }

    #[test]
    fn children_keep_document_order() {
        let repo = MemoryRepository::from_toml_str(DOCUMENT).expect("valid document");
        let root = repo.get_item(&node_id(1)).expect("lookup").expect("root");
        let names: Vec<String> = repo
            .get_children(&root)
            .expect("children")
            .into_iter()
            .map(|child| child.name)
            .collect();
        assert_eq!(names, vec!["child", "sibling"]);
    }

    #[test]
    fn descendants_include_self() {
        let repo = MemoryRepository::from_toml_str(DOCUMENT).expect("valid document");
        let root = repo.get_item(&node_id(1)).expect("lookup").expect("root");
        let child = repo.get_item(&node_id(2)).expect("lookup").expect("child");

        assert!(repo.is_descendant_of(&child, &root));
        assert!(repo.is_descendant_of(&root, &root));
        assert!(!repo.is_descendant_of(&root, &child));
    }

    #[test]
    fn template_matching_follows_inheritance() {
        let repo = MemoryRepository::from_toml_str(DOCUMENT).expect("valid document");
        let child = repo.get_item(&node_id(2)).expect("lookup").expect("child");

        assert!(repo.matches_template(&child, template(0xa2)));
        assert!(repo.matches_template(&child, template(0xa1)));
        assert!(!repo.matches_template_within(&child, template(0xa1), 0));
        assert!(!repo.matches_template(&child, template(0xff)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let node = ContentNode::new(node_id(1), "a", None, template(1));
        let document = ContentDocument::default()
            .with_item(node.clone())
            .with_item(node);
        let err = MemoryRepository::from_document(document).expect_err("duplicate id");
        assert!(matches!(err, InfraError::ContentStore { .. }));
    }

    #[test]
    fn rejects_missing_parents() {
        let document = ContentDocument::default().with_item(ContentNode::new(
            node_id(1),
            "orphan",
            Some(node_id(9)),
            template(1),
        ));
        assert!(MemoryRepository::from_document(document).is_err());
    }

    #[test]
    fn rejects_parent_cycles() {
        let document = ContentDocument::default()
            .with_item(ContentNode::new(node_id(1), "a", Some(node_id(2)), template(1)))
            .with_item(ContentNode::new(node_id(2), "b", Some(node_id(1)), template(1)));
        assert!(MemoryRepository::from_document(document).is_err());
    }

    #[test]
    fn malformed_toml_is_a_content_store_error() {
        let err = MemoryRepository::from_toml_str("[[items]]\nid = 5").expect_err("bad toml");
        assert!(matches!(err, InfraError::ContentStore { .. }));
    }
}
