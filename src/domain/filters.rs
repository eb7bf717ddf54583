//! Filter configuration records attached to commands.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::content::ContentNode;
use super::types::{NodeId, TemplateId};

/// Field naming the strategy kind on generic filter records.
pub const TYPE_FIELD: &str = "Type";
pub const ROOT_ITEM_FIELD: &str = "Root Item";
pub const INCLUDE_TEMPLATES_FIELD: &str = "Include Templates";
pub const EXCLUDE_TEMPLATES_FIELD: &str = "Exclude Templates";

pub const HIERARCHY_KIND: &str = "hierarchy";
pub const TEMPLATE_KIND: &str = "template";

/// Templates identifying filter records in the content tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterSchema {
    /// Base template of every filter record.
    pub generic: TemplateId,
    pub hierarchy: TemplateId,
    pub template: TemplateId,
}

/// Hide commands for nodes outside the subtree rooted at `root`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HierarchyFilterConfig {
    pub root: Option<NodeId>,
}

/// Show or hide commands depending on the selected node's template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TemplateFilterConfig {
    pub include: BTreeSet<TemplateId>,
    pub exclude: BTreeSet<TemplateId>,
}

/// A filter whose strategy is registered by the host under `kind`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomFilterConfig {
    pub kind: String,
    pub node: NodeId,
    pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterConfig {
    Hierarchy(HierarchyFilterConfig),
    Template(TemplateFilterConfig),
    Custom(CustomFilterConfig),
}

impl FilterConfig {
    /// Tag used to look up the strategy that evaluates this configuration.
    pub fn kind(&self) -> &str {
        match self {
            FilterConfig::Hierarchy(_) => HIERARCHY_KIND,
            FilterConfig::Template(_) => TEMPLATE_KIND,
            FilterConfig::Custom(custom) => custom.kind.as_str(),
        }
    }
}

/// Read a filter configuration from a node.
///
/// `is_of` answers whether the node is an instance of a template, including
/// inherited templates. Concrete filter templates win over the `Type` field of
/// the generic filter template. Returns `None` for nodes that are not filters
/// or generic filters without a type.
pub fn as_filter_config(
    node: &ContentNode,
    schema: &FilterSchema,
    is_of: impl Fn(TemplateId) -> bool,
) -> Option<FilterConfig> {
    if is_of(schema.hierarchy) {
        return Some(FilterConfig::Hierarchy(read_hierarchy(node)));
    }
    if is_of(schema.template) {
        return Some(FilterConfig::Template(read_template(node)));
    }
    if !is_of(schema.generic) {
        return None;
    }

    match node.read_field(TYPE_FIELD).trim() {
        "" => None,
        kind if kind.eq_ignore_ascii_case(HIERARCHY_KIND) => {
            Some(FilterConfig::Hierarchy(read_hierarchy(node)))
        }
        kind if kind.eq_ignore_ascii_case(TEMPLATE_KIND) => {
            Some(FilterConfig::Template(read_template(node)))
        }
        kind => Some(FilterConfig::Custom(CustomFilterConfig {
            kind: kind.to_string(),
            node: node.id,
            fields: node.fields.clone(),
        })),
    }
}

fn read_hierarchy(node: &ContentNode) -> HierarchyFilterConfig {
    HierarchyFilterConfig {
        root: node.read_reference_field(ROOT_ITEM_FIELD),
    }
}

fn read_template(node: &ContentNode) -> TemplateFilterConfig {
    let templates = |field: &str| -> BTreeSet<TemplateId> {
        node.read_multi_value_field(field)
            .into_iter()
            .map(|id| TemplateId::from_uuid(*id.as_uuid()))
            .collect()
    };

    TemplateFilterConfig {
        include: templates(INCLUDE_TEMPLATES_FIELD),
        exclude: templates(EXCLUDE_TEMPLATES_FIELD),
    }
}
