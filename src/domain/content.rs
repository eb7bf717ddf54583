//! Content nodes as handed out by a [`ContentRepository`](crate::application::repos::ContentRepository).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{NodeId, TemplateId};

/// Separator used by multi-value (multilist/treelist) reference fields.
pub const MULTI_VALUE_SEPARATOR: char = '|';

/// A content item snapshot: identity, position in the tree, schema and raw field values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub template: TemplateId,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ContentNode {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        parent: Option<NodeId>,
        template: TemplateId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            template,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Raw value of a field; missing fields read as the empty string.
    pub fn read_field(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// Node references stored in a multi-value field, in stored order.
    ///
    /// Segments that are not valid ids are skipped.
    pub fn read_multi_value_field(&self, field: &str) -> Vec<NodeId> {
        parse_references(self.read_field(field))
    }

    /// A single node reference stored in a link field.
    pub fn read_reference_field(&self, field: &str) -> Option<NodeId> {
        parse_references(self.read_field(field)).into_iter().next()
    }
}

fn parse_references(raw: &str) -> Vec<NodeId> {
    raw.split(MULTI_VALUE_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| match NodeId::parse(segment) {
            Ok(id) => Some(id),
            Err(err) => {
                debug!(segment, error = %err, "Skipping malformed field reference");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn node_with(field: &str, value: &str) -> ContentNode {
        ContentNode {
            id: NodeId::from_uuid(Uuid::new_v4()),
            name: "sample".to_string(),
            parent: None,
            template: TemplateId::from_uuid(Uuid::nil()),
            fields: BTreeMap::from([(field.to_string(), value.to_string())]),
        }
    }

    #[test]
    fn missing_field_reads_empty() {
        let node = node_with("Title", "x");
        assert_eq!(node.read_field("Command Name"), "");
        assert!(node.read_multi_value_field("Filters").is_empty());
    }

    #[test]
    fn multi_value_preserves_order_and_skips_garbage() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let raw = format!("{}|oops||{}", first.braced(), second);
        let node = node_with("Filters", &raw);

        assert_eq!(
            node.read_multi_value_field("Filters"),
            vec![NodeId::from_uuid(first), NodeId::from_uuid(second)]
        );
    }

    #[test]
    fn reference_field_takes_first_value() {
        let target = Uuid::new_v4();
        let node = node_with("Root Item", &target.braced().to_string());
        assert_eq!(
            node.read_reference_field("Root Item"),
            Some(NodeId::from_uuid(target))
        );
    }
}
