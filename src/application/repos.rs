//! Repository traits describing the content store the engine reads from.

use thiserror::Error;

use crate::domain::content::ContentNode;
use crate::domain::types::{NodeId, TemplateId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Read access to the content tree and its template model.
///
/// Calls are synchronous and may block on I/O.
pub trait ContentRepository: Send + Sync {
    fn get_item(&self, id: &NodeId) -> Result<Option<ContentNode>, RepoError>;

    /// Direct children of `node`, in tree order.
    fn get_children(&self, node: &ContentNode) -> Result<Vec<ContentNode>, RepoError>;

    /// True when `node` is `ancestor` or lies below it.
    fn is_descendant_of(&self, node: &ContentNode, ancestor: &ContentNode) -> bool;

    /// True when `node` is an instance of `template`, searching at most
    /// `max_depth` levels of base templates above the node's own template.
    fn matches_template_within(
        &self,
        node: &ContentNode,
        template: TemplateId,
        max_depth: usize,
    ) -> bool;

    /// True when `node` is an instance of `template` or of a template inheriting it.
    fn matches_template(&self, node: &ContentNode, template: TemplateId) -> bool {
        self.matches_template_within(node, template, usize::MAX)
    }
}
