//! Save hook that drops cached registries when configuration changes.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::registry_loader::CommandSchema;
use crate::application::repos::ContentRepository;
use crate::cache::NamespacedCache;
use crate::domain::content::ContentNode;

/// Inheritance levels searched when deciding whether a saved node is a filter record.
pub const FILTER_TEMPLATE_DEPTH: usize = 2;

pub struct InvalidationListener {
    cache: Arc<NamespacedCache>,
    repository: Arc<dyn ContentRepository>,
    schema: CommandSchema,
}

impl InvalidationListener {
    pub fn new(
        cache: Arc<NamespacedCache>,
        repository: Arc<dyn ContentRepository>,
        schema: CommandSchema,
    ) -> Self {
        Self {
            cache,
            repository,
            schema,
        }
    }

    /// True for command records and for filter records.
    pub fn is_configuration(&self, node: &ContentNode) -> bool {
        self.repository.matches_template(node, self.schema.command)
            || self.repository.matches_template_within(
                node,
                self.schema.filters.generic,
                FILTER_TEMPLATE_DEPTH,
            )
    }

    /// Handle a saved node. Returns how many cache entries were cleared.
    pub fn on_item_saved(&self, saved: Option<&ContentNode>) -> usize {
        let Some(node) = saved else {
            return 0;
        };
        if !self.is_configuration(node) {
            debug!(node = %node.id, "saved node is not configuration; cache kept");
            return 0;
        }

        let cleared = self.cache.clear_all();
        info!(
            target = "application::invalidation::on_item_saved",
            node = %node.id,
            name = %node.name,
            cleared,
            "configuration saved; command registries invalidated"
        );
        cleared
    }
}
