use tracing::{debug, warn};

use super::{FilterStrategy, VisibilityContext};
use crate::domain::filters::FilterConfig;

/// Hides the command unless the selected node lies at or below the filter's root.
///
/// Fails open: a missing or unresolvable root leaves the command visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchyFilter;

impl FilterStrategy for HierarchyFilter {
    fn evaluate(&self, context: &mut VisibilityContext<'_>) {
        let FilterConfig::Hierarchy(config) = context.filter else {
            debug!(kind = context.filter.kind(), "Hierarchy filter given another filter kind");
            return;
        };
        let Some(root_id) = config.root else {
            debug!("Hierarchy filter has no root item");
            return;
        };

        let root = match context.repository.get_item(&root_id) {
            Ok(Some(root)) => root,
            Ok(None) => {
                debug!(root = %root_id, "Hierarchy filter root does not exist");
                return;
            }
            Err(err) => {
                warn!(root = %root_id, error = %err, "Failed to resolve hierarchy filter root");
                return;
            }
        };

        context.hide = !context
            .repository
            .is_descendant_of(context.selected_node, &root);
    }
}
