use tracing::debug;

use super::{FilterStrategy, VisibilityContext};
use crate::domain::filters::FilterConfig;

/// Shows or hides the command based on the selected node's template.
///
/// Exclusions win. A non-empty include list acts as an allow-list; with no
/// include list the command stays visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateFilter;

impl FilterStrategy for TemplateFilter {
    fn evaluate(&self, context: &mut VisibilityContext<'_>) {
        let FilterConfig::Template(config) = context.filter else {
            debug!(kind = context.filter.kind(), "Template filter given another filter kind");
            return;
        };
        let repository = context.repository;
        let node = context.selected_node;
        let matches = |template| repository.matches_template(node, template);

        if config.exclude.iter().copied().any(matches) {
            context.hide = true;
            return;
        }
        if config.include.is_empty() {
            context.hide = false;
            return;
        }
        context.hide = !config.include.iter().copied().any(matches);
    }
}
