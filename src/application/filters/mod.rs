//! Filter strategies and the startup table that maps filter kinds to them.

mod hierarchy;
mod template;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::application::repos::ContentRepository;
use crate::domain::content::ContentNode;
use crate::domain::filters::{FilterConfig, HIERARCHY_KIND, TEMPLATE_KIND};

pub use hierarchy::HierarchyFilter;
pub use template::TemplateFilter;

/// Inputs and output of a single filter invocation.
pub struct VisibilityContext<'a> {
    pub selected_node: &'a ContentNode,
    pub filter: &'a FilterConfig,
    pub repository: &'a dyn ContentRepository,
    /// Set by the strategy; starts out `false`.
    pub hide: bool,
}

impl<'a> VisibilityContext<'a> {
    pub fn new(
        selected_node: &'a ContentNode,
        filter: &'a FilterConfig,
        repository: &'a dyn ContentRepository,
    ) -> Self {
        Self {
            selected_node,
            filter,
            repository,
            hide: false,
        }
    }
}

/// A visibility rule. Implementations only ever change `context.hide`.
pub trait FilterStrategy: Send + Sync {
    fn evaluate(&self, context: &mut VisibilityContext<'_>);
}

type StrategyConstructor = Box<dyn Fn() -> Arc<dyn FilterStrategy> + Send + Sync>;

/// Maps filter kinds (case-insensitive) to strategy constructors.
pub struct StrategyTable {
    constructors: HashMap<String, StrategyConstructor>,
}

impl StrategyTable {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Table with the hierarchy and template strategies registered.
    pub fn with_builtin() -> Self {
        let mut table = Self::empty();
        table
            .register(HIERARCHY_KIND, || Arc::new(HierarchyFilter))
            .register(TEMPLATE_KIND, || Arc::new(TemplateFilter));
        table
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl AsRef<str>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn FilterStrategy> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.as_ref().to_ascii_lowercase(), Box::new(constructor));
        self
    }

    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn FilterStrategy>> {
        self.constructors
            .get(&kind.to_ascii_lowercase())
            .map(|constructor| constructor())
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for StrategyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHide;

    impl FilterStrategy for AlwaysHide {
        fn evaluate(&self, context: &mut VisibilityContext<'_>) {
            context.hide = true;
        }
    }

    #[test]
    fn builtin_kinds_are_registered() {
        let table = StrategyTable::with_builtin();
        assert_eq!(table.kinds(), vec!["hierarchy", "template"]);
        assert!(table.resolve("Template").is_some());
        assert!(table.resolve("workflow").is_none());
    }

    #[test]
    fn custom_kinds_can_be_registered() {
        let mut table = StrategyTable::empty();
        table.register("Always-Hide", || Arc::new(AlwaysHide));
        assert!(table.resolve("always-hide").is_some());
        assert!(table.resolve("hierarchy").is_none());
    }
}
