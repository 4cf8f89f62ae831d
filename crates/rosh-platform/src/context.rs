//! The active query context.
//!
//! Everything that reads network state goes through one shared slot. Switching
//! namespace swaps the whole reference, so a reader holds either the old or the
//! new query for as long as it needs it, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::services::NetworkQuery;

pub struct QueryContext {
    current: ArcSwap<Arc<dyn NetworkQuery>>,
}

impl QueryContext {
    pub fn new(query: Arc<dyn NetworkQuery>) -> Self {
        Self {
            current: ArcSwap::from_pointee(query),
        }
    }

    /// Snapshot of the active query.
    pub fn current(&self) -> Arc<dyn NetworkQuery> {
        let guard = self.current.load();
        Arc::clone(&**guard)
    }

    /// Install a new query, returning the previous one.
    pub fn replace(&self, query: Arc<dyn NetworkQuery>) -> Arc<dyn NetworkQuery> {
        log::debug!(
            "query context switched to namespace {:?}",
            query.namespace()
        );
        Arc::unwrap_or_clone(self.current.swap(Arc::new(query)))
    }

    pub fn namespace(&self) -> Option<String> {
        self.current().namespace().map(str::to_string)
    }
}
