//! Shared, atomically replaceable rule set.

use crate::rollup::rules::Rules;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Handle to the current rule set.
///
/// Readers take a snapshot with [`RulesHandle::load`] and keep using it for
/// the whole call; a concurrent [`RulesHandle::store`] never exposes a half
/// replaced rule set.
#[derive(Debug, Clone)]
pub struct RulesHandle {
    inner: Arc<ArcSwap<Rules>>,
}

impl RulesHandle {
    pub fn new(rules: Rules) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(rules)),
        }
    }

    /// Snapshot of the current rule set
    pub fn load(&self) -> Arc<Rules> {
        self.inner.load_full()
    }

    /// Replace the rule set, returning the previous one.
    pub fn store(&self, rules: Rules) -> Arc<Rules> {
        let rules = Arc::new(rules);
        let patterns = rules.patterns().len();
        let previous = self.inner.swap(rules);
        tracing::info!(
            patterns,
            previous_updated = previous.updated(),
            "Rollup rules replaced"
        );
        previous
    }
}
