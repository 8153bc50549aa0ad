// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{RecoveryStrategy, default_strategy};
use crate::ErrorCategory;

/// Holds exactly one strategy per category.
#[derive(Debug)]
pub(crate) struct StrategyRegistry {
    strategies: RwLock<HashMap<ErrorCategory, RecoveryStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let strategies = ErrorCategory::ALL
            .into_iter()
            .map(|category| (category, default_strategy(category)))
            .collect();

        Self {
            strategies: RwLock::new(strategies),
        }
    }
}

impl StrategyRegistry {
    pub(crate) fn get(&self, category: ErrorCategory) -> RecoveryStrategy {
        self.strategies
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_else(|| default_strategy(category))
    }

    /// Replaces the strategy of `category`, re-targeting the strategy at it.
    pub(crate) fn put(&self, category: ErrorCategory, mut strategy: RecoveryStrategy) {
        strategy.set_category(category);
        self.strategies.write().insert(category, strategy);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backoff, RetryRule};

    #[test]
    fn every_category_has_a_strategy() {
        let registry = StrategyRegistry::default();

        for category in ErrorCategory::ALL {
            assert_eq!(registry.get(category), default_strategy(category));
        }
    }

    #[test]
    fn put_replaces_and_retargets() {
        let registry = StrategyRegistry::default();
        let custom = RecoveryStrategy::new(ErrorCategory::Unknown)
            .with_max_retries(9)
            .with_backoff(Backoff::Linear)
            .with_retry_rule(RetryRule::Never);

        registry.put(ErrorCategory::DomNotFound, custom);

        let stored = registry.get(ErrorCategory::DomNotFound);
        assert_eq!(stored.category(), ErrorCategory::DomNotFound);
        assert_eq!(stored.max_retries(), 9);
        assert_eq!(stored.retry_rule(), &RetryRule::Never);
        assert_eq!(registry.get(ErrorCategory::Unknown), default_strategy(ErrorCategory::Unknown));
    }
}
