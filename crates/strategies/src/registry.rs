// In crates/strategies/src/registry.rs

use crate::factory::create_strategy;
use crate::types::StrategySettings;
use crate::{Error, Strategy};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps strategy names to their resolved signal functions.
///
/// Built once at startup; every later lookup is a hash-map read.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every distinct name exactly once.
    ///
    /// All failures are collected and returned together so that each
    /// unresolved name is reported individually.
    pub fn resolve<'a>(
        names: impl IntoIterator<Item = &'a str>,
        settings: &StrategySettings,
    ) -> Result<Self, Vec<Error>> {
        let mut registry = Self::new();
        let mut failures = Vec::new();

        for name in names {
            if registry.contains(name) || failures.iter().any(|e| failed_name(e) == Some(name)) {
                continue;
            }
            match create_strategy(name, settings) {
                Ok(strategy) => {
                    tracing::info!(name, "Strategy resolved and cached.");
                    registry.register(name, strategy);
                }
                Err(e) => {
                    tracing::error!(name, error = %e, "Failed to resolve strategy.");
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(registry)
        } else {
            Err(failures)
        }
    }

    /// Adds (or replaces) a strategy under `name`.
    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

fn failed_name(error: &Error) -> Option<&str> {
    match error {
        Error::UnknownStrategy(name) => Some(name),
        Error::InvalidSettings { name, .. } => Some(name),
        Error::Evaluation { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_resolve_once() {
        let registry = StrategyRegistry::resolve(
            ["sma_cross", "sma_cross", "rsi_reversion"],
            &StrategySettings::default(),
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("sma_cross").is_some());
        assert!(registry.get("rsi_reversion").is_some());
    }

    #[test]
    fn each_unknown_name_is_reported() {
        let failures = StrategyRegistry::resolve(
            ["sma_cross", "momentum", "breakout", "momentum"],
            &StrategySettings::default(),
        )
        .err()
        .unwrap();

        let names: Vec<_> = failures.iter().filter_map(failed_name).collect();
        assert_eq!(names, vec!["momentum", "breakout"]);
    }
}
