//! Dispatch policy configuration.
//!
//! Every setting exists twice, once for basic events and once for command
//! events; the dispatcher picks the variant matching the event's category.
//!
//! | Setting | Basic default | Command default |
//! |---------|---------------|-----------------|
//! | strategy | `parallel` | `sequential` |
//! | scope | `per_subscriber` | `per_subscriber` |
//! | max parallelism | unbounded | unbounded |

use serde::{Deserialize, Serialize};

use herald_core::EventCategory;

/// Whether subscribers run one after another or concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// In ascending `order`, each awaited before the next starts.
    Sequential,
    /// Concurrently, bounded by the configured parallelism.
    Parallel,
}

/// Whether subscribers of one event occurrence share a resolution scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchScope {
    /// Each subscriber gets its own scope.
    #[default]
    PerSubscriber,
    /// All subscribers of the occurrence share one scope.
    PerEvent,
}

/// Dispatch policy for basic and command events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Concurrency limit for parallel basic-event dispatch. Unset means unbounded.
    pub max_basic_event_parallelism: Option<usize>,
    /// Concurrency limit for parallel command-event dispatch. Unset means unbounded.
    pub max_command_event_parallelism: Option<usize>,
    pub basic_dispatch_scope: DispatchScope,
    pub command_dispatch_scope: DispatchScope,
    pub basic_dispatch_strategy: DispatchStrategy,
    pub command_dispatch_strategy: DispatchStrategy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_basic_event_parallelism: None,
            max_command_event_parallelism: None,
            basic_dispatch_scope: DispatchScope::PerSubscriber,
            command_dispatch_scope: DispatchScope::PerSubscriber,
            basic_dispatch_strategy: DispatchStrategy::Parallel,
            command_dispatch_strategy: DispatchStrategy::Sequential,
        }
    }
}

impl DispatchConfig {
    /// The strategy applied to events of `category`.
    pub fn strategy(&self, category: EventCategory) -> DispatchStrategy {
        match category {
            EventCategory::Basic => self.basic_dispatch_strategy,
            EventCategory::Command => self.command_dispatch_strategy,
        }
    }

    /// The scope policy applied to events of `category`.
    pub fn scope(&self, category: EventCategory) -> DispatchScope {
        match category {
            EventCategory::Basic => self.basic_dispatch_scope,
            EventCategory::Command => self.command_dispatch_scope,
        }
    }

    /// The parallelism limit applied to events of `category`.
    pub fn max_parallelism(&self, category: EventCategory) -> Option<usize> {
        match category {
            EventCategory::Basic => self.max_basic_event_parallelism,
            EventCategory::Command => self.max_command_event_parallelism,
        }
    }

    /// Sets strategy and scope for both categories.
    pub fn uniform(strategy: DispatchStrategy, scope: DispatchScope) -> Self {
        Self {
            basic_dispatch_strategy: strategy,
            command_dispatch_strategy: strategy,
            basic_dispatch_scope: scope,
            command_dispatch_scope: scope,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(
            config.strategy(EventCategory::Basic),
            DispatchStrategy::Parallel
        );
        assert_eq!(
            config.strategy(EventCategory::Command),
            DispatchStrategy::Sequential
        );
        assert_eq!(
            config.scope(EventCategory::Command),
            DispatchScope::PerSubscriber
        );
        assert_eq!(config.max_parallelism(EventCategory::Basic), None);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: DispatchConfig = serde_json::from_str(
            r#"{ "command_dispatch_strategy": "parallel", "max_command_event_parallelism": 2 }"#,
        )
        .unwrap();

        assert_eq!(
            config.strategy(EventCategory::Command),
            DispatchStrategy::Parallel
        );
        assert_eq!(config.max_parallelism(EventCategory::Command), Some(2));
        assert_eq!(
            config.strategy(EventCategory::Basic),
            DispatchStrategy::Parallel
        );
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result: Result<DispatchConfig, _> =
            serde_json::from_str(r#"{ "basic_dispatch_strategy": "round_robin" }"#);
        assert!(result.is_err());
    }
}
