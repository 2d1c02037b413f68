//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for a debate's round ceiling.
pub const MAX_ROUND_CEILING: u32 = 20;

/// Configuration for debates created through the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Round ceiling applied when a request does not name one.
    pub max_rounds: u32,
    /// Moderator think/act/observe iterations allowed per round.
    pub moderator_max_iterations: u32,
    /// Per-debate broadcast channel capacity.
    pub event_channel_capacity: usize,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            moderator_max_iterations: 6,
            event_channel_capacity: 256,
        }
    }
}

impl DebateConfig {
    /// Resolve a requested round ceiling against the configured default and hard cap.
    pub fn resolve_max_rounds(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.max_rounds)
            .clamp(1, MAX_ROUND_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DebateConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.moderator_max_iterations, 6);
        assert_eq!(config.event_channel_capacity, 256);
    }

    #[test]
    fn test_resolve_max_rounds() {
        let config = DebateConfig::default();
        assert_eq!(config.resolve_max_rounds(None), 5);
        assert_eq!(config.resolve_max_rounds(Some(3)), 3);
        assert_eq!(config.resolve_max_rounds(Some(0)), 1);
        assert_eq!(config.resolve_max_rounds(Some(99)), MAX_ROUND_CEILING);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DebateConfig = serde_json::from_str(r#"{"max_rounds": 2}"#).unwrap();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.moderator_max_iterations, 6);
    }
}
