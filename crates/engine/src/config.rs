//! Engine invocation configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Promotion-selection policy of the external engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineRule {
    /// Apply promotions in priority order.
    #[default]
    Priority,
    /// Greedily pick the best-discount combination.
    #[serde(rename = "MOSTDISCOUNT")]
    MostDiscount,
}

/// Error for unknown engine rule names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine rule: {0}")]
pub struct ParseEngineRuleError(String);

impl FromStr for EngineRule {
    type Err = ParseEngineRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIORITY" => Ok(EngineRule::Priority),
            "MOSTDISCOUNT" => Ok(EngineRule::MostDiscount),
            other => Err(ParseEngineRuleError(other.to_string())),
        }
    }
}

/// Configuration for one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationConfig {
    pub engine_rule: EngineRule,
    pub evaluation_at: OffsetDateTime,
}

impl CalculationConfig {
    pub fn new(engine_rule: EngineRule, evaluation_at: OffsetDateTime) -> Self {
        CalculationConfig {
            engine_rule,
            evaluation_at,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
