//! Promotion actions: the discount computation applied once conditions hold.
//!
//! The discount mathematics themselves live in the external engine; this
//! module only models the action parameters the engine consumes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Which eligible line item(s) an action targets.
///
/// Stored as an ordinal; an absent ordinal defaults to [`Strategy::Cheapest`],
/// a present but out-of-range ordinal is data corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    #[default]
    Cheapest,
    Priciest,
}

impl TryFrom<i64> for Strategy {
    type Error = ModelError;

    fn try_from(ordinal: i64) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(Strategy::Cheapest),
            1 => Ok(Strategy::Priciest),
            _ => Err(ModelError::OrdinalOutOfRange {
                domain: "Strategy",
                ordinal,
            }),
        }
    }
}

/// A discount action attached to a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Percentage discount on the targeted line item(s), magnitude in `[0, 100]`.
    Percentage { percentage: Decimal, strategy: Strategy },
    /// Absolute amount discount on the targeted line item(s).
    FixedAmount { amount: Decimal, strategy: Strategy },
}

impl Action {
    pub fn percentage(percentage: Decimal, strategy: Strategy) -> Self {
        Action::Percentage {
            percentage,
            strategy,
        }
    }

    pub fn fixed_amount(amount: Decimal, strategy: Strategy) -> Self {
        Action::FixedAmount { amount, strategy }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Action::Percentage { strategy, .. } | Action::FixedAmount { strategy, .. } => *strategy,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
