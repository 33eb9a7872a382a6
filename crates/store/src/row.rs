//! Row records: the flat, normalized representation of promotions as stored.
//!
//! Rows carry raw ordinals for enum-valued columns (entry operator, strategy,
//! comparison operator, container tag). Mapping an ordinal onto its typed
//! counterpart happens during assembly and fails fast on out-of-range values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};

/// Lifecycle status of a persisted promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    Active,
    Inactive,
}

/// The promotion header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRow {
    pub oid: String,
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub priority: i32,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub status: PromotionStatus,
}

/// Concrete stored type of an action row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    PercentageDiscount,
    FixedAmount,
}

/// An action row linked to a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    pub oid: String,
    pub kind: ActionKind,
    /// Percentage for `PercentageDiscount`, absolute amount for `FixedAmount`.
    pub magnitude: Decimal,
    /// Strategy ordinal; absent means the default strategy.
    pub strategy: Option<i64>,
}

impl ActionRow {
    pub fn new(oid: impl Into<String>, kind: ActionKind, magnitude: Decimal) -> Self {
        ActionRow {
            oid: oid.into(),
            kind,
            magnitude,
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, ordinal: i64) -> Self {
        self.strategy = Some(ordinal);
        self
    }
}

/// Concrete stored type of a condition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    Products,
    ProductFamily,
    Store,
    DynamicProducts,
    Date,
    Time,
    DocTotal,
    ProductTotal,
    Max,
    Stack,
    Or,
}

/// Parent link of a condition row: top-level conditions point at their
/// promotion, children of an OR container point at the container condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentLink {
    Promotion(String),
    Condition(String),
}

/// A condition row. Kind-specific columns are optional; which ones must be
/// present is decided by `kind` during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub oid: String,
    pub kind: ConditionKind,
    pub parent: ParentLink,
    /// Container tag ordinal: 0 = source set, 1 = target set.
    pub container: i64,
    pub note: Option<String>,
    pub entry_operator: Option<i64>,
    pub operator: Option<i64>,
    pub total: Option<Decimal>,
    pub max_count: Option<i64>,
    pub position_quantity: Option<i64>,
    pub allow_target_same_as_source: Option<bool>,
}

impl ConditionRow {
    pub fn new(
        oid: impl Into<String>,
        kind: ConditionKind,
        parent: ParentLink,
        container: i64,
    ) -> Self {
        ConditionRow {
            oid: oid.into(),
            kind,
            parent,
            container,
            note: None,
            entry_operator: None,
            operator: None,
            total: None,
            max_count: None,
            position_quantity: None,
            allow_target_same_as_source: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_entry_operator(mut self, ordinal: i64) -> Self {
        self.entry_operator = Some(ordinal);
        self
    }

    pub fn with_operator(mut self, ordinal: i64) -> Self {
        self.operator = Some(ordinal);
        self
    }

    pub fn with_total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_max_count(mut self, max_count: i64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn with_position_quantity(mut self, quantity: i64) -> Self {
        self.position_quantity = Some(quantity);
        self
    }

    pub fn with_allow_target_same_as_source(mut self, allow: bool) -> Self {
        self.allow_target_same_as_source = Some(allow);
        self
    }
}

/// An inclusive date range row linked to a date condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeRow {
    pub start: Date,
    pub end: Date,
}

/// A time-of-day range row linked to a time condition. Offsets are NOT
/// stored; the assembler resolves the tenant offset when building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeRow {
    pub start: Time,
    pub end: Time,
}
