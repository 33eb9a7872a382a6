//! Promotion conditions: the predicates that must hold for a promotion to
//! apply.
//!
//! [`Condition`] is a closed sum type with one case per persisted condition
//! kind, so the assembler's dispatch is an exhaustive match. The only
//! recursive case is [`OrCondition`], which owns its children outright (no
//! arena, no parent back-pointers); depth is bounded by the persisted data.
//!
//! Every case carries a free-text note; the set-based cases additionally
//! carry an [`EntryOperator`] selecting the membership semantics.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::error::ModelError;

/// Membership semantics for set-based conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryOperator {
    IncludesAny,
    IncludesAll,
    Excludes,
}

impl TryFrom<i64> for EntryOperator {
    type Error = ModelError;

    fn try_from(ordinal: i64) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(EntryOperator::IncludesAny),
            1 => Ok(EntryOperator::IncludesAll),
            2 => Ok(EntryOperator::Excludes),
            _ => Err(ModelError::OrdinalOutOfRange {
                domain: "EntryOperator",
                ordinal,
            }),
        }
    }
}

/// Comparison operator for the total-threshold conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    Greater,
    GreaterEqual,
    Smaller,
    SmallerEqual,
}

impl TryFrom<i64> for Operator {
    type Error = ModelError;

    fn try_from(ordinal: i64) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(Operator::Equal),
            1 => Ok(Operator::Greater),
            2 => Ok(Operator::GreaterEqual),
            3 => Ok(Operator::Smaller),
            4 => Ok(Operator::SmallerEqual),
            _ => Err(ModelError::OrdinalOutOfRange {
                domain: "Operator",
                ordinal,
            }),
        }
    }
}

/// One product family plus the member products resolved at assembly time.
///
/// The member set is a denormalized snapshot: it is captured when the
/// promotion is assembled and never re-resolved lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyEntry {
    pub family_oid: String,
    pub product_oids: BTreeSet<String>,
}

impl FamilyEntry {
    pub fn new(family_oid: impl Into<String>, product_oids: impl IntoIterator<Item = String>) -> Self {
        FamilyEntry {
            family_oid: family_oid.into(),
            product_oids: product_oids.into_iter().collect(),
        }
    }
}

/// An inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A `[start, end]` time-of-day range at a fixed UTC offset.
///
/// The offset is resolved from the evaluation context when the promotion is
/// assembled, not when it is evaluated. Two assemblies at different times of
/// year can therefore disagree on the offset; that is accepted behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Time,
    pub end: Time,
    pub offset: UtcOffset,
}

impl TimeRange {
    pub fn new(start: Time, end: Time, offset: UtcOffset) -> Self {
        TimeRange { start, end, offset }
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        let local = at.to_offset(self.offset).time();
        self.start <= local && local <= self.end
    }
}

/// Explicit product set condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsCondition {
    pub entry_operator: EntryOperator,
    pub products: BTreeSet<String>,
    pub position_quantity: Option<u32>,
    pub allow_target_same_as_source: bool,
    pub note: Option<String>,
}

impl ProductsCondition {
    pub fn new(entry_operator: EntryOperator, products: impl IntoIterator<Item = String>) -> Self {
        ProductsCondition {
            entry_operator,
            products: products.into_iter().collect(),
            position_quantity: None,
            allow_target_same_as_source: false,
            note: None,
        }
    }

    pub fn with_position_quantity(mut self, quantity: u32) -> Self {
        self.position_quantity = Some(quantity);
        self
    }

    pub fn with_allow_target_same_as_source(mut self, allow: bool) -> Self {
        self.allow_target_same_as_source = allow;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Product family condition with denormalized member snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFamilyCondition {
    pub entry_operator: EntryOperator,
    pub entries: Vec<FamilyEntry>,
    pub allow_target_same_as_source: bool,
    pub note: Option<String>,
}

impl ProductFamilyCondition {
    pub fn new(entry_operator: EntryOperator, entries: Vec<FamilyEntry>) -> Self {
        ProductFamilyCondition {
            entry_operator,
            entries,
            allow_target_same_as_source: false,
            note: None,
        }
    }

    pub fn with_allow_target_same_as_source(mut self, allow: bool) -> Self {
        self.allow_target_same_as_source = allow;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Store / backend identifier condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCondition {
    pub entry_operator: EntryOperator,
    pub identifiers: BTreeSet<String>,
    pub note: Option<String>,
}

impl StoreCondition {
    pub fn new(
        entry_operator: EntryOperator,
        identifiers: impl IntoIterator<Item = String>,
    ) -> Self {
        StoreCondition {
            entry_operator,
            identifiers: identifiers.into_iter().collect(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Product set condition whose member set was computed from a dynamic
/// attribute filter at assembly time, rather than listed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicProductsCondition {
    pub entry_operator: EntryOperator,
    pub products: BTreeSet<String>,
    pub position_quantity: Option<u32>,
    pub allow_target_same_as_source: bool,
    pub note: Option<String>,
}

impl DynamicProductsCondition {
    pub fn new(entry_operator: EntryOperator, products: impl IntoIterator<Item = String>) -> Self {
        DynamicProductsCondition {
            entry_operator,
            products: products.into_iter().collect(),
            position_quantity: None,
            allow_target_same_as_source: false,
            note: None,
        }
    }

    pub fn with_position_quantity(mut self, quantity: u32) -> Self {
        self.position_quantity = Some(quantity);
        self
    }

    pub fn with_allow_target_same_as_source(mut self, allow: bool) -> Self {
        self.allow_target_same_as_source = allow;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Holds if the evaluation date falls in any of the ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCondition {
    pub ranges: Vec<DateRange>,
    pub note: Option<String>,
}

impl DateCondition {
    pub fn new(ranges: Vec<DateRange>) -> Self {
        DateCondition { ranges, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn contains(&self, date: Date) -> bool {
        self.ranges.iter().any(|r| r.contains(date))
    }
}

/// Holds if the evaluation instant falls in any of the time-of-day ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCondition {
    pub ranges: Vec<TimeRange>,
    pub note: Option<String>,
}

impl TimeCondition {
    pub fn new(ranges: Vec<TimeRange>) -> Self {
        TimeCondition { ranges, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Document-total threshold condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTotalCondition {
    pub operator: Operator,
    pub total: Decimal,
    pub note: Option<String>,
}

impl DocTotalCondition {
    pub fn new(operator: Operator, total: Decimal) -> Self {
        DocTotalCondition {
            operator,
            total,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Product-total threshold condition, restricted to an explicit product set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotalCondition {
    pub operator: Operator,
    pub total: Decimal,
    pub products: BTreeSet<String>,
    pub note: Option<String>,
}

impl ProductTotalCondition {
    pub fn new(
        operator: Operator,
        total: Decimal,
        products: impl IntoIterator<Item = String>,
    ) -> Self {
        ProductTotalCondition {
            operator,
            total,
            products: products.into_iter().collect(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Caps how many times the promotion's actions may apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxCondition {
    pub max: u32,
    pub note: Option<String>,
}

impl MaxCondition {
    pub fn new(max: u32) -> Self {
        MaxCondition { max, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Marker condition: the promotion is stackable with others. The stacking
/// semantics are owned by the external engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackCondition {
    pub note: Option<String>,
}

impl StackCondition {
    pub fn new() -> Self {
        StackCondition { note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Recursive container: holds child conditions that are logically OR-ed.
///
/// The constructor takes pre-built children; fetching and building them from
/// rows is the assembler's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrCondition {
    pub children: Vec<Condition>,
    pub note: Option<String>,
}

impl OrCondition {
    pub fn new(children: Vec<Condition>) -> Self {
        OrCondition {
            children,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A promotion condition, closed over all persisted condition kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    Products(ProductsCondition),
    ProductFamily(ProductFamilyCondition),
    Store(StoreCondition),
    DynamicProducts(DynamicProductsCondition),
    Date(DateCondition),
    Time(TimeCondition),
    DocTotal(DocTotalCondition),
    ProductTotal(ProductTotalCondition),
    Max(MaxCondition),
    Stack(StackCondition),
    Or(OrCondition),
}

impl From<ProductsCondition> for Condition {
    fn from(c: ProductsCondition) -> Self {
        Condition::Products(c)
    }
}

impl From<ProductFamilyCondition> for Condition {
    fn from(c: ProductFamilyCondition) -> Self {
        Condition::ProductFamily(c)
    }
}

impl From<StoreCondition> for Condition {
    fn from(c: StoreCondition) -> Self {
        Condition::Store(c)
    }
}

impl From<DynamicProductsCondition> for Condition {
    fn from(c: DynamicProductsCondition) -> Self {
        Condition::DynamicProducts(c)
    }
}

impl From<DateCondition> for Condition {
    fn from(c: DateCondition) -> Self {
        Condition::Date(c)
    }
}

impl From<TimeCondition> for Condition {
    fn from(c: TimeCondition) -> Self {
        Condition::Time(c)
    }
}

impl From<DocTotalCondition> for Condition {
    fn from(c: DocTotalCondition) -> Self {
        Condition::DocTotal(c)
    }
}

impl From<ProductTotalCondition> for Condition {
    fn from(c: ProductTotalCondition) -> Self {
        Condition::ProductTotal(c)
    }
}

impl From<MaxCondition> for Condition {
    fn from(c: MaxCondition) -> Self {
        Condition::Max(c)
    }
}

impl From<StackCondition> for Condition {
    fn from(c: StackCondition) -> Self {
        Condition::Stack(c)
    }
}

impl From<OrCondition> for Condition {
    fn from(c: OrCondition) -> Self {
        Condition::Or(c)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
