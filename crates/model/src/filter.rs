//! Dynamic attribute filter: the declarative input the predicate compiler
//! turns into a product query.

use serde::{Deserialize, Serialize};

/// Glue between the clauses of a compiled filter. Flat, never mixed: a filter
/// is either a conjunction or a disjunction of all its clauses, combined
/// left-to-right with no grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// One configured attribute pair: a short key into the tenant's attribute
/// mapping table plus the attribute value identifier to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePair {
    pub type_ref: String,
    pub value_id: i64,
}

impl AttributePair {
    pub fn new(type_ref: impl Into<String>, value_id: i64) -> Self {
        AttributePair {
            type_ref: type_ref.into(),
            value_id,
        }
    }
}

/// An ordered collection of attribute pairs plus the operator combining the
/// clauses they compile to.
///
/// Pairs whose `type_ref` does not resolve against the type registry are
/// dropped during compilation; that loss is accepted behavior, reported in
/// the compiler's result rather than raised as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub pairs: Vec<AttributePair>,
    pub op: LogicalOperator,
}

impl AttributeFilter {
    pub fn new(pairs: Vec<AttributePair>, op: LogicalOperator) -> Self {
        AttributeFilter { pairs, op }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
