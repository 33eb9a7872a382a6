//! The compiled product query executed against the product catalog.

use promo_model::LogicalOperator;
use serde::{Deserialize, Serialize};

/// One comparison clause: the storage select expression must match the
/// attribute value identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchClause {
    pub select: String,
    pub value_id: i64,
}

impl MatchClause {
    pub fn new(select: impl Into<String>, value_id: i64) -> Self {
        MatchClause {
            select: select.into(),
            value_id,
        }
    }
}

/// A flat product query: clauses combined left-to-right with a single
/// logical operator, never mixed and never grouped.
///
/// A query with zero clauses is *unrestricted*: it matches every product of
/// the base type. Callers rely on that degradation; backends must not treat
/// it as "match nothing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub clauses: Vec<MatchClause>,
    pub op: LogicalOperator,
}

impl ProductQuery {
    pub fn new(clauses: Vec<MatchClause>, op: LogicalOperator) -> Self {
        ProductQuery { clauses, op }
    }

    pub fn unrestricted() -> Self {
        ProductQuery {
            clauses: Vec::new(),
            op: LogicalOperator::And,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.clauses.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
