//! The cart document the engine computes discounts on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tax applicable to a position, passed through to the engine untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxEntry {
    pub key: String,
    pub percentage: Decimal,
}

impl TaxEntry {
    pub fn new(key: impl Into<String>, percentage: Decimal) -> Self {
        TaxEntry {
            key: key.into(),
            percentage,
        }
    }
}

/// A discount the engine attributed to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub promotion_oid: String,
    pub amount: Decimal,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub index: i32,
    pub product_oid: String,
    pub quantity: Decimal,
    pub net_unit_price: Decimal,
    pub taxes: Vec<TaxEntry>,
    /// Written by the engine; empty until calculation ran.
    pub discounts: Vec<AppliedDiscount>,
}

impl Position {
    pub fn new(
        index: i32,
        product_oid: impl Into<String>,
        quantity: Decimal,
        net_unit_price: Decimal,
    ) -> Self {
        Position {
            index,
            product_oid: product_oid.into(),
            quantity,
            net_unit_price,
            taxes: Vec::new(),
            discounts: Vec::new(),
        }
    }

    pub fn with_taxes(mut self, taxes: Vec<TaxEntry>) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn net_total(&self) -> Decimal {
        self.quantity * self.net_unit_price
    }

    pub fn discount_total(&self) -> Decimal {
        self.discounts.iter().map(|d| d.amount).sum()
    }
}

/// The cart document: ordered positions. The engine mutates positions in
/// place; this crate never interprets the discount fields it writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub positions: Vec<Position>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn net_total(&self) -> Decimal {
        self.positions.iter().map(Position::net_total).sum()
    }

    pub fn discount_total(&self) -> Decimal {
        self.positions.iter().map(Position::discount_total).sum()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
