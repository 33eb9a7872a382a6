//! Boundary contract for the external rule-evaluation engine.
//!
//! The catalog hands the engine a cart [`Document`] plus an ordered list of
//! promotions and a [`CalculationConfig`]; the engine mutates the document
//! with computed discounts. The discount mathematics — application order,
//! tie-breaking among overlapping promotions, stacking — are owned entirely
//! by the engine, never by this workspace.

pub mod config;
pub mod document;
pub mod traits;

pub use config::{CalculationConfig, EngineRule, ParseEngineRuleError};
pub use document::{AppliedDiscount, Document, Position, TaxEntry};
pub use traits::{DiscountEngine, NoopEngine};
