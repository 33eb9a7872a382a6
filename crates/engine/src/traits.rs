//! The discount engine trait.

use promo_model::Promotion;

use crate::config::CalculationConfig;
use crate::document::Document;

/// External rule-evaluation engine.
///
/// Given a document and an ordered, prioritized list of promotions, the
/// engine evaluates each promotion's conditions against the document and
/// mutates it with computed discounts. `explicit_order` overrides the
/// engine's own selection order when present.
pub trait DiscountEngine: Send + Sync {
    fn calculate(
        &self,
        document: &mut Document,
        promotions: &[Promotion],
        explicit_order: Option<&[String]>,
        config: &CalculationConfig,
    );
}

/// An engine that applies nothing. Used where the subsystem kill-switch is
/// off and in tests that only exercise document plumbing.
#[derive(Debug, Default)]
pub struct NoopEngine;

impl DiscountEngine for NoopEngine {
    fn calculate(
        &self,
        _document: &mut Document,
        _promotions: &[Promotion],
        _explicit_order: Option<&[String]>,
        _config: &CalculationConfig,
    ) {
    }
}
