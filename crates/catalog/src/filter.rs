//! The predicate compiler: turns an attribute filter into a product query
//! and resolves the matching product set.
//!
//! Each pair's `type_ref` keys into the tenant's attribute mapping table;
//! the mapped type reference is resolved against the type registry (exact
//! name first, then stable identifier). Pairs that do not resolve are
//! dropped — that loss is accepted, documented behavior, so the result
//! carries the dropped pairs alongside the compiled query instead of raising.
//!
//! When zero clauses resolve the query degrades to "all products of the base
//! type". Callers rely on an empty filter meaning *unrestricted*.

use std::collections::BTreeSet;
use std::sync::Arc;

use promo_model::{AttributeFilter, AttributePair};
use promo_store::{
    ConfigProvider, MatchClause, ProductQuery, PromotionStore, TenantId, TypeRegistry,
};

use crate::error::CatalogError;

/// A compiled filter: the executable query plus the pairs that were dropped
/// because their type reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub query: ProductQuery,
    pub dropped: Vec<AttributePair>,
}

/// Result of resolving a filter against the product catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSetResolution {
    pub product_oids: BTreeSet<String>,
    pub dropped: Vec<AttributePair>,
}

/// Compiles and executes dynamic attribute filters.
pub struct FilterResolver {
    store: Arc<dyn PromotionStore>,
    registry: Arc<dyn TypeRegistry>,
    config: Arc<dyn ConfigProvider>,
}

impl FilterResolver {
    pub fn new(
        store: Arc<dyn PromotionStore>,
        registry: Arc<dyn TypeRegistry>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        FilterResolver {
            store,
            registry,
            config,
        }
    }

    /// Compile a filter into a product query without executing it.
    ///
    /// A registry lookup error propagates; an unresolvable pair does not.
    pub async fn compile(
        &self,
        tenant: &TenantId,
        filter: &AttributeFilter,
    ) -> Result<CompiledFilter, CatalogError> {
        let mappings = self.config.attribute_mappings(tenant).await?;
        let mut clauses = Vec::new();
        let mut dropped = Vec::new();

        for pair in &filter.pairs {
            let Some(mapping) = mappings.get(&pair.type_ref) else {
                tracing::debug!(%tenant, type_ref = %pair.type_ref, "no attribute mapping, dropping pair");
                dropped.push(pair.clone());
                continue;
            };
            match self.registry.resolve(&mapping.type_ref).await? {
                Some(_) => clauses.push(MatchClause::new(mapping.select.clone(), pair.value_id)),
                None => {
                    tracing::debug!(%tenant, type_ref = %mapping.type_ref, "type did not resolve, dropping pair");
                    dropped.push(pair.clone());
                }
            }
        }

        Ok(CompiledFilter {
            query: ProductQuery::new(clauses, filter.op),
            dropped,
        })
    }

    /// Compile a filter and return the set of matching product identifiers.
    pub async fn resolve_product_set(
        &self,
        tenant: &TenantId,
        filter: &AttributeFilter,
    ) -> Result<ProductSetResolution, CatalogError> {
        let compiled = self.compile(tenant, filter).await?;
        let oids = self.store.query_products(tenant, &compiled.query).await?;
        Ok(ProductSetResolution {
            product_oids: oids.into_iter().collect(),
            dropped: compiled.dropped,
        })
    }

    /// Resolve the product set of one stored dynamic-products condition,
    /// outside any assembly (preview surface). The logical operator comes
    /// from tenant configuration.
    pub async fn resolve_condition_products(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<ProductSetResolution, CatalogError> {
        let pairs = self.store.fetch_attribute_pairs(tenant, condition_oid).await?;
        let op = self.config.filter_operator(tenant).await?;
        self.resolve_product_set(tenant, &AttributeFilter::new(pairs, op))
            .await
    }

    /// Format a pair as `"<label> == <value>"` for display.
    ///
    /// Uses the configured mapping label when the mapping resolves, the
    /// registry's own label when the configured one is empty. Returns `None`
    /// when the pair does not resolve or the value does not exist.
    pub async fn describe_pair(
        &self,
        tenant: &TenantId,
        pair: &AttributePair,
    ) -> Result<Option<String>, CatalogError> {
        let mappings = self.config.attribute_mappings(tenant).await?;
        let Some(mapping) = mappings.get(&pair.type_ref) else {
            return Ok(None);
        };
        let Some(handle) = self.registry.resolve(&mapping.type_ref).await? else {
            return Ok(None);
        };
        let label = if mapping.label.is_empty() {
            handle.label
        } else {
            mapping.label.clone()
        };
        let Some(value) = self.store.fetch_attribute_value(tenant, pair.value_id).await? else {
            return Ok(None);
        };
        Ok(Some(format!("{label} == {value}")))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
