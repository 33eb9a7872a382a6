//! The catalog facade: calculation orchestration, listing, export,
//! activation and the scheduled maintenance hooks.
//!
//! The orchestrator is deliberately thin. It builds a cart document from
//! caller-supplied lines (each line already carries its unit price and
//! taxes — pricing and tax lookup are not this crate's concern), selects the
//! promotion set, and hands both to the external engine. The mutated
//! document is returned as-is; its discount fields are never interpreted
//! here.

use std::sync::Arc;

use promo_engine::{CalculationConfig, DiscountEngine, Document, EngineRule, Position, TaxEntry};
use promo_model::{AttributePair, Promotion};
use promo_store::{
    ConditionKind, ConfigProvider, ParentLink, PromotionStatus, PromotionStore, TenantId,
    TypeRegistry,
};
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

use crate::assemble::Assembler;
use crate::cache::{CacheConfig, PromotionCache};
use crate::error::CatalogError;
use crate::filter::{FilterResolver, ProductSetResolution};

/// One caller-supplied cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub index: i32,
    pub product_oid: String,
    pub quantity: Decimal,
    pub net_unit_price: Decimal,
    pub taxes: Vec<TaxEntry>,
}

/// A calculation request: cart lines, an optional evaluation date, and an
/// optional explicit promotion subset. Without an explicit subset the
/// tenant's full active set is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationRequest {
    pub lines: Vec<CartLine>,
    pub date: Option<Date>,
    pub promotion_oids: Option<Vec<String>>,
}

/// Cheap promotion projection for listing surfaces; no assembly involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionHead {
    pub oid: String,
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
}

/// The promotion catalog service.
pub struct PromotionService {
    store: Arc<dyn PromotionStore>,
    config: Arc<dyn ConfigProvider>,
    engine: Arc<dyn DiscountEngine>,
    cache: PromotionCache,
    filter: FilterResolver,
}

impl PromotionService {
    pub fn new(
        store: Arc<dyn PromotionStore>,
        registry: Arc<dyn TypeRegistry>,
        config: Arc<dyn ConfigProvider>,
        engine: Arc<dyn DiscountEngine>,
        cache_config: CacheConfig,
    ) -> Self {
        let assembler = Assembler::new(store.clone(), registry.clone(), config.clone());
        let filter = FilterResolver::new(store.clone(), registry, config.clone());
        PromotionService {
            store,
            config,
            engine,
            cache: PromotionCache::new(assembler, cache_config),
            filter,
        }
    }

    // ── Promotion access ──────────────────────────────────────────────────

    /// The tenant's active promotion set, served through the tenant cache.
    pub async fn get_active_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<Promotion>, CatalogError> {
        self.cache.get_active_promotions(tenant).await
    }

    /// One promotion, served through the short-TTL per-id cache.
    pub async fn get_promotion(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<Promotion, CatalogError> {
        self.cache.get_promotion(tenant, oid).await
    }

    /// Header projections of every promotion, regardless of status.
    pub async fn promotion_heads(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromotionHead>, CatalogError> {
        Ok(self
            .store
            .fetch_all_promotions(tenant)
            .await?
            .into_iter()
            .map(|row| PromotionHead {
                oid: row.oid,
                name: row.name,
                label: row.label,
                description: row.description,
            })
            .collect())
    }

    /// Marshal one assembled promotion to pretty-printed JSON.
    pub async fn export_promotion(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<String, CatalogError> {
        let promotion = self.cache.get_promotion(tenant, oid).await?;
        serde_json::to_string_pretty(&promotion)
            .map_err(|err| CatalogError::Serialization(err.to_string()))
    }

    // ── Dynamic filter surfaces ───────────────────────────────────────────

    /// Preview the product set of a stored dynamic-products condition.
    pub async fn preview_condition_products(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<ProductSetResolution, CatalogError> {
        self.filter
            .resolve_condition_products(tenant, condition_oid)
            .await
    }

    /// Display form of one attribute pair (`"<label> == <value>"`).
    pub async fn describe_attribute_pair(
        &self,
        tenant: &TenantId,
        pair: &AttributePair,
    ) -> Result<Option<String>, CatalogError> {
        self.filter.describe_pair(tenant, pair).await
    }

    // ── Calculation orchestration ─────────────────────────────────────────

    /// Build a document from the request lines, select the promotion set and
    /// invoke the engine.
    pub async fn calculate(
        &self,
        tenant: &TenantId,
        request: CalculationRequest,
    ) -> Result<Document, CatalogError> {
        let mut document = Document::new();
        for line in request.lines {
            document.add_position(
                Position::new(line.index, line.product_oid, line.quantity, line.net_unit_price)
                    .with_taxes(line.taxes),
            );
        }

        if !self.config.promotions_enabled(tenant).await? {
            tracing::debug!(%tenant, "promotions disabled, skipping engine");
            return Ok(document);
        }

        let promotions = match &request.promotion_oids {
            Some(oids) => {
                let mut selected = Vec::with_capacity(oids.len());
                for oid in oids {
                    selected.push(self.cache.get_promotion(tenant, oid).await?);
                }
                selected
            }
            None => self.cache.get_active_promotions(tenant).await?,
        };

        let engine_rule = match self.config.engine_rule(tenant).await? {
            Some(name) => name.parse().unwrap_or_else(|err| {
                tracing::warn!(%tenant, %err, "falling back to default engine rule");
                EngineRule::default()
            }),
            None => EngineRule::default(),
        };
        let evaluation_at = match request.date {
            Some(date) => OffsetDateTime::now_utc().replace_date(date),
            None => OffsetDateTime::now_utc(),
        };
        let config = CalculationConfig::new(engine_rule, evaluation_at);
        tracing::info!(
            %tenant,
            rule = ?config.engine_rule,
            promotions = promotions.len(),
            "calculating promotions"
        );

        self.engine.calculate(
            &mut document,
            &promotions,
            request.promotion_oids.as_deref(),
            &config,
        );
        Ok(document)
    }

    // ── Activation ────────────────────────────────────────────────────────

    /// Whether the promotion may transition to Active: every dynamic-products
    /// condition must carry at least one attribute pair.
    pub async fn validate_activation(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<bool, CatalogError> {
        let parent = ParentLink::Promotion(oid.to_string());
        let conditions = self.store.fetch_conditions(tenant, &parent).await?;
        for row in conditions
            .iter()
            .filter(|row| row.kind == ConditionKind::DynamicProducts)
        {
            if self
                .store
                .fetch_attribute_pairs(tenant, &row.oid)
                .await?
                .is_empty()
            {
                tracing::warn!(%tenant, oid, condition = %row.oid, "activation not allowed: dynamic product condition without attribute pairs");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Activate a promotion after validation. Returns whether the transition
    /// happened.
    pub async fn activate(&self, tenant: &TenantId, oid: &str) -> Result<bool, CatalogError> {
        self.store
            .fetch_promotion(tenant, oid)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                oid: oid.to_string(),
            })?;
        if !self.validate_activation(tenant, oid).await? {
            return Ok(false);
        }
        self.store
            .update_promotion_status(tenant, oid, PromotionStatus::Active)
            .await?;
        self.cache.invalidate(tenant);
        Ok(true)
    }

    // ── Scheduled maintenance hooks ───────────────────────────────────────

    /// Mark the tenant's cache stale. Idempotent; safe to run concurrently
    /// with request traffic.
    pub fn clean_cache(&self, tenant: &TenantId) {
        self.cache.invalidate(tenant);
    }

    /// Deactivate active promotions whose end instant passed at least one
    /// whole day ago. Idempotent; returns how many were deactivated.
    pub async fn deactivate_expired_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<u32, CatalogError> {
        let now = OffsetDateTime::now_utc();
        let mut deactivated = 0;
        for row in self.store.fetch_active_promotions(tenant).await? {
            if now > row.end_at {
                let days = (now - row.end_at).whole_days();
                tracing::info!(%tenant, oid = %row.oid, days, "promotion past its end instant");
                if days > 0 {
                    self.store
                        .update_promotion_status(tenant, &row.oid, PromotionStatus::Inactive)
                        .await?;
                    deactivated += 1;
                }
            }
        }
        if deactivated > 0 {
            self.cache.invalidate(tenant);
        }
        Ok(deactivated)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
