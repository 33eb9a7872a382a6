//! The storage trait for promotion catalog backends.

use async_trait::async_trait;
use promo_model::AttributePair;

use crate::error::StoreError;
use crate::query::ProductQuery;
use crate::row::{
    ActionRow, ConditionRow, DateRangeRow, ParentLink, PromotionRow, PromotionStatus, TimeRangeRow,
};
use crate::tenant::TenantId;

/// Row-oriented storage for promotions and their linked rows.
///
/// Every call is tenant-scoped; implementations must not leak rows across
/// tenants. All reads are point-in-time with no snapshot guarantees — the
/// assembler tolerates rows changing between fetches by failing the whole
/// assembly rather than producing a partial promotion.
///
/// Implementations must be `Send + Sync` so the catalog can be shared across
/// concurrent request handlers.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    // ── Promotion headers ─────────────────────────────────────────────────

    /// Fetch one promotion header row. `Ok(None)` when absent.
    async fn fetch_promotion(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<Option<PromotionRow>, StoreError>;

    /// Fetch all promotion headers with Active status, ordered by ascending
    /// priority.
    async fn fetch_active_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromotionRow>, StoreError>;

    /// Fetch every promotion header regardless of status (listing surface).
    async fn fetch_all_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromotionRow>, StoreError>;

    /// Set a promotion's lifecycle status.
    async fn update_promotion_status(
        &self,
        tenant: &TenantId,
        oid: &str,
        status: PromotionStatus,
    ) -> Result<(), StoreError>;

    // ── Linked rows ───────────────────────────────────────────────────────

    /// Action rows linked to a promotion, in stored order.
    async fn fetch_actions(
        &self,
        tenant: &TenantId,
        promotion_oid: &str,
    ) -> Result<Vec<ActionRow>, StoreError>;

    /// Condition rows whose parent link equals `parent` — direct children
    /// only, no transitive descent.
    async fn fetch_conditions(
        &self,
        tenant: &TenantId,
        parent: &ParentLink,
    ) -> Result<Vec<ConditionRow>, StoreError>;

    /// Product oids linked to an explicit-products condition.
    async fn fetch_condition_products(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Family oids linked to a product-family condition.
    async fn fetch_condition_families(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Member product oids of one family.
    async fn fetch_family_members(
        &self,
        tenant: &TenantId,
        family_oid: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Store/backend identifiers linked to a store condition.
    async fn fetch_store_identifiers(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Attribute pairs linked to a dynamic-products condition, in stored
    /// order.
    async fn fetch_attribute_pairs(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<AttributePair>, StoreError>;

    /// Date ranges linked to a date condition.
    async fn fetch_date_ranges(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<DateRangeRow>, StoreError>;

    /// Time ranges linked to a time condition.
    async fn fetch_time_ranges(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<TimeRangeRow>, StoreError>;

    // ── Product catalog ───────────────────────────────────────────────────

    /// Execute a compiled product query. An unrestricted query returns every
    /// product of the base type.
    async fn query_products(
        &self,
        tenant: &TenantId,
        query: &ProductQuery,
    ) -> Result<Vec<String>, StoreError>;

    /// Display value of one attribute definition row, if it exists.
    async fn fetch_attribute_value(
        &self,
        tenant: &TenantId,
        value_id: i64,
    ) -> Result<Option<String>, StoreError>;
}
