//! In-memory implementations of the collaborator traits.
//!
//! `MemoryStore`, `MemoryRegistry` and `MemoryConfig` back the catalog's
//! tests and small embeddings. State lives behind plain mutexes; a poisoned
//! lock is recovered rather than propagated since every mutation is a simple
//! map insert.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use promo_model::{AttributePair, LogicalOperator};
use time::UtcOffset;

use crate::config::{AttributeMapping, ConfigProvider};
use crate::error::{RegistryError, StoreError};
use crate::query::ProductQuery;
use crate::registry::{TypeHandle, TypeRegistry};
use crate::row::{
    ActionRow, ConditionRow, DateRangeRow, ParentLink, PromotionRow, PromotionStatus, TimeRangeRow,
};
use crate::tenant::TenantId;
use crate::traits::PromotionStore;

/// A product with its attribute-definition assignments, keyed by select
/// expression.
#[derive(Debug, Clone, Default)]
pub struct ProductRecord {
    pub oid: String,
    pub attributes: BTreeMap<String, i64>,
}

impl ProductRecord {
    pub fn new(oid: impl Into<String>) -> Self {
        ProductRecord {
            oid: oid.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, select: impl Into<String>, value_id: i64) -> Self {
        self.attributes.insert(select.into(), value_id);
        self
    }
}

#[derive(Debug, Default)]
struct TenantData {
    promotions: BTreeMap<String, PromotionRow>,
    actions: BTreeMap<String, Vec<ActionRow>>,
    conditions: Vec<ConditionRow>,
    condition_products: BTreeMap<String, Vec<String>>,
    condition_families: BTreeMap<String, Vec<String>>,
    family_members: BTreeMap<String, Vec<String>>,
    store_identifiers: BTreeMap<String, Vec<String>>,
    attribute_pairs: BTreeMap<String, Vec<AttributePair>>,
    date_ranges: BTreeMap<String, Vec<DateRangeRow>>,
    time_ranges: BTreeMap<String, Vec<TimeRangeRow>>,
    products: Vec<ProductRecord>,
    attribute_values: BTreeMap<i64, String>,
}

/// In-memory [`PromotionStore`].
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<TenantId, TenantData>>,
    active_fetches: AtomicUsize,
    promotion_fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TenantId, TenantData>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// How many times `fetch_active_promotions` ran — lets tests assert on
    /// rebuild counts.
    pub fn active_fetch_count(&self) -> usize {
        self.active_fetches.load(Ordering::SeqCst)
    }

    /// How many times `fetch_promotion` ran.
    pub fn promotion_fetch_count(&self) -> usize {
        self.promotion_fetches.load(Ordering::SeqCst)
    }

    pub fn insert_promotion(&self, tenant: &TenantId, row: PromotionRow) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .promotions
            .insert(row.oid.clone(), row);
    }

    pub fn insert_action(&self, tenant: &TenantId, promotion_oid: &str, row: ActionRow) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .actions
            .entry(promotion_oid.to_string())
            .or_default()
            .push(row);
    }

    pub fn insert_condition(&self, tenant: &TenantId, row: ConditionRow) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .conditions
            .push(row);
    }

    pub fn set_condition_products(&self, tenant: &TenantId, condition_oid: &str, oids: Vec<String>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .condition_products
            .insert(condition_oid.to_string(), oids);
    }

    pub fn set_condition_families(&self, tenant: &TenantId, condition_oid: &str, oids: Vec<String>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .condition_families
            .insert(condition_oid.to_string(), oids);
    }

    pub fn set_family_members(&self, tenant: &TenantId, family_oid: &str, oids: Vec<String>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .family_members
            .insert(family_oid.to_string(), oids);
    }

    pub fn set_store_identifiers(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
        identifiers: Vec<String>,
    ) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .store_identifiers
            .insert(condition_oid.to_string(), identifiers);
    }

    pub fn set_attribute_pairs(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
        pairs: Vec<AttributePair>,
    ) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .attribute_pairs
            .insert(condition_oid.to_string(), pairs);
    }

    pub fn set_date_ranges(&self, tenant: &TenantId, condition_oid: &str, ranges: Vec<DateRangeRow>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .date_ranges
            .insert(condition_oid.to_string(), ranges);
    }

    pub fn set_time_ranges(&self, tenant: &TenantId, condition_oid: &str, ranges: Vec<TimeRangeRow>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .time_ranges
            .insert(condition_oid.to_string(), ranges);
    }

    pub fn insert_product(&self, tenant: &TenantId, product: ProductRecord) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .products
            .push(product);
    }

    pub fn set_attribute_value(&self, tenant: &TenantId, value_id: i64, value: impl Into<String>) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .attribute_values
            .insert(value_id, value.into());
    }

    fn with_tenant<T>(
        &self,
        tenant: &TenantId,
        f: impl FnOnce(&TenantData) -> T,
        empty: T,
    ) -> Result<T, StoreError> {
        let data = self.lock();
        Ok(match data.get(tenant) {
            Some(tenant_data) => f(tenant_data),
            None => empty,
        })
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn fetch_promotion(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<Option<PromotionRow>, StoreError> {
        self.promotion_fetches.fetch_add(1, Ordering::SeqCst);
        self.with_tenant(tenant, |d| d.promotions.get(oid).cloned(), None)
    }

    async fn fetch_active_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromotionRow>, StoreError> {
        self.active_fetches.fetch_add(1, Ordering::SeqCst);
        self.with_tenant(
            tenant,
            |d| {
                let mut rows: Vec<PromotionRow> = d
                    .promotions
                    .values()
                    .filter(|row| row.status == PromotionStatus::Active)
                    .cloned()
                    .collect();
                rows.sort_by_key(|row| row.priority);
                rows
            },
            Vec::new(),
        )
    }

    async fn fetch_all_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<PromotionRow>, StoreError> {
        self.with_tenant(
            tenant,
            |d| d.promotions.values().cloned().collect(),
            Vec::new(),
        )
    }

    async fn update_promotion_status(
        &self,
        tenant: &TenantId,
        oid: &str,
        status: PromotionStatus,
    ) -> Result<(), StoreError> {
        let mut data = self.lock();
        let row = data
            .get_mut(tenant)
            .and_then(|d| d.promotions.get_mut(oid))
            .ok_or_else(|| StoreError::RowNotFound {
                kind: "promotion",
                oid: oid.to_string(),
            })?;
        row.status = status;
        Ok(())
    }

    async fn fetch_actions(
        &self,
        tenant: &TenantId,
        promotion_oid: &str,
    ) -> Result<Vec<ActionRow>, StoreError> {
        self.with_tenant(
            tenant,
            |d| d.actions.get(promotion_oid).cloned().unwrap_or_default(),
            Vec::new(),
        )
    }

    async fn fetch_conditions(
        &self,
        tenant: &TenantId,
        parent: &ParentLink,
    ) -> Result<Vec<ConditionRow>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.conditions
                    .iter()
                    .filter(|row| &row.parent == parent)
                    .cloned()
                    .collect()
            },
            Vec::new(),
        )
    }

    async fn fetch_condition_products(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.condition_products
                    .get(condition_oid)
                    .cloned()
                    .unwrap_or_default()
            },
            Vec::new(),
        )
    }

    async fn fetch_condition_families(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.condition_families
                    .get(condition_oid)
                    .cloned()
                    .unwrap_or_default()
            },
            Vec::new(),
        )
    }

    async fn fetch_family_members(
        &self,
        tenant: &TenantId,
        family_oid: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.with_tenant(
            tenant,
            |d| d.family_members.get(family_oid).cloned().unwrap_or_default(),
            Vec::new(),
        )
    }

    async fn fetch_store_identifiers(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.store_identifiers
                    .get(condition_oid)
                    .cloned()
                    .unwrap_or_default()
            },
            Vec::new(),
        )
    }

    async fn fetch_attribute_pairs(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<AttributePair>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.attribute_pairs
                    .get(condition_oid)
                    .cloned()
                    .unwrap_or_default()
            },
            Vec::new(),
        )
    }

    async fn fetch_date_ranges(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<DateRangeRow>, StoreError> {
        self.with_tenant(
            tenant,
            |d| d.date_ranges.get(condition_oid).cloned().unwrap_or_default(),
            Vec::new(),
        )
    }

    async fn fetch_time_ranges(
        &self,
        tenant: &TenantId,
        condition_oid: &str,
    ) -> Result<Vec<TimeRangeRow>, StoreError> {
        self.with_tenant(
            tenant,
            |d| d.time_ranges.get(condition_oid).cloned().unwrap_or_default(),
            Vec::new(),
        )
    }

    async fn query_products(
        &self,
        tenant: &TenantId,
        query: &ProductQuery,
    ) -> Result<Vec<String>, StoreError> {
        self.with_tenant(
            tenant,
            |d| {
                d.products
                    .iter()
                    .filter(|product| {
                        if query.is_unrestricted() {
                            return true;
                        }
                        let mut matches = query
                            .clauses
                            .iter()
                            .map(|c| product.attributes.get(&c.select) == Some(&c.value_id));
                        match query.op {
                            LogicalOperator::And => matches.all(|m| m),
                            LogicalOperator::Or => matches.any(|m| m),
                        }
                    })
                    .map(|product| product.oid.clone())
                    .collect()
            },
            Vec::new(),
        )
    }

    async fn fetch_attribute_value(
        &self,
        tenant: &TenantId,
        value_id: i64,
    ) -> Result<Option<String>, StoreError> {
        self.with_tenant(tenant, |d| d.attribute_values.get(&value_id).cloned(), None)
    }
}

/// In-memory [`TypeRegistry`].
#[derive(Default)]
pub struct MemoryRegistry {
    types: Mutex<Vec<TypeHandle>>,
    failure: Mutex<Option<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        MemoryRegistry::default()
    }

    pub fn register(&self, handle: TypeHandle) {
        self.types
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Make every subsequent `resolve` fail, simulating an unreachable
    /// registry.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }
}

#[async_trait]
impl TypeRegistry for MemoryRegistry {
    async fn resolve(&self, name_or_id: &str) -> Result<Option<TypeHandle>, RegistryError> {
        if let Some(message) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(RegistryError::Unavailable(message));
        }
        let types = self.types.lock().unwrap_or_else(|e| e.into_inner());
        // Exact name match wins over the stable identifier.
        let by_name = types.iter().find(|t| t.name == name_or_id).cloned();
        Ok(by_name.or_else(|| types.iter().find(|t| t.uuid == name_or_id).cloned()))
    }
}

#[derive(Debug, Clone)]
struct TenantConfig {
    mappings: BTreeMap<String, AttributeMapping>,
    operator: LogicalOperator,
    engine_rule: Option<String>,
    enabled: bool,
    offset: UtcOffset,
}

impl Default for TenantConfig {
    fn default() -> Self {
        TenantConfig {
            mappings: BTreeMap::new(),
            operator: LogicalOperator::And,
            engine_rule: None,
            enabled: true,
            offset: UtcOffset::UTC,
        }
    }
}

/// In-memory [`ConfigProvider`].
#[derive(Default)]
pub struct MemoryConfig {
    tenants: Mutex<HashMap<TenantId, TenantConfig>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        MemoryConfig::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TenantId, TenantConfig>> {
        self.tenants.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_mapping(&self, tenant: &TenantId, key: impl Into<String>, mapping: AttributeMapping) {
        self.lock()
            .entry(tenant.clone())
            .or_default()
            .mappings
            .insert(key.into(), mapping);
    }

    pub fn set_filter_operator(&self, tenant: &TenantId, operator: LogicalOperator) {
        self.lock().entry(tenant.clone()).or_default().operator = operator;
    }

    pub fn set_engine_rule(&self, tenant: &TenantId, rule: impl Into<String>) {
        self.lock().entry(tenant.clone()).or_default().engine_rule = Some(rule.into());
    }

    pub fn set_promotions_enabled(&self, tenant: &TenantId, enabled: bool) {
        self.lock().entry(tenant.clone()).or_default().enabled = enabled;
    }

    pub fn set_utc_offset(&self, tenant: &TenantId, offset: UtcOffset) {
        self.lock().entry(tenant.clone()).or_default().offset = offset;
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfig {
    async fn attribute_mappings(
        &self,
        tenant: &TenantId,
    ) -> Result<BTreeMap<String, AttributeMapping>, StoreError> {
        Ok(self
            .lock()
            .get(tenant)
            .map(|c| c.mappings.clone())
            .unwrap_or_default())
    }

    async fn filter_operator(&self, tenant: &TenantId) -> Result<LogicalOperator, StoreError> {
        Ok(self
            .lock()
            .get(tenant)
            .map(|c| c.operator)
            .unwrap_or_default())
    }

    async fn engine_rule(&self, tenant: &TenantId) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(tenant).and_then(|c| c.engine_rule.clone()))
    }

    async fn promotions_enabled(&self, tenant: &TenantId) -> Result<bool, StoreError> {
        Ok(self.lock().get(tenant).map(|c| c.enabled).unwrap_or(true))
    }

    async fn utc_offset(&self, tenant: &TenantId) -> Result<UtcOffset, StoreError> {
        Ok(self
            .lock()
            .get(tenant)
            .map(|c| c.offset)
            .unwrap_or(UtcOffset::UTC))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MatchClause;
    use crate::row::ConditionKind;
    use rust_decimal::Decimal;
    use time::macros::datetime;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn promotion_row(oid: &str, status: PromotionStatus, priority: i32) -> PromotionRow {
        PromotionRow {
            oid: oid.to_string(),
            name: format!("promo-{oid}"),
            label: None,
            description: None,
            priority,
            start_at: datetime!(2024-01-01 00:00 UTC),
            end_at: datetime!(2025-01-01 00:00 UTC),
            status,
        }
    }

    #[tokio::test]
    async fn active_promotions_filtered_and_ordered() {
        let store = MemoryStore::new();
        store.insert_promotion(&tenant(), promotion_row("1.1", PromotionStatus::Active, 10));
        store.insert_promotion(&tenant(), promotion_row("1.2", PromotionStatus::Inactive, 1));
        store.insert_promotion(&tenant(), promotion_row("1.3", PromotionStatus::Active, 2));

        let rows = store.fetch_active_promotions(&tenant()).await.unwrap();
        let oids: Vec<&str> = rows.iter().map(|r| r.oid.as_str()).collect();
        assert_eq!(oids, vec!["1.3", "1.1"]);
        assert_eq!(store.active_fetch_count(), 1);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = MemoryStore::new();
        let other = TenantId::new("globex");
        store.insert_promotion(&tenant(), promotion_row("1.1", PromotionStatus::Active, 0));

        assert!(store
            .fetch_active_promotions(&other)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn conditions_fetched_by_parent() {
        let store = MemoryStore::new();
        let top = ConditionRow::new(
            "c1",
            ConditionKind::Or,
            ParentLink::Promotion("1.1".to_string()),
            0,
        );
        let child = ConditionRow::new(
            "c2",
            ConditionKind::Stack,
            ParentLink::Condition("c1".to_string()),
            0,
        );
        store.insert_condition(&tenant(), top.clone());
        store.insert_condition(&tenant(), child.clone());

        let direct = store
            .fetch_conditions(&tenant(), &ParentLink::Promotion("1.1".to_string()))
            .await
            .unwrap();
        assert_eq!(direct, vec![top]);

        let children = store
            .fetch_conditions(&tenant(), &ParentLink::Condition("c1".to_string()))
            .await
            .unwrap();
        assert_eq!(children, vec![child]);
    }

    #[tokio::test]
    async fn query_products_and_or_semantics() {
        let store = MemoryStore::new();
        store.insert_product(
            &tenant(),
            ProductRecord::new("p1")
                .with_attribute("class.brand", 1)
                .with_attribute("class.line", 2),
        );
        store.insert_product(&tenant(), ProductRecord::new("p2").with_attribute("class.brand", 1));
        store.insert_product(&tenant(), ProductRecord::new("p3").with_attribute("class.line", 2));

        let clauses = vec![
            MatchClause::new("class.brand", 1),
            MatchClause::new("class.line", 2),
        ];
        let and = store
            .query_products(
                &tenant(),
                &ProductQuery::new(clauses.clone(), LogicalOperator::And),
            )
            .await
            .unwrap();
        assert_eq!(and, vec!["p1".to_string()]);

        let or = store
            .query_products(&tenant(), &ProductQuery::new(clauses, LogicalOperator::Or))
            .await
            .unwrap();
        assert_eq!(or.len(), 3);
    }

    #[tokio::test]
    async fn unrestricted_query_returns_everything() {
        let store = MemoryStore::new();
        store.insert_product(&tenant(), ProductRecord::new("p1"));
        store.insert_product(&tenant(), ProductRecord::new("p2").with_attribute("x", 9));

        let all = store
            .query_products(&tenant(), &ProductQuery::unrestricted())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_status_missing_row() {
        let store = MemoryStore::new();
        let err = store
            .update_promotion_status(&tenant(), "9.9", PromotionStatus::Inactive)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::RowNotFound {
                kind: "promotion",
                oid: "9.9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn registry_name_wins_over_uuid() {
        let registry = MemoryRegistry::new();
        registry.register(TypeHandle {
            id: 1,
            name: "Products_AttributeBrand".to_string(),
            uuid: "aaaa-1111".to_string(),
            label: "Brand".to_string(),
        });
        registry.register(TypeHandle {
            id: 2,
            name: "aaaa-1111".to_string(),
            uuid: "bbbb-2222".to_string(),
            label: "Odd".to_string(),
        });

        // "aaaa-1111" is both type 1's uuid and type 2's name; name match wins.
        let resolved = registry.resolve("aaaa-1111").await.unwrap().unwrap();
        assert_eq!(resolved.id, 2);

        let by_uuid = registry.resolve("bbbb-2222").await.unwrap().unwrap();
        assert_eq!(by_uuid.id, 2);

        assert!(registry.resolve("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn registry_failure_propagates() {
        let registry = MemoryRegistry::new();
        registry.fail_with("connection refused");
        let err = registry.resolve("anything").await.unwrap_err();
        assert_eq!(
            err,
            RegistryError::Unavailable("connection refused".to_string())
        );
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = MemoryConfig::new();
        assert_eq!(
            config.filter_operator(&tenant()).await.unwrap(),
            LogicalOperator::And
        );
        assert!(config.promotions_enabled(&tenant()).await.unwrap());
        assert_eq!(config.engine_rule(&tenant()).await.unwrap(), None);
        assert_eq!(config.utc_offset(&tenant()).await.unwrap(), UtcOffset::UTC);
        assert!(config.attribute_mappings(&tenant()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn actions_in_stored_order() {
        let store = MemoryStore::new();
        store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a1", crate::row::ActionKind::PercentageDiscount, Decimal::TEN),
        );
        store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a2", crate::row::ActionKind::FixedAmount, Decimal::ONE),
        );
        let actions = store.fetch_actions(&tenant(), "1.1").await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].oid, "a1");
    }
}
