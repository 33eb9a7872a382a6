//! Tenant-scoped promotion cache with stampede-safe coordination.
//!
//! Per tenant the cache holds an optional serialized payload plus two flags:
//! `stale` (the payload must be rebuilt) and `loading` (a rebuild is in
//! flight, self-expiring after a bounded duration). The state machine:
//!
//! | state | reader behavior |
//! |---|---|
//! | payload absent | trigger rebuild unless loading |
//! | payload present, not stale | serve directly |
//! | payload present, stale, not loading | evict flag and payload, rebuild |
//! | loading | serve the old payload (or none) without a second rebuild |
//!
//! The loading flag is a time-bounded advisory lock, not a strict mutex: it
//! prevents rebuild storms but never blocks a reader. Concurrent readers of
//! a loading tenant tolerate a transiently empty or stale list —
//! at-most-one-rebuild-in-flight is prioritized over always-fresh.
//!
//! Serialization failures on either side of the payload boundary are logged
//! and downgraded to a cache miss; they never reach the caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use promo_model::Promotion;
use promo_store::TenantId;

use crate::assemble::Assembler;
use crate::error::CatalogError;

/// Cache tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long a loading flag suppresses other rebuild attempts. This is
    /// the only cap on a stuck rebuild's effect on other readers.
    pub loading_ttl: Duration,
    /// Expiry of per-promotion entries.
    pub promotion_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            loading_ttl: Duration::from_secs(30),
            promotion_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct TenantSlot {
    payload: Option<String>,
    stale: bool,
    loading_until: Option<Instant>,
}

#[derive(Debug)]
struct SingleSlot {
    payload: String,
    expires_at: Instant,
}

enum Plan {
    Serve(Vec<Promotion>),
    Fallback(Option<Vec<Promotion>>),
    Rebuild,
}

/// The tenant cache coordinator. Shared across all concurrent requests for a
/// tenant; no operation blocks waiting on another's completion.
pub struct PromotionCache {
    assembler: Assembler,
    config: CacheConfig,
    slots: Mutex<HashMap<TenantId, TenantSlot>>,
    singles: Mutex<HashMap<(TenantId, String), SingleSlot>>,
}

impl PromotionCache {
    pub fn new(assembler: Assembler, config: CacheConfig) -> Self {
        PromotionCache {
            assembler,
            config,
            slots: Mutex::new(HashMap::new()),
            singles: Mutex::new(HashMap::new()),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<TenantId, TenantSlot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_singles(&self) -> MutexGuard<'_, HashMap<(TenantId, String), SingleSlot>> {
        self.singles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The tenant's active promotion list, rebuilt through the assembler on
    /// a miss.
    pub async fn get_active_promotions(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<Promotion>, CatalogError> {
        let plan = {
            let mut slots = self.lock_slots();
            let slot = slots.entry(tenant.clone()).or_default();
            let now = Instant::now();
            let loading = slot.loading_until.is_some_and(|until| until > now);

            if loading {
                Plan::Fallback(slot.payload.as_deref().and_then(|payload| {
                    match serde_json::from_str(payload) {
                        Ok(list) => Some(list),
                        Err(err) => {
                            tracing::warn!(%tenant, %err, "cache payload unreadable while rebuild in flight");
                            None
                        }
                    }
                }))
            } else {
                if slot.stale {
                    slot.stale = false;
                    slot.payload = None;
                }
                let cached = slot.payload.as_deref().and_then(|payload| {
                    match serde_json::from_str::<Vec<Promotion>>(payload) {
                        Ok(list) => Some(list),
                        Err(err) => {
                            tracing::warn!(%tenant, %err, "cache payload unreadable, treating as miss");
                            None
                        }
                    }
                });
                match cached {
                    Some(list) => Plan::Serve(list),
                    None => {
                        slot.payload = None;
                        slot.loading_until = Some(now + self.config.loading_ttl);
                        Plan::Rebuild
                    }
                }
            }
        };

        match plan {
            Plan::Serve(list) => Ok(list),
            Plan::Fallback(list) => Ok(list.unwrap_or_default()),
            Plan::Rebuild => {
                let assembled = self.assembler.assemble_active(tenant).await;
                let mut slots = self.lock_slots();
                let slot = slots.entry(tenant.clone()).or_default();
                slot.loading_until = None;
                let promotions = assembled?;
                match serde_json::to_string(&promotions) {
                    Ok(payload) => {
                        slot.payload = Some(payload);
                        slot.stale = false;
                    }
                    Err(err) => {
                        tracing::warn!(%tenant, %err, "failed to serialize catalog payload");
                    }
                }
                Ok(promotions)
            }
        }
    }

    /// One promotion through the short-TTL per-id cache. A miss assembles
    /// directly, bypassing the tenant-wide rebuild machinery.
    pub async fn get_promotion(
        &self,
        tenant: &TenantId,
        oid: &str,
    ) -> Result<Promotion, CatalogError> {
        let key = (tenant.clone(), oid.to_string());
        {
            let mut singles = self.lock_singles();
            if let Some(slot) = singles.get(&key) {
                if slot.expires_at > Instant::now() {
                    match serde_json::from_str(&slot.payload) {
                        Ok(promotion) => return Ok(promotion),
                        Err(err) => {
                            tracing::warn!(%tenant, oid, %err, "cached promotion unreadable, treating as miss");
                        }
                    }
                }
                singles.remove(&key);
            }
        }

        let promotion = self.assembler.assemble(tenant, oid).await?;
        match serde_json::to_string(&promotion) {
            Ok(payload) => {
                self.lock_singles().insert(
                    key,
                    SingleSlot {
                        payload,
                        expires_at: Instant::now() + self.config.promotion_ttl,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(%tenant, oid, %err, "failed to serialize promotion payload");
            }
        }
        Ok(promotion)
    }

    /// Mark the tenant's payload stale and sweep its per-promotion entries.
    /// Does not rebuild; the next reader does.
    pub fn invalidate(&self, tenant: &TenantId) {
        self.lock_slots().entry(tenant.clone()).or_default().stale = true;
        self.lock_singles().retain(|(t, _), _| t != tenant);
        tracing::debug!(%tenant, "promotion cache invalidated");
    }

    #[cfg(test)]
    fn force_loading(&self, tenant: &TenantId, ttl: Duration) {
        self.lock_slots()
            .entry(tenant.clone())
            .or_default()
            .loading_until = Some(Instant::now() + ttl);
    }

    #[cfg(test)]
    fn inject_payload(&self, tenant: &TenantId, payload: impl Into<String>) {
        self.lock_slots()
            .entry(tenant.clone())
            .or_default()
            .payload = Some(payload.into());
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use promo_store::{
        MemoryConfig, MemoryRegistry, MemoryStore, PromotionRow, PromotionStatus,
    };
    use std::sync::Arc;
    use time::macros::datetime;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: Arc<PromotionCache>,
    }

    fn fixture(config: CacheConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(MemoryRegistry::new());
        let tenant_config = Arc::new(MemoryConfig::new());
        let assembler = Assembler::new(store.clone(), registry, tenant_config);
        Fixture {
            store,
            cache: Arc::new(PromotionCache::new(assembler, config)),
        }
    }

    fn promotion_row(oid: &str) -> PromotionRow {
        PromotionRow {
            oid: oid.to_string(),
            name: format!("promo-{oid}"),
            label: None,
            description: None,
            priority: 0,
            start_at: datetime!(2024-01-01 00:00 UTC),
            end_at: datetime!(2025-01-01 00:00 UTC),
            status: PromotionStatus::Active,
        }
    }

    #[tokio::test]
    async fn idempotent_reads_assemble_once() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));

        let first = f.cache.get_active_promotions(&tenant()).await.unwrap();
        let second = f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(f.store.active_fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cold_cache_stampede_rebuilds_at_most_once() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = f.cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get_active_promotions(&tenant()).await.unwrap()
            }));
        }
        for handle in handles {
            // Concurrent readers get either the fresh list or a transiently
            // empty one; both are valid under the wait-free protocol.
            let list = handle.await.unwrap();
            assert!(list.len() <= 1);
        }
        assert_eq!(f.store.active_fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn invalidate_then_stampede_rebuilds_exactly_once() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(f.store.active_fetch_count(), 1);

        f.cache.invalidate(&tenant());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = f.cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get_active_promotions(&tenant()).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(f.store.active_fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild_with_fresh_rows() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        assert_eq!(f.cache.get_active_promotions(&tenant()).await.unwrap().len(), 1);

        f.store.insert_promotion(&tenant(), promotion_row("1.2"));
        // Still served from cache until invalidated.
        assert_eq!(f.cache.get_active_promotions(&tenant()).await.unwrap().len(), 1);

        f.cache.invalidate(&tenant());
        assert_eq!(f.cache.get_active_promotions(&tenant()).await.unwrap().len(), 2);
        assert_eq!(f.store.active_fetch_count(), 2);
    }

    #[tokio::test]
    async fn loading_flag_suppresses_rebuild_and_serves_old_payload() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(f.store.active_fetch_count(), 1);

        f.store.insert_promotion(&tenant(), promotion_row("1.2"));
        f.cache.force_loading(&tenant(), Duration::from_secs(60));

        // Old payload is served; no second rebuild while loading is valid.
        let list = f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(f.store.active_fetch_count(), 1);
    }

    #[tokio::test]
    async fn loading_flag_on_cold_cache_serves_empty() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.force_loading(&tenant(), Duration::from_secs(60));

        let list = f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert!(list.is_empty());
        assert_eq!(f.store.active_fetch_count(), 0);
    }

    #[tokio::test]
    async fn expired_loading_flag_allows_rebuild() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.force_loading(&tenant(), Duration::ZERO);

        let list = f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(f.store.active_fetch_count(), 1);
    }

    #[tokio::test]
    async fn unreadable_payload_downgrades_to_miss() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.inject_payload(&tenant(), "not json at all");

        let list = f.cache.get_active_promotions(&tenant()).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(f.store.active_fetch_count(), 1);
    }

    #[tokio::test]
    async fn assembly_failure_clears_loading_flag() {
        let f = fixture(CacheConfig::default());
        let mut corrupt = promotion_row("1.1");
        corrupt.status = PromotionStatus::Active;
        f.store.insert_promotion(&tenant(), corrupt);
        f.store.insert_action(
            &tenant(),
            "1.1",
            promo_store::ActionRow::new(
                "a1",
                promo_store::ActionKind::PercentageDiscount,
                rust_decimal::Decimal::TEN,
            )
            .with_strategy(99),
        );

        let err = f.cache.get_active_promotions(&tenant()).await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));

        // The failed rebuild released the loading flag; the next reader may
        // try again.
        let err = f.cache.get_active_promotions(&tenant()).await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
        assert_eq!(f.store.active_fetch_count(), 2);
    }

    #[tokio::test]
    async fn single_promotion_cache_fills_and_serves() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));

        let first = f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        let second = f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.store.promotion_fetch_count(), 1);
    }

    #[tokio::test]
    async fn single_promotion_ttl_expires() {
        let f = fixture(CacheConfig {
            promotion_ttl: Duration::ZERO,
            ..CacheConfig::default()
        });
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));

        f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        assert_eq!(f.store.promotion_fetch_count(), 2);
    }

    #[tokio::test]
    async fn single_promotion_bypasses_bulk_loading_flag() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.force_loading(&tenant(), Duration::from_secs(60));

        let promotion = f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        assert_eq!(promotion.oid(), "1.1");
        assert_eq!(f.store.active_fetch_count(), 0);
    }

    #[tokio::test]
    async fn invalidate_sweeps_single_entries() {
        let f = fixture(CacheConfig::default());
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        assert_eq!(f.store.promotion_fetch_count(), 1);

        f.cache.invalidate(&tenant());
        f.cache.get_promotion(&tenant(), "1.1").await.unwrap();
        assert_eq!(f.store.promotion_fetch_count(), 2);
    }

    #[tokio::test]
    async fn missing_promotion_surfaces_not_found() {
        let f = fixture(CacheConfig::default());
        let err = f.cache.get_promotion(&tenant(), "9.9").await.unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotFound {
                oid: "9.9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn tenants_do_not_share_slots() {
        let f = fixture(CacheConfig::default());
        let other = TenantId::new("globex");
        f.store.insert_promotion(&tenant(), promotion_row("1.1"));
        f.store.insert_promotion(&other, promotion_row("2.1"));

        assert_eq!(f.cache.get_active_promotions(&tenant()).await.unwrap().len(), 1);
        assert_eq!(f.cache.get_active_promotions(&other).await.unwrap().len(), 1);

        f.cache.invalidate(&tenant());
        // Other tenant's payload is untouched.
        assert_eq!(f.cache.get_active_promotions(&other).await.unwrap().len(), 1);
        assert_eq!(f.store.active_fetch_count(), 2);
    }
}
