//! The rule assembler: reads a promotion's rows and produces one immutable
//! promotion graph.
//!
//! Assembly is a pure read path: header row, action rows, then the direct
//! child condition rows, dispatching exhaustively on each row's stored kind.
//! OR containers recurse by parent link; the recursion terminates at leaf
//! kinds, which query no children. A malformed ordinal anywhere fails the
//! whole assembly — that is data corruption, not a recoverable condition.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use promo_model::{
    Action, Condition, DateCondition, DateRange, DocTotalCondition, DynamicProductsCondition,
    EntryOperator, FamilyEntry, MaxCondition, Operator, OrCondition, ProductFamilyCondition,
    ProductTotalCondition, ProductsCondition, Promotion, StackCondition, StoreCondition, Strategy,
    TimeCondition, TimeRange,
};
use promo_store::{
    ActionKind, ActionRow, ConditionKind, ConditionRow, ConfigProvider, ParentLink, PromotionRow,
    PromotionStore, TenantId, TypeRegistry,
};
use rust_decimal::Decimal;
use time::UtcOffset;

use crate::error::CatalogError;
use crate::filter::FilterResolver;

/// Which condition set a top-level condition row belongs to.
enum Container {
    Source,
    Target,
}

/// Assembles promotions from row storage.
pub struct Assembler {
    store: Arc<dyn PromotionStore>,
    config: Arc<dyn ConfigProvider>,
    filter: FilterResolver,
}

impl Assembler {
    pub fn new(
        store: Arc<dyn PromotionStore>,
        registry: Arc<dyn TypeRegistry>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        let filter = FilterResolver::new(store.clone(), registry, config.clone());
        Assembler {
            store,
            config,
            filter,
        }
    }

    /// Assemble one promotion by oid.
    pub async fn assemble(&self, tenant: &TenantId, oid: &str) -> Result<Promotion, CatalogError> {
        let row = self
            .store
            .fetch_promotion(tenant, oid)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                oid: oid.to_string(),
            })?;
        self.assemble_row(tenant, &row).await
    }

    /// Assemble every promotion whose status is Active at call time.
    ///
    /// One corrupt promotion aborts the whole batch; no partial list is
    /// returned.
    pub async fn assemble_active(&self, tenant: &TenantId) -> Result<Vec<Promotion>, CatalogError> {
        let rows = self.store.fetch_active_promotions(tenant).await?;
        let mut promotions = Vec::with_capacity(rows.len());
        for row in &rows {
            promotions.push(self.assemble_row(tenant, row).await?);
        }
        Ok(promotions)
    }

    async fn assemble_row(
        &self,
        tenant: &TenantId,
        row: &PromotionRow,
    ) -> Result<Promotion, CatalogError> {
        // Offset for time ranges is captured now, at assembly time, from
        // tenant configuration. Evaluations against a long-lived cache keep
        // whatever offset was current when the payload was built.
        let offset = self.config.utc_offset(tenant).await?;

        let mut builder = Promotion::builder()
            .with_oid(&row.oid)
            .with_name(&row.name)
            .with_priority(row.priority)
            .with_start_at(row.start_at)
            .with_end_at(row.end_at);
        if let Some(label) = &row.label {
            builder = builder.with_label(label);
        }
        if let Some(description) = &row.description {
            builder = builder.with_description(description);
        }

        for action_row in self.store.fetch_actions(tenant, &row.oid).await? {
            builder = builder.add_action(build_action(&row.oid, &action_row)?);
        }

        let parent = ParentLink::Promotion(row.oid.clone());
        for condition_row in self.store.fetch_conditions(tenant, &parent).await? {
            let target_set = container(&condition_row)?;
            let condition = self.build_condition(tenant, condition_row, offset).await?;
            builder = match target_set {
                Container::Source => builder.add_source_condition(condition),
                Container::Target => builder.add_target_condition(condition),
            };
        }

        builder
            .build()
            .map_err(|err| CatalogError::corrupt(&row.oid, err.to_string()))
    }

    /// Build one condition from its row, recursing into OR children.
    fn build_condition<'a>(
        &'a self,
        tenant: &'a TenantId,
        row: ConditionRow,
        offset: UtcOffset,
    ) -> Pin<Box<dyn Future<Output = Result<Condition, CatalogError>> + Send + 'a>> {
        Box::pin(async move {
            let condition: Condition = match row.kind {
                ConditionKind::Products => {
                    let operator = entry_operator(&row)?;
                    let products = self.store.fetch_condition_products(tenant, &row.oid).await?;
                    let mut condition = ProductsCondition::new(operator, products);
                    if let Some(quantity) = row.position_quantity {
                        condition = condition.with_position_quantity(quantity_of(&row, quantity)?);
                    }
                    if let Some(allow) = row.allow_target_same_as_source {
                        condition = condition.with_allow_target_same_as_source(allow);
                    }
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::ProductFamily => {
                    let operator = entry_operator(&row)?;
                    let families = self.store.fetch_condition_families(tenant, &row.oid).await?;
                    // Zero linked families is an empty entries list, not an error.
                    let mut entries = Vec::with_capacity(families.len());
                    for family_oid in families {
                        let members = self.store.fetch_family_members(tenant, &family_oid).await?;
                        entries.push(FamilyEntry::new(family_oid, members));
                    }
                    let mut condition = ProductFamilyCondition::new(operator, entries);
                    if let Some(allow) = row.allow_target_same_as_source {
                        condition = condition.with_allow_target_same_as_source(allow);
                    }
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Store => {
                    let operator = entry_operator(&row)?;
                    let identifiers = self.store.fetch_store_identifiers(tenant, &row.oid).await?;
                    let mut condition = StoreCondition::new(operator, identifiers);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::DynamicProducts => {
                    let operator = entry_operator(&row)?;
                    let resolution = self
                        .filter
                        .resolve_condition_products(tenant, &row.oid)
                        .await?;
                    if !resolution.dropped.is_empty() {
                        tracing::debug!(
                            %tenant,
                            condition = %row.oid,
                            dropped = resolution.dropped.len(),
                            "attribute pairs dropped during assembly"
                        );
                    }
                    let mut condition =
                        DynamicProductsCondition::new(operator, resolution.product_oids);
                    if let Some(quantity) = row.position_quantity {
                        condition = condition.with_position_quantity(quantity_of(&row, quantity)?);
                    }
                    if let Some(allow) = row.allow_target_same_as_source {
                        condition = condition.with_allow_target_same_as_source(allow);
                    }
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Date => {
                    let ranges = self
                        .store
                        .fetch_date_ranges(tenant, &row.oid)
                        .await?
                        .into_iter()
                        .map(|r| DateRange::new(r.start, r.end))
                        .collect();
                    let mut condition = DateCondition::new(ranges);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Time => {
                    let ranges = self
                        .store
                        .fetch_time_ranges(tenant, &row.oid)
                        .await?
                        .into_iter()
                        .map(|r| TimeRange::new(r.start, r.end, offset))
                        .collect();
                    let mut condition = TimeCondition::new(ranges);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::DocTotal => {
                    let mut condition = DocTotalCondition::new(operator_of(&row)?, total_of(&row)?);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::ProductTotal => {
                    let operator = operator_of(&row)?;
                    let total = total_of(&row)?;
                    let products = self.store.fetch_condition_products(tenant, &row.oid).await?;
                    let mut condition = ProductTotalCondition::new(operator, total, products);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Max => {
                    let max = row.max_count.ok_or_else(|| {
                        CatalogError::corrupt(&row.oid, "max condition without count")
                    })?;
                    let max = u32::try_from(max).map_err(|_| {
                        CatalogError::corrupt(&row.oid, format!("negative max count {max}"))
                    })?;
                    let mut condition = MaxCondition::new(max);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Stack => {
                    let mut condition = StackCondition::new();
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
                ConditionKind::Or => {
                    let children_rows = self
                        .store
                        .fetch_conditions(tenant, &ParentLink::Condition(row.oid.clone()))
                        .await?;
                    let mut children = Vec::with_capacity(children_rows.len());
                    for child in children_rows {
                        children.push(self.build_condition(tenant, child, offset).await?);
                    }
                    let mut condition = OrCondition::new(children);
                    if let Some(note) = &row.note {
                        condition = condition.with_note(note);
                    }
                    condition.into()
                }
            };
            Ok(condition)
        })
    }
}

fn build_action(promotion_oid: &str, row: &ActionRow) -> Result<Action, CatalogError> {
    let strategy = match row.strategy {
        None => Strategy::default(),
        Some(ordinal) => Strategy::try_from(ordinal)
            .map_err(|err| CatalogError::corrupt(promotion_oid, err.to_string()))?,
    };
    match row.kind {
        ActionKind::PercentageDiscount => {
            if row.magnitude < Decimal::ZERO || row.magnitude > Decimal::ONE_HUNDRED {
                return Err(CatalogError::corrupt(
                    promotion_oid,
                    format!("percentage {} outside [0, 100]", row.magnitude),
                ));
            }
            Ok(Action::percentage(row.magnitude, strategy))
        }
        ActionKind::FixedAmount => Ok(Action::fixed_amount(row.magnitude, strategy)),
    }
}

fn container(row: &ConditionRow) -> Result<Container, CatalogError> {
    match row.container {
        0 => Ok(Container::Source),
        1 => Ok(Container::Target),
        other => Err(CatalogError::corrupt(
            &row.oid,
            format!("container ordinal {other} out of range"),
        )),
    }
}

fn entry_operator(row: &ConditionRow) -> Result<EntryOperator, CatalogError> {
    let ordinal = row
        .entry_operator
        .ok_or_else(|| CatalogError::corrupt(&row.oid, "condition without entry operator"))?;
    EntryOperator::try_from(ordinal).map_err(|err| CatalogError::corrupt(&row.oid, err.to_string()))
}

fn operator_of(row: &ConditionRow) -> Result<Operator, CatalogError> {
    let ordinal = row
        .operator
        .ok_or_else(|| CatalogError::corrupt(&row.oid, "total condition without operator"))?;
    Operator::try_from(ordinal).map_err(|err| CatalogError::corrupt(&row.oid, err.to_string()))
}

fn total_of(row: &ConditionRow) -> Result<Decimal, CatalogError> {
    row.total
        .ok_or_else(|| CatalogError::corrupt(&row.oid, "total condition without total"))
}

fn quantity_of(row: &ConditionRow, quantity: i64) -> Result<u32, CatalogError> {
    u32::try_from(quantity)
        .map_err(|_| CatalogError::corrupt(&row.oid, format!("negative position quantity {quantity}")))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use promo_model::LogicalOperator;
    use promo_store::{
        AttributeMapping, DateRangeRow, MemoryConfig, MemoryRegistry, MemoryStore, ProductRecord,
        PromotionRow, PromotionStatus, TimeRangeRow, TypeHandle,
    };
    use promo_model::AttributePair;
    use time::macros::{date, datetime, offset, time};

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        registry: Arc<MemoryRegistry>,
        config: Arc<MemoryConfig>,
        assembler: Assembler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(MemoryRegistry::new());
        let config = Arc::new(MemoryConfig::new());
        let assembler = Assembler::new(store.clone(), registry.clone(), config.clone());
        Fixture {
            store,
            registry,
            config,
            assembler,
        }
    }

    fn header(oid: &str) -> PromotionRow {
        PromotionRow {
            oid: oid.to_string(),
            name: format!("promo-{oid}"),
            label: Some("Label".to_string()),
            description: Some("Description".to_string()),
            priority: 1,
            start_at: datetime!(2024-01-01 00:00 UTC),
            end_at: datetime!(2025-01-01 00:00 UTC),
            status: PromotionStatus::Active,
        }
    }

    #[tokio::test]
    async fn missing_promotion_is_not_found() {
        let f = fixture();
        let err = f.assembler.assemble(&tenant(), "9.9").await.unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotFound {
                oid: "9.9".to_string()
            }
        );
    }

    #[tokio::test]
    async fn assembles_header_actions_and_partitioned_conditions() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a1", ActionKind::PercentageDiscount, Decimal::TEN).with_strategy(1),
        );
        f.store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a2", ActionKind::FixedAmount, Decimal::new(500, 2)),
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Products,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(1)
            .with_position_quantity(2)
            .with_allow_target_same_as_source(true)
            .with_note("source products"),
        );
        f.store
            .set_condition_products(&tenant(), "c1", vec!["p1".to_string(), "p2".to_string()]);
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c2",
                ConditionKind::Stack,
                ParentLink::Promotion("1.1".to_string()),
                1,
            ),
        );

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        assert_eq!(promotion.oid(), "1.1");
        assert_eq!(promotion.name(), "promo-1.1");
        assert_eq!(promotion.label(), Some("Label"));
        assert_eq!(promotion.actions().len(), 2);
        assert_eq!(
            promotion.actions()[0],
            Action::percentage(Decimal::TEN, Strategy::Priciest)
        );
        // Absent strategy ordinal falls back to the default.
        assert_eq!(promotion.actions()[1].strategy(), Strategy::Cheapest);

        assert_eq!(promotion.source_conditions().len(), 1);
        assert_eq!(promotion.target_conditions().len(), 1);
        assert_eq!(
            promotion.source_conditions()[0],
            Condition::Products(
                ProductsCondition::new(
                    EntryOperator::IncludesAll,
                    ["p1".to_string(), "p2".to_string()]
                )
                .with_position_quantity(2)
                .with_allow_target_same_as_source(true)
                .with_note("source products")
            )
        );
    }

    #[tokio::test]
    async fn malformed_strategy_ordinal_fails_assembly() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a1", ActionKind::PercentageDiscount, Decimal::TEN).with_strategy(9),
        );
        let err = f.assembler.assemble(&tenant(), "1.1").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn percentage_out_of_range_fails_assembly() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_action(
            &tenant(),
            "1.1",
            ActionRow::new("a1", ActionKind::PercentageDiscount, Decimal::new(101, 0)),
        );
        let err = f.assembler.assemble(&tenant(), "1.1").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn malformed_entry_operator_fails_assembly() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Products,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(5),
        );
        let err = f.assembler.assemble(&tenant(), "1.1").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn family_condition_snapshots_members() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::ProductFamily,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(0),
        );
        f.store
            .set_condition_families(&tenant(), "c1", vec!["fam1".to_string(), "fam2".to_string()]);
        f.store
            .set_family_members(&tenant(), "fam1", vec!["p1".to_string(), "p2".to_string()]);
        // fam2 has no members on purpose.

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        let Condition::ProductFamily(condition) = &promotion.source_conditions()[0] else {
            panic!("expected family condition");
        };
        assert_eq!(condition.entries.len(), 2);
        assert_eq!(condition.entries[0].product_oids.len(), 2);
        assert!(condition.entries[1].product_oids.is_empty());
    }

    #[tokio::test]
    async fn family_condition_with_zero_families_is_empty_not_error() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::ProductFamily,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(0),
        );
        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        let Condition::ProductFamily(condition) = &promotion.source_conditions()[0] else {
            panic!("expected family condition");
        };
        assert!(condition.entries.is_empty());
    }

    #[tokio::test]
    async fn dynamic_products_resolved_through_filter() {
        let f = fixture();
        f.registry.register(TypeHandle {
            id: 1,
            name: "Products_AttributeBrand".to_string(),
            uuid: "11111111-aaaa".to_string(),
            label: "Brand".to_string(),
        });
        f.config.set_mapping(
            &tenant(),
            "brand",
            AttributeMapping::new("Products_AttributeBrand", "class.brand", "Brand"),
        );
        f.store
            .insert_product(&tenant(), ProductRecord::new("p1").with_attribute("class.brand", 10));
        f.store
            .insert_product(&tenant(), ProductRecord::new("p2").with_attribute("class.brand", 99));

        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::DynamicProducts,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(0),
        );
        f.store
            .set_attribute_pairs(&tenant(), "c1", vec![AttributePair::new("brand", 10)]);
        f.config.set_filter_operator(&tenant(), LogicalOperator::And);

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        let Condition::DynamicProducts(condition) = &promotion.source_conditions()[0] else {
            panic!("expected dynamic products condition");
        };
        assert!(condition.products.contains("p1"));
        assert!(!condition.products.contains("p2"));
    }

    #[tokio::test]
    async fn date_time_and_total_conditions() {
        let f = fixture();
        f.config.set_utc_offset(&tenant(), offset!(-5));
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Date,
                ParentLink::Promotion("1.1".to_string()),
                0,
            ),
        );
        f.store.set_date_ranges(
            &tenant(),
            "c1",
            vec![DateRangeRow {
                start: date!(2024 - 12 - 01),
                end: date!(2024 - 12 - 31),
            }],
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c2",
                ConditionKind::Time,
                ParentLink::Promotion("1.1".to_string()),
                0,
            ),
        );
        f.store.set_time_ranges(
            &tenant(),
            "c2",
            vec![TimeRangeRow {
                start: time!(09:00),
                end: time!(18:00),
            }],
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c3",
                ConditionKind::DocTotal,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_operator(2)
            .with_total(Decimal::new(10000, 2)),
        );

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        assert_eq!(promotion.source_conditions().len(), 3);
        let Condition::Time(time_condition) = &promotion.source_conditions()[1] else {
            panic!("expected time condition");
        };
        // Offset captured from tenant config at assembly time.
        assert_eq!(time_condition.ranges[0].offset, offset!(-5));
        let Condition::DocTotal(total_condition) = &promotion.source_conditions()[2] else {
            panic!("expected doc total condition");
        };
        assert_eq!(total_condition.operator, Operator::GreaterEqual);
    }

    #[tokio::test]
    async fn store_and_product_total_conditions() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Store,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_entry_operator(2),
        );
        f.store
            .set_store_identifiers(&tenant(), "c1", vec!["backend-01".to_string()]);
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c2",
                ConditionKind::ProductTotal,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_operator(1)
            .with_total(Decimal::new(5000, 2)),
        );
        f.store
            .set_condition_products(&tenant(), "c2", vec!["p1".to_string()]);

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        assert_eq!(
            promotion.source_conditions()[0],
            Condition::Store(StoreCondition::new(
                EntryOperator::Excludes,
                ["backend-01".to_string()]
            ))
        );
        assert_eq!(
            promotion.source_conditions()[1],
            Condition::ProductTotal(ProductTotalCondition::new(
                Operator::Greater,
                Decimal::new(5000, 2),
                ["p1".to_string()]
            ))
        );
    }

    #[tokio::test]
    async fn or_condition_recurses_by_parent_link() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "or1",
                ConditionKind::Or,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_note("outer"),
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "or2",
                ConditionKind::Or,
                ParentLink::Condition("or1".to_string()),
                0,
            ),
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "leaf1",
                ConditionKind::Max,
                ParentLink::Condition("or2".to_string()),
                0,
            )
            .with_max_count(3),
        );
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "leaf2",
                ConditionKind::Stack,
                ParentLink::Condition("or1".to_string()),
                0,
            ),
        );

        let promotion = f.assembler.assemble(&tenant(), "1.1").await.unwrap();
        let Condition::Or(outer) = &promotion.source_conditions()[0] else {
            panic!("expected or condition");
        };
        assert_eq!(outer.note.as_deref(), Some("outer"));
        assert_eq!(outer.children.len(), 2);
        let Condition::Or(inner) = &outer.children[0] else {
            panic!("expected nested or condition");
        };
        assert_eq!(
            inner.children,
            vec![Condition::Max(MaxCondition::new(3))]
        );
        assert_eq!(outer.children[1], Condition::Stack(StackCondition::new()));
    }

    #[tokio::test]
    async fn negative_max_count_fails_assembly() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Max,
                ParentLink::Promotion("1.1".to_string()),
                0,
            )
            .with_max_count(-1),
        );
        let err = f.assembler.assemble(&tenant(), "1.1").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn invalid_container_ordinal_fails_assembly() {
        let f = fixture();
        f.store.insert_promotion(&tenant(), header("1.1"));
        f.store.insert_condition(
            &tenant(),
            ConditionRow::new(
                "c1",
                ConditionKind::Stack,
                ParentLink::Promotion("1.1".to_string()),
                7,
            ),
        );
        let err = f.assembler.assemble(&tenant(), "1.1").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn bulk_assembly_aborts_on_first_corrupt_promotion() {
        let f = fixture();
        let mut first = header("1.1");
        first.priority = 1;
        let mut second = header("1.2");
        second.priority = 2;
        f.store.insert_promotion(&tenant(), first);
        f.store.insert_promotion(&tenant(), second);
        f.store.insert_action(
            &tenant(),
            "1.2",
            ActionRow::new("a1", ActionKind::PercentageDiscount, Decimal::TEN).with_strategy(42),
        );

        let err = f.assembler.assemble_active(&tenant()).await.unwrap_err();
        assert!(matches!(err, CatalogError::DataCorruption { .. }));
    }

    #[tokio::test]
    async fn bulk_assembly_orders_by_priority() {
        let f = fixture();
        let mut low = header("1.1");
        low.priority = 9;
        let mut high = header("1.2");
        high.priority = 1;
        f.store.insert_promotion(&tenant(), low);
        f.store.insert_promotion(&tenant(), high);

        let promotions = f.assembler.assemble_active(&tenant()).await.unwrap();
        let oids: Vec<&str> = promotions.iter().map(Promotion::oid).collect();
        assert_eq!(oids, vec!["1.2", "1.1"]);
    }
}
