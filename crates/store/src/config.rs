//! Per-tenant configuration collaborator.
//!
//! Tenants configure the attribute mapping table consumed by the predicate
//! compiler, the logical operator gluing compiled clauses, the engine rule
//! name handed to the external engine, the subsystem kill-switch, and the
//! UTC offset captured by the assembler for time conditions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use promo_model::LogicalOperator;
use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::error::StoreError;
use crate::tenant::TenantId;

/// One entry of the attribute mapping table: a short key maps to a type
/// reference (name or stable identifier), the storage select expression the
/// compiled clause matches against, and a display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub type_ref: String,
    pub select: String,
    pub label: String,
}

impl AttributeMapping {
    pub fn new(
        type_ref: impl Into<String>,
        select: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        AttributeMapping {
            type_ref: type_ref.into(),
            select: select.into(),
            label: label.into(),
        }
    }
}

/// Read-only per-tenant configuration.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// The attribute mapping table, keyed by short key.
    async fn attribute_mappings(
        &self,
        tenant: &TenantId,
    ) -> Result<BTreeMap<String, AttributeMapping>, StoreError>;

    /// Operator gluing compiled filter clauses. Defaults to AND.
    async fn filter_operator(&self, tenant: &TenantId) -> Result<LogicalOperator, StoreError>;

    /// Configured engine rule name, if any.
    async fn engine_rule(&self, tenant: &TenantId) -> Result<Option<String>, StoreError>;

    /// Kill-switch: when false the orchestrator applies no promotions at all.
    async fn promotions_enabled(&self, tenant: &TenantId) -> Result<bool, StoreError>;

    /// The tenant's UTC offset, captured by the assembler for time ranges.
    async fn utc_offset(&self, tenant: &TenantId) -> Result<UtcOffset, StoreError>;
}
