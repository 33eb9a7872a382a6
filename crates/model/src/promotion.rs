//! The promotion aggregate and its builder.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::action::Action;
use crate::condition::Condition;
use crate::error::ModelError;

/// An assembled discount rule: header, actions, and the source/target
/// condition sets.
///
/// Immutable once built; any mutation requires re-assembly from source rows.
/// Lower priority values are evaluated first (the ordering policy itself is
/// owned by the external engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    oid: String,
    name: String,
    label: Option<String>,
    description: Option<String>,
    priority: i32,
    start_at: OffsetDateTime,
    end_at: OffsetDateTime,
    actions: Vec<Action>,
    source_conditions: Vec<Condition>,
    target_conditions: Vec<Condition>,
}

impl Promotion {
    pub fn builder() -> PromotionBuilder {
        PromotionBuilder::default()
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn start_at(&self) -> OffsetDateTime {
        self.start_at
    }

    pub fn end_at(&self) -> OffsetDateTime {
        self.end_at
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn source_conditions(&self) -> &[Condition] {
        &self.source_conditions
    }

    pub fn target_conditions(&self) -> &[Condition] {
        &self.target_conditions
    }

    /// Whether the active window `[start_at, end_at)` covers the instant.
    pub fn active_at(&self, at: OffsetDateTime) -> bool {
        self.start_at <= at && at < self.end_at
    }
}

/// Builder for [`Promotion`]. `oid` and `name` are required; the window
/// defaults to unbounded in both directions.
#[derive(Debug, Clone)]
pub struct PromotionBuilder {
    oid: Option<String>,
    name: Option<String>,
    label: Option<String>,
    description: Option<String>,
    priority: i32,
    start_at: OffsetDateTime,
    end_at: OffsetDateTime,
    actions: Vec<Action>,
    source_conditions: Vec<Condition>,
    target_conditions: Vec<Condition>,
}

impl Default for PromotionBuilder {
    fn default() -> Self {
        PromotionBuilder {
            oid: None,
            name: None,
            label: None,
            description: None,
            priority: 0,
            start_at: OffsetDateTime::UNIX_EPOCH,
            end_at: OffsetDateTime::UNIX_EPOCH + time::Duration::days(365 * 200),
            actions: Vec::new(),
            source_conditions: Vec::new(),
            target_conditions: Vec::new(),
        }
    }
}

impl PromotionBuilder {
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_start_at(mut self, start_at: OffsetDateTime) -> Self {
        self.start_at = start_at;
        self
    }

    pub fn with_end_at(mut self, end_at: OffsetDateTime) -> Self {
        self.end_at = end_at;
        self
    }

    pub fn add_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn add_source_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.source_conditions.push(condition.into());
        self
    }

    pub fn add_target_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.target_conditions.push(condition.into());
        self
    }

    pub fn build(self) -> Result<Promotion, ModelError> {
        Ok(Promotion {
            oid: self.oid.ok_or(ModelError::MissingField("oid"))?,
            name: self.name.ok_or(ModelError::MissingField("name"))?,
            label: self.label,
            description: self.description,
            priority: self.priority,
            start_at: self.start_at,
            end_at: self.end_at,
            actions: self.actions,
            source_conditions: self.source_conditions,
            target_conditions: self.target_conditions,
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
