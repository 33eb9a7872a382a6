//! The type registry collaborator: resolves opaque type references.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A canonical type handle resolved from a name or stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHandle {
    pub id: i64,
    pub name: String,
    /// Stable identifier string, unchanged across renames.
    pub uuid: String,
    pub label: String,
}

/// Resolves an opaque type reference to a canonical handle.
#[async_trait]
pub trait TypeRegistry: Send + Sync {
    /// Resolve `name_or_id`, matching by exact type name first and by the
    /// stable identifier string second.
    ///
    /// Returns `Ok(None)` when neither matches — "no match" is an accepted
    /// outcome, not an error. `Err` means the registry itself was
    /// unreachable.
    async fn resolve(&self, name_or_id: &str) -> Result<Option<TypeHandle>, RegistryError>;
}
