use promo_store::{RegistryError, StoreError};

/// Errors surfaced by the catalog.
///
/// Propagation policy: assembly errors are not retried internally;
/// cache-layer serialization failures are swallowed (logged, downgraded to a
/// miss) and never appear here; an unresolvable attribute pair is an accepted
/// silent drop, not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// A referenced promotion row does not exist. Not retried.
    #[error("promotion not found: {oid}")]
    NotFound { oid: String },

    /// An ordinal or required field was out of its valid domain during
    /// assembly. Fails the whole assembly; no partial promotion is returned.
    #[error("corrupt promotion data on {oid}: {message}")]
    DataCorruption { oid: String, message: String },

    /// The storage or type registry collaborator was unreachable. A caller
    /// may retry; the catalog itself owns no retry policy.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Marshalling failed outside the cache layer (e.g. on explicit export).
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CatalogError {
    pub(crate) fn corrupt(oid: &str, message: impl Into<String>) -> Self {
        CatalogError::DataCorruption {
            oid: oid.to_string(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        CatalogError::Lookup(err.to_string())
    }
}

impl From<RegistryError> for CatalogError {
    fn from(err: RegistryError) -> Self {
        CatalogError::Lookup(err.to_string())
    }
}
