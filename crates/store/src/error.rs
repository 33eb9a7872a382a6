/// All errors that can be returned by a promotion storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No row with the given oid exists for the given kind.
    #[error("row not found: {kind} {oid}")]
    RowNotFound { kind: &'static str, oid: String },

    /// A backend-specific error (connection, query execution, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from the type registry collaborator.
///
/// "No match" is NOT an error — `resolve` returns `Ok(None)` for that. This
/// type covers the registry itself being unreachable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("type registry unavailable: {0}")]
    Unavailable(String),
}
