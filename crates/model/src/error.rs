/// Errors raised by model constructors and builders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A required builder field was never set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A stored ordinal does not map to any variant of the target enum.
    #[error("ordinal {ordinal} out of range for {domain}")]
    OrdinalOutOfRange { domain: &'static str, ordinal: i64 },
}
