use std::time::Duration;

/// Errors surfaced by typed-data hashing, wallet signing and key recovery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    /// The descriptor does not conform to its own type schema.
    #[error("typed data does not match its schema: {0}")]
    SchemaMismatch(String),

    #[error("invalid typed data JSON: {0}")]
    InvalidJson(String),

    /// No signer is connected to the wallet session.
    #[error("no wallet connected")]
    WalletUnavailable,

    #[error("signature request rejected by the wallet")]
    UserRejected,

    #[error("wallet did not answer within {0:?}")]
    Timeout(Duration),

    /// The signature is malformed or does not recover for the given hash.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The underlying signer failed for a reason other than rejection.
    #[error("signer failure: {0}")]
    Signer(String),
}

pub type Result<T, E = SignError> = std::result::Result<T, E>;
