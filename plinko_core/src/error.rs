use thiserror::Error;

/// Caller-input violations rejected by the engine.
///
/// None of these are retryable: the caller must fix the input before
/// re-invoking. A failed verification is not an error, it is `false`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FairError {
    #[error("malformed server seed: expected 64 lowercase hex characters")]
    MalformedServerSeed,

    #[error("malformed server seed hash: expected 64 lowercase hex characters")]
    MalformedSeedHash,

    #[error("invalid client seed: {0}")]
    InvalidClientSeed(&'static str),

    #[error("unsupported board: {0} rows")]
    InvalidRows(u8),

    #[error("invalid bet amount: {0}")]
    InvalidBet(f64),

    #[error("round nonce {got} does not follow commitment nonce {expected}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("round record is internally inconsistent")]
    InconsistentRecord,

    #[error("revealed seed does not match commitment {0}")]
    CommitmentMismatch(String),

    #[error("nonce space exhausted for this seed pair")]
    NonceExhausted,

    #[error("illegal round transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: crate::session::RoundPhase,
        to: crate::session::RoundPhase,
    },

    #[error("authority unavailable: {0}")]
    Authority(String),
}

pub type FairResult<T> = Result<T, FairError>;
