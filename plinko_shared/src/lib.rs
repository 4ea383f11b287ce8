use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use plinko_core::{Outcome, PublishedRound, RiskLevel, SeedReveal};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CommitmentResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RollRequest {
    pub client_seed: String,
    pub bet: f64,
    pub rows: u8,
    #[serde(default)]
    pub risk: RiskLevel,
}

/// A resolved round. The server seed is only available via `/reveals`
/// once it has been rotated out.
pub type RollResponse = PublishedRound;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MultiplierResponse {
    pub rows: u8,
    pub risk: RiskLevel,
    pub multipliers: Vec<f64>,
    pub rtp: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RotateResponse {
    pub revealed: SeedReveal,
    pub next_server_seed_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoundLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub client_seed: String,
    pub nonce: i64,
    pub server_seed_hash: String,
    pub rows: u8,
    pub risk: String,
    pub path: String,
    pub bucket_index: i64,
    pub multiplier: f64,
    pub payout: f64,
    pub verification_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal server error")]
    Internal,
}

impl From<plinko_core::FairError> for ApiError {
    fn from(e: plinko_core::FairError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
