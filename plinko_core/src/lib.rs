//! Provably-fair outcome engine for Plinko.
//!
//! A round is a pure function of a committed server seed, a player client
//! seed and a nonce. Anyone holding the revealed seed can recompute and
//! audit it.

pub mod authority;
pub mod engine;
pub mod error;
pub mod multipliers;
pub mod rng;
pub mod seed;
pub mod session;

pub use crate::authority::{LocalAuthority, OutcomeAuthority};
pub use crate::engine::{
    bucket_of, compute_outcome, compute_path, path_string, verification_hash, verify_outcome,
    Outcome, RoundInput, Step,
};
pub use crate::error::{FairError, FairResult};
pub use crate::multipliers::{
    bucket_probability, expected_value, MultiplierTable, RiskLevel, MAX_ROWS, MIN_ROWS,
};
pub use crate::rng::{derive_hash_hex, slice_sample, Derivation, ProvablyFairRng};
pub use crate::seed::{
    generate_client_seed, generate_server_seed, hash_server_seed, validate_client_seed,
    validate_seed_hash, validate_server_seed,
};
pub use crate::session::{
    Commitment, PublishedRound, RoundAudit, RoundPhase, SeedReveal, SeedSession,
};
