//! Seed generation, commitment and input validation.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{FairError, FairResult};
use crate::rng::derive_hash_hex;

/// Server seeds carry 256 bits of entropy, hex encoded.
pub const SERVER_SEED_BYTES: usize = 32;
const CLIENT_SEED_BYTES: usize = 16;
pub const MAX_CLIENT_SEED_LEN: usize = 64;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh server seed from the operating system CSPRNG.
pub fn generate_server_seed() -> String {
    random_hex(SERVER_SEED_BYTES)
}

/// Machine-generated default client seed. Players may replace it.
pub fn generate_client_seed() -> String {
    random_hex(CLIENT_SEED_BYTES)
}

/// SHA-256 commitment over the seed's UTF-8 bytes, published before play.
pub fn hash_server_seed(server_seed: &str) -> FairResult<String> {
    validate_server_seed(server_seed)?;
    Ok(derive_hash_hex(server_seed.as_bytes()))
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn validate_server_seed(server_seed: &str) -> FairResult<()> {
    if is_lower_hex(server_seed, SERVER_SEED_BYTES * 2) {
        Ok(())
    } else {
        Err(FairError::MalformedServerSeed)
    }
}

pub fn validate_seed_hash(hash: &str) -> FairResult<()> {
    if is_lower_hex(hash, 64) {
        Ok(())
    } else {
        Err(FairError::MalformedSeedHash)
    }
}

pub fn validate_client_seed(client_seed: &str) -> FairResult<()> {
    if client_seed.is_empty() {
        return Err(FairError::InvalidClientSeed("must not be empty"));
    }
    if client_seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(FairError::InvalidClientSeed("longer than 64 bytes"));
    }
    if client_seed.chars().any(|c| c.is_control()) {
        return Err(FairError::InvalidClientSeed("contains control characters"));
    }
    Ok(())
}
