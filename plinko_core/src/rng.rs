use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

// Deterministic RNG using provably-fair HMAC construction
// server_seed (key) + "client_seed:nonce" -> HMAC-SHA256 -> 4-byte slices -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

/// Width of one digest slice in bytes.
pub const SLICE_WIDTH: usize = 4;
/// Slices per 32-byte digest block.
pub const SLICES_PER_BLOCK: usize = 32 / SLICE_WIDTH;

pub fn derive_hash_hex(input: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Rule mapping board rows onto digest slices.
///
/// Both schedules read slice `row % 8`. They differ in which digest block
/// that slice comes from once the board has more than eight rows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Derivation {
    /// Every row reads block 0, so rows 8..16 repeat rows 0..8.
    /// Kept for bit-compatibility with previously recorded rounds.
    Legacy,
    /// Row `i` reads block `i / 8`; block `k > 0` is keyed on `client_seed:nonce:k`.
    #[default]
    Extended,
}

impl Derivation {
    pub fn as_str(self) -> &'static str {
        match self {
            Derivation::Legacy => "legacy",
            Derivation::Extended => "extended",
        }
    }

    fn block_for_row(self, row: usize) -> usize {
        match self {
            Derivation::Legacy => 0,
            Derivation::Extended => row / SLICES_PER_BLOCK,
        }
    }
}

impl std::str::FromStr for Derivation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Derivation::Legacy),
            "extended" => Ok(Derivation::Extended),
            other => Err(format!("unknown derivation `{other}`")),
        }
    }
}

/// Map slice `index` of a digest block to a uniform float in [0,1).
///
/// The slice is read as a big-endian u32 and divided by 2^32.
pub fn slice_sample(block: &[u8; 32], index: usize) -> f64 {
    let start = (index % SLICES_PER_BLOCK) * SLICE_WIDTH;
    let chunk = &block[start..start + SLICE_WIDTH];
    let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    (v as f64) / (u32::MAX as f64 + 1.0)
}

#[derive(Debug, Clone)]
pub struct ProvablyFairRng {
    pub server_seed: String, // secret until revealed
    pub client_seed: String,
    pub nonce: u64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    fn message(&self, block: usize) -> String {
        if block == 0 {
            format!("{}:{}", self.client_seed, self.nonce)
        } else {
            format!("{}:{}:{}", self.client_seed, self.nonce, block)
        }
    }

    /// HMAC digest block `block`. Block 0 is the round's primary digest.
    pub fn hmac_block(&self, block: usize) -> [u8; 32] {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.server_seed.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any length"));
        mac.update(self.message(block).as_bytes());
        mac.finalize().into_bytes().into()
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        self.hmac_block(0)
    }

    /// One uniform sample per row, following `derivation`.
    pub fn row_samples(&self, rows: usize, derivation: Derivation) -> Vec<f64> {
        let mut out = Vec::with_capacity(rows);
        let mut current: Option<(usize, [u8; 32])> = None;
        for row in 0..rows {
            let block_index = derivation.block_for_row(row);
            let block = match current {
                Some((idx, block)) if idx == block_index => block,
                _ => {
                    let block = self.hmac_block(block_index);
                    current = Some((block_index, block));
                    block
                }
            };
            out.push(slice_sample(&block, row));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let rng1 = ProvablyFairRng::new("server", "client", 1);
        let rng2 = ProvablyFairRng::new("server", "client", 1);
        assert_eq!(rng1.server_seed_hash_hex(), rng2.server_seed_hash_hex());
        assert_eq!(rng1.hmac_bytes(), rng2.hmac_bytes());
        assert_eq!(
            rng1.row_samples(16, Derivation::Extended),
            rng2.row_samples(16, Derivation::Extended)
        );
    }

    #[test]
    fn samples_are_in_unit_interval() {
        let rng = ProvablyFairRng::new("server", "client", 9);
        for f in rng.row_samples(16, Derivation::Extended) {
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn slice_sample_reads_big_endian() {
        let mut block = [0u8; 32];
        block[4..8].copy_from_slice(&[0x80, 0, 0, 0]);
        assert_eq!(slice_sample(&block, 0), 0.0);
        assert_eq!(slice_sample(&block, 1), 0.5);
        // index wraps modulo the slice count
        assert_eq!(slice_sample(&block, 9), 0.5);
    }

    #[test]
    fn schedules_agree_on_first_block() {
        let rng = ProvablyFairRng::new("server", "client", 3);
        let legacy = rng.row_samples(8, Derivation::Legacy);
        let extended = rng.row_samples(8, Derivation::Extended);
        assert_eq!(legacy, extended);
    }

    #[test]
    fn legacy_schedule_reuses_slices() {
        let rng = ProvablyFairRng::new("server", "client", 3);
        let samples = rng.row_samples(16, Derivation::Legacy);
        assert_eq!(samples[..8], samples[8..]);
        let extended = rng.row_samples(16, Derivation::Extended);
        assert_ne!(extended[..8], extended[8..]);
    }
}
