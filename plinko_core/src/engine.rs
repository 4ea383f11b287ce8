use serde::{Deserialize, Serialize};

use crate::{
    error::{FairError, FairResult},
    multipliers::{MultiplierTable, RiskLevel},
    rng::{derive_hash_hex, Derivation, ProvablyFairRng},
    seed::{validate_client_seed, validate_seed_hash, validate_server_seed},
};

/// One peg decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Step {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Step {
    pub fn from_sample(sample: f64) -> Self {
        if sample < 0.5 {
            Step::Left
        } else {
            Step::Right
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Step::Left => 'L',
            Step::Right => 'R',
        }
    }
}

/// Render a path as `LRRL...`.
pub fn path_string(path: &[Step]) -> String {
    path.iter().map(|s| s.as_char()).collect()
}

/// Inputs that fully determine a round's path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundInput {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    #[serde(default)]
    pub derivation: Derivation,
}

impl RoundInput {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
            derivation: Derivation::default(),
        }
    }

    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = derivation;
        self
    }

    fn validate(&self) -> FairResult<()> {
        validate_server_seed(&self.server_seed)?;
        validate_client_seed(&self.client_seed)
    }
}

/// A resolved round. Everything except `payout` is independent of the stake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub rows: u8,
    pub risk: RiskLevel,
    #[serde(default)]
    pub derivation: Derivation,
    pub bet_amount: f64,
    pub path: Vec<Step>,
    pub bucket_index: usize,
    pub multiplier: f64,
    pub payout: f64,
    pub verification_hash: String,
}

/// Derive the decision path for `rows` rows. Bucket index is the number of right steps.
pub fn compute_path(input: &RoundInput, rows: u8) -> Vec<Step> {
    let rng = ProvablyFairRng::new(input.server_seed.as_str(), input.client_seed.as_str(), input.nonce);
    rng.row_samples(rows as usize, input.derivation)
        .into_iter()
        .map(Step::from_sample)
        .collect()
}

pub fn bucket_of(path: &[Step]) -> usize {
    path.iter().filter(|s| **s == Step::Right).count()
}

/// Resolve a round against `table`. `bet_amount` only scales the payout.
pub fn compute_outcome(
    input: &RoundInput,
    bet_amount: f64,
    table: &MultiplierTable,
) -> FairResult<Outcome> {
    input.validate()?;
    if !bet_amount.is_finite() || bet_amount < 0.0 {
        return Err(FairError::InvalidBet(bet_amount));
    }

    let path = compute_path(input, table.rows());
    let bucket_index = bucket_of(&path);
    let multiplier = table
        .get(bucket_index)
        .ok_or(FairError::InvalidRows(table.rows()))?;
    let server_seed_hash = derive_hash_hex(input.server_seed.as_bytes());
    let verification_hash = verification_hash(
        &server_seed_hash,
        &input.client_seed,
        input.nonce,
        bucket_index,
        multiplier,
    );

    Ok(Outcome {
        server_seed: input.server_seed.clone(),
        server_seed_hash,
        client_seed: input.client_seed.clone(),
        nonce: input.nonce,
        rows: table.rows(),
        risk: table.risk(),
        derivation: input.derivation,
        bet_amount,
        path,
        bucket_index,
        multiplier,
        payout: bet_amount * multiplier,
        verification_hash,
    })
}

/// SHA-256 over `server_seed_hash:client_seed:nonce:bucket_index:multiplier`.
///
/// The multiplier is rendered in shortest round-trip form (`0.5`, `1000`).
pub fn verification_hash(
    server_seed_hash: &str,
    client_seed: &str,
    nonce: u64,
    bucket_index: usize,
    multiplier: f64,
) -> String {
    let record = format!("{server_seed_hash}:{client_seed}:{nonce}:{bucket_index}:{multiplier}");
    derive_hash_hex(record.as_bytes())
}

/// Audit a claimed outcome: recompute the round from its seeds against the
/// published table for its board and compare every derived field.
/// Nothing stored on the outcome is trusted.
pub fn verify_outcome(outcome: &Outcome) -> bool {
    let Ok(table) = MultiplierTable::standard(outcome.rows, outcome.risk) else {
        return false;
    };
    if validate_seed_hash(&outcome.server_seed_hash).is_err() {
        return false;
    }
    let input = RoundInput {
        server_seed: outcome.server_seed.clone(),
        client_seed: outcome.client_seed.clone(),
        nonce: outcome.nonce,
        derivation: outcome.derivation,
    };
    let Ok(expected) = compute_outcome(&input, outcome.bet_amount, &table) else {
        return false;
    };

    expected.server_seed_hash == outcome.server_seed_hash
        && expected.path == outcome.path
        && expected.bucket_index == outcome.bucket_index
        && expected.multiplier == outcome.multiplier
        && expected.payout == outcome.payout
        && expected.verification_hash == outcome.verification_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipliers::{MAX_ROWS, MIN_ROWS};

    fn zero_seed() -> String {
        "0".repeat(64)
    }

    fn low16() -> MultiplierTable {
        MultiplierTable::standard(16, RiskLevel::Low).unwrap()
    }

    #[test]
    fn test_outcome_deterministic() {
        let input = RoundInput::new(zero_seed(), "client", 1);
        let out1 = compute_outcome(&input, 1.0, &low16()).unwrap();
        let out2 = compute_outcome(&input, 1.0, &low16()).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn pinned_zero_seed_round() {
        let input = RoundInput::new(zero_seed(), "test", 0);
        let out = compute_outcome(&input, 1.0, &low16()).unwrap();
        assert_eq!(path_string(&out.path), "LRRRLRRLRLRLRLLL");
        assert_eq!(out.bucket_index, 8);
        assert_eq!(out.multiplier, 0.5);
        assert_eq!(
            out.verification_hash,
            "8a24865e5a074d1a92d10c11334c62718174009e320395dfc7ef7a67ee21cea9"
        );
        assert!(verify_outcome(&out));
    }

    #[test]
    fn pinned_zero_seed_round_legacy() {
        let input = RoundInput::new(zero_seed(), "test", 0).with_derivation(Derivation::Legacy);
        let out = compute_outcome(&input, 1.0, &low16()).unwrap();
        assert_eq!(path_string(&out.path), "LRRRLRRLLRRRLRRL");
        assert_eq!(out.bucket_index, 10);
        assert_eq!(out.multiplier, 1.1);
        assert!(verify_outcome(&out));
    }

    #[test]
    fn next_nonce_changes_path() {
        let a = compute_outcome(&RoundInput::new(zero_seed(), "test", 0), 1.0, &low16()).unwrap();
        let b = compute_outcome(&RoundInput::new(zero_seed(), "test", 1), 1.0, &low16()).unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(path_string(&b.path), "RRRRRLRLRRLRLLRR");
        assert_eq!(b.bucket_index, 11);
    }

    #[test]
    fn verification_hash_renders_whole_multipliers_without_fraction() {
        let a = verification_hash("h", "c", 0, 0, 1000.0);
        let b = derive_hash_hex(b"h:c:0:0:1000");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_inputs() {
        let table = low16();
        assert_eq!(
            compute_outcome(&RoundInput::new("nothex", "c", 0), 1.0, &table),
            Err(FairError::MalformedServerSeed)
        );
        assert!(matches!(
            compute_outcome(&RoundInput::new(zero_seed(), "", 0), 1.0, &table),
            Err(FairError::InvalidClientSeed(_))
        ));
        assert!(matches!(
            compute_outcome(&RoundInput::new(zero_seed(), "c", 0), -1.0, &table),
            Err(FairError::InvalidBet(_))
        ));
        assert!(matches!(
            compute_outcome(&RoundInput::new(zero_seed(), "c", 0), f64::NAN, &table),
            Err(FairError::InvalidBet(_))
        ));
    }

    #[test]
    fn tampered_fields_fail_verification() {
        let out = compute_outcome(&RoundInput::new(zero_seed(), "test", 0), 2.0, &low16()).unwrap();

        let mut bucket = out.clone();
        bucket.bucket_index = 0;
        assert!(!verify_outcome(&bucket));

        let mut multiplier = out.clone();
        multiplier.multiplier = 16.0;
        assert!(!verify_outcome(&multiplier));

        let mut payout = out.clone();
        payout.payout = 100.0;
        assert!(!verify_outcome(&payout));

        let mut path = out.clone();
        path.path[0] = Step::Right;
        assert!(!verify_outcome(&path));

        let mut hash = out.clone();
        hash.server_seed_hash = "f".repeat(64);
        assert!(!verify_outcome(&hash));

        let mut record = out.clone();
        record.verification_hash = "0".repeat(64);
        assert!(!verify_outcome(&record));

        let mut seed = out;
        seed.server_seed = "1".repeat(64);
        assert!(!verify_outcome(&seed));
    }

    #[test]
    fn outcome_serializes_path_as_letters() {
        let out = compute_outcome(&RoundInput::new(zero_seed(), "test", 0), 1.0, &low16()).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["path"][0], "L");
        assert_eq!(json["risk"], "low");
        assert_eq!(json["derivation"], "extended");
        let back: Outcome = serde_json::from_value(json).unwrap();
        assert!(verify_outcome(&back));
    }

    #[test]
    fn cent_bets_verify_after_json_round_trip() {
        for rows in MIN_ROWS..=MAX_ROWS {
            let table = MultiplierTable::standard(rows, RiskLevel::Medium).unwrap();
            for cents in 1..=1000u32 {
                let bet = cents as f64 / 100.0;
                let input = RoundInput::new(zero_seed(), "json", cents as u64);
                let out = compute_outcome(&input, bet, &table).unwrap();
                let json = serde_json::to_string(&out).unwrap();
                let back: Outcome = serde_json::from_str(&json).unwrap();
                assert_eq!(back.payout, out.payout, "bet {bet} rows {rows}");
                assert!(verify_outcome(&back), "bet {bet} rows {rows}");
            }
        }
    }

    #[test]
    fn every_table_accepted_by_compute_is_auditable() {
        for risk in RiskLevel::ALL {
            for rows in MIN_ROWS..=MAX_ROWS {
                let table = MultiplierTable::standard(rows, risk).unwrap();
                let out = compute_outcome(&RoundInput::new(zero_seed(), "t", 3), 2.0, &table)
                    .unwrap();
                assert_eq!((out.rows, out.risk), (rows, risk));
                assert!(verify_outcome(&out));
            }
        }
    }

    #[test]
    fn relabelled_board_fails_verification() {
        let out = compute_outcome(&RoundInput::new(zero_seed(), "test", 0), 1.0, &low16()).unwrap();

        let mut risk = out.clone();
        risk.risk = RiskLevel::High;
        assert!(!verify_outcome(&risk));

        let mut rows = out;
        rows.rows = 4;
        assert!(!verify_outcome(&rows));
    }
}
