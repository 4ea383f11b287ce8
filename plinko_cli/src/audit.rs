//! Offline checks that need nothing but the engine.

use anyhow::{bail, Context};
use plinko_core::{
    compute_outcome, path_string, verify_outcome, Derivation, MultiplierTable, Outcome,
    RiskLevel, RoundInput, SeedSession,
};

/// Claimed values to compare a recomputed round against.
#[derive(Debug, Default, Clone, Copy)]
pub struct Claim {
    pub bucket_index: Option<usize>,
    pub multiplier: Option<f64>,
}

/// Recompute a round from revealed seeds and compare it to `claim`.
pub fn recompute(
    input: &RoundInput,
    rows: u8,
    risk: RiskLevel,
    claim: Claim,
) -> anyhow::Result<Outcome> {
    let table = MultiplierTable::standard(rows, risk)?;
    let outcome = compute_outcome(input, 0.0, &table)?;
    if let Some(bucket) = claim.bucket_index {
        if bucket != outcome.bucket_index {
            bail!(
                "bucket mismatch: claimed {bucket}, derived {}",
                outcome.bucket_index
            );
        }
    }
    if let Some(multiplier) = claim.multiplier {
        if multiplier != outcome.multiplier {
            bail!(
                "multiplier mismatch: claimed {multiplier}, derived {}",
                outcome.multiplier
            );
        }
    }
    Ok(outcome)
}

pub fn verify_file(path: &str) -> anyhow::Result<bool> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let outcome: Outcome = serde_json::from_str(&raw).context("parsing outcome JSON")?;
    Ok(verify_outcome(&outcome))
}

pub fn describe(outcome: &Outcome) -> String {
    format!(
        "nonce={} path={} bucket={} multiplier={} payout={} verification_hash={}",
        outcome.nonce,
        path_string(&outcome.path),
        outcome.bucket_index,
        outcome.multiplier,
        outcome.payout,
        outcome.verification_hash
    )
}

/// Play `rounds` unit bets under a fresh seed and return the observed RTP.
pub fn simulate(
    rows: u8,
    risk: RiskLevel,
    rounds: u64,
    derivation: Derivation,
) -> anyhow::Result<f64> {
    if rounds == 0 {
        bail!("need at least one round");
    }
    let table = MultiplierTable::standard(rows, risk)?;
    let mut session = SeedSession::new().with_derivation(derivation);
    let mut total_payout = 0.0;
    for _ in 0..rounds {
        total_payout += session.play(1.0, &table)?.payout;
    }
    Ok(total_payout / rounds as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_input() -> RoundInput {
        RoundInput::new("0".repeat(64), "test", 0)
    }

    #[test]
    fn recompute_accepts_matching_claim() {
        let claim = Claim {
            bucket_index: Some(8),
            multiplier: Some(0.5),
        };
        let outcome = recompute(&zero_input(), 16, RiskLevel::Low, claim).unwrap();
        assert_eq!(path_string(&outcome.path), "LRRRLRRLRLRLRLLL");
    }

    #[test]
    fn recompute_rejects_wrong_claim() {
        let claim = Claim {
            bucket_index: Some(9),
            multiplier: None,
        };
        assert!(recompute(&zero_input(), 16, RiskLevel::Low, claim).is_err());
    }

    #[test]
    fn verify_file_reads_outcome_json() {
        let table = MultiplierTable::standard(8, RiskLevel::High).unwrap();
        let outcome = compute_outcome(&zero_input(), 5.0, &table).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round.json");
        std::fs::write(&path, serde_json::to_string(&outcome).unwrap()).unwrap();
        assert!(verify_file(path.to_str().unwrap()).unwrap());
    }

    #[test]
    fn simulate_reports_a_plausible_rtp() {
        let rtp = simulate(8, RiskLevel::Low, 2000, Derivation::Extended).unwrap();
        assert!(rtp > 0.5 && rtp < 1.5);
        assert!(simulate(8, RiskLevel::Low, 0, Derivation::Extended).is_err());
    }
}
