//! Commit/reveal bookkeeping around the pure engine.
//!
//! The engine itself is stateless. A [`SeedSession`] is what an authority
//! holds between rounds: the secret server seed, the player's client seed
//! and the next nonce to issue.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    engine::{compute_outcome, verification_hash, Outcome, RoundInput, Step},
    error::{FairError, FairResult},
    multipliers::{MultiplierTable, RiskLevel},
    rng::{derive_hash_hex, Derivation},
    seed::{
        generate_client_seed, generate_server_seed, hash_server_seed, validate_client_seed,
        validate_server_seed,
    },
};

/// What the player sees before betting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commitment {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// A retired server seed, disclosed once it can no longer affect play.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedReveal {
    pub server_seed: String,
    pub server_seed_hash: String,
    /// Nonces `0..rounds` were issued under this seed.
    pub rounds: u64,
}

impl SeedReveal {
    pub fn matches_commitment(&self) -> bool {
        derive_hash_hex(self.server_seed.as_bytes()) == self.server_seed_hash
    }
}

/// An outcome as published while its server seed is still secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedRound {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub rows: u8,
    pub risk: RiskLevel,
    pub derivation: Derivation,
    pub bet_amount: f64,
    pub path: Vec<Step>,
    pub bucket_index: usize,
    pub multiplier: f64,
    pub payout: f64,
    pub verification_hash: String,
}

impl From<Outcome> for PublishedRound {
    fn from(o: Outcome) -> Self {
        Self {
            server_seed_hash: o.server_seed_hash,
            client_seed: o.client_seed,
            nonce: o.nonce,
            rows: o.rows,
            risk: o.risk,
            derivation: o.derivation,
            bet_amount: o.bet_amount,
            path: o.path,
            bucket_index: o.bucket_index,
            multiplier: o.multiplier,
            payout: o.payout,
            verification_hash: o.verification_hash,
        }
    }
}

impl PublishedRound {
    /// Check the published record hash without any secret.
    pub fn record_is_consistent(&self) -> bool {
        verification_hash(
            &self.server_seed_hash,
            &self.client_seed,
            self.nonce,
            self.bucket_index,
            self.multiplier,
        ) == self.verification_hash
    }

    /// Attach the revealed server seed. Fails if it does not hash to the
    /// commitment this round was published under.
    pub fn reveal(self, server_seed: &str) -> FairResult<Outcome> {
        validate_server_seed(server_seed)?;
        if derive_hash_hex(server_seed.as_bytes()) != self.server_seed_hash {
            return Err(FairError::CommitmentMismatch(self.server_seed_hash));
        }
        Ok(Outcome {
            server_seed: server_seed.to_string(),
            server_seed_hash: self.server_seed_hash,
            client_seed: self.client_seed,
            nonce: self.nonce,
            rows: self.rows,
            risk: self.risk,
            derivation: self.derivation,
            bet_amount: self.bet_amount,
            path: self.path,
            bucket_index: self.bucket_index,
            multiplier: self.multiplier,
            payout: self.payout,
            verification_hash: self.verification_hash,
        })
    }
}

/// Secret server seed, public client seed and the next nonce.
#[derive(Debug, Clone)]
pub struct SeedSession {
    server_seed: String,
    server_seed_hash: String,
    client_seed: String,
    nonce: u64,
    derivation: Derivation,
}

impl SeedSession {
    pub fn new() -> Self {
        let server_seed = generate_server_seed();
        let server_seed_hash = derive_hash_hex(server_seed.as_bytes());
        Self {
            server_seed,
            server_seed_hash,
            client_seed: generate_client_seed(),
            nonce: 0,
            derivation: Derivation::default(),
        }
    }

    /// Resume a session, e.g. from storage.
    pub fn resume(
        server_seed: impl Into<String>,
        client_seed: impl Into<String>,
        nonce: u64,
    ) -> FairResult<Self> {
        let server_seed = server_seed.into();
        let client_seed = client_seed.into();
        let server_seed_hash = hash_server_seed(&server_seed)?;
        validate_client_seed(&client_seed)?;
        Ok(Self {
            server_seed,
            server_seed_hash,
            client_seed,
            nonce,
            derivation: Derivation::default(),
        })
    }

    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = derivation;
        self
    }

    pub fn commitment(&self) -> Commitment {
        Commitment {
            server_seed_hash: self.server_seed_hash.clone(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
        }
    }

    pub fn server_seed_hash(&self) -> &str {
        &self.server_seed_hash
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Replace the client seed between rounds.
    ///
    /// The nonce keeps counting for the lifetime of the server seed, so
    /// switching back to an earlier client seed never repeats a derivation input.
    pub fn set_client_seed(&mut self, client_seed: impl Into<String>) -> FairResult<()> {
        let client_seed = client_seed.into();
        validate_client_seed(&client_seed)?;
        debug!(nonce = self.nonce, "client seed replaced");
        self.client_seed = client_seed;
        Ok(())
    }

    /// Resolve one round at the current nonce, then advance it.
    pub fn play(&mut self, bet_amount: f64, table: &MultiplierTable) -> FairResult<Outcome> {
        let client_seed = self.client_seed.clone();
        self.play_as(&client_seed, bet_amount, table)
    }

    /// Resolve one round under `client_seed`. The session only adopts the
    /// seed and advances the nonce if the round resolves.
    pub fn play_as(
        &mut self,
        client_seed: &str,
        bet_amount: f64,
        table: &MultiplierTable,
    ) -> FairResult<Outcome> {
        let next = self.nonce.checked_add(1).ok_or(FairError::NonceExhausted)?;
        let input = RoundInput {
            server_seed: self.server_seed.clone(),
            client_seed: client_seed.to_string(),
            nonce: self.nonce,
            derivation: self.derivation,
        };
        let outcome = compute_outcome(&input, bet_amount, table)?;
        if self.client_seed != client_seed {
            debug!(nonce = self.nonce, "client seed replaced");
            self.client_seed = input.client_seed;
        }
        self.nonce = next;
        Ok(outcome)
    }

    /// Reveal the current server seed and commit to a fresh one.
    pub fn rotate(&mut self) -> SeedReveal {
        let fresh = generate_server_seed();
        let fresh_hash = derive_hash_hex(fresh.as_bytes());
        let reveal = SeedReveal {
            server_seed: std::mem::replace(&mut self.server_seed, fresh),
            server_seed_hash: std::mem::replace(&mut self.server_seed_hash, fresh_hash),
            rounds: std::mem::replace(&mut self.nonce, 0),
        };
        info!(
            revealed = %reveal.server_seed_hash,
            next = %self.server_seed_hash,
            rounds = reveal.rounds,
            "server seed rotated"
        );
        reveal
    }
}

impl Default for SeedSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of one round as seen by the surrounding system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundPhase {
    SeedCommitted,
    BetPlaced,
    OutcomeComputed,
    SeedRevealed,
    Verified,
}

impl RoundPhase {
    pub fn next(self) -> Option<RoundPhase> {
        match self {
            RoundPhase::SeedCommitted => Some(RoundPhase::BetPlaced),
            RoundPhase::BetPlaced => Some(RoundPhase::OutcomeComputed),
            RoundPhase::OutcomeComputed => Some(RoundPhase::SeedRevealed),
            RoundPhase::SeedRevealed => Some(RoundPhase::Verified),
            RoundPhase::Verified => None,
        }
    }

    pub fn advance(self, to: RoundPhase) -> FairResult<RoundPhase> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(FairError::IllegalTransition { from: self, to })
        }
    }
}

/// Player-side tracker that walks one round through its lifecycle.
#[derive(Debug, Clone)]
pub struct RoundAudit {
    phase: RoundPhase,
    commitment: Commitment,
    published: Option<PublishedRound>,
    outcome: Option<Outcome>,
}

impl RoundAudit {
    pub fn new(commitment: Commitment) -> Self {
        Self {
            phase: RoundPhase::SeedCommitted,
            commitment,
            published: None,
            outcome: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn place_bet(&mut self) -> FairResult<()> {
        self.phase = self.phase.advance(RoundPhase::BetPlaced)?;
        Ok(())
    }

    /// Record the authority's published result. It must be bound to the
    /// commitment and nonce shown before the bet, and its record hash must
    /// match its own fields.
    pub fn record(&mut self, round: PublishedRound) -> FairResult<()> {
        let to = self.phase.advance(RoundPhase::OutcomeComputed)?;
        if round.server_seed_hash != self.commitment.server_seed_hash {
            return Err(FairError::CommitmentMismatch(
                self.commitment.server_seed_hash.clone(),
            ));
        }
        if round.nonce != self.commitment.nonce {
            return Err(FairError::NonceMismatch {
                expected: self.commitment.nonce,
                got: round.nonce,
            });
        }
        if !round.record_is_consistent() {
            return Err(FairError::InconsistentRecord);
        }
        self.published = Some(round);
        self.phase = to;
        Ok(())
    }

    pub fn reveal(&mut self, server_seed: &str) -> FairResult<()> {
        let to = self.phase.advance(RoundPhase::SeedRevealed)?;
        let Some(round) = self.published.clone() else {
            return Err(FairError::IllegalTransition {
                from: self.phase,
                to,
            });
        };
        self.outcome = Some(round.reveal(server_seed)?);
        self.phase = to;
        Ok(())
    }

    /// Final audit. A `false` result is a trust failure and must be surfaced.
    pub fn verify(&mut self) -> FairResult<bool> {
        let to = self.phase.advance(RoundPhase::Verified)?;
        let valid = self
            .outcome
            .as_ref()
            .map(crate::engine::verify_outcome)
            .unwrap_or(false);
        self.phase = to;
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::verify_outcome;

    fn table() -> MultiplierTable {
        MultiplierTable::standard(12, RiskLevel::Medium).unwrap()
    }

    #[test]
    fn nonces_strictly_increase() {
        let mut session = SeedSession::new();
        let a = session.play(1.0, &table()).unwrap();
        let b = session.play(1.0, &table()).unwrap();
        assert_eq!(a.nonce, 0);
        assert_eq!(b.nonce, 1);
        assert_eq!(session.nonce(), 2);
    }

    #[test]
    fn rotation_reveals_committed_seed() {
        let mut session = SeedSession::new();
        let committed = session.commitment();
        session.play(1.0, &table()).unwrap();
        let reveal = session.rotate();
        assert_eq!(reveal.server_seed_hash, committed.server_seed_hash);
        assert!(reveal.matches_commitment());
        assert_eq!(reveal.rounds, 1);
        assert_eq!(session.nonce(), 0);
        assert_ne!(session.server_seed_hash(), committed.server_seed_hash);
    }

    #[test]
    fn client_seed_change_keeps_nonce_running() {
        let mut session = SeedSession::new();
        session.play(1.0, &table()).unwrap();
        session.set_client_seed("mine").unwrap();
        assert_eq!(session.nonce(), 1);
        let next = session.play(1.0, &table()).unwrap();
        assert_eq!(next.nonce, 1);
        assert_eq!(next.client_seed, "mine");
        assert_eq!(session.client_seed(), "mine");
        assert!(session.set_client_seed("").is_err());
    }

    #[test]
    fn exhausted_nonce_is_rejected() {
        let mut session = SeedSession::resume("a".repeat(64), "c", u64::MAX).unwrap();
        assert_eq!(session.play(1.0, &table()), Err(FairError::NonceExhausted));
    }

    #[test]
    fn published_round_reveals_to_verifiable_outcome() {
        let mut session = SeedSession::new();
        let outcome = session.play(3.0, &table()).unwrap();
        let published = PublishedRound::from(outcome.clone());
        assert!(published.record_is_consistent());

        let wrong = published.clone().reveal(&"f".repeat(64));
        assert!(matches!(wrong, Err(FairError::CommitmentMismatch(_))));

        let reveal = session.rotate();
        let revealed = published.reveal(&reveal.server_seed).unwrap();
        assert_eq!(revealed, outcome);
        assert!(verify_outcome(&revealed));
    }

    #[test]
    fn round_audit_walks_the_lifecycle() {
        let mut session = SeedSession::new();
        let mut audit = RoundAudit::new(session.commitment());
        assert!(audit.reveal("x").is_err());

        audit.place_bet().unwrap();
        let round = PublishedRound::from(session.play(1.0, &table()).unwrap());
        audit.record(round).unwrap();
        let reveal = session.rotate();
        audit.reveal(&reveal.server_seed).unwrap();
        assert!(audit.verify().unwrap());
        assert_eq!(audit.phase(), RoundPhase::Verified);
        assert!(audit.verify().is_err());
    }

    #[test]
    fn round_audit_flags_tampered_result() {
        let mut session = SeedSession::new();
        let mut audit = RoundAudit::new(session.commitment());
        audit.place_bet().unwrap();
        let mut round = PublishedRound::from(session.play(1.0, &table()).unwrap());
        // payout is outside the record hash, so only the final audit sees it
        round.payout += 1.0;
        audit.record(round).unwrap();
        audit.reveal(&session.rotate().server_seed).unwrap();
        assert!(!audit.verify().unwrap());
    }

    #[test]
    fn round_audit_rejects_inconsistent_record() {
        let mut session = SeedSession::new();
        let mut audit = RoundAudit::new(session.commitment());
        audit.place_bet().unwrap();
        let mut round = PublishedRound::from(session.play(1.0, &table()).unwrap());
        round.bucket_index = (round.bucket_index + 1) % 13;
        assert_eq!(audit.record(round), Err(FairError::InconsistentRecord));
        assert_eq!(audit.phase(), RoundPhase::BetPlaced);
    }

    #[test]
    fn round_audit_rejects_other_nonce() {
        let mut session = SeedSession::new();
        let mut audit = RoundAudit::new(session.commitment());
        audit.place_bet().unwrap();
        session.play(1.0, &table()).unwrap();
        // consistent round, but one nonce later than the player was shown
        let later = PublishedRound::from(session.play(1.0, &table()).unwrap());
        assert!(later.record_is_consistent());
        assert_eq!(
            audit.record(later),
            Err(FairError::NonceMismatch { expected: 0, got: 1 })
        );
        assert_eq!(audit.phase(), RoundPhase::BetPlaced);
    }

    #[test]
    fn rejected_bet_leaves_session_untouched() {
        let mut session = SeedSession::resume("a".repeat(64), "original", 5).unwrap();
        assert!(session.play_as("other", -1.0, &table()).is_err());
        assert!(session.play_as("", 1.0, &table()).is_err());
        assert_eq!(session.client_seed(), "original");
        assert_eq!(session.nonce(), 5);

        let out = session.play_as("other", 1.0, &table()).unwrap();
        assert_eq!(out.client_seed, "other");
        assert_eq!(out.nonce, 5);
        assert_eq!(session.client_seed(), "other");
        assert_eq!(session.nonce(), 6);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        assert!(RoundPhase::SeedCommitted
            .advance(RoundPhase::OutcomeComputed)
            .is_err());
        assert_eq!(
            RoundPhase::BetPlaced.advance(RoundPhase::OutcomeComputed),
            Ok(RoundPhase::OutcomeComputed)
        );
    }
}
