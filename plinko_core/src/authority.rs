//! Who resolves rounds.
//!
//! The game layer talks to an [`OutcomeAuthority`]. Which implementation it
//! gets is decided where the application is wired together:
//! - [`LocalAuthority`] resolves rounds in-process (offline play, tests)
//! - a remote implementation forwards to an authoritative server

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::FairResult,
    multipliers::{MultiplierTable, RiskLevel},
    session::{Commitment, PublishedRound, SeedReveal, SeedSession},
};

#[async_trait]
pub trait OutcomeAuthority: Send + Sync {
    /// Current server seed commitment and next nonce.
    async fn commitment(&self) -> FairResult<Commitment>;

    /// Resolve one round. The server seed stays secret until [`rotate`](Self::rotate).
    async fn play(
        &self,
        client_seed: &str,
        bet_amount: f64,
        rows: u8,
        risk: RiskLevel,
    ) -> FairResult<PublishedRound>;

    /// Retire the current server seed and disclose it.
    async fn rotate(&self) -> FairResult<SeedReveal>;
}

/// In-process authority backed by a [`SeedSession`].
pub struct LocalAuthority {
    session: Mutex<SeedSession>,
}

impl LocalAuthority {
    pub fn new(session: SeedSession) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

impl Default for LocalAuthority {
    fn default() -> Self {
        Self::new(SeedSession::new())
    }
}

#[async_trait]
impl OutcomeAuthority for LocalAuthority {
    async fn commitment(&self) -> FairResult<Commitment> {
        Ok(self.session.lock().await.commitment())
    }

    async fn play(
        &self,
        client_seed: &str,
        bet_amount: f64,
        rows: u8,
        risk: RiskLevel,
    ) -> FairResult<PublishedRound> {
        let table = MultiplierTable::standard(rows, risk)?;
        let outcome = self
            .session
            .lock()
            .await
            .play_as(client_seed, bet_amount, &table)?;
        debug!(nonce = outcome.nonce, bucket = outcome.bucket_index, "local round resolved");
        Ok(outcome.into())
    }

    async fn rotate(&self) -> FairResult<SeedReveal> {
        Ok(self.session.lock().await.rotate())
    }
}
