//! [`OutcomeAuthority`] backed by a running `plinko_server`.

use async_trait::async_trait;
use plinko_core::{
    Commitment, FairError, FairResult, OutcomeAuthority, PublishedRound, RiskLevel, SeedReveal,
};
use plinko_shared::{CommitmentResponse, ErrorBody, RollRequest, RollResponse, RotateResponse};
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::sync::Mutex;

pub struct RemoteAuthority {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    // the server does not track client seeds: the caller's seed until the
    // first round, then the last one played
    client_seed: Mutex<String>,
}

impl RemoteAuthority {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        client_seed: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client_seed: Mutex::new(client_seed.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> FairResult<T> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| FairError::Authority(format!("bad response: {e}")));
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = serde_json::from_value::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        Err(FairError::Authority(message))
    }
}

fn transport(e: reqwest::Error) -> FairError {
    FairError::Authority(e.to_string())
}

#[async_trait]
impl OutcomeAuthority for RemoteAuthority {
    async fn commitment(&self) -> FairResult<Commitment> {
        let resp = self
            .client
            .get(self.url("/commitment"))
            .send()
            .await
            .map_err(transport)?;
        let c: CommitmentResponse = Self::decode(resp).await?;
        Ok(Commitment {
            server_seed_hash: c.server_seed_hash,
            client_seed: self.client_seed.lock().await.clone(),
            nonce: c.nonce,
        })
    }

    async fn play(
        &self,
        client_seed: &str,
        bet_amount: f64,
        rows: u8,
        risk: RiskLevel,
    ) -> FairResult<PublishedRound> {
        let req = RollRequest {
            client_seed: client_seed.to_string(),
            bet: bet_amount,
            rows,
            risk,
        };
        let resp = self
            .client
            .post(self.url("/roll"))
            .json(&req)
            .send()
            .await
            .map_err(transport)?;
        let round: RollResponse = Self::decode(resp).await?;
        if !round.record_is_consistent() {
            return Err(FairError::Authority(
                "server returned an inconsistent verification hash".into(),
            ));
        }
        *self.client_seed.lock().await = client_seed.to_string();
        Ok(round)
    }

    async fn rotate(&self) -> FairResult<SeedReveal> {
        let Some(key) = &self.api_key else {
            return Err(FairError::Authority("rotation needs an API key".into()));
        };
        let resp = self
            .client
            .post(self.url("/admin/rotate-seed"))
            .bearer_auth(key)
            .send()
            .await
            .map_err(transport)?;
        let rotated: RotateResponse = Self::decode(resp).await?;
        Ok(rotated.revealed)
    }
}
