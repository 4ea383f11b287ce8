use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use plinko_core::{
    compute_outcome, derive_hash_hex, generate_server_seed, verify_outcome, Derivation,
    MultiplierTable, Outcome, RiskLevel, RoundInput, SeedReveal,
};
use plinko_shared::{
    ApiError, CommitmentResponse, ErrorBody, MultiplierResponse, RollRequest, RollResponse,
    RotateResponse, RoundLogEntry, VerifyResponse,
};

use crate::db;

pub struct AppState {
    pub db: SqlitePool,
    pub api_key: String,
    // rolls and rotations read-modify-write the nonce; serialize them
    pub seed_lock: Mutex<()>,
}

impl AppState {
    pub fn new(db: SqlitePool, api_key: impl Into<String>) -> Self {
        Self {
            db,
            api_key: api_key.into(),
            seed_lock: Mutex::new(()),
        }
    }
}

pub struct AppError(ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        AppError(e)
    }
}

impl From<plinko_core::FairError> for AppError {
    fn from(e: plinko_core::FairError) -> Self {
        AppError(e.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        error!("database error: {e}");
        AppError(ApiError::Internal)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        error!("internal error: {e:#}");
        AppError(ApiError::Internal)
    }
}

type AppResult<T> = Result<Json<T>, AppError>;

async fn route_commitment(State(state): State<Arc<AppState>>) -> AppResult<CommitmentResponse> {
    let p = db::get_params(&state.db).await?;
    Ok(Json(CommitmentResponse {
        server_seed_hash: p.server_seed_hash,
        nonce: u64::try_from(p.nonce).map_err(anyhow::Error::from)?,
    }))
}

async fn route_roll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RollRequest>,
) -> AppResult<RollResponse> {
    if req.bet <= 0.0 {
        return Err(ApiError::Invalid("bet must be positive".into()).into());
    }
    let table = MultiplierTable::standard(req.rows, req.risk)?;

    let _guard = state.seed_lock.lock().await;
    let mut tx = state.db.begin().await?;
    let mut p = db::get_params(&mut *tx).await?;
    let input = RoundInput {
        server_seed: p.server_seed.clone(),
        client_seed: req.client_seed,
        nonce: u64::try_from(p.nonce).map_err(anyhow::Error::from)?,
        derivation: Derivation::Extended,
    };
    let outcome = compute_outcome(&input, req.bet, &table)?;

    // log round
    db::insert_round(&mut *tx, &outcome).await?;

    // persist incremented nonce
    p.nonce += 1;
    db::set_params(&mut *tx, &p).await?;
    tx.commit().await?;

    info!(
        nonce = outcome.nonce,
        rows = outcome.rows,
        risk = %outcome.risk,
        bucket = outcome.bucket_index,
        payout = outcome.payout,
        "round resolved"
    );
    Ok(Json(outcome.into()))
}

async fn route_verify(Json(outcome): Json<Outcome>) -> Json<VerifyResponse> {
    let valid = verify_outcome(&outcome);
    if !valid {
        info!(nonce = outcome.nonce, hash = %outcome.server_seed_hash, "verification failed");
    }
    Json(VerifyResponse { valid })
}

async fn route_multipliers(
    Path((rows, risk)): Path<(u8, RiskLevel)>,
) -> AppResult<MultiplierResponse> {
    let table = MultiplierTable::standard(rows, risk)?;
    Ok(Json(MultiplierResponse {
        rows,
        risk,
        rtp: table.rtp(),
        multipliers: table.multipliers().to_vec(),
    }))
}

#[derive(Debug, Deserialize)]
struct RoundsQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

async fn route_rounds(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RoundsQuery>,
) -> AppResult<Vec<RoundLogEntry>> {
    let limit = q.limit.clamp(1, 500);
    Ok(Json(db::recent_rounds(&state.db, limit).await?))
}

async fn route_reveals(State(state): State<Arc<AppState>>) -> AppResult<Vec<SeedReveal>> {
    Ok(Json(db::list_reveals(&state.db).await?))
}

async fn route_admin_rotate_seed(
    State(state): State<Arc<AppState>>,
    TypedHeader(axum_extra::headers::Authorization(bearer)): TypedHeader<
        axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>,
    >,
) -> AppResult<RotateResponse> {
    if bearer.token() != state.api_key {
        return Err(ApiError::Unauthorized.into());
    }

    let _guard = state.seed_lock.lock().await;
    let mut tx = state.db.begin().await?;
    let mut p = db::get_params(&mut *tx).await?;
    let revealed = SeedReveal {
        server_seed: p.server_seed.clone(),
        server_seed_hash: p.server_seed_hash.clone(),
        rounds: u64::try_from(p.nonce).map_err(anyhow::Error::from)?,
    };
    db::insert_reveal(&mut *tx, &revealed).await?;

    p.server_seed = generate_server_seed();
    p.server_seed_hash = derive_hash_hex(p.server_seed.as_bytes());
    p.nonce = 0;
    db::set_params(&mut *tx, &p).await?;
    tx.commit().await?;

    info!(
        revealed = %revealed.server_seed_hash,
        next = %p.server_seed_hash,
        rounds = revealed.rounds,
        "server seed rotated"
    );
    Ok(Json(RotateResponse {
        revealed,
        next_server_seed_hash: p.server_seed_hash,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/commitment", get(route_commitment))
        .route("/roll", post(route_roll))
        .route("/verify", post(route_verify))
        .route("/multipliers/:rows/:risk", get(route_multipliers))
        .route("/rounds", get(route_rounds))
        .route("/reveals", get(route_reveals))
        .route("/admin/rotate-seed", post(route_admin_rotate_seed))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
