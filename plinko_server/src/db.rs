use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::{error, info};

use plinko_core::{derive_hash_hex, generate_server_seed, path_string, Outcome, SeedReveal};
use plinko_shared::RoundLogEntry;

// DB schema is defined in migrations (see migrations/ folder)

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredParams {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub nonce: i64,
}

pub async fn get_params<'e>(ex: impl SqliteExecutor<'e>) -> sqlx::Result<StoredParams> {
    sqlx::query_as::<_, StoredParams>(
        "SELECT server_seed, server_seed_hash, nonce FROM params WHERE id = 1",
    )
    .fetch_one(ex)
    .await
}

pub async fn set_params<'e>(ex: impl SqliteExecutor<'e>, p: &StoredParams) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE params SET server_seed = ?, server_seed_hash = ?, nonce = ? WHERE id = 1",
    )
    .bind(&p.server_seed)
    .bind(&p.server_seed_hash)
    .bind(p.nonce)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn init_db(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;

    let seed = generate_server_seed();
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO params (id, server_seed, server_seed_hash, nonce) VALUES (1, ?, ?, 0)",
    )
    .bind(&seed)
    .bind(derive_hash_hex(seed.as_bytes()))
    .execute(db)
    .await?;
    if inserted.rows_affected() > 0 {
        info!("committed initial server seed");
    }

    // a published commitment is never rewritten
    let p = get_params(db).await?;
    if p.server_seed_hash != derive_hash_hex(p.server_seed.as_bytes()) {
        error!(stored = %p.server_seed_hash, "server seed hash does not match stored seed");
        anyhow::bail!(
            "stored server seed hash {} does not match its seed",
            p.server_seed_hash
        );
    }
    Ok(())
}

pub async fn insert_round<'e>(ex: impl SqliteExecutor<'e>, o: &Outcome) -> anyhow::Result<i64> {
    let ts = Utc::now().to_rfc3339();
    let id = sqlx::query(
        "INSERT INTO rounds (ts, client_seed, nonce, server_seed_hash, board_rows, risk, derivation, bet, path, bucket_index, multiplier, payout, verification_hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(ts)
    .bind(&o.client_seed)
    .bind(i64::try_from(o.nonce)?)
    .bind(&o.server_seed_hash)
    .bind(o.rows as i64)
    .bind(o.risk.as_str())
    .bind(o.derivation.as_str())
    .bind(o.bet_amount)
    .bind(path_string(&o.path))
    .bind(o.bucket_index as i64)
    .bind(o.multiplier)
    .bind(o.payout)
    .bind(&o.verification_hash)
    .execute(ex)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn recent_rounds(db: &SqlitePool, limit: i64) -> anyhow::Result<Vec<RoundLogEntry>> {
    let rows = sqlx::query(
        "SELECT id, ts, client_seed, nonce, server_seed_hash, board_rows, risk, path, bucket_index, multiplier, payout, verification_hash \
         FROM rounds ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let ts: String = r.get("ts");
        out.push(RoundLogEntry {
            id: r.get("id"),
            ts: DateTime::parse_from_rfc3339(&ts)?.with_timezone(&Utc),
            client_seed: r.get("client_seed"),
            nonce: r.get("nonce"),
            server_seed_hash: r.get("server_seed_hash"),
            rows: u8::try_from(r.get::<i64, _>("board_rows"))?,
            risk: r.get("risk"),
            path: r.get("path"),
            bucket_index: r.get("bucket_index"),
            multiplier: r.get("multiplier"),
            payout: r.get("payout"),
            verification_hash: r.get("verification_hash"),
        });
    }
    Ok(out)
}

pub async fn insert_reveal<'e>(ex: impl SqliteExecutor<'e>, reveal: &SeedReveal) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO reveals (server_seed_hash, server_seed, rounds, revealed_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&reveal.server_seed_hash)
    .bind(&reveal.server_seed)
    .bind(i64::try_from(reveal.rounds)?)
    .bind(Utc::now().to_rfc3339())
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn list_reveals(db: &SqlitePool) -> anyhow::Result<Vec<SeedReveal>> {
    let rows = sqlx::query(
        "SELECT server_seed, server_seed_hash, rounds FROM reveals ORDER BY revealed_at DESC",
    )
    .fetch_all(db)
    .await?;
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(SeedReveal {
            server_seed: r.get("server_seed"),
            server_seed_hash: r.get("server_seed_hash"),
            rounds: u64::try_from(r.get::<i64, _>("rounds"))?,
        });
    }
    Ok(out)
}
