//! Operator actions against the server's database.

use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use plinko_core::{derive_hash_hex, generate_server_seed, validate_server_seed, SeedReveal};

pub async fn get_pool(url: Option<String>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or_else(|| "sqlite://plinko.db".into());
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sqlx::migrate!("../plinko_server/migrations").run(&pool).await?;
    Ok(pool)
}

/// Reveal the active server seed and commit to `new_seed` (or a fresh one).
pub async fn rotate_seed(
    pool: &SqlitePool,
    new_seed: Option<String>,
) -> anyhow::Result<(Option<SeedReveal>, String)> {
    let new_seed = new_seed.unwrap_or_else(generate_server_seed);
    validate_server_seed(&new_seed)?;
    let hash = derive_hash_hex(new_seed.as_bytes());

    let mut tx = pool.begin().await?;
    let current = sqlx::query("SELECT server_seed, server_seed_hash, nonce FROM params WHERE id = 1")
        .fetch_optional(&mut *tx)
        .await?;

    let revealed = match current {
        Some(row) => {
            let reveal = SeedReveal {
                server_seed: row.get("server_seed"),
                server_seed_hash: row.get("server_seed_hash"),
                rounds: u64::try_from(row.get::<i64, _>("nonce"))?,
            };
            sqlx::query(
                "INSERT INTO reveals (server_seed_hash, server_seed, rounds, revealed_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&reveal.server_seed_hash)
            .bind(&reveal.server_seed)
            .bind(i64::try_from(reveal.rounds)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
            Some(reveal)
        }
        None => None,
    };

    sqlx::query(
        "INSERT INTO params (id, server_seed, server_seed_hash, nonce) VALUES (1, ?, ?, 0) \
         ON CONFLICT(id) DO UPDATE SET server_seed = excluded.server_seed, server_seed_hash = excluded.server_seed_hash, nonce = 0",
    )
    .bind(&new_seed)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(next = %hash, "server seed rotated");
    Ok((revealed, hash))
}

pub async fn view_logs(pool: &SqlitePool, n: i64) -> anyhow::Result<()> {
    let rows = sqlx::query(
        "SELECT id, ts, client_seed, nonce, server_seed_hash, board_rows, risk, bucket_index, payout FROM rounds ORDER BY id DESC LIMIT ?",
    )
    .bind(n)
    .fetch_all(pool)
    .await?;
    for r in rows {
        let id: i64 = r.get("id");
        let ts: String = r.get("ts");
        let client_seed: String = r.get("client_seed");
        let nonce: i64 = r.get("nonce");
        let server_seed_hash: String = r.get("server_seed_hash");
        let board_rows: i64 = r.get("board_rows");
        let risk: String = r.get("risk");
        let bucket: i64 = r.get("bucket_index");
        let payout: f64 = r.get("payout");
        println!(
            "#{:>6} {} seed={} nonce={} hash={} board={}/{} bucket={} payout={}",
            id, ts, client_seed, nonce, server_seed_hash, board_rows, risk, bucket, payout
        );
    }
    Ok(())
}

pub async fn export_csv(pool: &SqlitePool, path: &str) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "id",
        "ts",
        "client_seed",
        "nonce",
        "server_seed_hash",
        "board_rows",
        "risk",
        "derivation",
        "bet",
        "path",
        "bucket_index",
        "multiplier",
        "payout",
        "verification_hash",
    ])?;
    let rows = sqlx::query(
        "SELECT id, ts, client_seed, nonce, server_seed_hash, board_rows, risk, derivation, bet, path, bucket_index, multiplier, payout, verification_hash \
         FROM rounds ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    for r in &rows {
        wtr.write_record(&[
            r.get::<i64, _>("id").to_string(),
            r.get::<String, _>("ts"),
            r.get::<String, _>("client_seed"),
            r.get::<i64, _>("nonce").to_string(),
            r.get::<String, _>("server_seed_hash"),
            r.get::<i64, _>("board_rows").to_string(),
            r.get::<String, _>("risk"),
            r.get::<String, _>("derivation"),
            r.get::<f64, _>("bet").to_string(),
            r.get::<String, _>("path"),
            r.get::<i64, _>("bucket_index").to_string(),
            r.get::<f64, _>("multiplier").to_string(),
            r.get::<f64, _>("payout").to_string(),
            r.get::<String, _>("verification_hash"),
        ])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let url = format!("sqlite://{}", dir.path().join("plinko.db").display());
        get_pool(Some(url)).await.unwrap()
    }

    #[tokio::test]
    async fn rotate_reveals_previous_seed() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;

        let (first_reveal, first_hash) = rotate_seed(&pool, Some("a".repeat(64))).await.unwrap();
        assert!(first_reveal.is_none());

        let (second_reveal, second_hash) = rotate_seed(&pool, None).await.unwrap();
        let reveal = second_reveal.unwrap();
        assert_eq!(reveal.server_seed, "a".repeat(64));
        assert_eq!(reveal.server_seed_hash, first_hash);
        assert!(reveal.matches_commitment());
        assert_ne!(first_hash, second_hash);
    }

    #[tokio::test]
    async fn rotate_rejects_malformed_seed() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;
        assert!(rotate_seed(&pool, Some("short".into())).await.is_err());
    }

    #[tokio::test]
    async fn export_writes_header_for_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;
        let out = dir.path().join("rounds.csv");
        let n = export_csv(&pool, out.to_str().unwrap()).await.unwrap();
        assert_eq!(n, 0);
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.starts_with("id,ts,client_seed"));
    }
}
