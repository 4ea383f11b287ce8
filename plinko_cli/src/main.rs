use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plinko_core::{
    generate_server_seed, hash_server_seed, path_string, verify_outcome, Derivation,
    LocalAuthority, MultiplierTable, OutcomeAuthority, RiskLevel, RoundInput, MAX_ROWS, MIN_ROWS,
};

mod admin;
mod audit;
mod remote;

use remote::RemoteAuthority;

#[derive(Parser)]
#[command(name = "plinko-cli", about = "Admin and audit CLI for provably-fair Plinko")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://plinko.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh server seed and print it with its commitment
    GenSeed,
    /// Print the SHA-256 commitment of a server seed
    HashSeed { seed: String },
    /// Recompute a round from revealed seeds
    Verify {
        #[arg(long)]
        server_seed: String,
        #[arg(long)]
        client_seed: String,
        #[arg(long)]
        nonce: u64,
        #[arg(long, default_value_t = 16)]
        rows: u8,
        #[arg(long, default_value = "low")]
        risk: RiskLevel,
        #[arg(long, default_value = "extended")]
        derivation: Derivation,
        /// Claimed bucket index to check against
        #[arg(long)]
        bucket: Option<usize>,
        /// Claimed multiplier to check against
        #[arg(long)]
        multiplier: Option<f64>,
    },
    /// Verify a full outcome record stored as JSON
    VerifyOutcome { path: String },
    /// Show multiplier tables with their theoretical RTP
    Rtp {
        #[arg(long)]
        rows: Option<u8>,
        #[arg(long)]
        risk: Option<RiskLevel>,
        /// Also simulate this many rounds under a fresh seed
        #[arg(long)]
        simulate: Option<u64>,
    },
    /// Play rounds against a local or remote authority, then reveal and audit them
    Play {
        /// Server base URL; plays locally when absent
        #[arg(long, env = "PLINKO_URL")]
        remote: Option<String>,
        #[arg(long, env = "API_KEY")]
        api_key: Option<String>,
        #[arg(long, default_value = "cli-player")]
        client_seed: String,
        #[arg(long, default_value_t = 5)]
        rounds: u32,
        #[arg(long, default_value_t = 1.0)]
        bet: f64,
        #[arg(long, default_value_t = 16)]
        rows: u8,
        #[arg(long, default_value = "low")]
        risk: RiskLevel,
        /// Rotate the server seed afterwards and verify every round
        #[arg(long)]
        reveal: bool,
    },
    /// Rotate server seed, revealing the current one
    RotateSeed { new_seed: Option<String> },
    /// View last N rounds
    ViewLogs {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export rounds to CSV path
    ExportCsv { path: String },
}

async fn play(
    authority: &dyn OutcomeAuthority,
    client_seed: &str,
    rounds: u32,
    bet: f64,
    rows: u8,
    risk: RiskLevel,
    reveal: bool,
) -> anyhow::Result<()> {
    let commitment = authority.commitment().await?;
    println!("server_seed_hash={}", commitment.server_seed_hash);

    let mut played = Vec::with_capacity(rounds as usize);
    for _ in 0..rounds {
        let round = authority.play(client_seed, bet, rows, risk).await?;
        println!(
            "nonce={} path={} bucket={} multiplier={} payout={}",
            round.nonce,
            path_string(&round.path),
            round.bucket_index,
            round.multiplier,
            round.payout
        );
        played.push(round);
    }

    if reveal {
        let revealed = authority.rotate().await?;
        println!("revealed server_seed={}", revealed.server_seed);
        let mut failures = 0;
        for round in played {
            let nonce = round.nonce;
            let ok = round
                .reveal(&revealed.server_seed)
                .map(|o| verify_outcome(&o))
                .unwrap_or(false);
            if !ok {
                failures += 1;
                println!("nonce={nonce} FAILED verification");
            }
        }
        if failures > 0 {
            anyhow::bail!("{failures} round(s) failed verification");
        }
        println!("all rounds verified");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::GenSeed => {
            let seed = generate_server_seed();
            println!("server_seed={}", seed);
            println!("server_seed_hash={}", hash_server_seed(&seed)?);
        }
        Commands::HashSeed { seed } => {
            println!("{}", hash_server_seed(&seed)?);
        }
        Commands::Verify {
            server_seed,
            client_seed,
            nonce,
            rows,
            risk,
            derivation,
            bucket,
            multiplier,
        } => {
            let input = RoundInput::new(server_seed, client_seed, nonce).with_derivation(derivation);
            let claim = audit::Claim {
                bucket_index: bucket,
                multiplier,
            };
            let outcome = audit::recompute(&input, rows, risk, claim)?;
            println!("server_seed_hash={}", outcome.server_seed_hash);
            println!("{}", audit::describe(&outcome));
        }
        Commands::VerifyOutcome { path } => {
            if audit::verify_file(&path)? {
                println!("valid");
            } else {
                anyhow::bail!("outcome in {path} does NOT verify");
            }
        }
        Commands::Rtp {
            rows,
            risk,
            simulate,
        } => {
            let row_range = match rows {
                Some(r) => r..=r,
                None => MIN_ROWS..=MAX_ROWS,
            };
            let risks = match risk {
                Some(r) => vec![r],
                None => RiskLevel::ALL.to_vec(),
            };
            for rows in row_range {
                for &risk in &risks {
                    let table = MultiplierTable::standard(rows, risk)?;
                    println!(
                        "rows={:>2} risk={:<6} rtp={:.4}% edge={:.4}% table={:?}",
                        rows,
                        risk,
                        table.rtp() * 100.0,
                        table.house_edge() * 100.0,
                        table.multipliers()
                    );
                    if let Some(n) = simulate {
                        let observed = audit::simulate(rows, risk, n, Derivation::Extended)?;
                        println!("          simulated {} rounds: rtp={:.4}%", n, observed * 100.0);
                    }
                }
            }
        }
        Commands::Play {
            remote,
            api_key,
            client_seed,
            rounds,
            bet,
            rows,
            risk,
            reveal,
        } => {
            let authority: Box<dyn OutcomeAuthority> = match remote {
                Some(url) => Box::new(RemoteAuthority::new(url, api_key, client_seed.clone())),
                None => Box::new(LocalAuthority::default()),
            };
            play(authority.as_ref(), &client_seed, rounds, bet, rows, risk, reveal).await?;
        }
        Commands::RotateSeed { new_seed } => {
            let pool = admin::get_pool(cli.database_url).await?;
            let (revealed, hash) = admin::rotate_seed(&pool, new_seed).await?;
            if let Some(r) = revealed {
                println!(
                    "Revealed server seed {} (hash {}, {} rounds)",
                    r.server_seed, r.server_seed_hash, r.rounds
                );
            }
            println!("Rotated server seed. New hash: {}", hash);
        }
        Commands::ViewLogs { n } => {
            let pool = admin::get_pool(cli.database_url).await?;
            admin::view_logs(&pool, n).await?;
        }
        Commands::ExportCsv { path } => {
            let pool = admin::get_pool(cli.database_url).await?;
            let total = admin::export_csv(&pool, &path).await?;
            println!("Exported {} rows to {}", total, path);
        }
    }

    Ok(())
}
