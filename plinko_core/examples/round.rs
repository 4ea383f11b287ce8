use plinko_core::{path_string, verify_outcome, MultiplierTable, RiskLevel, SeedSession};

fn main() -> Result<(), plinko_core::FairError> {
    // Commit, play a few rounds, reveal, audit
    let mut session = SeedSession::new();
    let table = MultiplierTable::standard(16, RiskLevel::Medium)?;
    println!("committed server_seed_hash={}", session.server_seed_hash());

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(session.play(1.0, &table)?);
    }
    let reveal = session.rotate();
    println!("revealed server_seed={}", reveal.server_seed);

    for outcome in &outcomes {
        println!(
            "nonce={} path={} bucket={} multiplier={} verified={}",
            outcome.nonce,
            path_string(&outcome.path),
            outcome.bucket_index,
            outcome.multiplier,
            verify_outcome(outcome)
        );
    }
    Ok(())
}
