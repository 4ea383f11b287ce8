//! Browser bindings: let the player audit rounds without trusting the server.

use plinko_core::{
    compute_outcome, expected_value, generate_client_seed, hash_server_seed, verify_outcome,
    Derivation, MultiplierTable, Outcome, PublishedRound, RiskLevel, RoundInput,
};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {e}")))
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_risk(risk: &str) -> Result<RiskLevel, JsValue> {
    risk.parse::<RiskLevel>().map_err(js_err)
}

fn parse_derivation(derivation: Option<String>) -> Result<Derivation, JsValue> {
    match derivation {
        Some(d) => d.parse::<Derivation>().map_err(js_err),
        None => Ok(Derivation::default()),
    }
}

#[wasm_bindgen(js_name = hashServerSeed)]
pub fn hash_server_seed_js(seed: &str) -> Result<String, JsValue> {
    hash_server_seed(seed).map_err(js_err)
}

#[wasm_bindgen(js_name = generateClientSeed)]
pub fn generate_client_seed_js() -> String {
    generate_client_seed()
}

/// Ordered multipliers for a board, edge to edge.
#[wasm_bindgen(js_name = multiplierTable)]
pub fn multiplier_table_js(rows: u8, risk: &str) -> Result<Vec<f64>, JsValue> {
    let table = MultiplierTable::standard(rows, parse_risk(risk)?).map_err(js_err)?;
    Ok(table.multipliers().to_vec())
}

#[wasm_bindgen(js_name = expectedValue)]
pub fn expected_value_js(multipliers: Vec<f64>, rows: u8) -> f64 {
    expected_value(&multipliers, rows)
}

#[wasm_bindgen(js_name = computeOutcome)]
pub fn compute_outcome_js(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    bet_amount: f64,
    rows: u8,
    risk: &str,
    derivation: Option<String>,
) -> Result<JsValue, JsValue> {
    let table = MultiplierTable::standard(rows, parse_risk(risk)?).map_err(js_err)?;
    let input = RoundInput::new(server_seed, client_seed, nonce)
        .with_derivation(parse_derivation(derivation)?);
    let outcome = compute_outcome(&input, bet_amount, &table).map_err(js_err)?;
    to_js(&outcome)
}

/// Audit a full outcome record. `false` means the round cannot be trusted.
#[wasm_bindgen(js_name = verifyOutcome)]
pub fn verify_outcome_js(outcome: JsValue) -> Result<bool, JsValue> {
    let outcome: Outcome = serde_wasm_bindgen::from_value(outcome).map_err(js_err)?;
    Ok(verify_outcome(&outcome))
}

/// Attach a revealed server seed to a round published before the reveal,
/// then audit it.
#[wasm_bindgen(js_name = verifyRevealedRound)]
pub fn verify_revealed_round_js(round: JsValue, server_seed: &str) -> Result<bool, JsValue> {
    let round: PublishedRound = serde_wasm_bindgen::from_value(round).map_err(js_err)?;
    Ok(round
        .reveal(server_seed)
        .map(|o| verify_outcome(&o))
        .unwrap_or(false))
}
