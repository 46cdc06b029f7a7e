//! Entropy sources for key generation

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::sha256::Sha256;

/// Draw `n` uniformly random bytes from the operating system.
pub fn rand_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Number of inputs the user-entropy mixer collects.
pub const USER_ENTROPY_ROUNDS: usize = 5;

/// Collect entropy from the user: a handful of typed inputs mixed with
/// microsecond timestamps, folded through SHA-256 one input at a time.
///
/// `prompt` is called with the 1-based round number and returns whatever
/// the user typed.
pub fn user_entropy<F>(mut prompt: F) -> [u8; 32]
where
    F: FnMut(usize) -> String,
{
    let mut seed = [0u8; 32];
    for round in 1..=USER_ENTROPY_ROUNDS {
        let line = prompt(round);
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or(0);
        let mut engine = Sha256::new();
        engine.update(&seed);
        engine.update(line.as_bytes());
        engine.update(b"|");
        engine.update(micros.to_string().as_bytes());
        engine.update(b"|");
        seed = engine.finalize();
    }
    seed
}

/// The fixed key from Mastering Bitcoin, chapter 4. Handy as a known
/// vector, never as a real key.
pub fn mastering_bitcoin_bytes() -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = hex::decode("3aba4162c7251c891207b747840551a71939b0de081f85c4e44cf7c13e41daa6")
        .expect("hardcoded hex");
    out.copy_from_slice(&bytes);
    out
}
