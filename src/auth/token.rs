use anyhow::Context;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

/// Size in bytes (before encoding) of every remember token.
pub const REMEMBER_TOKEN_BYTES: usize = 32;

/// `n` bytes from the OS CSPRNG.
pub fn bytes(n: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("failed to read from the OS random source")?;
    Ok(buf)
}

/// `n_bytes` random bytes, URL-safe base64 encoded.
pub fn string(n_bytes: usize) -> anyhow::Result<String> {
    let b = bytes(n_bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE.encode(b))
}

pub fn remember_token() -> anyhow::Result<String> {
    string(REMEMBER_TOKEN_BYTES)
}
