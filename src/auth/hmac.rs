use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic HMAC-SHA256 keyed with a process-wide secret.
///
/// Used to turn remember tokens into lookup digests so the database never
/// holds a usable session token. Changing the key invalidates every
/// outstanding remember cookie.
#[derive(Clone)]
pub struct KeyedHasher {
    mac: HmacSha256,
}

impl KeyedHasher {
    pub fn new(key: &str) -> anyhow::Result<Self> {
        if key.is_empty() {
            anyhow::bail!("hmac key must not be empty");
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid hmac key: {e}"))?;
        Ok(Self { mac })
    }

    /// URL-safe base64 of the MAC over `input`.
    pub fn hash(&self, input: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(input.as_bytes());
        base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes())
    }
}
