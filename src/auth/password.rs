use std::sync::Arc;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordCost;

/// Salted Argon2id hashing of `password + pepper`.
///
/// The pepper is a server-side secret shared by every account; the per-user
/// salt is generated by argon2 and embedded in the PHC string it returns.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Arc<str>,
    params: Params,
}

impl PasswordHasher {
    pub fn new(pepper: &str, cost: &PasswordCost) -> anyhow::Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self {
            pepper: Arc::from(pepper),
            params,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn peppered(&self, plain: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(plain.len() + self.pepper.len());
        bytes.extend_from_slice(plain.as_bytes());
        bytes.extend_from_slice(self.pepper.as_bytes());
        bytes
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(&self.peppered(plain), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` is a mismatch; `Err` means the stored hash is unusable.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        // Verification takes its parameters from the PHC string, so hashes
        // produced under an older cost keep working after a config change.
        match self.argon2().verify_password(&self.peppered(plain), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, algorithm = %parsed.algorithm, "argon2 verify error");
                Err(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
