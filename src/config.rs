use anyhow::Context;
use serde::Deserialize;

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordCost {
    /// Cheapest parameters argon2 accepts; for tests only.
    #[cfg(test)]
    pub fn testing() -> Self {
        Self {
            memory_kib: argon2::Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    pub password_pepper: String,
    pub hmac_key: String,
    pub password_cost: PasswordCost,
}

// Secrets stay out of logs.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("password_pepper", &"<redacted>")
            .field("hmac_key", &"<redacted>")
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRules {
    pub require_name: bool,
    pub min_password_length: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            require_name: true,
            min_password_length: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub security: SecurityConfig,
    pub rules: ValidationRules,
    pub cookie_secure: bool,
    pub destructive_reset: bool,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let defaults = PasswordCost::default();
        let security = SecurityConfig {
            password_pepper: std::env::var("PASSWORD_PEPPER")
                .context("PASSWORD_PEPPER is not set")?,
            hmac_key: std::env::var("HMAC_SECRET_KEY").context("HMAC_SECRET_KEY is not set")?,
            password_cost: PasswordCost {
                memory_kib: parse_var("ARGON2_MEMORY_KIB", defaults.memory_kib),
                iterations: parse_var("ARGON2_ITERATIONS", defaults.iterations),
                parallelism: parse_var("ARGON2_PARALLELISM", defaults.parallelism),
            },
        };
        let rule_defaults = ValidationRules::default();
        let rules = ValidationRules {
            require_name: parse_var("REQUIRE_NAME", rule_defaults.require_name),
            min_password_length: parse_var(
                "MIN_PASSWORD_LENGTH",
                rule_defaults.min_password_length,
            ),
        };
        Ok(Self {
            database_url,
            security,
            rules,
            cookie_secure: parse_var("COOKIE_SECURE", false),
            destructive_reset: parse_var("DESTRUCTIVE_RESET", false),
        })
    }
}
