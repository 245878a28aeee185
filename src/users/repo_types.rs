use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
///
/// `password` and `remember` are plaintext and never persisted; they only
/// live between request receipt and hashing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct User {
    /// 0 until storage assigns one.
    pub id: i64,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
    pub name: String,
    pub email: String,
    #[sqlx(skip)]
    #[serde(skip)]
    pub password: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(skip)]
    #[serde(skip)]
    pub remember: String,
    /// HMAC of `remember`.
    #[serde(skip_serializing)]
    pub remember_hash: String,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }
}
