use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::users::{
    error::{Result, UserError},
    repo_types::User,
};

/// Raw persistence for users. No business rules live here: callers hand in
/// fully prepared records (hashes already computed).
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn by_id(&self, id: i64) -> Result<User>;
    async fn by_email(&self, email: &str) -> Result<User>;
    async fn by_remember_hash(&self, digest: &str) -> Result<User>;
    /// Assigns identity and timestamps; returns the stored record.
    async fn create(&self, user: &User) -> Result<User>;
    /// Full-record overwrite of an existing, non-deleted user.
    async fn update(&self, user: &User) -> Result<User>;
    /// Soft delete. Zero or negative ids are `InvalidId`.
    async fn delete(&self, id: i64) -> Result<()>;
    async fn auto_migrate(&self) -> Result<()>;
    /// Drops and recreates the schema. Bootstrap and tests only.
    async fn destructive_reset(&self) -> Result<()>;
    async fn close(&self);
}

pub(crate) const EMAIL_INDEX: &str = "users_email_active_key";

const USER_COLUMNS: &str =
    "id, created_at, updated_at, deleted_at, name, email, password_hash, remember_hash";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        deleted_at    TIMESTAMPTZ NULL,
        name          TEXT NOT NULL DEFAULT '',
        email         TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        remember_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS users_email_active_key
        ON users (email) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS users_remember_hash_active_key
        ON users (remember_hash) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS users_deleted_at_idx ON users (deleted_at)
    "#,
];

/// Collapse the driver's "no row" signals into `NotFound`; everything else
/// stays a storage error, except the unique email index which is reported
/// as `EmailTaken`.
pub(crate) fn normalize(err: sqlx::Error) -> UserError {
    match err {
        sqlx::Error::RowNotFound => UserError::NotFound,
        sqlx::Error::Database(ref db) if db.constraint() == Some(EMAIL_INDEX) => {
            UserError::EmailTaken
        }
        other => UserError::Storage(other),
    }
}

fn first(row: std::result::Result<Option<User>, sqlx::Error>) -> Result<User> {
    row.map_err(normalize)?.ok_or(UserError::NotFound)
}

/// Postgres-backed `UserStore`.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, column: &str, value: &str) -> Result<User> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL"
        );
        first(
            sqlx::query_as::<_, User>(&sql)
                .bind(value)
                .fetch_optional(&self.db)
                .await,
        )
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn by_id(&self, id: i64) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        first(
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(&self.db)
                .await,
        )
    }

    async fn by_email(&self, email: &str) -> Result<User> {
        self.find_where("email", email).await
    }

    async fn by_remember_hash(&self, digest: &str) -> Result<User> {
        self.find_where("remember_hash", digest).await
    }

    async fn create(&self, user: &User) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, remember_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let stored = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.remember_hash)
            .fetch_one(&self.db)
            .await
            .map_err(normalize)?;
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<User> {
        if user.id <= 0 {
            return Err(UserError::InvalidId);
        }
        let sql = format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, remember_hash = $5, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        first(
            sqlx::query_as::<_, User>(&sql)
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.remember_hash)
                .fetch_optional(&self.db)
                .await,
        )
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(UserError::InvalidId);
        }
        sqlx::query("UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(normalize)?;
        Ok(())
    }

    async fn auto_migrate(&self) -> Result<()> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement).execute(&self.db).await?;
        }
        info!("users schema migrated");
        Ok(())
    }

    async fn destructive_reset(&self) -> Result<()> {
        warn!("dropping users table");
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(&self.db)
            .await?;
        self.auto_migrate().await
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
