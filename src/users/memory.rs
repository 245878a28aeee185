use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::{
    error::{Result, UserError},
    repo::UserStore,
    repo_types::User,
};

/// In-process `UserStore` with the same uniqueness and soft-delete rules as
/// the Postgres schema.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<User>,
}

impl Inner {
    fn active(&self) -> impl Iterator<Item = &User> {
        self.rows.iter().filter(|u| u.deleted_at.is_none())
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Result<User> {
        self.active().find(|&u| pred(u)).cloned().ok_or(UserError::NotFound)
    }

    fn check_unique(&self, user: &User) -> Result<()> {
        for other in self.active().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(UserError::EmailTaken);
            }
            if other.remember_hash == user.remember_hash {
                return Err(UserError::Storage(sqlx::Error::Protocol(
                    "duplicate remember_hash".into(),
                )));
            }
        }
        Ok(())
    }
}

/// Only what storage owns is kept: plaintext fields are dropped.
fn persisted(user: &User) -> User {
    User {
        password: String::new(),
        remember: String::new(),
        ..user.clone()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows including soft-deleted ones.
    pub fn row_count(&self) -> usize {
        self.inner.lock().expect("store lock").rows.len()
    }

    /// Raw row as stored, soft-deleted or not.
    pub fn raw(&self, id: i64) -> Option<User> {
        let inner = self.inner.lock().expect("store lock");
        inner.rows.iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn by_id(&self, id: i64) -> Result<User> {
        self.inner.lock().expect("store lock").find(|u| u.id == id)
    }

    async fn by_email(&self, email: &str) -> Result<User> {
        self.inner.lock().expect("store lock").find(|u| u.email == email)
    }

    async fn by_remember_hash(&self, digest: &str) -> Result<User> {
        self.inner
            .lock()
            .expect("store lock")
            .find(|u| u.remember_hash == digest)
    }

    async fn create(&self, user: &User) -> Result<User> {
        let mut inner = self.inner.lock().expect("store lock");
        let mut row = persisted(user);
        row.id = 0;
        inner.check_unique(&row)?;
        inner.next_id += 1;
        let now = OffsetDateTime::now_utc();
        row.id = inner.next_id;
        row.created_at = Some(now);
        row.updated_at = Some(now);
        row.deleted_at = None;
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> Result<User> {
        if user.id <= 0 {
            return Err(UserError::InvalidId);
        }
        let mut inner = self.inner.lock().expect("store lock");
        inner.check_unique(user)?;
        let row = inner
            .rows
            .iter_mut()
            .find(|u| u.id == user.id && u.deleted_at.is_none())
            .ok_or(UserError::NotFound)?;
        let created_at = row.created_at;
        *row = persisted(user);
        row.created_at = created_at;
        row.updated_at = Some(OffsetDateTime::now_utc());
        row.deleted_at = None;
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(UserError::InvalidId);
        }
        let mut inner = self.inner.lock().expect("store lock");
        if let Some(row) = inner
            .rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            row.deleted_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn auto_migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn destructive_reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.rows.clear();
        inner.next_id = 0;
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: &str, remember_hash: &str) -> User {
        User {
            email: email.into(),
            password_hash: "hash".into(),
            remember_hash: remember_hash.into(),
            password: "plain".into(),
            remember: "token".into(),
            ..User::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_ids_and_drops_plaintext() {
        let store = MemoryUserStore::new();
        let a = store.create(&row("a@x.com", "ha")).await.unwrap();
        let b = store.create(&row("b@x.com", "hb")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(a.created_at.is_some());
        let raw = store.raw(a.id).unwrap();
        assert!(raw.password.is_empty());
        assert!(raw.remember.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.create(&row("a@x.com", "h1")).await.unwrap();
        let err = store.create(&row("a@x.com", "h2")).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_invisible_but_kept() {
        let store = MemoryUserStore::new();
        let a = store.create(&row("a@x.com", "ha")).await.unwrap();
        store.delete(a.id).await.unwrap();
        assert!(matches!(store.by_id(a.id).await, Err(UserError::NotFound)));
        assert_eq!(store.row_count(), 1);
        assert!(store.raw(a.id).unwrap().deleted_at.is_some());
        // the address is free again
        store.create(&row("a@x.com", "ha")).await.unwrap();
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = MemoryUserStore::new();
        let mut user = row("a@x.com", "ha");
        user.id = 42;
        assert!(matches!(store.update(&user).await, Err(UserError::NotFound)));
        user.id = 0;
        assert!(matches!(store.update(&user).await, Err(UserError::InvalidId)));
    }
}
