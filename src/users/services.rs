use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    auth::{KeyedHasher, PasswordHasher},
    config::{SecurityConfig, ValidationRules},
    users::{
        error::{Result, UserError},
        repo::UserStore,
        repo_types::User,
        validator::{StepContext, UserValidator},
    },
};

/// Single entry point for account management used by the HTTP handlers.
#[derive(Clone)]
pub struct UserService {
    validator: UserValidator,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        security: &SecurityConfig,
        rules: ValidationRules,
    ) -> anyhow::Result<Self> {
        let ctx = StepContext {
            passwords: PasswordHasher::new(&security.password_pepper, &security.password_cost)?,
            keyed: KeyedHasher::new(&security.hmac_key)?,
            rules,
        };
        Ok(Self {
            validator: UserValidator::new(store, ctx),
        })
    }

    #[instrument(skip_all, fields(email = %user.email))]
    pub async fn create(&self, user: User) -> Result<User> {
        let user = self.validator.create(user).await?;
        info!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn update(&self, user: User) -> Result<User> {
        self.validator.update(user).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.validator.delete(id).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Issues and stores a new remember token for a signed-in user.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn rotate_remember(&self, user: User) -> Result<User> {
        self.validator.rotate_remember(user).await
    }

    pub async fn by_id(&self, id: i64) -> Result<User> {
        self.validator.by_id(id).await
    }

    pub async fn by_email(&self, email: &str) -> Result<User> {
        self.validator.by_email(email).await
    }

    pub async fn by_remember(&self, token: &str) -> Result<User> {
        self.validator.by_remember(token).await
    }

    /// Looks the user up by email and checks the password against the stored
    /// hash. Unknown email is `NotFound`, a wrong password `InvalidPassword`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = self.validator.by_email(email).await.inspect_err(|e| {
            if matches!(e, UserError::NotFound) {
                warn!("login unknown email");
            }
        })?;

        let passwords = self.validator.context().passwords.clone();
        let hash = user.password_hash.clone();
        let plain = password.to_string();
        let ok = tokio::task::spawn_blocking(move || passwords.verify(&plain, &hash))
            .await
            .map_err(|e| UserError::Internal(anyhow::anyhow!("verify task failed: {e}")))??;

        if !ok {
            warn!(user_id = user.id, "login invalid password");
            return Err(UserError::InvalidPassword);
        }
        info!(user_id = user.id, "user authenticated");
        Ok(user)
    }

    pub async fn auto_migrate(&self) -> Result<()> {
        self.validator.auto_migrate().await
    }

    pub async fn destructive_reset(&self) -> Result<()> {
        self.validator.destructive_reset().await
    }

    pub async fn close(&self) {
        self.validator.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PasswordCost,
        users::{memory::MemoryUserStore, repo::UserStore},
    };

    fn security() -> SecurityConfig {
        SecurityConfig {
            password_pepper: "test-pepper".into(),
            hmac_key: "test-hmac-key".into(),
            password_cost: PasswordCost::testing(),
        }
    }

    fn service() -> (UserService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let svc = UserService::new(store.clone(), &security(), ValidationRules::default())
            .expect("service");
        (svc, store)
    }

    fn ann() -> User {
        User::new("Ann", "ann@x.com", "secret123")
    }

    #[tokio::test]
    async fn signup_then_login_scenario() {
        let (svc, store) = service();

        let created = svc.create(ann()).await.unwrap();
        assert!(created.id > 0);
        assert!(!created.password_hash.is_empty());
        assert!(created.password.is_empty());
        assert!(!created.remember.is_empty());
        assert!(!created.remember_hash.is_empty());

        let stored = store.raw(created.id).unwrap();
        assert!(stored.password.is_empty());
        assert!(stored.remember.is_empty());
        let hasher = PasswordHasher::new("test-pepper", &PasswordCost::testing()).unwrap();
        assert!(hasher.verify("secret123", &stored.password_hash).unwrap());

        let authed = svc.authenticate("ann@x.com", "secret123").await.unwrap();
        assert_eq!(authed.id, created.id);
        assert!(authed.password.is_empty());

        let err = svc.authenticate("ann@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidPassword));

        let err = svc.by_email("nobody@x.com").await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (svc, _) = service();
        let err = svc.authenticate("nobody@x.com", "secret123").await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn email_lookup_ignores_case_and_whitespace() {
        let (svc, _) = service();
        let created = svc
            .create(User::new("Ann", "  Ann@X.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(created.email, "ann@x.com");
        assert_eq!(svc.by_email("ANN@x.com ").await.unwrap().id, created.id);
        assert!(svc.authenticate("Ann@X.COM", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (svc, _) = service();
        svc.create(ann()).await.unwrap();
        let err = svc
            .create(User::new("Other", "ANN@x.com", "password99"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn by_remember_resolves_issued_token_only() {
        let (svc, _) = service();
        let created = svc.create(ann()).await.unwrap();

        let found = svc.by_remember(&created.remember).await.unwrap();
        assert_eq!(found.id, created.id);

        let mut tampered = created.remember.clone();
        tampered.replace_range(0..1, if tampered.starts_with('A') { "B" } else { "A" });
        assert!(matches!(
            svc.by_remember(&tampered).await,
            Err(UserError::NotFound)
        ));
        assert!(matches!(svc.by_remember("").await, Err(UserError::NotFound)));
    }

    #[tokio::test]
    async fn update_rotates_remember_hash() {
        let (svc, _) = service();
        let mut user = svc.create(ann()).await.unwrap();
        let old_token = user.remember.clone();

        user.remember = "fresh-token".into();
        let updated = svc.update(user).await.unwrap();
        assert_eq!(updated.remember, "fresh-token");

        assert_eq!(svc.by_remember("fresh-token").await.unwrap().id, updated.id);
        assert!(matches!(
            svc.by_remember(&old_token).await,
            Err(UserError::NotFound)
        ));
        // password untouched
        assert!(svc.authenticate("ann@x.com", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn update_with_new_password_rehashes() {
        let (svc, _) = service();
        let mut user = svc.create(ann()).await.unwrap();
        user.password = "another-secret".into();
        svc.update(user).await.unwrap();
        assert!(matches!(
            svc.authenticate("ann@x.com", "secret123").await,
            Err(UserError::InvalidPassword)
        ));
        assert!(svc.authenticate("ann@x.com", "another-secret").await.is_ok());
    }

    #[tokio::test]
    async fn update_with_blank_hashes_is_rejected() {
        let (svc, store) = service();
        let created = svc.create(ann()).await.unwrap();
        let before = store.raw(created.id).unwrap();

        let blank = User {
            id: created.id,
            name: "Ann".into(),
            email: "ann@x.com".into(),
            ..User::default()
        };
        let err = svc.update(blank).await.unwrap_err();
        assert!(matches!(err, UserError::Validation(_)), "{err}");

        let after = store.raw(created.id).unwrap();
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(after.remember_hash, before.remember_hash);
        assert!(svc.authenticate("ann@x.com", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn rotate_remember_skips_profile_rules() {
        let store = Arc::new(MemoryUserStore::new());
        let lenient = ValidationRules {
            require_name: false,
            ..ValidationRules::default()
        };
        let svc = UserService::new(store.clone(), &security(), lenient).unwrap();
        let created = svc
            .create(User::new("", "ann@x.com", "secret123"))
            .await
            .unwrap();

        // same data, stricter rules after signup
        let strict = UserService::new(store, &security(), ValidationRules::default()).unwrap();
        let user = strict.authenticate("ann@x.com", "secret123").await.unwrap();
        assert!(matches!(
            strict.update(user.clone()).await,
            Err(UserError::Validation(_))
        ));

        let rotated = strict.rotate_remember(user).await.unwrap();
        assert_ne!(rotated.remember, created.remember);
        assert_eq!(strict.by_remember(&rotated.remember).await.unwrap().id, created.id);
        assert!(matches!(
            strict.by_remember(&created.remember).await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn foreign_hash_scheme_is_an_error_not_a_mismatch() {
        let (svc, store) = service();
        let mut created = svc.create(ann()).await.unwrap();
        created.password_hash =
            "$pbkdf2-sha256$i=1000$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA".into();
        store.update(&created).await.unwrap();

        let err = svc.authenticate("ann@x.com", "secret123").await.unwrap_err();
        assert!(matches!(err, UserError::Internal(_)), "{err}");
    }

    #[tokio::test]
    async fn delete_zero_is_invalid_id() {
        let (svc, _) = service();
        assert!(matches!(svc.delete(0).await, Err(UserError::InvalidId)));
    }

    #[tokio::test]
    async fn delete_hides_user() {
        let (svc, _) = service();
        let created = svc.create(ann()).await.unwrap();
        svc.delete(created.id).await.unwrap();
        assert!(matches!(svc.by_id(created.id).await, Err(UserError::NotFound)));
        assert!(matches!(
            svc.by_remember(&created.remember).await,
            Err(UserError::NotFound)
        ));
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_storage() {
        let (svc, store) = service();
        let err = svc
            .create(User::new("Ann", "ann@x.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn destructive_reset_empties_store() {
        let (svc, store) = service();
        svc.create(ann()).await.unwrap();
        svc.destructive_reset().await.unwrap();
        assert_eq!(store.row_count(), 0);
        svc.close().await;
    }

    #[test]
    fn construction_fails_on_empty_hmac_key() {
        let store = Arc::new(MemoryUserStore::new());
        let mut security = security();
        security.hmac_key.clear();
        assert!(UserService::new(store, &security, ValidationRules::default()).is_err());
    }
}
