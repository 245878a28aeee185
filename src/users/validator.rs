use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::{
    auth::{token, KeyedHasher, PasswordHasher},
    config::ValidationRules,
    users::{
        error::{Result, UserError},
        repo::UserStore,
        repo_types::User,
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Email case policy: trimmed and lower-cased on every write and lookup.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// One stage of the validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    NormalizeEmail,
    RequireEmail,
    EmailFormat,
    RequireName,
    RequirePassword,
    HashPassword,
    DefaultRemember,
    HashRemember,
    RequireHashes,
}

/// Everything the steps need besides the user itself.
#[derive(Clone)]
pub struct StepContext {
    pub passwords: PasswordHasher,
    pub keyed: KeyedHasher,
    pub rules: ValidationRules,
}

impl Step {
    pub fn apply(self, mut user: User, ctx: &StepContext) -> Result<User> {
        match self {
            Step::NormalizeEmail => {
                user.email = normalize_email(&user.email);
                user.name = user.name.trim().to_string();
            }
            Step::RequireEmail => {
                if user.email.is_empty() {
                    return Err(UserError::validation("email address is required"));
                }
            }
            Step::EmailFormat => {
                if !is_valid_email(&user.email) {
                    return Err(UserError::validation("email address is not valid"));
                }
            }
            Step::RequireName => {
                if user.name.is_empty() {
                    return Err(UserError::validation("name is required"));
                }
            }
            Step::RequirePassword => {
                if user.password.is_empty() {
                    return Err(UserError::validation("password is required"));
                }
            }
            Step::HashPassword => {
                if user.password.is_empty() {
                    return Ok(user);
                }
                if user.password.chars().count() < ctx.rules.min_password_length {
                    return Err(UserError::validation(format!(
                        "password must be at least {} characters long",
                        ctx.rules.min_password_length
                    )));
                }
                user.password_hash = ctx.passwords.hash(&user.password)?;
                user.password.clear();
            }
            Step::DefaultRemember => {
                if user.remember.is_empty() {
                    user.remember = token::remember_token()?;
                    debug!("remember token generated");
                }
            }
            Step::HashRemember => {
                if !user.remember.is_empty() {
                    user.remember_hash = ctx.keyed.hash(&user.remember);
                }
            }
            Step::RequireHashes => {
                if user.password_hash.is_empty() {
                    return Err(UserError::validation("password is required"));
                }
                if user.remember_hash.is_empty() {
                    return Err(UserError::validation("remember token is required"));
                }
            }
        }
        Ok(user)
    }
}

/// Ordered steps run before a single terminal storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline(Vec<Step>);

impl Pipeline {
    pub fn for_create(rules: &ValidationRules) -> Self {
        let mut steps = vec![Step::NormalizeEmail, Step::RequireEmail, Step::EmailFormat];
        if rules.require_name {
            steps.push(Step::RequireName);
        }
        steps.extend([
            Step::RequirePassword,
            Step::HashPassword,
            Step::DefaultRemember,
            Step::HashRemember,
            Step::RequireHashes,
        ]);
        Self(steps)
    }

    pub fn for_update(rules: &ValidationRules) -> Self {
        let mut steps = vec![Step::NormalizeEmail, Step::RequireEmail, Step::EmailFormat];
        if rules.require_name {
            steps.push(Step::RequireName);
        }
        steps.extend([Step::HashPassword, Step::HashRemember, Step::RequireHashes]);
        Self(steps)
    }

    /// Re-keys the remember token only; name and email are left as stored.
    pub fn for_rotation() -> Self {
        Self(vec![Step::HashRemember, Step::RequireHashes])
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn run(&self, user: User, ctx: &StepContext) -> Result<User> {
        self.0.iter().try_fold(user, |user, step| step.apply(user, ctx))
    }
}

/// Enforces the user invariants, then hands off to the wrapped store.
#[derive(Clone)]
pub struct UserValidator {
    store: Arc<dyn UserStore>,
    ctx: Arc<StepContext>,
    create: Arc<Pipeline>,
    update: Arc<Pipeline>,
    rotation: Arc<Pipeline>,
}

impl UserValidator {
    pub fn new(store: Arc<dyn UserStore>, ctx: StepContext) -> Self {
        let create = Arc::new(Pipeline::for_create(&ctx.rules));
        let update = Arc::new(Pipeline::for_update(&ctx.rules));
        Self {
            store,
            ctx: Arc::new(ctx),
            create,
            update,
            rotation: Arc::new(Pipeline::for_rotation()),
        }
    }

    pub(crate) fn context(&self) -> &StepContext {
        &self.ctx
    }

    /// Argon2 is CPU bound, so pipelines run off the async executor.
    async fn run(&self, pipeline: &Arc<Pipeline>, user: User) -> Result<User> {
        let pipeline = Arc::clone(pipeline);
        let ctx = Arc::clone(&self.ctx);
        tokio::task::spawn_blocking(move || pipeline.run(user, &ctx))
            .await
            .map_err(|e| UserError::Internal(anyhow::anyhow!("validation task failed: {e}")))?
    }

    /// Returns the stored user with the plaintext remember token attached.
    pub async fn create(&self, user: User) -> Result<User> {
        let user = self.run(&self.create, user).await.inspect_err(|e| {
            if let UserError::Validation(reason) = e {
                warn!(%reason, "user rejected on create");
            }
        })?;
        match self.store.by_email(&user.email).await {
            Ok(_) => return Err(UserError::EmailTaken),
            Err(UserError::NotFound) => {}
            Err(e) => return Err(e),
        }
        let remember = user.remember.clone();
        let mut stored = self.store.create(&user).await?;
        stored.remember = remember;
        Ok(stored)
    }

    pub async fn update(&self, user: User) -> Result<User> {
        if user.id <= 0 {
            return Err(UserError::InvalidId);
        }
        let user = self.run(&self.update, user).await?;
        let remember = user.remember.clone();
        let mut stored = self.store.update(&user).await?;
        stored.remember = remember;
        Ok(stored)
    }

    /// Issues a fresh remember token for an already stored user and persists
    /// its digest. Name and email are not re-validated.
    pub async fn rotate_remember(&self, mut user: User) -> Result<User> {
        if user.id <= 0 {
            return Err(UserError::InvalidId);
        }
        user.remember = token::remember_token()?;
        let user = self.rotation.run(user, &self.ctx)?;
        let remember = user.remember.clone();
        let mut stored = self.store.update(&user).await?;
        stored.remember = remember;
        debug!(user_id = stored.id, "remember token rotated");
        Ok(stored)
    }

    /// Looks a user up by the plaintext token; callers never pre-hash.
    pub async fn by_remember(&self, token: &str) -> Result<User> {
        if token.is_empty() {
            return Err(UserError::NotFound);
        }
        let digest = self.ctx.keyed.hash(token);
        let mut user = self.store.by_remember_hash(&digest).await?;
        user.remember = token.to_string();
        Ok(user)
    }

    pub async fn by_id(&self, id: i64) -> Result<User> {
        self.store.by_id(id).await
    }

    pub async fn by_email(&self, email: &str) -> Result<User> {
        self.store.by_email(&normalize_email(email)).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(id).await
    }

    pub async fn auto_migrate(&self) -> Result<()> {
        self.store.auto_migrate().await
    }

    pub async fn destructive_reset(&self) -> Result<()> {
        self.store.destructive_reset().await
    }

    pub async fn close(&self) {
        self.store.close().await
    }
}
