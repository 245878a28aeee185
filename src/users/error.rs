use thiserror::Error;

/// Errors surfaced by the user service and everything below it.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("ID provided was invalid")]
    InvalidId,

    #[error("incorrect password provided")]
    InvalidPassword,

    #[error("{0}")]
    Validation(String),

    #[error("email address is already taken")]
    EmailTaken,

    #[error("storage: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl UserError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Errors the end user can act on, as opposed to infrastructure failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::InvalidId
                | Self::InvalidPassword
                | Self::Validation(_)
                | Self::EmailTaken
        )
    }
}

pub type Result<T, E = UserError> = std::result::Result<T, E>;
