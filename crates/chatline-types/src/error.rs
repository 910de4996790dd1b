use thiserror::Error;

/// Failures reported by the directory and conversation backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found")]
    NotFound,

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Failures reported by the identity provider. The display text is shown
/// to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("The email address is badly formatted.")]
    InvalidEmail,

    #[error("The password must be at least {min} characters long.")]
    WeakPassword { min: usize },

    #[error("The email address is already in use by another account.")]
    EmailInUse,

    #[error("The email or password is incorrect.")]
    InvalidCredentials,

    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Authentication service error: {0}")]
    Provider(String),
}
