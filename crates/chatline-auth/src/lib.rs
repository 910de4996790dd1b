//! Local identity provider: Argon2id credentials stored next to the
//! directory, JWT session tokens.

pub mod provider;
pub mod token;
pub mod validation;

pub use provider::LocalIdentityProvider;
