use std::sync::Arc;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use chatline_db::Database;
use chatline_types::backend::IdentityProvider;
use chatline_types::{AuthError, Session};

use crate::token::{create_token, decode_token};
use crate::validation::{normalize_email, validate_password};

pub struct LocalIdentityProvider {
    db: Arc<Database>,
    jwt_secret: String,
    session_ttl: Duration,
}

impl LocalIdentityProvider {
    pub fn new(db: Arc<Database>, jwt_secret: impl Into<String>, session_ttl: Duration) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            session_ttl,
        }
    }

    fn issue(&self, user_id: String, email: String) -> Result<Session, AuthError> {
        let (token, expires_at) = create_token(&self.jwt_secret, &user_id, &email, self.session_ttl)
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(Session {
            user_id,
            email,
            token,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        let password = password.to_string();
        let db = self.db.clone();
        let lookup = email.clone();

        // Argon2 verification is CPU-bound; keep it off the async threads
        let user_id = tokio::task::spawn_blocking(move || -> Result<String, AuthError> {
            let credential = db
                .get_credential_by_email(&lookup)
                .map_err(provider_error)?
                .ok_or(AuthError::InvalidCredentials)?;

            let parsed_hash = PasswordHash::new(&credential.password)
                .map_err(|e| AuthError::Provider(e.to_string()))?;

            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| AuthError::InvalidCredentials)?;

            Ok(credential.id)
        })
        .await
        .map_err(join_error)??;

        info!(user_id = %user_id, "Signed in");
        self.issue(user_id, email)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password = password.to_string();
        let db = self.db.clone();
        let record = email.clone();

        let user_id = tokio::task::spawn_blocking(move || -> Result<String, AuthError> {
            if db
                .get_credential_by_email(&record)
                .map_err(provider_error)?
                .is_some()
            {
                return Err(AuthError::EmailInUse);
            }

            // Hash password with Argon2id
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| AuthError::Provider(e.to_string()))?
                .to_string();

            // A concurrent sign-up may have taken the email since the check
            let user_id = Uuid::new_v4().to_string();
            if !db
                .create_credential(&user_id, &record, &password_hash)
                .map_err(provider_error)?
            {
                return Err(AuthError::EmailInUse);
            }

            Ok(user_id)
        })
        .await
        .map_err(join_error)??;

        info!(user_id = %user_id, "Account created");
        self.issue(user_id, email)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        match decode_token(&self.jwt_secret, &session.token) {
            Ok(claims) if claims.sub != session.user_id => {
                warn!(user_id = %session.user_id, "Sign-out token belongs to another user");
                return Err(AuthError::InvalidCredentials);
            }
            // Expired sessions sign out cleanly
            Ok(_) | Err(AuthError::SessionExpired) => {}
            Err(e) => return Err(e),
        }

        info!(user_id = %session.user_id, "Signed out");
        Ok(())
    }

    async fn restore(&self, token: &str) -> Result<Session, AuthError> {
        let claims = decode_token(&self.jwt_secret, token)?;

        let db = self.db.clone();
        let user_id = claims.sub.clone();
        let exists = tokio::task::spawn_blocking(move || db.get_credential_by_id(&user_id))
            .await
            .map_err(join_error)?
            .map_err(provider_error)?
            .is_some();

        if !exists {
            warn!(user_id = %claims.sub, "Session refers to a deleted account");
            return Err(AuthError::SessionExpired);
        }

        Ok(Session {
            expires_at: claims.expires_at(),
            user_id: claims.sub,
            email: claims.email,
            token: token.to_string(),
        })
    }
}

fn provider_error(e: anyhow::Error) -> AuthError {
    AuthError::Provider(e.to_string())
}

fn join_error(e: tokio::task::JoinError) -> AuthError {
    error!("spawn_blocking join error: {}", e);
    AuthError::Provider(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalIdentityProvider {
        let db = Arc::new(Database::open_in_memory().unwrap());
        LocalIdentityProvider::new(db, "test-secret", Duration::hours(1))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let provider = provider();
        let created = provider.sign_up("Bob@Example.com", "hunter22").await.unwrap();
        assert_eq!(created.email, "bob@example.com");

        let session = provider.sign_in("bob@example.com", "hunter22").await.unwrap();
        assert_eq!(session.user_id, created.user_id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let provider = provider();
        provider.sign_up("bob@example.com", "hunter22").await.unwrap();

        assert_eq!(
            provider.sign_in("bob@example.com", "wrong-pass").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            provider.sign_in("eve@example.com", "hunter22").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn duplicate_and_invalid_sign_ups_fail() {
        let provider = provider();
        provider.sign_up("bob@example.com", "hunter22").await.unwrap();

        assert_eq!(
            provider.sign_up("BOB@example.com", "another1").await.unwrap_err(),
            AuthError::EmailInUse
        );
        assert_eq!(
            provider.sign_up("bob", "hunter22").await.unwrap_err(),
            AuthError::InvalidEmail
        );
        assert_eq!(
            provider.sign_up("amy@example.com", "123").await.unwrap_err(),
            AuthError::WeakPassword { min: 6 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_sign_ups_for_one_email_yield_one_account() {
        let provider = provider();
        let (first, second) = tokio::join!(
            provider.sign_up("bob@example.com", "hunter22"),
            provider.sign_up("bob@example.com", "another1"),
        );

        let mut outcomes = [first, second];
        outcomes.sort_by_key(|r| r.is_err());
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].clone().unwrap_err(), AuthError::EmailInUse);
    }

    #[tokio::test]
    async fn restore_round_trips_and_rejects_garbage() {
        let provider = provider();
        let session = provider.sign_up("bob@example.com", "hunter22").await.unwrap();

        let restored = provider.restore(&session.token).await.unwrap();
        assert_eq!(restored, session);

        assert_eq!(
            provider.restore("not-a-token").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn sign_out_checks_token_owner() {
        let provider = provider();
        let session = provider.sign_up("bob@example.com", "hunter22").await.unwrap();
        assert!(provider.sign_out(&session).await.is_ok());

        let forged = Session {
            user_id: "someone-else".into(),
            ..session
        };
        assert_eq!(
            provider.sign_out(&forged).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
}
