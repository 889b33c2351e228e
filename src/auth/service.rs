use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::claims::TokenKind;
use crate::auth::dto::LoginIdentifier;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::store::{StoreError, User, UserStore};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum accepted username length.
pub const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    Unauthenticated,
    #[error("not authorized to access this profile")]
    Forbidden,
    #[error("user not found")]
    NotFound,
    #[error("storage unavailable")]
    Storage(#[source] StoreError),
    #[error("internal error")]
    Internal,
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => ServiceError::UsernameTaken,
            StoreError::DuplicateEmail => ServiceError::EmailTaken,
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Unavailable(_) => ServiceError::Storage(err),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        error!(error = %err, "password hashing failure");
        ServiceError::Internal
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login and profile business rules, independent of the
/// transport. All state lives in the store; the service is cheap to
/// clone and safe to share across requests.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    jwt: JwtKeys,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, jwt: JwtKeys) -> Self {
        Self { store, jwt }
    }

    pub fn jwt(&self) -> &JwtKeys {
        &self.jwt
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        if username.is_empty() {
            return Err(ServiceError::InvalidInput {
                field: "username",
                reason: "must not be empty",
            });
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(ServiceError::InvalidInput {
                field: "username",
                reason: "must be at most 50 characters",
            });
        }
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(ServiceError::InvalidInput {
                field: "email",
                reason: "invalid format",
            });
        }
        if password.len() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(ServiceError::InvalidInput {
                field: "password",
                reason: "must be at least 6 characters",
            });
        }

        if self.store.find_by_username(username).await?.is_some() {
            warn!(username = %username, "username already taken");
            return Err(ServiceError::UsernameTaken);
        }
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(ServiceError::EmailTaken);
        }

        let hash = hash_password(password)?;

        // The store's unique constraints still win a check-then-insert
        // race; its Duplicate* errors map to the same outcomes as the
        // pre-checks above.
        let user = self.store.create(username, &email, &hash).await?;
        Ok(user)
    }

    pub async fn login(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let user = match identifier {
            LoginIdentifier::Username(username) => {
                self.store.find_by_username(username).await?
            }
            LoginIdentifier::Email(email) => {
                self.store.find_by_email(&email.trim().to_lowercase()).await?
            }
        };

        // Unknown user and wrong password collapse into one outcome so
        // callers cannot probe which identifiers exist.
        let mut user = match user {
            Some(user) => user,
            None => {
                warn!("login for unknown identifier");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let ok = match verify_password(password, &user.password_hash) {
            Ok(ok) => ok,
            Err(e) => {
                // A stored hash that fails to parse is a server fault,
                // not a credential failure.
                error!(error = %e, user_id = %user.id, "stored password hash rejected");
                return Err(ServiceError::Internal);
            }
        };
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ServiceError::InvalidCredentials);
        }

        let now = OffsetDateTime::now_utc();
        match self.store.update_last_login(user.id, now).await {
            Ok(()) => user.last_login = Some(now),
            Err(e) => {
                // Best effort: a failed timestamp update must not fail
                // the login.
                warn!(error = %e, user_id = %user.id, "failed to update last_login");
            }
        }

        let access_token = self.jwt.sign_access(user.id).map_err(|e| {
            error!(error = %e, "jwt sign access failed");
            ServiceError::Internal
        })?;
        let refresh_token = self.jwt.sign_refresh(user.id).map_err(|e| {
            error!(error = %e, "jwt sign refresh failed");
            ServiceError::Internal
        })?;

        Ok(LoginOutcome {
            user,
            access_token,
            refresh_token,
        })
    }

    pub async fn profile(
        &self,
        user_id: Uuid,
        bearer: Option<&str>,
    ) -> Result<User, ServiceError> {
        let token = bearer.ok_or(ServiceError::Unauthenticated)?;
        let claims = self.jwt.verify(token).map_err(|e| {
            warn!(error = %e, "profile token rejected");
            ServiceError::Unauthenticated
        })?;
        if claims.kind != TokenKind::Access {
            warn!(user_id = %claims.sub, "profile presented a non-access token");
            return Err(ServiceError::Unauthenticated);
        }
        if claims.sub != user_id {
            warn!(subject = %claims.sub, requested = %user_id, "cross-user profile read denied");
            return Err(ServiceError::Forbidden);
        }
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        Ok(user)
    }
}
