//! Password login and cookie sessions.
//!
//! Session tokens look like `ys_<prefix>_<secret>`. Only the prefix and a
//! SHA-256 digest of the secret are stored; lookups go by prefix and the
//! digest is compared in constant time.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::users::validate_username;

const TOKEN_PREFIX: &str = "ys";
const MIN_SECRET_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionAuthError {
    #[error("invalid session token")]
    Invalid,
    #[error("expired session")]
    Expired,
    #[error("session lookup failed")]
    Unavailable,
}

/// The authenticated user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub principal: Principal,
}

#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: std::time::Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl: Duration::try_from(session_ttl).unwrap_or(Duration::weeks(2)),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn register(&self, cmd: RegisterUser) -> Result<UserRecord, AuthError> {
        let username = validate_username(&cmd.username)?;
        validate_password(&cmd.password)?;
        let password_hash = hash_password_blocking(cmd.password).await?;

        let user = self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: cmd.first_name.trim().to_string(),
                last_name: cmd.last_name.trim().to_string(),
                email: cmd.email.trim().to_string(),
                password_hash,
            })
            .await?;

        info!(
            target = "yatube::auth",
            user_id = user.id,
            username = %user.username,
            "user registered"
        );
        Ok(user)
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionIssued, AuthError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let verified = verify_password_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !verified {
            warn!(
                target = "yatube::auth",
                username = %user.username,
                "login rejected"
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(&user).await
    }

    /// Open a session for an already-verified user.
    pub async fn start_session(&self, user: &UserRecord) -> Result<SessionIssued, AuthError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(SessionIssued {
            token,
            expires_at,
            principal: Principal {
                user_id: user.id,
                username: user.username.clone(),
            },
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, SessionAuthError> {
        let parsed = parse_token(token).ok_or(SessionAuthError::Invalid)?;
        let record = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| SessionAuthError::Unavailable)?
            .ok_or(SessionAuthError::Invalid)?;

        if record.expires_at <= OffsetDateTime::now_utc() {
            return Err(SessionAuthError::Expired);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionAuthError::Invalid);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await
            .map_err(|_| SessionAuthError::Unavailable)?
            .ok_or(SessionAuthError::Invalid)?;

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    /// Revoke the session behind a token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_by_prefix(&parsed.prefix).await?;
        }
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self
            .sessions
            .purge_expired(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("password must contain at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password",
            "password cannot be entirely numeric",
        ));
    }
    Ok(())
}

/// Hash a password into a PHC string with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash(err.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| AuthError::PasswordHash(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::PasswordHash(err.to_string())),
    }
}

async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::PasswordHash(err.to_string()))?
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| AuthError::PasswordHash(err.to_string()))?
}
