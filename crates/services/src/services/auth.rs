use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::Duration;
use db::{
    ConnectionTrait, DbErr,
    models::user::{CreateUser, User},
    types::UserRole,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils_jwt::{Claims, JwtError, TokenIssuer};

use crate::services::config::AuthConfig;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Deserialize, TS)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthSession {
    pub token: String,
    pub expires_in_secs: i64,
    pub user: User,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| AuthError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!("Stored password hash is unreadable: {err}");
            false
        }
    }
}

fn validate_registration(data: &RegisterRequest) -> Result<(), AuthError> {
    let email = data.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(AuthError::Validation("A valid email is required".to_string())),
    }
    if data.full_name.trim().is_empty() {
        return Err(AuthError::Validation("Full name is required".to_string()));
    }
    if data.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Issues and checks credentials for the HTTP layer.
#[derive(Clone)]
pub struct AuthService {
    issuer: TokenIssuer,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.jwt_secret.as_deref().unwrap_or_default();
        let issuer = TokenIssuer::new(secret, Duration::hours(config.token_ttl_hours))?;
        Ok(Self { issuer })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.issuer.verify(token)
    }

    fn session_for(&self, user: User) -> Result<AuthSession, AuthError> {
        let token = self.issuer.issue(user.id, &user.role.to_string())?;
        Ok(AuthSession {
            token,
            expires_in_secs: self.issuer.ttl().num_seconds(),
            user,
        })
    }

    /// Self-registration always creates a customer account.
    pub async fn register<C: ConnectionTrait>(
        &self,
        db: &C,
        data: &RegisterRequest,
    ) -> Result<AuthSession, AuthError> {
        validate_registration(data)?;
        if User::find_by_email(db, &data.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user = User::create(
            db,
            &CreateUser {
                email: data.email.clone(),
                password_hash: hash_password(&data.password)?,
                full_name: data.full_name.clone(),
                phone: data.phone.clone(),
                role: UserRole::Customer,
            },
        )
        .await?;
        tracing::info!(user_id = %user.id, "Registered new customer account");
        self.session_for(user)
    }

    pub async fn login<C: ConnectionTrait>(
        &self,
        db: &C,
        data: &LoginRequest,
    ) -> Result<AuthSession, AuthError> {
        let Some((user, hash)) = User::find_credentials_by_email(db, &data.email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&data.password, &hash) {
            return Err(AuthError::InvalidCredentials);
        }
        self.session_for(user)
    }

    /// Creates an account with an explicit role, used by admins and bootstrap.
    pub async fn create_account<C: ConnectionTrait>(
        &self,
        db: &C,
        data: &RegisterRequest,
        role: UserRole,
    ) -> Result<User, AuthError> {
        validate_registration(data)?;
        if User::find_by_email(db, &data.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        Ok(User::create(
            db,
            &CreateUser {
                email: data.email.clone(),
                password_hash: hash_password(&data.password)?,
                full_name: data.full_name.clone(),
                phone: data.phone.clone(),
                role,
            },
        )
        .await?)
    }
}
