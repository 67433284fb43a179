use super::jwt::{generate_token, validate_token, Claims};
use super::password::{hash_password, verify_password};
use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::state::Store;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Registration input after presence checks
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1 to 64 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// A freshly issued token
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
    pub claims: Claims,
}

impl LoginSession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.claims.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Register, login, authenticate and logout over the user store
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate().map_err(|e| AppError::Validation(first_message(&e)))?;

        let password_hash = hash_password(&request.password, self.config.bcrypt_cost).await?;
        let user = self
            .store
            .create_user(NewUser {
                username: request.username,
                email: request.email,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(password, &user.password_hash).await? {
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let claims = Claims::for_user(&user, self.config.token_ttl_hours);
        let token = generate_token(&self.config.secret_key, &claims)?;

        info!(user_id = user.id, "User logged in");
        Ok(LoginSession {
            token,
            user,
            claims,
        })
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, token: &str) -> Result<(User, Claims)> {
        let claims = validate_token(&self.config.secret_key, token)?;

        if self.store.is_session_revoked(&claims.jti).await? {
            return Err(AppError::Authentication(
                "Token has been revoked".to_string(),
            ));
        }

        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid token".to_string()))?;

        Ok((user, claims))
    }

    pub async fn logout(&self, claims: &Claims) -> Result<()> {
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Authentication("Invalid token".to_string()))?;

        self.store.revoke_session(&claims.jti, expires_at).await?;
        info!(user_id = claims.sub, "User logged out");
        Ok(())
    }
}

fn first_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}
