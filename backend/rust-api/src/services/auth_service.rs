use std::sync::Arc;

use anyhow::Context;
use bcrypt::{hash, verify};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::store::Store;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, TokenResponse, UpdateProfileRequest,
    User, UserProfile,
};

const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            jwt_service: JwtService::new(&config.jwt_secret),
            access_token_ttl_seconds: config.access_token_ttl_seconds,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// bcrypt is CPU bound, keep it off the async workers
    async fn hash_password(&self, password: &str) -> AppResult<String> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;
        Ok(hashed)
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        let matches = tokio::task::spawn_blocking(move || verify(password, &password_hash))
            .await
            .context("Password verification task failed")?
            .unwrap_or(false);
        Ok(matches)
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<UserProfile> {
        req.validate()?;

        if self.store.find_user_by_username(&req.username).await?.is_some()
            || self.store.find_user_by_email(&req.email).await?.is_some()
        {
            return Err(AppError::conflict("Username or email already registered"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: req.username,
            email: req.email,
            password_hash: self.hash_password(&req.password).await?,
            full_name: req.full_name,
            role: req.role,
            language: req.language,
            class_id: None,
            created_at: Utc::now(),
        };

        self.store.insert_user(&user).await?;
        tracing::info!("User registered: {} ({})", user.id, user.role.as_str());

        Ok(user.into())
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<TokenResponse> {
        req.validate()?;

        let invalid = || AppError::unauthorized("Incorrect username or password");

        let user = self
            .store
            .find_user_by_username(&req.username)
            .await?
            .ok_or_else(invalid)?;

        if !self.verify_password(&req.password, &user.password_hash).await? {
            tracing::warn!("Failed login for user: {}", req.username);
            return Err(invalid());
        }

        let claims = JwtClaims::new(&user.id, user.role, self.access_token_ttl_seconds);
        let access_token = self
            .jwt_service
            .generate_token(&claims)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to issue token: {}", e)))?;

        tracing::info!("User logged in: {}", user.id);

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: user.into(),
        })
    }

    async fn load_user(&self, user_id: &str) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn current_user(&self, user_id: &str) -> AppResult<UserProfile> {
        Ok(self.load_user(user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> AppResult<UserProfile> {
        req.validate()?;
        let mut user = self.load_user(user_id).await?;

        if req.username != user.username {
            if let Some(other) = self.store.find_user_by_username(&req.username).await? {
                if other.id != user.id {
                    return Err(AppError::conflict("Username already taken"));
                }
            }
        }
        if req.email != user.email {
            if let Some(other) = self.store.find_user_by_email(&req.email).await? {
                if other.id != user.id {
                    return Err(AppError::conflict("Email already registered"));
                }
            }
        }

        user.username = req.username;
        user.email = req.email;
        user.full_name = req.full_name;
        if let Some(language) = req.language {
            user.language = language;
        }

        self.store.update_user(&user).await?;
        tracing::info!("Profile updated: {}", user.id);

        Ok(user.into())
    }

    pub async fn change_password(&self, user_id: &str, req: ChangePasswordRequest) -> AppResult<()> {
        let (current, new) = match (req.current_password, req.new_password) {
            (Some(current), Some(new)) if !current.is_empty() && !new.is_empty() => (current, new),
            _ => {
                return Err(AppError::invalid_input(
                    "Both old and new passwords required",
                ))
            }
        };
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::invalid_input(
                "Password must be at least 8 characters",
            ));
        }

        let mut user = self.load_user(user_id).await?;
        if !self.verify_password(&current, &user.password_hash).await? {
            return Err(AppError::invalid_input("Incorrect old password"));
        }

        user.password_hash = self.hash_password(&new).await?;
        self.store.update_user(&user).await?;
        tracing::info!("Password changed: {}", user.id);

        Ok(())
    }
}
