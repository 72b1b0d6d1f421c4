//! Signup and login
//!
//! Argon2 is CPU-bound, so hashing and verification run on the blocking
//! thread pool.

use crate::error::{CatalogError, CatalogResult};
use crate::models::User;
use crate::password::{PasswordError, PasswordHasherService};
use crate::store::{Insert, UserRepository};
use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 8;

pub struct AccountService<S> {
    store: Arc<S>,
    hasher: PasswordHasherService,
}

impl<S> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), hasher: self.hasher.clone() }
    }
}

impl<S: UserRepository> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, hasher: PasswordHasherService::new() }
    }

    /// Register a regular (non-staff) account
    pub async fn signup(&self, username: &str, password: &str) -> CatalogResult<User> {
        self.register(username, password, false).await
    }

    /// Register an account; `is_staff` is only reachable from seeding
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        is_staff: bool,
    ) -> CatalogResult<User> {
        let username = username.trim();

        let mut errors = Vec::new();
        if username.is_empty() {
            errors.push("Username is required".to_string());
        } else if username.chars().any(char::is_whitespace) {
            errors.push("Username cannot contain spaces".to_string());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let hash = self.hash(password).await?;
        match self.store.register_user(username.to_string(), hash, is_staff).await? {
            Insert::Created(user) => {
                log::info!("Account {} created (id {})", user.username, user.id);
                Ok(user)
            }
            Insert::Existing(_) => {
                Err(CatalogError::validation(format!("Username {} is already taken", username)))
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> CatalogResult<User> {
        let Some(user) = self.store.user_by_username(username.trim()).await? else {
            log::info!("Login failed for unknown user {}", username.trim());
            return Err(CatalogError::InvalidCredentials);
        };

        if self.verify(password, &user.password_hash).await? {
            Ok(user)
        } else {
            log::info!("Login failed for {}: wrong password", user.username);
            Err(CatalogError::InvalidCredentials)
        }
    }

    async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
    }
}
