//! Authentication module.

use crate::db::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Provider name of email/password accounts.
pub const LOCAL_PROVIDER: &str = "local";

/// Body returned by login, signup and OAuth callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Signed-in user.
    pub user: User,
    /// Bearer token for later requests.
    pub token: String,
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Loose email check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let mut labels = domain.split('.');
    domain.contains('.') && labels.all(|label| !label.is_empty())
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    registration_enabled: bool,
    min_password_len: usize,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(
        db: Database,
        session_duration_days: u32,
        registration_enabled: bool,
        min_password_len: usize,
    ) -> Self {
        Self {
            db,
            session_duration_days,
            registration_enabled,
            min_password_len,
        }
    }

    fn check_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_len {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    /// Register a new account and sign it in.
    pub fn signup(&self, email: &str, password: &str, name: &str) -> Result<(User, String)> {
        if !self.registration_enabled {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }

        let user = self.create_user(email, password, name)?;
        let token = self.issue_session(&user)?;
        tracing::info!(user_id = %user.id, "Account created");
        Ok((user, token))
    }

    /// Create a new email/password account (also used by the admin CLI).
    pub fn create_user(&self, email: &str, password: &str, name: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput(
                "A valid email address is required".to_string(),
            ));
        }

        let name = match name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            n => n.to_string(),
        };
        if name.is_empty() || name.chars().count() > 64 {
            return Err(AppError::InvalidInput(
                "Name must be 1-64 characters".to_string(),
            ));
        }

        self.check_password(password)?;

        let password_hash = hash_password(password)?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name,
            password_hash,
            provider: LOCAL_PROVIDER.to_string(),
            created_at: Utc::now(),
            last_login: None,
        };

        self.db.create_user(&user)?;
        Ok(user)
    }

    /// Login and create a session.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let user = self
            .db
            .get_user_by_email(&email.trim().to_lowercase())?
            .ok_or_else(invalid)?;

        // OAuth accounts have no password
        if user.password_hash.is_empty() || !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let token = self.issue_session(&user)?;
        tracing::debug!(user_id = %user.id, "Login");
        Ok((user, token))
    }

    /// Sign in through an OAuth provider, creating the account on first use.
    pub fn upsert_oauth_user(
        &self,
        provider: &str,
        email: &str,
        name: &str,
    ) -> Result<(User, String)> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::Upstream(format!(
                "{} did not return a usable email address",
                provider
            )));
        }

        let user = match self.db.get_user_by_email(&email)? {
            Some(user) => user,
            None => {
                let name = match name.trim() {
                    "" => email.split('@').next().unwrap_or_default().to_string(),
                    n => n.to_string(),
                };
                let user = User {
                    id: uuid::Uuid::new_v4().to_string(),
                    email,
                    name,
                    password_hash: String::new(),
                    provider: provider.to_string(),
                    created_at: Utc::now(),
                    last_login: None,
                };
                self.db.create_user(&user)?;
                tracing::info!(user_id = %user.id, provider, "Account created via OAuth");
                user
            }
        };

        let token = self.issue_session(&user)?;
        Ok((user, token))
    }

    fn issue_session(&self, user: &User) -> Result<String> {
        // Update last login
        self.db.update_user_last_login(&user.id)?;

        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        let session = Session {
            token: token.clone(),
            user_id: user.id.clone(),
            expires_at,
        };

        self.db.create_session(&session)?;
        Ok(token)
    }

    /// Validate a session token and return the user.
    pub fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        // Check expiration
        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(&session.user_id)
    }

    /// Logout (delete session).
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Change the display name.
    pub fn update_profile(&self, user_id: &str, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 64 {
            return Err(AppError::InvalidInput(
                "Name must be 1-64 characters".to_string(),
            ));
        }

        if !self.db.update_user_name(user_id, name)? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        self.db
            .get_user_by_id(user_id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Change user password.
    pub fn change_password(&self, email: &str, new_password: &str) -> Result<bool> {
        self.check_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.db
            .update_user_password(&email.trim().to_lowercase(), &password_hash)
    }

    /// Delete a user.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        self.db.delete_user(&email.trim().to_lowercase())
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }
}
