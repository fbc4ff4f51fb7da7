use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use furnish_db::models::UserRow;
use furnish_db::{Database, is_unique_violation};
use furnish_types::api::{AuthResponse, TokenKind};
use furnish_types::models::{Role, User, UserStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::tokens::TokenIssuer;

/// Hash verified against when the email is unknown, so a miss costs the same
/// as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("furnish-dummy-password").ok());

pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Registration, login and token refresh over the credential store.
pub struct AccountService {
    db: Arc<Database>,
    tokens: Arc<TokenIssuer>,
}

impl AccountService {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenIssuer>) -> Self {
        Self { db, tokens }
    }

    pub fn register(&self, registration: Registration) -> ApiResult<AuthResponse> {
        let email = normalize_email(&registration.email);

        if self.db.user_exists_by_email(&email)? {
            return Err(ApiError::DuplicateEmail);
        }

        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&registration.password)?,
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            phone: registration.phone.filter(|p| !p.trim().is_empty()),
            role: Role::User,
            status: UserStatus::Active,
            is_verified: false,
            email_verified: false,
            phone_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        // The unique index catches a concurrent registration that slipped past
        // the existence check.
        self.db.create_user(&row).map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::DuplicateEmail
            } else {
                ApiError::Internal(e)
            }
        })?;

        info!("Registered user {} ({})", row.id, row.email);
        self.issue_pair(&row.to_user())
    }

    pub fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        let email = normalize_email(email);

        let Some(row) = self.db.find_user_by_email(&email)? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(password, dummy);
            }
            warn!("Login failed: unknown email");
            return Err(ApiError::InvalidCredentials);
        };

        if !verify_password(password, &row.password_hash) {
            warn!("Login failed: bad password for user {}", row.id);
            return Err(ApiError::InvalidCredentials);
        }

        if row.status != UserStatus::Active {
            warn!("Login failed: user {} is {}", row.id, row.status.as_str());
            return Err(ApiError::InvalidCredentials);
        }

        let row = self
            .db
            .record_login(row.id, Utc::now())?
            .ok_or(ApiError::InvalidCredentials)?;

        info!("User {} logged in", row.id);
        self.issue_pair(&row.to_user())
    }

    /// Exchanges a valid refresh token for a new token pair.
    pub fn refresh(&self, refresh_token: &str) -> ApiResult<AuthResponse> {
        let claims = self
            .tokens
            .validate(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                warn!("Refresh rejected: {}", e);
                ApiError::InvalidCredentials
            })?;

        let row = self
            .db
            .get_user_by_id(claims.sub)?
            .filter(|row| row.status == UserStatus::Active)
            .ok_or(ApiError::InvalidCredentials)?;

        self.issue_pair(&row.to_user())
    }

    pub fn profile(&self, user_id: Uuid) -> ApiResult<User> {
        self.db
            .get_user_by_id(user_id)?
            .map(|row| row.to_user())
            .ok_or(ApiError::NotFound("User"))
    }

    /// Creates the account as ADMIN, or promotes it if the email is taken.
    /// The password of an existing account is left alone.
    pub fn ensure_admin(&self, registration: Registration) -> ApiResult<User> {
        let email = normalize_email(&registration.email);

        if let Some(mut row) = self.db.find_user_by_email(&email)? {
            if row.role != Role::Admin {
                row.role = Role::Admin;
                row.updated_at = Utc::now();
                self.db.update_user(&row)?;
                info!("Promoted {} to ADMIN", row.email);
            }
            return Ok(row.to_user());
        }

        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&registration.password)?,
            first_name: registration.first_name,
            last_name: registration.last_name,
            phone: registration.phone,
            role: Role::Admin,
            status: UserStatus::Active,
            is_verified: true,
            email_verified: true,
            phone_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        self.db.create_user(&row)?;
        info!("Created admin account {}", row.email);
        Ok(row.to_user())
    }

    fn issue_pair(&self, user: &User) -> ApiResult<AuthResponse> {
        Ok(AuthResponse {
            token: self.tokens.issue_access_token(user)?,
            refresh_token: self.tokens.issue_refresh_token(user)?,
            email: user.email.clone(),
            role: user.role,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
