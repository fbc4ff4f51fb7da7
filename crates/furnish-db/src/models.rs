/// Database row types that never cross the API boundary as-is.
use chrono::{DateTime, Utc};
use furnish_types::models::{Role, User, UserStatus};
use uuid::Uuid;

/// A `users` row, including the password hash. Convert with [`UserRow::to_user`]
/// before handing an account to anything that serializes it.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub is_verified: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            role: self.role,
            status: self.status,
            is_verified: self.is_verified,
            email_verified: self.email_verified,
            phone_verified: self.phone_verified,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
