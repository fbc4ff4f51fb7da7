use anyhow::Result;
use chrono::{DateTime, Utc};
use furnish_types::models::{Role, UserStatus};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::models::UserRow;
use crate::{Database, OptionalExt, uuid_column};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, status, \
     is_verified, email_verified, phone_verified, last_login, created_at, updated_at";

impl Database {
    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.role.as_str(),
                    user.status.as_str(),
                    user.is_verified,
                    user.email_verified,
                    user.phone_verified,
                    user.last_login,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Overwrites every mutable column of an existing account.
    pub fn update_user(&self, user: &UserRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email = ?2, password_hash = ?3, first_name = ?4, last_name = ?5,
                     phone = ?6, role = ?7, status = ?8, is_verified = ?9, email_verified = ?10,
                     phone_verified = ?11, last_login = ?12, updated_at = ?13
                 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.role.as_str(),
                    user.status.as_str(),
                    user.is_verified,
                    user.email_verified,
                    user.phone_verified,
                    user.last_login,
                    user.updated_at,
                ],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn user_exists_by_email(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [email],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    /// Stamps `last_login` and returns the updated row, or `None` if the
    /// account vanished in the meantime.
    pub fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET last_login = ?2, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), at],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(UserRow {
        id: uuid_column(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        role: Role::parse(&role).ok_or_else(|| bad_enum(6, &role))?,
        status: UserStatus::parse(&status).ok_or_else(|| bad_enum(7, &status))?,
        is_verified: row.get(8)?,
        email_verified: row.get(9)?,
        phone_verified: row.get(10)?,
        last_login: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn bad_enum(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown value '{}'", value).into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn sample_user(email: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "$argon2id$not-a-real-hash".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role: Role::User,
            status: UserStatus::Active,
            is_verified: false,
            email_verified: false,
            phone_verified: false,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_find_by_email() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user("ada@example.com");
        db.create_user(&user).unwrap();

        let found = db.find_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::User);
        assert_eq!(found.status, UserStatus::Active);
        assert!(found.last_login.is_none());

        assert!(db.user_exists_by_email("ada@example.com").unwrap());
        assert!(!db.user_exists_by_email("grace@example.com").unwrap());
        assert!(db.find_user_by_email("grace@example.com").unwrap().is_none());
    }

    #[test]
    fn email_lookup_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&sample_user("ada@example.com")).unwrap();
        assert!(db.user_exists_by_email("ADA@Example.com").unwrap());
        assert!(db.find_user_by_email("Ada@example.COM").unwrap().is_some());
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&sample_user("ada@example.com")).unwrap();

        let err = db.create_user(&sample_user("ADA@example.com")).unwrap_err();
        assert!(is_unique_violation(&err));

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn record_login_sets_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user("ada@example.com");
        db.create_user(&user).unwrap();

        let at = Utc::now();
        let updated = db.record_login(user.id, at).unwrap().unwrap();
        assert_eq!(updated.last_login.map(|t| t.timestamp()), Some(at.timestamp()));
        assert!(db.record_login(Uuid::new_v4(), at).unwrap().is_none());
    }

    #[test]
    fn update_user_overwrites_role() {
        let db = Database::open_in_memory().unwrap();
        let mut user = sample_user("ada@example.com");
        db.create_user(&user).unwrap();

        user.role = Role::Admin;
        assert!(db.update_user(&user).unwrap());
        let stored = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
    }
}
