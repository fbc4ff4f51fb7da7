use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub page_cache_capacity: u64,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("FURNISH_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FURNISH_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let admin = match (lookup("FURNISH_ADMIN_EMAIL"), lookup("FURNISH_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap { email, password })
            }
            (Some(_), _) | (_, Some(_)) => {
                bail!("FURNISH_ADMIN_EMAIL and FURNISH_ADMIN_PASSWORD must be set together")
            }
            _ => None,
        };

        Ok(Self {
            host: lookup("FURNISH_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "FURNISH_PORT", 8080)?,
            db_path: lookup("FURNISH_DB_PATH").unwrap_or_else(|| "furnish.db".into()).into(),
            jwt_secret,
            access_ttl_minutes: parse_or(&lookup, "FURNISH_ACCESS_TTL_MINUTES", 24 * 60)?,
            refresh_ttl_days: parse_or(&lookup, "FURNISH_REFRESH_TTL_DAYS", 7)?,
            page_cache_capacity: parse_or(&lookup, "FURNISH_PAGE_CACHE_CAPACITY", 256)?,
            admin,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("FURNISH_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("furnish.db"));
        assert_eq!(config.access_ttl_minutes, 1440);
        assert_eq!(config.refresh_ttl_days, 7);
        assert_eq!(config.page_cache_capacity, 256);
        assert!(config.admin.is_none());
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("FURNISH_JWT_SECRET", "change-me")]).is_err());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("FURNISH_JWT_SECRET", "a-real-secret"), ("FURNISH_PORT", "http")]).is_err());
    }

    #[test]
    fn admin_needs_both_halves() {
        let with_admin = config(&[
            ("FURNISH_JWT_SECRET", "a-real-secret"),
            ("FURNISH_ADMIN_EMAIL", "admin@example.com"),
            ("FURNISH_ADMIN_PASSWORD", "hunter2hunter2"),
        ])
        .unwrap();
        assert_eq!(with_admin.admin.unwrap().email, "admin@example.com");

        assert!(config(&[
            ("FURNISH_JWT_SECRET", "a-real-secret"),
            ("FURNISH_ADMIN_EMAIL", "admin@example.com"),
        ])
        .is_err());
    }
}
