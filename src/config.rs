use anyhow::Context;
use std::{collections::HashSet, env};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Lowercased emails allowed to request super mode.
    pub admin_emails: HashSet<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8081);
        let admin_emails = parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default());
        Ok(Self {
            database_url,
            port,
            admin_emails,
        })
    }
}

pub fn parse_admin_emails(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
