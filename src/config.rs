use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub drive_api_base: String,
    pub drive_access_token: Option<String>,
    pub db_connection_string: String,
    pub debounce_ms: u64,
    pub bind_addr: String,
}

const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";
const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://driveread.sqlite?mode=rwc";
const DEFAULT_DEBOUNCE_MS: u64 = 750;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const MAX_DEBOUNCE_MS: u64 = 10_000;

impl Default for Config {
    fn default() -> Self {
        Config {
            drive_api_base: DEFAULT_DRIVE_API_BASE.into(),
            drive_access_token: None,
            db_connection_string: DEFAULT_DB_CONNECTION_STRING.into(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            bind_addr: DEFAULT_BIND_ADDR.into(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let drive_api_base =
            lookup("DRIVE_API_BASE").unwrap_or(DEFAULT_DRIVE_API_BASE.into());
        let drive_access_token = lookup("DRIVE_ACCESS_TOKEN").filter(|t| !t.trim().is_empty());
        let db_connection_string =
            lookup("DB_CONNECTION_STRING").unwrap_or(DEFAULT_DB_CONNECTION_STRING.into());
        let debounce_ms = match lookup("DEBOUNCE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid DEBOUNCE_MS: {}", raw))?,
            None => DEFAULT_DEBOUNCE_MS,
        };
        let bind_addr = lookup("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into());
        Ok(Config {
            drive_api_base,
            drive_access_token,
            db_connection_string,
            debounce_ms,
            bind_addr,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.drive_api_base.trim().is_empty() {
            return Err("DRIVE_API_BASE is empty".into());
        }
        if self.bind_addr.trim().is_empty() {
            return Err("BIND_ADDR is empty".into());
        }
        if !(1..=MAX_DEBOUNCE_MS).contains(&self.debounce_ms) {
            return Err(format!(
                "DEBOUNCE_MS must be between 1 and {}",
                MAX_DEBOUNCE_MS
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
