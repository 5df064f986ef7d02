//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Passwords may sit in the TOML, in a `password_file`, or in a
//! `LEMMY_PASSWORD_<ACCOUNT>` env var, which wins over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use community_sync::Exclusions;
use lemmy_client::{ExecutorConfig, SessionOptions};
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Name of the account acting as the default sync source
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// Request pacing and timeouts shared by every account
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_page_attempts")]
    pub max_page_attempts: u32,
}

/// One account section
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    /// Bare host or URL of the instance
    pub site: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    /// Prompt for a TOTP code at login
    #[serde(default)]
    pub totp: bool,
    /// Comma-separated community names never to subscribe to
    #[serde(default)]
    pub exclude: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit_ms(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            max_page_attempts: default_max_page_attempts(),
        }
    }
}

fn default_main() -> String {
    "main".into()
}

fn default_rate_limit_ms() -> u64 {
    lemmy_client::DEFAULT_RATE_LIMIT.as_millis() as u64
}

fn default_connect_timeout() -> u64 {
    lemmy_client::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_timeout() -> u64 {
    lemmy_client::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_max_page_attempts() -> u32 {
    lemmy_client::DEFAULT_MAX_PAGE_ATTEMPTS
}

/// Env var holding the password override for `account`.
pub fn password_env_var(account: &str) -> String {
    let suffix: String = account
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("LEMMY_PASSWORD_{suffix}")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order per account:
    /// 1. `LEMMY_PASSWORD_<ACCOUNT>` env var
    /// 2. `password` in the account section
    /// 3. `password_file` path from the account section
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.accounts.is_empty() {
            return Err(common::Error::Config("no accounts configured".into()));
        }

        if !config.accounts.contains_key(&config.main) {
            return Err(common::Error::Config(format!(
                "main account \"{}\" is not defined in [accounts]",
                config.main
            )));
        }

        if config.client.connect_timeout_secs == 0 {
            return Err(common::Error::Config(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if config.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.client.max_page_attempts == 0 {
            return Err(common::Error::Config(
                "max_page_attempts must be greater than 0".into(),
            ));
        }

        for (name, account) in config.accounts.iter_mut() {
            account.resolve_password(name)?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or LEMMY_MIGRATE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("LEMMY_MIGRATE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("lemmy_migrate.toml")
    }

    pub fn main_account(&self) -> Option<&AccountConfig> {
        self.accounts.get(&self.main)
    }

    /// Every account except main, in name order.
    pub fn satellites(&self) -> impl Iterator<Item = (&str, &AccountConfig)> {
        self.accounts
            .iter()
            .filter(|(name, _)| **name != self.main)
            .map(|(name, account)| (name.as_str(), account))
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            rate_limit: Duration::from_millis(self.client.rate_limit_ms),
            connect_timeout: Duration::from_secs(self.client.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.client.timeout_secs),
        }
    }

    pub fn session_options(&self, dry_run: bool) -> SessionOptions {
        SessionOptions {
            dry_run,
            max_page_attempts: self.client.max_page_attempts,
            ..SessionOptions::default()
        }
    }
}

impl AccountConfig {
    pub fn exclusions(&self) -> Exclusions {
        self.exclude
            .as_deref()
            .map(Exclusions::parse)
            .unwrap_or_default()
    }

    fn resolve_password(&mut self, name: &str) -> common::Result<()> {
        if let Ok(password) = std::env::var(password_env_var(name)) {
            self.password = Some(Secret::new(password));
        } else if self.password.is_none() {
            if let Some(ref file) = self.password_file {
                let password = std::fs::read_to_string(file).map_err(|e| {
                    common::Error::Config(format!(
                        "account \"{name}\": failed to read password_file {}: {e}",
                        file.display()
                    ))
                })?;
                self.password = Some(Secret::new(password.trim().to_owned()));
            }
        }

        match &self.password {
            Some(password) if !password.is_blank() => Ok(()),
            _ => Err(common::Error::Config(format!(
                "account \"{name}\" has no password (set password, password_file or {})",
                password_env_var(name)
            ))),
        }
    }
}

/// Serializes tests that read or mutate environment variables. Every test
/// that calls `Config::load` must hold it, since loading reads
/// `LEMMY_PASSWORD_*`.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
