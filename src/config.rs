//! Application configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_GENERATION_LATENCY_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub http_addr: SocketAddr,
    pub database_max_connections: u32,
    pub shutdown_grace: Duration,
    pub generation_timeout: Duration,
    pub generation_latency: Duration,
    pub seed_catalog: bool,
    /// Derive the init-data key from the bot token instead of the fixed key
    pub auth_bind_bot_token: bool,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: String::new(),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            generation_latency: Duration::from_millis(DEFAULT_GENERATION_LATENCY_MS),
            seed_catalog: true,
            auth_bind_bot_token: false,
            log_format: LogFormat::Plain,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bot_token = lookup("BOT_TOKEN")
            .or_else(|| lookup("TELEGRAM_BOT_TOKEN"))
            .filter(|v| !v.trim().is_empty())
            .context("BOT_TOKEN must be set")?;

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set")?;

        let http_addr = lookup("HTTP_ADDR")
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("HTTP_ADDR must be a socket address like 0.0.0.0:5000")?;

        let database_max_connections = parse_or(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            defaults.database_max_connections,
        )?;
        let shutdown_grace = Duration::from_secs(parse_or(
            &lookup,
            "SHUTDOWN_GRACE_SECS",
            DEFAULT_SHUTDOWN_GRACE_SECS,
        )?);
        let generation_timeout = Duration::from_secs(parse_or(
            &lookup,
            "GENERATION_TIMEOUT_SECS",
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?);
        let generation_latency = Duration::from_millis(parse_or(
            &lookup,
            "GENERATION_LATENCY_MS",
            DEFAULT_GENERATION_LATENCY_MS,
        )?);

        let seed_catalog = parse_bool_or(&lookup, "SEED_CATALOG", defaults.seed_catalog)?;
        let auth_bind_bot_token =
            parse_bool_or(&lookup, "AUTH_BIND_BOT_TOKEN", defaults.auth_bind_bot_token)?;

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Plain,
        };

        Ok(Self {
            bot_token,
            database_url,
            http_addr,
            database_max_connections,
            shutdown_grace,
            generation_timeout,
            generation_latency,
            seed_catalog,
            auth_bind_bot_token,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid boolean for {key}: {v}"),
        },
    }
}
