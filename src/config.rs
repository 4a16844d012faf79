/*
 * Responsibility
 * - 環境変数 (.env 含む) からの設定読み込み
 * - 設定値のバリデーション (不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // None disables JWT decoding entirely
    pub jwt_header: Option<HeaderName>,
    pub log_jwt: bool,

    pub body_limit_bytes: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (process env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("HTTP_PORT").filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?,
            None => 8080,
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let jwt_header = match lookup("JWT_HEADER").map(|s| s.trim().to_string()) {
            Some(name) if !name.is_empty() => Some(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ConfigError::Invalid("JWT_HEADER"))?,
            ),
            _ => None,
        };

        let log_jwt = lookup("LOG_JWT")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let body_limit_bytes = match lookup("BODY_LIMIT_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid("BODY_LIMIT_BYTES"))?,
            None => 10 * 1024 * 1024,
        };

        let request_timeout_seconds = match lookup("REQUEST_TIMEOUT_SECONDS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
            None => 30,
        };

        Ok(Self {
            addr,
            app_env,
            jwt_header,
            log_jwt,
            body_limit_bytes,
            request_timeout: Duration::from_secs(request_timeout_seconds),
        })
    }
}
