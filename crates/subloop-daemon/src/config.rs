//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use subloop_campaign::PlanLimits;
use subloop_tasks::CompletionPolicy;

/// Environment variable that overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "SUBLOOP_JWT_SECRET";

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "SUBLOOP_DATA_DIR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. Empty = any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Bearer token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the token issuer.
    #[serde(default)]
    pub jwt_secret: String,
    /// User ids granted the admin role at startup.
    #[serde(default)]
    pub admin_users: Vec<String>,
    /// Clock skew tolerated on `exp`.
    #[serde(default = "default_token_leeway")]
    pub token_leeway_secs: u64,
}

/// Credit economy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Credits granted when a profile is first created.
    #[serde(default = "default_signup_bonus")]
    pub signup_bonus: i64,
    #[serde(default = "default_max_target_actions")]
    pub max_target_actions: u32,
    #[serde(default = "default_max_credits_per_campaign")]
    pub max_credits_per_campaign: i64,
}

/// Task completion safeguards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    #[serde(default = "default_true")]
    pub block_on_high_risk: bool,
    #[serde(default = "default_task_rate_limit")]
    pub task_rate_limit: u32,
    #[serde(default = "default_task_rate_window")]
    pub task_rate_window_minutes: u32,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level used when `RUST_LOG` is unset: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_token_leeway() -> u64 {
    30
}

fn default_signup_bonus() -> i64 {
    100
}

fn default_max_target_actions() -> u32 {
    PlanLimits::default().max_target_actions
}

fn default_max_credits_per_campaign() -> i64 {
    PlanLimits::default().max_credits_per_campaign
}

fn default_true() -> bool {
    true
}

fn default_task_rate_limit() -> u32 {
    CompletionPolicy::default().task_rate_limit
}

fn default_task_rate_window() -> u32 {
    CompletionPolicy::default().task_rate_window_minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            admin_users: Vec::new(),
            token_leeway_secs: default_token_leeway(),
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            signup_bonus: default_signup_bonus(),
            max_target_actions: default_max_target_actions(),
            max_credits_per_campaign: default_max_credits_per_campaign(),
        }
    }
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            block_on_high_risk: true,
            task_rate_limit: default_task_rate_limit(),
            task_rate_window_minutes: default_task_rate_window(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist. The JWT secret
    /// may be supplied through the environment instead of the file.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.is_empty() {
                config.auth.jwt_secret = secret;
            }
        }
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// `bind_addr:port` for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }

    pub fn plan_limits(&self) -> PlanLimits {
        PlanLimits {
            max_target_actions: self.economy.max_target_actions,
            max_credits_per_campaign: self.economy.max_credits_per_campaign,
        }
    }

    pub fn completion_policy(&self) -> CompletionPolicy {
        CompletionPolicy {
            block_on_high_risk: self.fraud.block_on_high_risk,
            task_rate_limit: self.fraud.task_rate_limit,
            task_rate_window_minutes: self.fraud.task_rate_window_minutes,
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Subloop")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Subloop")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".subloop")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/subloop"))
}
