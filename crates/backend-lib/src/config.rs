// ============================
// backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Environment variable prefix; nested keys use `__` (e.g. `CONCERN_STORE__BACKEND`)
pub const ENV_PREFIX: &str = "CONCERN_";

/// Longest accepted session or token lifetime (30 days)
pub const MAX_TTL_SECS: u64 = 60 * 60 * 24 * 30;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level (also used as the default `EnvFilter` directive)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Base URL used when building links sent by email/SMS
    pub public_base_url: String,
    /// Session TTL in seconds
    pub session_ttl_secs: u64,
    /// Persistence backend
    pub store: StoreSettings,
    /// Registration policy
    pub registration: RegistrationPolicy,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    /// scrypt cost parameters for new hashes
    pub password_hashing: HashingSettings,
    /// Verification code / reset token lifetimes
    pub tokens: TokenSettings,
    /// Request and login throttling
    pub rate_limit: RateLimitSettings,
    /// Outbound email/SMS
    pub notifier: NotifierSettings,
    /// Issue categories students may choose from
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Which store adapter the process wires up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreSettings {
    /// Process-local; contents are lost on restart
    Memory,
    /// SQLite database file
    Sqlite { path: PathBuf },
    /// Firebase Realtime Database over its REST API
    Firebase {
        url: String,
        #[serde(default)]
        auth: Option<String>,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
}

fn default_http_timeout() -> u64 {
    10
}

/// Registration policy consulted by `register`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationPolicy {
    /// Required email suffix, e.g. `@ktu.edu.gh`. Empty accepts any domain.
    pub allowed_email_domain: String,
    /// Students must confirm their email before logging in
    pub require_email_verification: bool,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

/// scrypt parameters (`N = 2^log_n`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub verification_ttl_secs: u64,
    pub reset_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests allowed per client per window
    pub max_requests: u32,
    pub window_secs: u64,
    /// Failed logins before a client is locked out
    pub max_failed_logins: u32,
    pub lockout_secs: u64,
    /// Key clients by `x-real-ip`/`x-forwarded-for`; only behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

/// Outbound notification channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierSettings {
    /// Write messages to the log instead of delivering them
    Log,
    /// Brevo transactional email + SMS API
    Brevo {
        api_key: String,
        sender_email: String,
        #[serde(default)]
        sender_name: Option<String>,
        #[serde(default = "default_sms_sender")]
        sms_sender: String,
        #[serde(default = "default_brevo_base")]
        api_base: String,
    },
}

fn default_sms_sender() -> String {
    "KTUPortal".to_string()
}

fn default_brevo_base() -> String {
    "https://api.brevo.com/v3".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 7, // 7 days
            store: StoreSettings::default(),
            registration: RegistrationPolicy::default(),
            password_requirements: PasswordRequirements::default(),
            password_hashing: HashingSettings::default(),
            tokens: TokenSettings::default(),
            rate_limit: RateLimitSettings::default(),
            notifier: NotifierSettings::default(),
            categories: [
                "academic",
                "exams_grades",
                "technical",
                "administration",
                "facilities",
                "welfare",
                "other",
            ]
            .iter()
            .map(|c| (*c).to_string())
            .collect(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::Sqlite {
            path: PathBuf::from("data/portal.db"),
        }
    }
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            allowed_email_domain: "@ktu.edu.gh".to_string(),
            require_email_verification: true,
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        // scrypt:32768:8:1
        Self { log_n: 15, r: 8, p: 1 }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            verification_ttl_secs: 15 * 60,
            reset_ttl_secs: 60 * 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            max_failed_logins: 5,
            lockout_secs: 5 * 60,
            trust_proxy_headers: false,
        }
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        NotifierSettings::Log
    }
}

impl Settings {
    /// Load settings from `config.toml` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load settings from a specific TOML file, then apply environment overrides.
    /// A missing file is not an error; defaults fill every unset key.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_TTL_SECS {
            bail!("session_ttl_secs must be between 1 and {MAX_TTL_SECS}");
        }
        if self.password_requirements.min_length < 6 {
            bail!("password_requirements.min_length must be at least 6");
        }
        for (name, ttl) in [
            ("tokens.verification_ttl_secs", self.tokens.verification_ttl_secs),
            ("tokens.reset_ttl_secs", self.tokens.reset_ttl_secs),
        ] {
            if ttl == 0 || ttl > MAX_TTL_SECS {
                bail!("{name} must be between 1 and {MAX_TTL_SECS}");
            }
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }
        if self.rate_limit.max_failed_logins == 0 {
            bail!("rate_limit.max_failed_logins must be positive");
        }
        let domain = &self.registration.allowed_email_domain;
        if !domain.is_empty() && !domain.starts_with('@') {
            bail!("registration.allowed_email_domain must start with '@'");
        }
        if self.categories.is_empty() {
            bail!("at least one issue category is required");
        }
        let h = self.password_hashing;
        if scrypt::Params::new(h.log_n, h.r, h.p, scrypt::Params::RECOMMENDED_LEN).is_err() {
            bail!("invalid scrypt parameters: log_n={} r={} p={}", h.log_n, h.r, h.p);
        }
        if let StoreSettings::Firebase { url, .. } = &self.store {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                bail!("store.url must be an http(s) URL");
            }
        }
        Ok(())
    }
}
