//! Configuration management
//!
//! Loads configuration for studytrack from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults, so a bare
//! `studytrack` binary starts with SQLite in `data/` and the IST campus
//! timezone.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Email (SMTP) configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Checkout-discipline schedule configuration
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the frontend)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/studytrack.db".to_string()
}

/// Email (SMTP) configuration
///
/// Used for checkout reminders and password-reset links. When `host` is
/// empty, sends fail with a configuration error rather than silently
/// dropping mail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host
    #[serde(default)]
    pub host: String,
    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username
    #[serde(default)]
    pub username: String,
    /// SMTP password (an app password, not a login password)
    #[serde(default)]
    pub password: String,
    /// From address
    #[serde(default)]
    pub from: String,
    /// Base URL used in password-reset links
    #[serde(default = "default_reset_base_url")]
    pub reset_base_url: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_reset_base_url() -> String {
    "http://localhost:3000".to_string()
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types for work proofs
    #[serde(default = "default_proof_types")]
    pub proof_types: Vec<String>,
    /// Allowed MIME types for profile photos
    #[serde(default = "default_photo_types")]
    pub photo_types: Vec<String>,
    /// Public URL prefix under which uploads are served
    #[serde(default = "default_public_base")]
    pub public_base: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            proof_types: default_proof_types(),
            photo_types: default_photo_types(),
            public_base: default_public_base(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_proof_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "application/pdf".to_string(),
    ]
}

fn default_photo_types() -> Vec<String> {
    vec!["image/jpeg".to_string(), "image/png".to_string()]
}

fn default_public_base() -> String {
    "/uploads".to_string()
}

/// Checkout-discipline schedule configuration
///
/// The campus runs on a single fixed offset; the default is IST (+05:30).
/// The warn cutoff must precede the lockdown cutoff, though the lockdown
/// sweep stays correct even if the jobs fire out of order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Campus UTC offset in minutes (IST = 330)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Reminder-email cutoff, local time
    #[serde(default = "default_warn_at")]
    pub warn_at: String,
    /// Force-close cutoff, local time
    #[serde(default = "default_lockdown_at")]
    pub lockdown_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            warn_at: default_warn_at(),
            lockdown_at: default_lockdown_at(),
        }
    }
}

fn default_utc_offset_minutes() -> i32 {
    330
}

fn default_warn_at() -> String {
    "21:30".to_string()
}

fn default_lockdown_at() -> String {
    "22:00".to_string()
}

impl ScheduleConfig {
    /// The campus timezone as a chrono offset.
    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    /// Parse an `HH:MM` cutoff into (hour, minute).
    pub fn parse_cutoff(value: &str) -> Result<(u32, u32), ConfigError> {
        let invalid = || ConfigError::ValidationError(format!("invalid cutoff time '{}'", value));
        let (h, m) = value.split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok((hour, minute))
    }

    pub fn warn_cutoff(&self) -> Result<(u32, u32), ConfigError> {
        Self::parse_cutoff(&self.warn_at)
    }

    pub fn lockdown_cutoff(&self) -> Result<(u32, u32), ConfigError> {
        Self::parse_cutoff(&self.lockdown_at)
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session token lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Password-reset token lifetime in minutes
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: i64,
    /// Built-in admin username
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    /// Built-in admin password (change it in deployment)
    #[serde(default = "default_admin_pass")]
    pub admin_pass: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            reset_token_minutes: default_reset_token_minutes(),
            admin_user: default_admin_user(),
            admin_pass: default_admin_pass(),
        }
    }
}

fn default_session_days() -> i64 {
    1
}

fn default_reset_token_minutes() -> i64 {
    30
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_admin_pass() -> String {
    "admin123".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Variables follow the pattern `STUDYTRACK_<SECTION>_<KEY>`, e.g.
    /// `STUDYTRACK_SERVER_PORT` or `STUDYTRACK_EMAIL_PASSWORD`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("STUDYTRACK_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("STUDYTRACK_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(origin) = std::env::var("STUDYTRACK_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Ok(url) = std::env::var("STUDYTRACK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(host) = std::env::var("STUDYTRACK_EMAIL_HOST") {
            self.email.host = host;
        }
        if let Ok(username) = std::env::var("STUDYTRACK_EMAIL_USERNAME") {
            self.email.username = username;
        }
        if let Ok(password) = std::env::var("STUDYTRACK_EMAIL_PASSWORD") {
            self.email.password = password;
        }
        if let Ok(from) = std::env::var("STUDYTRACK_EMAIL_FROM") {
            self.email.from = from;
        }
        if let Ok(offset) = std::env::var("STUDYTRACK_SCHEDULE_UTC_OFFSET_MINUTES") {
            if let Ok(offset) = offset.parse() {
                self.schedule.utc_offset_minutes = offset;
            }
        }
        if let Ok(warn_at) = std::env::var("STUDYTRACK_SCHEDULE_WARN_AT") {
            self.schedule.warn_at = warn_at;
        }
        if let Ok(lockdown_at) = std::env::var("STUDYTRACK_SCHEDULE_LOCKDOWN_AT") {
            self.schedule.lockdown_at = lockdown_at;
        }
        if let Ok(pass) = std::env::var("STUDYTRACK_AUTH_ADMIN_PASS") {
            self.auth.admin_pass = pass;
        }
    }
}

impl UploadConfig {
    /// Check whether a MIME type is an accepted work proof.
    pub fn is_proof_type(&self, mime_type: &str) -> bool {
        self.proof_types.iter().any(|t| t == mime_type)
    }

    /// Check whether a MIME type is an accepted profile photo.
    pub fn is_photo_type(&self, mime_type: &str) -> bool {
        self.photo_types.iter().any(|t| t == mime_type)
    }
}

/// File extension for a MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ist_campus() {
        let config = Config::default();
        assert_eq!(config.schedule.utc_offset_minutes, 330);
        assert_eq!(config.schedule.warn_at, "21:30");
        assert_eq!(config.schedule.lockdown_at, "22:00");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_days, 1);

        let tz = config.schedule.timezone().unwrap();
        assert_eq!(tz.local_minus_utc(), 330 * 60);
    }

    #[test]
    fn cutoffs_parse_and_reject_nonsense() {
        assert_eq!(ScheduleConfig::parse_cutoff("21:30").unwrap(), (21, 30));
        assert_eq!(ScheduleConfig::parse_cutoff("00:00").unwrap(), (0, 0));
        assert!(ScheduleConfig::parse_cutoff("24:00").is_err());
        assert!(ScheduleConfig::parse_cutoff("9pm").is_err());
        assert!(ScheduleConfig::parse_cutoff("21:61").is_err());
    }

    #[test]
    fn proof_allow_list_is_images_and_pdf() {
        let upload = UploadConfig::default();
        assert!(upload.is_proof_type("image/jpeg"));
        assert!(upload.is_proof_type("image/png"));
        assert!(upload.is_proof_type("application/pdf"));
        assert!(!upload.is_proof_type("application/x-msdownload"));
        assert!(!upload.is_photo_type("application/pdf"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(std::path::Path::new("does-not-exist.yml")).unwrap();
        assert_eq!(config.database.url, "data/studytrack.db");
    }

    #[test]
    fn env_overrides_cover_the_schedule_section() {
        std::env::set_var("STUDYTRACK_SCHEDULE_UTC_OFFSET_MINUTES", "0");
        std::env::set_var("STUDYTRACK_SCHEDULE_WARN_AT", "20:45");
        std::env::set_var("STUDYTRACK_SCHEDULE_LOCKDOWN_AT", "21:15");

        let mut config = Config::default();
        config.apply_env_overrides();

        std::env::remove_var("STUDYTRACK_SCHEDULE_UTC_OFFSET_MINUTES");
        std::env::remove_var("STUDYTRACK_SCHEDULE_WARN_AT");
        std::env::remove_var("STUDYTRACK_SCHEDULE_LOCKDOWN_AT");

        assert_eq!(config.schedule.utc_offset_minutes, 0);
        assert_eq!(config.schedule.warn_cutoff().unwrap(), (20, 45));
        assert_eq!(config.schedule.lockdown_cutoff().unwrap(), (21, 15));
        assert_eq!(config.schedule.timezone().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "server:\n  port: 9001\nschedule:\n  lockdown_at: \"23:15\"\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.schedule.lockdown_at, "23:15");
        // untouched sections keep their defaults
        assert_eq!(config.schedule.warn_at, "21:30");
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
    }
}
