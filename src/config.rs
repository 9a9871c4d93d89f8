use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use config; // Explicitly import the config crate

const DEFAULT_BAAS_URL: &str = "http://localhost:54321";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";
const DEFAULT_ALLOWED_MIME_TYPES: &str = "image/jpeg,image/png,image/webp,image/gif";

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Everything below is populated from the environment (or the .env file).
    pub baas_url: String,
    pub baas_anon_key: String,
    pub site_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub max_upload_size_mb: u64,
    pub allowed_mime_types: String,
    pub max_product_images: usize,
    pub checkout_delay_ms: u64,
}

/// Reads an optional variable, treating an empty value as unset.
fn read_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// A variable with no built-in default. Keys and secrets are never compiled in.
fn require(key: &str, value: Option<String>) -> Result<String, config::ConfigError> {
    value.ok_or_else(|| config::ConfigError::Message(format!(
        "FATAL: Environment variable '{}' is not set and has no default.", key
    )))
}

fn parse_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match read_var(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            config::ConfigError::Message(format!(
                "FATAL: '{}' must be a non-negative whole number (got '{}').",
                key, raw
            ))
        }),
        None => Ok(default),
    }
}

fn validate_base_url(key: &str, value: &str) -> Result<(), config::ConfigError> {
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => Err(config::ConfigError::Message(format!(
            "FATAL: '{}' must be an absolute http(s) URL (got '{}').",
            key, value
        ))),
    }
}

impl Config {
    /// Loads configuration. When `env_path` is given that file must exist; otherwise a
    /// `.env` in the working directory is used if present.
    pub fn from_env(env_path: Option<&Path>) -> Result<Self, config::ConfigError> {
        match env_path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| config::ConfigError::Message(format!(
                    "FATAL: Failed to load .env file from '{}'. Error: {}", path.display(), e
                )))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        let builder = config::Config::builder()
            // Web host/port come from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?;

        Self::from_builder(builder)
    }

    /// Validates the process environment on top of an already prepared builder.
    pub(crate) fn from_builder(
        builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let baas_url = read_var("BAAS_URL").unwrap_or_else(|| DEFAULT_BAAS_URL.to_string());
        validate_base_url("BAAS_URL", &baas_url)?;

        let baas_anon_key = require("BAAS_ANON_KEY", read_var("BAAS_ANON_KEY"))?;

        let site_url = read_var("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        validate_base_url("SITE_URL", &site_url)?;

        let session_secret_key = require("SESSION_SECRET_KEY", read_var("SESSION_SECRET_KEY"))?;

        // It must be 128 hex characters (64 bytes).
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
            ));
        }

        let allowed_origins = read_var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = read_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let use_secure_cookies = read_var("USE_SECURE_COOKIES")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let max_upload_size_mb = parse_number("MAX_UPLOAD_SIZE_MB", 5u64)?;
        if max_upload_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "FATAL: 'MAX_UPLOAD_SIZE_MB' must be at least 1.".to_string()
            ));
        }

        let allowed_mime_types = read_var("ALLOWED_MIME_TYPES")
            .unwrap_or_else(|| DEFAULT_ALLOWED_MIME_TYPES.to_string());
        if let Some(bad) = allowed_mime_types.split(',').map(str::trim).find(|m| !m.starts_with("image/")) {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'ALLOWED_MIME_TYPES' may only list image types (found '{}').", bad
            )));
        }

        let max_product_images = parse_number("MAX_PRODUCT_IMAGES", 6usize)?;
        let checkout_delay_ms = parse_number("CHECKOUT_DELAY_MS", 3000u64)?;

        builder
            .set_override("baas_url", baas_url.trim_end_matches('/'))?
            .set_override("baas_anon_key", baas_anon_key)?
            .set_override("site_url", site_url.trim_end_matches('/'))?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("max_upload_size_mb", max_upload_size_mb as i64)?
            .set_override("allowed_mime_types", allowed_mime_types)?
            .set_override("max_product_images", max_product_images as i64)?
            .set_override("checkout_delay_ms", checkout_delay_ms as i64)?
            .build()?
            .try_deserialize()
    }

    /// Absolute link into this site, used for e-mail redirect targets.
    pub fn redirect_url(&self, path: &str) -> String {
        format!("{}/{}", self.site_url, path.trim_start_matches('/'))
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    pub fn allowed_mime_set(&self) -> HashSet<String> {
        self.allowed_mime_types
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> Config {
        Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 8080 },
            baas_url: "http://localhost:54321".to_string(),
            baas_anon_key: "anon".to_string(),
            site_url: "http://localhost:8080".to_string(),
            allowed_origins: String::new(),
            log_level: "info".to_string(),
            session_secret_key: "ab".repeat(64),
            use_secure_cookies: false,
            max_upload_size_mb: 5,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.to_string(),
            max_product_images: 6,
            checkout_delay_ms: 0,
        }
    }

    #[test]
    fn redirect_url_joins_without_double_slash() {
        let config = sample_config();
        assert_eq!(config.redirect_url("/reset-password"), "http://localhost:8080/reset-password");
        assert_eq!(config.redirect_url("auth/confirm"), "http://localhost:8080/auth/confirm");
    }

    #[test]
    fn mime_set_trims_entries() {
        let mut config = sample_config();
        config.allowed_mime_types = " image/png , image/gif ,".to_string();
        let set = config.allowed_mime_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("image/png"));
        assert!(set.contains("image/gif"));
    }

    #[test]
    fn upload_limit_is_in_bytes() {
        assert_eq!(sample_config().max_upload_size_bytes(), 5 * 1024 * 1024);
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(validate_base_url("BAAS_URL", "https://project.example.co").is_ok());
        assert!(validate_base_url("BAAS_URL", "ftp://example.com").is_err());
        assert!(validate_base_url("BAAS_URL", "not a url").is_err());
    }

    #[test]
    fn anon_key_has_no_fallback() {
        let err = require("BAAS_ANON_KEY", None).unwrap_err();
        assert!(err.to_string().contains("'BAAS_ANON_KEY' is not set"));
        assert_eq!(require("BAAS_ANON_KEY", Some("anon".into())).unwrap(), "anon");
    }
}
