use std::env;
use std::time::Duration;

use crate::services::files::StorageSettings;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_PRESIGN_EXPIRES_SECONDS: u64 = 600;
// SigV4 presigned URLs cannot outlive one week.
const MAX_PRESIGN_EXPIRES_SECONDS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_bucket: String,
    pub s3_public_base_url: String,
    pub presign_expires_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let s3_public_base_url = require("S3_PUBLIC_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&s3_public_base_url).map_err(|e| ConfigError::Invalid {
            key: "S3_PUBLIC_BASE_URL",
            reason: e.to_string(),
        })?;

        let s3_endpoint = get("S3_ENDPOINT");
        if let Some(endpoint) = &s3_endpoint {
            url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
                key: "S3_ENDPOINT",
                reason: e.to_string(),
            })?;
        }

        let presign_expires_seconds = match get("PRESIGN_EXPIRES_SECONDS") {
            None => DEFAULT_PRESIGN_EXPIRES_SECONDS,
            Some(raw) => parse_expiry(&raw)?,
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            s3_region: get("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_endpoint,
            s3_access_key: require("S3_ACCESS_KEY")?,
            s3_secret_key: require("S3_SECRET_KEY")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_public_base_url,
            presign_expires_seconds,
        })
    }

    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            bucket: self.s3_bucket.clone(),
            public_base_url: self.s3_public_base_url.clone(),
            presign_expires: Duration::from_secs(self.presign_expires_seconds),
        }
    }
}

fn parse_expiry(raw: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "PRESIGN_EXPIRES_SECONDS",
        reason,
    };
    let secs: u64 = raw
        .parse()
        .map_err(|_| invalid(format!("'{raw}' is not a whole number of seconds")))?;
    if secs == 0 || secs > MAX_PRESIGN_EXPIRES_SECONDS {
        return Err(invalid(format!(
            "must be between 1 and {MAX_PRESIGN_EXPIRES_SECONDS}"
        )));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/files"),
            ("S3_ACCESS_KEY", "minio"),
            ("S3_SECRET_KEY", "minio-secret"),
            ("S3_BUCKET", "uploads"),
            ("S3_PUBLIC_BASE_URL", "https://cdn.example.com/uploads/"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.s3_region, "us-east-1");
        assert_eq!(config.s3_endpoint, None);
        assert_eq!(config.presign_expires_seconds, 600);
        assert_eq!(config.s3_public_base_url, "https://cdn.example.com/uploads");

        let settings = config.storage_settings();
        assert_eq!(settings.bucket, "uploads");
        assert_eq!(settings.presign_expires, Duration::from_secs(600));
    }

    #[test]
    fn reads_optional_values() {
        let mut vars = base_env();
        vars.insert("S3_REGION", "eu-central-1");
        vars.insert("S3_ENDPOINT", "http://localhost:9000");
        vars.insert("PRESIGN_EXPIRES_SECONDS", "120");

        let config = load(&vars).unwrap();
        assert_eq!(config.s3_region, "eu-central-1");
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.presign_expires_seconds, 120);
    }

    #[test]
    fn missing_required_value() {
        let mut vars = base_env();
        vars.remove("S3_BUCKET");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("S3_BUCKET"));

        let mut vars = base_env();
        vars.insert("S3_SECRET_KEY", "   ");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("S3_SECRET_KEY"));
    }

    #[test]
    fn rejects_bad_expiry() {
        for raw in ["0", "abc", "-5", "604801"] {
            let mut vars = base_env();
            vars.insert("PRESIGN_EXPIRES_SECONDS", raw);
            assert!(
                matches!(
                    load(&vars),
                    Err(ConfigError::Invalid { key: "PRESIGN_EXPIRES_SECONDS", .. })
                ),
                "expected {raw} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_bad_public_base_url() {
        let mut vars = base_env();
        vars.insert("S3_PUBLIC_BASE_URL", "not a url");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key: "S3_PUBLIC_BASE_URL", .. })
        ));
    }
}
