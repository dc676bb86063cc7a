//! Configuration management
//!
//! Two sources feed a benchmark run:
//! - an optional TOML file with defaults, stored at ~/.config/gcs-bench/config.toml
//! - environment variables naming the bucket, object and local file
//!
//! CLI flags take precedence over both.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::job::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};
use crate::listing::{DEFAULT_MAX_RESULTS, DEFAULT_PAGE_SIZE};
use crate::plan::MIB;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "GCS_BENCH_CONFIG";

/// GCS XML API endpoint that accepts S3-style requests
pub const DEFAULT_INTEROP_ENDPOINT: &str = "https://storage.googleapis.com";

/// Region used to sign S3-style requests
pub const DEFAULT_INTEROP_REGION: &str = "europe-west4";

/// What the top level does with a failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Print a diagnostic and exit with a non-zero status
    #[default]
    Exit,
    /// Hand the original error back to the caller
    Propagate,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub interop: Interop,

    #[serde(default)]
    pub gcloud: GcloudSettings,
}

/// Default benchmark parameters
#[derive(Debug, Clone, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_results")]
    pub max_results: u64,

    #[serde(default)]
    pub on_error: FailurePolicy,
}

/// S3-compatible endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct Interop {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,
}

/// gcloud CLI settings
#[derive(Debug, Clone, Deserialize)]
pub struct GcloudSettings {
    /// Program name or path of the gcloud executable
    #[serde(default = "default_gcloud_program")]
    pub program: String,
}

fn default_chunk_size_mb() -> u64 {
    DEFAULT_CHUNK_SIZE / MIB
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_results() -> u64 {
    DEFAULT_MAX_RESULTS
}

fn default_endpoint() -> String {
    DEFAULT_INTEROP_ENDPOINT.to_string()
}

fn default_region() -> String {
    DEFAULT_INTEROP_REGION.to_string()
}

fn default_gcloud_program() -> String {
    "gcloud".to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
            workers: default_workers(),
            page_size: default_page_size(),
            max_results: default_max_results(),
            on_error: FailurePolicy::default(),
        }
    }
}

impl Default for Interop {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
        }
    }
}

impl Default for GcloudSettings {
    fn default() -> Self {
        Self {
            program: default_gcloud_program(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            interop: Interop::default(),
            gcloud: GcloudSettings::default(),
        }
    }
}

impl Config {
    /// Check values the deserializer cannot
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.interop.endpoint)?;
        if self.defaults.chunk_size_mb == 0 {
            return Err(Error::InvalidConfig(
                "defaults.chunk_size_mb must be greater than zero".into(),
            ));
        }
        if self.defaults.workers == 0 {
            return Err(Error::InvalidConfig(
                "defaults.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager handles locating and loading the config file
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for `$GCS_BENCH_CONFIG` or the default config path
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::InvalidConfig("Could not determine config directory".into())
        })?;
        Ok(Self::with_path(config_dir.join("gcs-bench").join("config.toml")))
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// A missing file yields the default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::InvalidConfig(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade gcs-bench.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.validate()?;
        Ok(config)
    }
}

/// HMAC key pair for the S3-compatible endpoint
#[derive(Clone)]
pub struct HmacCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl HmacCredentials {
    /// Keys from `ACCESS_KEY` and `SECRET_KEY`, when both are set
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Some(Self {
            access_key: get(TransferEnv::ACCESS_KEY)?,
            secret_key: get(TransferEnv::SECRET_KEY)?,
        })
    }
}

impl std::fmt::Debug for HmacCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Transfer settings supplied through the environment
#[derive(Debug, Clone)]
pub struct TransferEnv {
    pub bucket: String,
    /// Object key, without a leading `/`
    pub remote_key: String,
    pub local_path: PathBuf,
    pub credentials: Option<HmacCredentials>,
}

impl TransferEnv {
    pub const BUCKET_NAME: &'static str = "BUCKET_NAME";
    pub const REMOTE_FILENAME: &'static str = "REMOTE_FILENAME";
    pub const LOCAL_FILENAME: &'static str = "LOCAL_FILENAME";
    pub const ACCESS_KEY: &'static str = "ACCESS_KEY";
    pub const SECRET_KEY: &'static str = "SECRET_KEY";

    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as absent.
    ///
    /// Every missing required variable is named in one `MissingConfig`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = get(Self::BUCKET_NAME);
        let remote_key = get(Self::REMOTE_FILENAME);
        let local_path = get(Self::LOCAL_FILENAME);

        let missing: Vec<&str> = [
            (Self::BUCKET_NAME, bucket.is_none()),
            (Self::REMOTE_FILENAME, remote_key.is_none()),
            (Self::LOCAL_FILENAME, local_path.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(bucket), Some(remote_key), Some(local_path)) = (bucket, remote_key, local_path)
        else {
            return Err(Error::MissingConfig(format!(
                "environment variables not set: {}",
                missing.join(", ")
            )));
        };

        let credentials = HmacCredentials::from_lookup(&lookup);

        Ok(Self {
            bucket,
            remote_key: remote_key.trim_start_matches('/').to_string(),
            local_path: PathBuf::from(local_path),
            credentials,
        })
    }

    /// HMAC keys, required by the S3-compatible backend
    pub fn require_credentials(&self) -> Result<&HmacCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            Error::MissingConfig(format!(
                "environment variables not set: {}, {}",
                Self::ACCESS_KEY,
                Self::SECRET_KEY
            ))
        })
    }

    /// `gs://bucket/key` form of the remote object
    pub fn remote_url(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.remote_key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.chunk_size_mb, 25);
        assert_eq!(config.defaults.workers, 50);
        assert_eq!(config.defaults.page_size, 1000);
        assert_eq!(config.defaults.max_results, 25_000);
        assert_eq!(config.defaults.on_error, FailurePolicy::Exit);
        assert_eq!(config.interop.endpoint, DEFAULT_INTEROP_ENDPOINT);
        assert_eq!(config.gcloud.program, "gcloud");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_load_partial_file() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            r#"
            schema_version = 1

            [defaults]
            workers = 8
            on_error = "propagate"

            [interop]
            region = "us-east1"
            "#,
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.defaults.workers, 8);
        assert_eq!(config.defaults.chunk_size_mb, 25);
        assert_eq!(config.defaults.on_error, FailurePolicy::Propagate);
        assert_eq!(config.interop.region, "us-east1");
        assert_eq!(config.interop.endpoint, DEFAULT_INTEROP_ENDPOINT);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("newer than supported"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[interop]\nendpoint = \"not a url\"\n",
        )
        .unwrap();
        assert!(matches!(manager.load(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_env_all_present() {
        let env = TransferEnv::from_lookup(lookup(&[
            ("BUCKET_NAME", "bench-bucket"),
            ("REMOTE_FILENAME", "/data/large.bin"),
            ("LOCAL_FILENAME", "/mnt/ram/large.bin"),
        ]))
        .unwrap();

        assert_eq!(env.bucket, "bench-bucket");
        assert_eq!(env.remote_key, "data/large.bin");
        assert_eq!(env.local_path, PathBuf::from("/mnt/ram/large.bin"));
        assert_eq!(env.remote_url(), "gs://bench-bucket/data/large.bin");
        assert!(env.credentials.is_none());
        assert!(matches!(
            env.require_credentials(),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn test_env_reports_every_missing_variable() {
        let err = TransferEnv::from_lookup(lookup(&[("REMOTE_FILENAME", "a.bin")])).unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
        let message = err.to_string();
        assert!(message.contains("BUCKET_NAME"));
        assert!(message.contains("LOCAL_FILENAME"));
        assert!(!message.contains("REMOTE_FILENAME"));
    }

    #[test]
    fn test_env_empty_value_counts_as_missing() {
        let err = TransferEnv::from_lookup(lookup(&[
            ("BUCKET_NAME", ""),
            ("REMOTE_FILENAME", "a.bin"),
            ("LOCAL_FILENAME", "/tmp/a.bin"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("BUCKET_NAME"));
    }

    #[test]
    fn test_env_credentials() {
        let env = TransferEnv::from_lookup(lookup(&[
            ("BUCKET_NAME", "b"),
            ("REMOTE_FILENAME", "k"),
            ("LOCAL_FILENAME", "/tmp/k"),
            ("ACCESS_KEY", "GOOG1EXAMPLE"),
            ("SECRET_KEY", "secret"),
        ]))
        .unwrap();
        let creds = env.require_credentials().unwrap();
        assert_eq!(creds.access_key, "GOOG1EXAMPLE");
        assert!(!format!("{creds:?}").contains("secret\""));
    }
}
