//! Application configuration for Underwrite.
//!
//! User config lives at `~/.underwrite/underwrite.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file; it only names the env vars holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalogue::DEFAULT_DATASET;
use crate::error::{Result, UnderwriteError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "underwrite.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".underwrite";

// ---------------------------------------------------------------------------
// Config structs (matching underwrite.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// BigQuery data source settings.
    #[serde(default)]
    pub bigquery: BigQueryConfig,

    /// Gemini generator settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// `[aggregation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Query all sources concurrently instead of one after another.
    #[serde(default = "default_true")]
    pub fan_out: bool,

    /// Overall deadline for source lookups, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            fan_out: true,
            deadline_ms: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[bigquery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Name of the env var holding the GCP project id.
    #[serde(default = "default_project_id_env")]
    pub project_id_env: String,

    /// Name of the env var holding an OAuth2 access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// REST endpoint root.
    #[serde(default = "default_bigquery_endpoint")]
    pub endpoint: String,

    /// Dataset the catalogue tables live in (`project.dataset`).
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_bigquery_timeout")]
    pub timeout_secs: u64,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            project_id_env: default_project_id_env(),
            access_token_env: default_access_token_env(),
            endpoint: default_bigquery_endpoint(),
            dataset: default_dataset(),
            timeout_secs: default_bigquery_timeout(),
        }
    }
}

fn default_project_id_env() -> String {
    "GCP_PROJECT_ID".into()
}
fn default_access_token_env() -> String {
    "GCP_ACCESS_TOKEN".into()
}
fn default_bigquery_endpoint() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".into()
}
fn default_dataset() -> String {
    DEFAULT_DATASET.into()
}
fn default_bigquery_timeout() -> u64 {
    30
}

impl BigQueryConfig {
    /// Resolve `(project_id, access_token)` from the environment.
    pub fn credentials(&self) -> Result<(String, String)> {
        let project_id = read_secret_env(&self.project_id_env, "GCP project id")?;
        let token = read_secret_env(&self.access_token_env, "GCP access token")?;
        Ok((project_id, token))
    }

    /// Parsed endpoint URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        parse_endpoint(&self.endpoint)
    }
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for memo generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// REST endpoint root.
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_gemini_endpoint(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_gemini_timeout() -> u64 {
    120
}

impl GeminiConfig {
    /// Resolve the API key from the environment.
    pub fn api_key(&self) -> Result<String> {
        read_secret_env(&self.api_key_env, "Gemini API key")
    }

    /// Parsed endpoint URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        parse_endpoint(&self.endpoint)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| UnderwriteError::config(format!("invalid endpoint '{raw}': {e}")))
}

/// Read a non-empty env var, describing what it holds if it is missing.
pub fn read_secret_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(UnderwriteError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.underwrite/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| UnderwriteError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.underwrite/underwrite.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| UnderwriteError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        UnderwriteError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| UnderwriteError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| UnderwriteError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| UnderwriteError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GCP_PROJECT_ID"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("fan_out = true"));
        assert!(!toml_str.contains("deadline_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.bigquery.timeout_secs, 30);
        assert_eq!(parsed.bigquery.dataset, DEFAULT_DATASET);
        assert_eq!(parsed.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[aggregation]
fan_out = false
deadline_ms = 2500

[bigquery]
dataset = "my-proj.cre"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.aggregation.fan_out);
        assert_eq!(config.aggregation.deadline_ms, Some(2500));
        assert_eq!(config.bigquery.dataset, "my-proj.cre");
        assert_eq!(config.bigquery.access_token_env, "GCP_ACCESS_TOKEN");
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("uw-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[gemini]\nmodel = \"gemini-2.5-pro\"\n").expect("write");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.gemini.model, "gemini-2.5-pro");
        std::fs::remove_file(&path).ok();

        let err = load_config_from(Path::new("/nonexistent/underwrite.toml")).unwrap_err();
        assert!(matches!(err, UnderwriteError::Io { .. }));
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut config = AppConfig::default();
        // Use unique env var names to avoid interfering with other tests
        config.bigquery.project_id_env = "UW_TEST_NONEXISTENT_PROJECT_12345".into();
        config.gemini.api_key_env = "UW_TEST_NONEXISTENT_KEY_12345".into();

        let err = config.bigquery.credentials().unwrap_err();
        assert!(err.to_string().contains("UW_TEST_NONEXISTENT_PROJECT_12345"));

        let err = config.gemini.api_key().unwrap_err();
        assert!(err.to_string().contains("Gemini API key not found"));
    }

    #[test]
    fn endpoint_parsing() {
        let config = BigQueryConfig::default();
        let url = config.endpoint_url().expect("valid default endpoint");
        assert_eq!(url.host_str(), Some("bigquery.googleapis.com"));

        let bad = GeminiConfig {
            endpoint: "not a url".into(),
            ..Default::default()
        };
        assert!(bad.endpoint_url().is_err());
    }
}
