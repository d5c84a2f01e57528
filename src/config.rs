//! Pipeline configuration
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `PAYDAY_*` environment variables (a `.env` file is honoured), then CLI
//! flags applied by the runner.

use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::resources::Resource;
use crate::silver::QualityPolicy;
use crate::types::{OptionStringExt, SourceKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where Bronze records are fetched from
    pub source: SourceKind,

    /// Payday REST API settings
    pub api: ApiConfig,

    /// Resources to fetch, in order
    pub resources: Vec<String>,

    /// Directory layout
    pub paths: PathsConfig,

    /// Fetch tuning
    pub fetch: FetchConfig,

    /// Silver quality gate
    pub quality: QualityPolicy,
}

// ============================================================================
// API
// ============================================================================

/// Payday REST API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL (`PAYDAY_BASE_URL`)
    pub base_url: String,

    /// Credentials
    pub auth: AuthSettings,

    /// HTTP client tuning
    pub http: HttpSettings,
}

/// Raw credentials as configured
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Pre-issued token (`PAYDAY_BEARER_TOKEN`)
    #[serde(skip_serializing)]
    pub bearer_token: Option<String>,

    /// OAuth2 client id (`PAYDAY_CLIENT_ID`)
    pub client_id: Option<String>,

    /// OAuth2 client secret (`PAYDAY_CLIENT_SECRET`)
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,

    /// OAuth2 token endpoint (`PAYDAY_TOKEN_URL`)
    pub token_url: Option<String>,

    /// Scope requested with the client-credentials grant
    pub scope: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bearer_token: None,
            client_id: None,
            client_secret: None,
            token_url: None,
            scope: default_scope(),
        }
    }
}

fn default_scope() -> String {
    "api".to_string()
}

impl AuthSettings {
    /// Resolve the credentials to an auth method
    ///
    /// A bearer token wins. Otherwise the client id, secret and token URL
    /// must all be set.
    pub fn resolve(&self) -> Result<AuthConfig> {
        if let Some(token) = self.bearer_token.clone().none_if_empty() {
            return Ok(AuthConfig::Bearer { token });
        }

        let client_id = self.client_id.clone().none_if_empty();
        let client_secret = self.client_secret.clone().none_if_empty();
        let token_url = self.token_url.clone().none_if_empty();

        match (client_id, client_secret, token_url) {
            (Some(client_id), Some(client_secret), Some(token_url)) => {
                Ok(AuthConfig::Oauth2ClientCredentials {
                    token_url,
                    client_id,
                    client_secret,
                    scopes: vec![self.scope.clone()],
                })
            }
            _ => Err(Error::auth(
                "No auth provided. Set PAYDAY_BEARER_TOKEN or client credentials in .env",
            )),
        }
    }
}

/// HTTP client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Maximum number of retries
    pub max_retries: u32,

    /// Requests per second; 0 disables rate limiting
    pub requests_per_second: u32,

    /// Token bucket size
    pub burst_size: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            max_retries: 3,
            requests_per_second: 5,
            burst_size: 5,
        }
    }
}

impl HttpSettings {
    /// HTTP client config for the given base URL
    pub fn client_config(&self, base_url: &str) -> HttpClientConfig {
        let builder = HttpClientConfig::builder()
            .base_url(base_url.trim_end_matches('/'))
            .timeout(Duration::from_secs(self.timeout_seconds))
            .max_retries(self.max_retries);

        let builder = if self.requests_per_second == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::new(
                self.requests_per_second,
                self.burst_size,
            ))
        };
        builder.build()
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Data root
    pub data_dir: PathBuf,

    /// Bronze snapshots, one directory per resource
    pub bronze_dir: PathBuf,

    /// Gold Parquet exports
    pub gold_dir: PathBuf,

    /// DuckDB warehouse file
    pub warehouse: PathBuf,

    /// Account-groups CSV
    pub account_groups: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(Path::new("data"))
    }
}

impl PathsConfig {
    /// Default layout below a data root
    pub fn under(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            bronze_dir: data_dir.join("bronze").join("payday"),
            gold_dir: data_dir.join("gold"),
            warehouse: PathBuf::from("duckdb").join("finance.duckdb"),
            account_groups: PathBuf::from("config").join("account_groups.csv"),
        }
    }

    /// Move the data root, keeping the Bronze and Gold directories below it
    pub fn rebase(&mut self, data_dir: &Path) {
        let rebased = Self::under(data_dir);
        self.data_dir = rebased.data_dir;
        self.bronze_dir = rebased.bronze_dir;
        self.gold_dir = rebased.gold_dir;
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Fetch tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Records requested per page
    pub page_size: u32,

    /// Safety limit on pages per resource
    pub max_pages: u32,

    /// Start of the account-statement window
    pub statement_from: NaiveDate,

    /// Bridge command line; the tool name and JSON arguments are appended
    pub bridge_command: Vec<String>,

    /// Working directory for the bridge process
    pub bridge_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_pages: 1000,
            statement_from: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            bridge_command: vec!["node".to_string(), "scripts/mcp_bridge.js".to_string()],
            bridge_dir: None,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Environment variable names
pub mod env {
    pub const BASE_URL: &str = "PAYDAY_BASE_URL";
    pub const CLIENT_ID: &str = "PAYDAY_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "PAYDAY_CLIENT_SECRET";
    pub const TOKEN_URL: &str = "PAYDAY_TOKEN_URL";
    pub const BEARER_TOKEN: &str = "PAYDAY_BEARER_TOKEN";
    pub const RESOURCES: &str = "PAYDAY_RESOURCES";
}

impl PipelineConfig {
    /// Load a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML config
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))
    }

    /// Defaults, overlaid with the optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay `PAYDAY_*` variables from the process environment and `.env`
    pub fn apply_env(&mut self) {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay variables from a lookup; unset or blank variables are ignored
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).none_if_empty();

        if let Some(url) = get(env::BASE_URL) {
            self.api.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(id) = get(env::CLIENT_ID) {
            self.api.auth.client_id = Some(id);
        }
        if let Some(secret) = get(env::CLIENT_SECRET) {
            self.api.auth.client_secret = Some(secret);
        }
        if let Some(url) = get(env::TOKEN_URL) {
            self.api.auth.token_url = Some(url);
        }
        if let Some(token) = get(env::BEARER_TOKEN) {
            self.api.auth.bearer_token = Some(token);
        }
        if let Some(list) = get(env::RESOURCES) {
            self.resources = parse_resource_list(&list);
        }
    }

    /// Check settings the fetch step depends on
    pub fn validate(&self) -> Result<()> {
        if self.fetch.page_size == 0 {
            return Err(Error::invalid_value("fetch.page_size", "must be positive"));
        }
        if self.fetch.max_pages == 0 {
            return Err(Error::invalid_value("fetch.max_pages", "must be positive"));
        }

        match self.source {
            SourceKind::Http => {
                if self.api.base_url.trim().is_empty() {
                    return Err(Error::missing_field("api.base_url (PAYDAY_BASE_URL)"));
                }
                url::Url::parse(&self.api.base_url)?;
            }
            SourceKind::Bridge => {
                if self.fetch.bridge_command.is_empty() {
                    return Err(Error::missing_field("fetch.bridge_command"));
                }
            }
        }

        for name in &self.resources {
            if Resource::lookup(name).is_none() {
                warn!("Unknown resource in config: {}", name);
            }
        }
        Ok(())
    }
}

/// Split a comma-separated resource list, dropping blanks
pub fn parse_resource_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use test_case::test_case;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source, SourceKind::Http);
        assert_eq!(config.paths.bronze_dir, PathBuf::from("data/bronze/payday"));
        assert_eq!(config.paths.gold_dir, PathBuf::from("data/gold"));
        assert_eq!(config.paths.warehouse, PathBuf::from("duckdb/finance.duckdb"));
        assert_eq!(
            config.paths.account_groups,
            PathBuf::from("config/account_groups.csv")
        );
        assert_eq!(config.fetch.page_size, 500);
        assert_eq!(config.fetch.max_pages, 1000);
        assert_eq!(
            config.fetch.statement_from,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
        assert_eq!(config.fetch.bridge_command, vec!["node", "scripts/mcp_bridge.js"]);
        assert_eq!(config.api.auth.scope, "api");
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r"
source: bridge
resources: [accounts, invoices]
paths:
  warehouse: /tmp/wh.duckdb
fetch:
  page_size: 100
  statement_from: 2023-06-01
quality:
  fail_on_orphans: true
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.source, SourceKind::Bridge);
        assert_eq!(config.resources, vec!["accounts", "invoices"]);
        assert_eq!(config.paths.warehouse, PathBuf::from("/tmp/wh.duckdb"));
        assert_eq!(config.paths.gold_dir, PathBuf::from("data/gold"));
        assert_eq!(config.fetch.page_size, 100);
        assert_eq!(config.fetch.max_pages, 1000);
        assert_eq!(
            config.fetch.statement_from,
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
        );
        assert!(config.quality.fail_on_orphans);
        assert!(!config.quality.fail_on_missing);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api:\n  base_url: https://api.example.test").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.test");

        let err = PipelineConfig::from_file("/nonexistent/payday.yaml").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = PipelineConfig::from_yaml("fetch: [").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PipelineConfig::default();
        config.apply_vars(vars(&[
            ("PAYDAY_BASE_URL", "https://api.payday.is/"),
            ("PAYDAY_CLIENT_ID", "id"),
            ("PAYDAY_CLIENT_SECRET", "secret"),
            ("PAYDAY_TOKEN_URL", "https://auth.payday.is/token"),
            ("PAYDAY_BEARER_TOKEN", "  "),
            ("PAYDAY_RESOURCES", "accounts, ,invoices,"),
        ]));

        assert_eq!(config.api.base_url, "https://api.payday.is");
        assert_eq!(config.api.auth.client_id.as_deref(), Some("id"));
        assert!(config.api.auth.bearer_token.is_none());
        assert_eq!(config.resources, vec!["accounts", "invoices"]);
    }

    #[test_case("accounts,customers", &["accounts", "customers"] ; "plain")]
    #[test_case(" accounts , customers ", &["accounts", "customers"] ; "padded")]
    #[test_case(",,", &[] ; "only separators")]
    #[test_case("", &[] ; "empty")]
    fn test_parse_resource_list(input: &str, expected: &[&str]) {
        assert_eq!(parse_resource_list(input), expected);
    }

    #[test]
    fn test_resolve_bearer_wins() {
        let settings = AuthSettings {
            bearer_token: Some("tok".into()),
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            token_url: Some("https://auth.example.test/token".into()),
            ..Default::default()
        };
        assert!(matches!(
            settings.resolve().unwrap(),
            AuthConfig::Bearer { token } if token == "tok"
        ));
    }

    #[test]
    fn test_resolve_client_credentials() {
        let settings = AuthSettings {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            token_url: Some("https://auth.example.test/token".into()),
            ..Default::default()
        };
        match settings.resolve().unwrap() {
            AuthConfig::Oauth2ClientCredentials { scopes, client_id, .. } => {
                assert_eq!(client_id, "id");
                assert_eq!(scopes, vec!["api"]);
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_no_auth() {
        let settings = AuthSettings {
            client_id: Some("id".into()),
            ..Default::default()
        };
        let err = settings.resolve().unwrap_err();
        assert!(err.to_string().contains("No auth provided"));
    }

    #[test]
    fn test_validate() {
        let mut config = PipelineConfig::default();
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::MissingConfigField { .. }
        ));

        config.api.base_url = "https://api.payday.is".into();
        config.validate().unwrap();

        config.fetch.page_size = 0;
        assert!(config.validate().is_err());

        let mut bridge = PipelineConfig {
            source: SourceKind::Bridge,
            ..Default::default()
        };
        bridge.validate().unwrap();
        bridge.fetch.bridge_command.clear();
        assert!(bridge.validate().is_err());
    }

    #[test]
    fn test_rebase_paths() {
        let mut paths = PathsConfig::default();
        paths.rebase(Path::new("/srv/finance"));
        assert_eq!(paths.bronze_dir, PathBuf::from("/srv/finance/bronze/payday"));
        assert_eq!(paths.gold_dir, PathBuf::from("/srv/finance/gold"));
        assert_eq!(paths.warehouse, PathBuf::from("duckdb/finance.duckdb"));
    }

    #[test]
    fn test_client_config() {
        let settings = HttpSettings {
            requests_per_second: 0,
            ..Default::default()
        };
        let config = settings.client_config("https://api.payday.is/");
        assert_eq!(config.base_url.as_deref(), Some("https://api.payday.is"));
        assert!(config.rate_limit.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
