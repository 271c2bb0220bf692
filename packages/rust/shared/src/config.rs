//! Application configuration for EventHarvest.
//!
//! User config lives at `~/.eventharvest/eventharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EventHarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "eventharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".eventharvest";

// ---------------------------------------------------------------------------
// Config structs (matching eventharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where events are discovered and how pages are loaded.
    #[serde(default)]
    pub source: SourceConfig,

    /// CSS selectors and markers used by the extractors.
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Backing store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing page to walk.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Wait after each page render before parsing, in milliseconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Per-request timeout for the HTTP renderer.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            settle_delay_ms: default_settle_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_listing_url() -> String {
    "https://kultuuriaken.tartu.ee/en/events".into()
}
fn default_settle_delay() -> u64 {
    2000
}
fn default_request_timeout() -> u64 {
    30
}

/// `[selectors]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// One element per event on the listing page.
    #[serde(default = "default_container")]
    pub container: String,

    /// Link inside a container carrying the title and detail href.
    #[serde(default = "default_link")]
    pub link: String,

    /// Descriptive text elements inside a container (location, then time).
    #[serde(default = "default_description")]
    pub description: String,

    /// Tag-list container on the detail page.
    #[serde(default = "default_tag_list")]
    pub tag_list: String,

    /// Item inside the tag list; the first one is the category.
    #[serde(default = "default_tag_item")]
    pub tag_item: String,

    /// Substring identifying the inline script that embeds coordinates.
    #[serde(default = "default_script_marker")]
    pub script_marker: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            link: default_link(),
            description: default_description(),
            tag_list: default_tag_list(),
            tag_item: default_tag_item(),
            script_marker: default_script_marker(),
        }
    }
}

fn default_container() -> String {
    "div.col".into()
}
fn default_link() -> String {
    "a".into()
}
fn default_description() -> String {
    "p".into()
}
fn default_tag_list() -> String {
    ".tags".into()
}
fn default_tag_item() -> String {
    "li".into()
}
fn default_script_marker() -> String {
    "latitude".into()
}

/// Which backing store receives records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Remote table behind a Supabase/PostgREST endpoint.
    Supabase,
    /// Local libSQL database file.
    Local,
    /// Records are normalized and reported but not written anywhere.
    None,
}

impl FromStr for StoreBackendKind {
    type Err = EventHarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "local" => Ok(Self::Local),
            "none" => Ok(Self::None),
            other => Err(EventHarvestError::config(format!(
                "unknown store backend '{other}' (expected supabase, local, or none)"
            ))),
        }
    }
}

impl std::fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Supabase => "supabase",
            Self::Local => "local",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackendKind,

    /// Remote table name.
    #[serde(default = "default_table")]
    pub table: String,

    /// Send the run-local sequence id to the store instead of letting it assign one.
    #[serde(default)]
    pub include_id: bool,

    /// Name of the env var holding the store endpoint (never store the value itself).
    #[serde(default = "default_url_env")]
    pub url_env: String,

    /// Name of the env var holding the store key.
    #[serde(default = "default_key_env")]
    pub key_env: String,

    /// Database file for the local backend.
    #[serde(default = "default_local_path")]
    pub local_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            table: default_table(),
            include_id: false,
            url_env: default_url_env(),
            key_env: default_key_env(),
            local_path: default_local_path(),
        }
    }
}

fn default_backend() -> StoreBackendKind {
    StoreBackendKind::Supabase
}
fn default_table() -> String {
    "events".into()
}
fn default_url_env() -> String {
    "SUPABASE_URL".into()
}
fn default_key_env() -> String {
    "SUPABASE_ANON_KEY".into()
}
fn default_local_path() -> String {
    "var/eventharvest.db".into()
}

/// Store endpoint and key, resolved from the environment.
#[derive(Clone)]
pub struct StoreCredentials {
    pub url: String,
    pub key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.eventharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EventHarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.eventharvest/eventharvest.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EventHarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EventHarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventHarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EventHarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EventHarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the store endpoint and key from the env vars named in `[store]`.
pub fn resolve_store_credentials(config: &AppConfig) -> Result<StoreCredentials> {
    let url = read_env(&config.store.url_env)?;
    let key = read_env(&config.store.key_env)?;
    Ok(StoreCredentials {
        url: url.trim_end_matches('/').to_string(),
        key,
    })
}

fn read_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(EventHarvestError::config(format!(
            "store credential not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Parse a listing URL given on the command line or in `[source]`.
///
/// Only absolute `http`/`https` URLs are accepted.
pub fn parse_listing_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| EventHarvestError::parse(format!("invalid listing URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EventHarvestError::validation(format!(
            "listing URL '{raw}' has unsupported scheme '{other}' (expected http or https)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("listing_url"));
        assert!(toml_str.contains("SUPABASE_ANON_KEY"));
        assert!(toml_str.contains("backend = \"supabase\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.settle_delay_ms, 2000);
        assert_eq!(parsed.selectors, SelectorConfig::default());
        assert_eq!(parsed.store.backend, StoreBackendKind::Supabase);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[source]
settle_delay_ms = 0

[selectors]
container = "article.event"

[store]
backend = "local"
include_id = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.source.settle_delay_ms, 0);
        assert_eq!(
            config.source.listing_url,
            "https://kultuuriaken.tartu.ee/en/events"
        );
        assert_eq!(config.selectors.container, "article.event");
        assert_eq!(config.selectors.link, "a");
        assert_eq!(config.store.backend, StoreBackendKind::Local);
        assert!(config.store.include_id);
        assert_eq!(config.store.table, "events");
    }

    #[test]
    fn backend_kind_parsing() {
        assert_eq!(
            "Supabase".parse::<StoreBackendKind>().unwrap(),
            StoreBackendKind::Supabase
        );
        assert_eq!("none".parse::<StoreBackendKind>().unwrap(), StoreBackendKind::None);
        let err = "postgres".parse::<StoreBackendKind>().unwrap_err();
        assert!(err.to_string().contains("unknown store backend"));
    }

    #[test]
    fn missing_credentials_name_the_variable() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.store.url_env = "EH_TEST_NONEXISTENT_URL_12345".into();
        let result = resolve_store_credentials(&config);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("EH_TEST_NONEXISTENT_URL_12345")
        );
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let creds = StoreCredentials {
            url: "https://abc.supabase.co".into(),
            key: "secret-key".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("abc.supabase.co"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn listing_url_must_be_absolute_http() {
        let url = parse_listing_url(" https://kultuuriaken.tartu.ee/en/events ").unwrap();
        assert_eq!(url.path(), "/en/events");

        let err = parse_listing_url("/en/events").unwrap_err();
        assert!(matches!(err, EventHarvestError::Parse { .. }));

        let err = parse_listing_url("ftp://example.com/events").unwrap_err();
        assert!(matches!(err, EventHarvestError::Validation { .. }));
        assert!(err.to_string().contains("ftp"));
    }
}
