//! Run configuration and credentials
//!
//! `Config` is read once from TOML at startup and passed by reference to
//! every component. Credentials live in a separate JSON file and can be
//! overridden from the environment (`.env` is loaded first by `main`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::resilience::ConcurrencyConfig;

/// Configuration or credentials could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    /// A credential needed by the selected collaborators is absent
    MissingCredential { name: String },
    Invalid { message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "failed to parse {}: {}", path.display(), message)
            }
            ConfigError::MissingCredential { name } => write!(f, "missing credential '{}'", name),
            ConfigError::Invalid { message } => write!(f, "invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level run configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub carriers: CarriersConfig,
    pub concurrency: ConcurrencyConfig,
    /// Overrides the profile's archive markers when set
    pub archive_markers: Option<Vec<String>>,
    pub credentials_path: Option<PathBuf>,
    /// `[[runs]]`: sheets synced one after another by `sync --all`
    pub runs: Vec<RunConfig>,
}

/// One sheet of a multi-sheet run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub profile: String,
    pub view: String,
    pub active_table: String,
    pub archive_table: String,
    /// Saved export to read instead of the API
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub archive_markers: Option<Vec<String>>,
}

/// `[source]`: where records are fetched from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub token_url: String,
    /// Workspace export base, e.g. `https://analyticsapi.zoho.com/api/<owner>/<workspace>`
    pub workspace_url: String,
    /// View (table/report) exported each cycle
    pub view: String,
    /// Built-in source profile name
    pub profile: String,
    /// Read the export from this XML file instead of the API
    pub file: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            token_url: "https://accounts.zoho.com/oauth/v2/token".to_string(),
            workspace_url: String::new(),
            view: "Logistic 2".to_string(),
            profile: "logistic".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Csv,
    Xlsx,
    Sheets,
}

/// `[store]`: where the active and archive tables are persisted
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory (csv), workbook path (xlsx) or spreadsheet id (sheets)
    pub location: String,
    pub active_table: String,
    pub archive_table: String,
    /// Rows per write request
    pub chunk_size: usize,
    pub sheets_api_base: String,
    /// Bearer token for the Sheets API; `TRACKLINE_SHEETS_TOKEN` wins when set
    pub sheets_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Csv,
            location: "tracking".to_string(),
            active_table: "Test_new".to_string(),
            archive_table: "Test_DB".to_string(),
            chunk_size: 1000,
            sheets_api_base: "https://sheets.googleapis.com/v4".to_string(),
            sheets_token: None,
        }
    }
}

/// `[carriers]`: carrier API endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CarriersConfig {
    pub fedex_base_url: String,
    pub ups_base_url: String,
    pub ups_token_url: String,
    pub timeout_secs: u64,
}

impl Default for CarriersConfig {
    fn default() -> Self {
        Self {
            fedex_base_url: "https://apis.fedex.com".to_string(),
            ups_base_url: "https://onlinetools.ups.com".to_string(),
            ups_token_url: "https://wwwcie.ups.com/security/v1/oauth/token".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Default config location: `<config_dir>/trackline/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trackline").join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No config file found, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.clone(),
            message,
        })?;

        log::debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// The single run described by `[source]` and `[store]`
    pub fn primary_run(&self, profile: Option<&str>) -> RunConfig {
        RunConfig {
            profile: profile.unwrap_or(self.source.profile.as_str()).to_string(),
            view: self.source.view.clone(),
            active_table: self.store.active_table.clone(),
            archive_table: self.store.archive_table.clone(),
            file: self.source.file.clone(),
            archive_markers: self.archive_markers.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                message: "store.chunk_size must be at least 1".to_string(),
            });
        }
        if self.store.active_table.trim().is_empty() || self.store.archive_table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "store.active_table and store.archive_table must be set".to_string(),
            });
        }
        if self.store.active_table == self.store.archive_table {
            return Err(ConfigError::Invalid {
                message: "active and archive tables must differ".to_string(),
            });
        }

        let mut actives = std::collections::HashSet::new();
        for run in &self.runs {
            if run.active_table == run.archive_table {
                return Err(ConfigError::Invalid {
                    message: format!("run '{}' uses '{}' as both active and archive", run.view, run.active_table),
                });
            }
            if !actives.insert(run.active_table.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("active table '{}' is used by more than one run", run.active_table),
                });
            }
        }
        Ok(())
    }
}

/// `zoho_params` section of the credentials file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZohoParams {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub soid: String,
}

/// `fedex_params` section of the credentials file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FedexParams {
    #[serde(rename = "CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: String,
}

/// `ups_params` section of the credentials file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsParams {
    pub client_key: String,
    pub client_secret: String,
}

/// Credentials for the source feed and carriers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    pub zoho_params: Option<ZohoParams>,
    pub fedex_params: Option<FedexParams>,
    pub ups_params: Option<UpsParams>,
}

impl Credentials {
    /// Read the credentials file (if any) and apply `TRACKLINE_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut credentials = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Self::from_json(&content).map_err(|message| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message,
                })?
            }
            None => Credentials::default(),
        };
        credentials.apply_overrides(|name| std::env::var(name).ok());
        Ok(credentials)
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Overwrite fields from `lookup(VAR)`, creating sections as needed
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let zoho = [
            "TRACKLINE_ZOHO_CLIENT_ID",
            "TRACKLINE_ZOHO_CLIENT_SECRET",
            "TRACKLINE_ZOHO_SCOPE",
            "TRACKLINE_ZOHO_SOID",
        ]
        .map(get);
        if zoho.iter().any(Option::is_some) {
            let params = self.zoho_params.get_or_insert_with(ZohoParams::default);
            let [id, secret, scope, soid] = zoho;
            set_if(&mut params.client_id, id);
            set_if(&mut params.client_secret, secret);
            set_if(&mut params.scope, scope);
            set_if(&mut params.soid, soid);
        }

        let fedex = ["TRACKLINE_FEDEX_CLIENT_ID", "TRACKLINE_FEDEX_CLIENT_SECRET"].map(get);
        if fedex.iter().any(Option::is_some) {
            let params = self.fedex_params.get_or_insert_with(FedexParams::default);
            let [id, secret] = fedex;
            set_if(&mut params.client_id, id);
            set_if(&mut params.client_secret, secret);
        }

        let ups = ["TRACKLINE_UPS_CLIENT_KEY", "TRACKLINE_UPS_CLIENT_SECRET"].map(get);
        if ups.iter().any(Option::is_some) {
            let params = self.ups_params.get_or_insert_with(UpsParams::default);
            let [key, secret] = ups;
            set_if(&mut params.client_key, key);
            set_if(&mut params.client_secret, secret);
        }
    }

    pub fn zoho(&self) -> Result<&ZohoParams, ConfigError> {
        self.zoho_params
            .as_ref()
            .filter(|p| !p.client_id.is_empty() && !p.client_secret.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                name: "zoho_params".to_string(),
            })
    }
}

fn set_if(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Csv);
        assert_eq!(config.store.chunk_size, 1000);
        assert_eq!(config.concurrency.max_concurrent_lookups, 10);
        assert_eq!(config.source.profile, "logistic");
        assert!(config.archive_markers.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml(
            r#"
archive_markers = ["ORDER CLOSED"]
credentials_path = "credentials.json"

[source]
profile = "krati"
view = "Krati UK"

[store]
backend = "sheets"
location = "1AbC"
chunk_size = 500

[concurrency]
max_concurrent_lookups = 4
"#,
        )
        .unwrap();

        assert_eq!(config.source.profile, "krati");
        assert_eq!(config.source.token_url, "https://accounts.zoho.com/oauth/v2/token");
        assert_eq!(config.store.backend, StoreBackend::Sheets);
        assert_eq!(config.store.chunk_size, 500);
        assert_eq!(config.store.active_table, "Test_new");
        assert_eq!(config.concurrency.max_concurrent_lookups, 4);
        assert_eq!(config.archive_markers, Some(vec!["ORDER CLOSED".to_string()]));
        assert_eq!(config.credentials_path, Some(PathBuf::from("credentials.json")));
    }

    #[test]
    fn test_runs_and_primary_run() {
        let config = Config::from_toml(
            r#"
[source]
view = "Logistic 2"

[[runs]]
profile = "logistic"
view = "Logistic 2"
active_table = "Test_new"
archive_table = "Test_DB"

[[runs]]
profile = "krati"
view = "Krati UK"
active_table = "Krati_new"
archive_table = "Krati_DB"
file = "exports/krati.xml"
"#,
        )
        .unwrap();

        assert_eq!(config.runs.len(), 2);
        assert_eq!(config.runs[1].file, Some(PathBuf::from("exports/krati.xml")));
        assert!(config.runs[0].archive_markers.is_none());
        assert!(config.validate().is_ok());

        let primary = config.primary_run(Some("poonam"));
        assert_eq!(primary.profile, "poonam");
        assert_eq!(primary.active_table, "Test_new");
        assert_eq!(config.primary_run(None).profile, "logistic");
    }

    #[test]
    fn test_runs_must_not_share_active_tables() {
        let mut config = Config::default();
        let run = config.primary_run(None);
        config.runs = vec![run.clone(), RunConfig { view: "Other".into(), ..run }];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Config::from_toml("[store]\nbackend = \"ftp\"").is_err());
    }

    #[test]
    fn test_load_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nactive_table = \"Same\"\narchive_table = \"Same\"").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Invalid { .. })
        ));

        let missing = Path::new("/definitely/not/here/config.toml");
        assert!(matches!(Config::load(Some(missing)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_credentials_file_layout() {
        let credentials = Credentials::from_json(
            r#"{
                "zoho_params": {"client_id": "zid", "client_secret": "zsec", "scope": "ZohoAnalytics.data.read", "soid": "ZohoCRM.1"},
                "fedex_params": {"CLIENT_ID": "fid", "CLIENT_SECRET": "fsec"},
                "ups_params": {"client_key": "ukey", "client_secret": "usec"}
            }"#,
        )
        .unwrap();

        assert_eq!(credentials.zoho().unwrap().soid, "ZohoCRM.1");
        assert_eq!(credentials.fedex_params.unwrap().client_id, "fid");
        assert_eq!(credentials.ups_params.unwrap().client_key, "ukey");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TRACKLINE_FEDEX_CLIENT_SECRET", "from-env"),
            ("TRACKLINE_UPS_CLIENT_KEY", "ups-env"),
            ("TRACKLINE_ZOHO_SCOPE", "  "),
        ]);
        let mut credentials = Credentials::from_json(
            r#"{"fedex_params": {"CLIENT_ID": "fid", "CLIENT_SECRET": "file"}}"#,
        )
        .unwrap();
        credentials.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        let fedex = credentials.fedex_params.as_ref().unwrap();
        assert_eq!(fedex.client_id, "fid");
        assert_eq!(fedex.client_secret, "from-env");
        assert_eq!(credentials.ups_params.as_ref().unwrap().client_key, "ups-env");
        assert!(credentials.zoho_params.is_none());
        assert!(matches!(
            credentials.zoho(),
            Err(ConfigError::MissingCredential { .. })
        ));
    }
}
