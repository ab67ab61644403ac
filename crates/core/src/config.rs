//! TOML-based configuration system for Stacks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StacksError};

/// Top-level Stacks configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksConfig {
    pub stacks: StacksSection,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub sip2: Option<Sip2Config>,
    #[serde(default)]
    pub ldap: Option<LdapConfig>,
    #[serde(default)]
    pub harvest: HarvestConfig,
    /// OAI-PMH harvest targets keyed by target name.
    #[serde(default)]
    pub oai: BTreeMap<String, OaiTargetConfig>,
}

/// Core instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksSection {
    pub instance_name: String,
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// SQLite database settings for the patron table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some("/var/lib/stacks/stacks.db".into()),
        }
    }
}

/// ILS connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Registered driver identifier (e.g. `demo`, `sample`, `noils`).
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Substitute the NoILS driver when the configured driver cannot be loaded.
    #[serde(default)]
    pub load_no_ils_on_failure: bool,
    #[serde(default)]
    pub holds_mode: HoldsMode,
    #[serde(default)]
    pub title_holds_mode: TitleHoldsMode,
    #[serde(default)]
    pub cancel_holds_enabled: bool,
    #[serde(default)]
    pub renewals_enabled: bool,
    /// Secret used to sign hold request keys.
    #[serde(default)]
    pub hmac_secret: Option<String>,
    /// Per-function settings keyed by function name (`Holds`, `changePassword`, ...).
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,
    #[serde(default)]
    pub no_ils: NoIlsConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            load_no_ils_on_failure: false,
            holds_mode: HoldsMode::default(),
            title_holds_mode: TitleHoldsMode::default(),
            cancel_holds_enabled: false,
            renewals_enabled: false,
            hmac_secret: None,
            functions: BTreeMap::new(),
            no_ils: NoIlsConfig::default(),
        }
    }
}

fn default_driver() -> String {
    "noils".into()
}

impl CatalogConfig {
    /// Look up function settings; function names match case-insensitively.
    pub fn function(&self, name: &str) -> Option<&FunctionConfig> {
        self.functions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// Which items may receive holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoldsMode {
    #[default]
    All,
    Holds,
    Recalls,
    Availability,
    Driver,
    None,
}

/// Whether title-level holds are offered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TitleHoldsMode {
    #[default]
    Disabled,
    Always,
    Availability,
    Driver,
}

/// Settings attached to one ILS function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FunctionConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Colon-separated list of hold detail fields covered by the request key.
    #[serde(default)]
    pub hmac_keys: Option<String>,
    /// Default "required by" offset as `days:months:years`.
    #[serde(default)]
    pub default_required_date: Option<String>,
    /// Colon-separated list of extra fields shown on the hold form.
    #[serde(default)]
    pub extra_hold_fields: Option<String>,
}

/// What the NoILS driver reports while the real ILS is unavailable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NoIlsMode {
    #[default]
    #[serde(rename = "ils-offline")]
    IlsOffline,
    #[serde(rename = "ils-none")]
    IlsNone,
}

impl NoIlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoIlsMode::IlsOffline => "ils-offline",
            NoIlsMode::IlsNone => "ils-none",
        }
    }
}

/// Settings for the NoILS fallback driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoIlsConfig {
    #[serde(default)]
    pub mode: NoIlsMode,
    #[serde(default)]
    pub hide_login: bool,
    /// Report a placeholder status line for every record.
    #[serde(default)]
    pub use_status: bool,
    /// Report a placeholder holdings line for every record.
    #[serde(default)]
    pub use_holdings: bool,
    #[serde(default = "default_unavailable_status")]
    pub status_text: String,
    #[serde(default = "default_unavailable_location")]
    pub location_text: String,
}

impl Default for NoIlsConfig {
    fn default() -> Self {
        Self {
            mode: NoIlsMode::default(),
            hide_login: false,
            use_status: false,
            use_holdings: false,
            status_text: default_unavailable_status(),
            location_text: default_unavailable_location(),
        }
    }
}

fn default_unavailable_status() -> String {
    "ILS Unavailable".into()
}

fn default_unavailable_location() -> String {
    "Not Available".into()
}

/// Which backend authenticates patrons.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    Ils,
    Sip2,
    Ldap,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
}

/// SIP2 server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sip2Config {
    pub host: String,
    #[serde(default = "default_sip2_port")]
    pub port: u16,
    /// Terminal password sent in the AC field.
    #[serde(default)]
    pub terminal_password: Option<String>,
    /// Append AY/AZ sequence and checksum fields to each message.
    #[serde(default)]
    pub error_detection: bool,
    #[serde(default = "default_sip2_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
}

fn default_sip2_port() -> u16 {
    6002
}

fn default_sip2_retries() -> u32 {
    3
}

/// LDAP directory settings. Required keys are checked when the client is built.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LdapConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub basedn: Option<String>,
    /// Attribute holding the login name, e.g. `uid`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub bind_username: Option<String>,
    #[serde(default)]
    pub bind_password: Option<String>,
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cat_username: Option<String>,
    #[serde(default)]
    pub cat_password: Option<String>,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
}

fn default_tls_verify() -> bool {
    true
}

/// Global harvest settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvestConfig {
    /// Root directory for harvested files; defaults to `<data_dir>/harvest`.
    #[serde(default)]
    pub base_dir: Option<String>,
}

/// One OAI-PMH harvest target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OaiTargetConfig {
    pub url: String,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default)]
    pub id_prefix: Option<String>,
    #[serde(default)]
    pub id_search: Vec<String>,
    #[serde(default)]
    pub id_replace: Vec<String>,
    #[serde(default)]
    pub harvested_id_log: Option<String>,
    #[serde(default)]
    pub inject_id: Option<String>,
    #[serde(default)]
    pub inject_date: Option<String>,
    #[serde(default)]
    pub inject_set_spec: Option<String>,
    #[serde(default)]
    pub inject_set_name: Option<String>,
    /// `auto`, `YYYY-MM-DD`, or `YYYY-MM-DDThh:mm:ssZ`.
    #[serde(default = "default_granularity")]
    pub date_granularity: String,
    #[serde(default = "default_oai_timeout")]
    pub timeout_secs: u64,
    /// Delay used when a 503 carries no usable Retry-After header.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_metadata_prefix() -> String {
    "oai_dc".into()
}

fn default_granularity() -> String {
    "auto".into()
}

fn default_oai_timeout() -> u64 {
    60
}

fn default_retry_delay() -> u64 {
    5
}

impl OaiTargetConfig {
    /// Minimal target definition for the given endpoint.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            set: None,
            metadata_prefix: default_metadata_prefix(),
            id_prefix: None,
            id_search: Vec::new(),
            id_replace: Vec::new(),
            harvested_id_log: None,
            inject_id: None,
            inject_date: None,
            inject_set_spec: None,
            inject_set_name: None,
            date_granularity: default_granularity(),
            timeout_secs: default_oai_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl StacksConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| StacksError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if self.stacks.instance_name.is_empty() {
            return Err(StacksError::Config(
                "stacks.instance_name must not be empty".into(),
            ));
        }

        if self.stacks.data_dir.is_empty() {
            return Err(StacksError::Config(
                "stacks.data_dir must not be empty".into(),
            ));
        }

        if self.stacks.database.path.is_none() {
            return Err(StacksError::Config(
                "stacks.database.path is required".into(),
            ));
        }

        if self.catalog.driver.trim().is_empty() {
            return Err(StacksError::Config(
                "catalog.driver must not be empty".into(),
            ));
        }

        match self.auth.method {
            AuthMethod::Sip2 => match &self.sip2 {
                Some(sip2) if !sip2.host.is_empty() => {}
                _ => {
                    return Err(StacksError::Config(
                        "sip2.host is required when auth.method is sip2".into(),
                    ))
                }
            },
            AuthMethod::Ldap => {
                if self.ldap.is_none() {
                    return Err(StacksError::Config(
                        "[ldap] section is required when auth.method is ldap".into(),
                    ));
                }
            }
            AuthMethod::Ils => {}
        }

        for (name, target) in &self.oai {
            if target.url.is_empty() {
                return Err(StacksError::Config(format!("oai.{name}.url must not be empty")));
            }
            if target.id_search.len() != target.id_replace.len() {
                return Err(StacksError::Config(format!(
                    "oai.{name}.id_search and oai.{name}.id_replace must have the same length"
                )));
            }
        }

        Ok(())
    }

    /// Directory under which each OAI target gets its own subdirectory.
    pub fn harvest_dir(&self) -> PathBuf {
        match &self.harvest.base_dir {
            Some(dir) => PathBuf::from(dir),
            None => Path::new(&self.stacks.data_dir).join("harvest"),
        }
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            stacks: StacksSection {
                instance_name: "My Library".into(),
                data_dir: "/var/lib/stacks".into(),
                database: DatabaseConfig::default(),
            },
            catalog: CatalogConfig::default(),
            auth: AuthConfig::default(),
            sip2: None,
            ldap: None,
            harvest: HarvestConfig::default(),
            oai: BTreeMap::new(),
        }
    }
}
