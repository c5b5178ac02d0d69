//! Environment configuration for the rental contract diagnostics
//!
//! Raw inputs are captured once into an [`EnvironmentConfig`] and resolved into
//! typed [`Settings`] in priority order:
//!
//! 1. Environment variables (after loading `.env`)
//! 2. rentals.toml profile selection
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```rust,no_run
//! use rentals_tools::config::{EnvironmentConfig, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = EnvironmentConfig::load();
//! let settings = Settings::resolve(&env, None, None)?;
//! println!("Network: {}", settings.mode);
//! println!("RPC URL: {}", settings.endpoint());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::DiagnosticError;

pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:7545";
pub const DEFAULT_PROVIDER_URL: &str = "https://sepolia.infura.io/v3/{api_key}";
pub const DEFAULT_CONTRACT: &str = "RentalContract";
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";
pub const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid network mode: {0}. Must be: local or remote")]
    InvalidNetwork(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Where the diagnostic connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Local development chain (Ganache) with unlocked accounts
    Local,
    /// Remote provider endpoint authenticated by an API key
    Remote,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Local => "local",
            NetworkMode::Remote => "remote",
        }
    }

    /// Parse mode from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "local" | "ganache" | "development" => Ok(NetworkMode::Local),
            "remote" | "sepolia" | "infura" => Ok(NetworkMode::Remote),
            other => Err(ConfigError::InvalidNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named configuration inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    ProviderApiKey,
    Mnemonic,
    ExpectedAccount,
    ContractName,
    NetworkMode,
    RpcUrl,
    ProviderUrl,
    ArtifactsDir,
    ContractAddress,
    DerivedAccounts,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 10] = [
        ConfigKey::ProviderApiKey,
        ConfigKey::Mnemonic,
        ConfigKey::ExpectedAccount,
        ConfigKey::ContractName,
        ConfigKey::NetworkMode,
        ConfigKey::RpcUrl,
        ConfigKey::ProviderUrl,
        ConfigKey::ArtifactsDir,
        ConfigKey::ContractAddress,
        ConfigKey::DerivedAccounts,
    ];

    /// Keys reported by the config probe, in report order
    pub const PROBED: [ConfigKey; 5] = [
        ConfigKey::ProviderApiKey,
        ConfigKey::Mnemonic,
        ConfigKey::ExpectedAccount,
        ConfigKey::ContractName,
        ConfigKey::NetworkMode,
    ];

    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::ProviderApiKey => "INFURA_API_KEY",
            ConfigKey::Mnemonic => "MNEMONIC",
            ConfigKey::ExpectedAccount => "RENTALS_EXPECTED_ACCOUNT",
            ConfigKey::ContractName => "RENTALS_CONTRACT",
            ConfigKey::NetworkMode => "RENTALS_NETWORK",
            ConfigKey::RpcUrl => "RENTALS_RPC_URL",
            ConfigKey::ProviderUrl => "RENTALS_PROVIDER_URL",
            ConfigKey::ArtifactsDir => "RENTALS_ARTIFACTS_DIR",
            ConfigKey::ContractAddress => "RENTALS_CONTRACT_ADDRESS",
            ConfigKey::DerivedAccounts => "RENTALS_DERIVED_ACCOUNTS",
        }
    }

    /// Secrets are never echoed back
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::Mnemonic)
    }

    /// Default used when an optional key is absent
    fn default_note(&self) -> &'static str {
        match self {
            ConfigKey::ProviderApiKey => "only needed for remote mode",
            ConfigKey::Mnemonic => "no wallet will be derived",
            ConfigKey::ExpectedAccount => "the first available account is used",
            ConfigKey::ContractName => DEFAULT_CONTRACT,
            ConfigKey::NetworkMode => "local",
            ConfigKey::RpcUrl => DEFAULT_LOCAL_RPC_URL,
            ConfigKey::ProviderUrl => DEFAULT_PROVIDER_URL,
            ConfigKey::ArtifactsDir => DEFAULT_ARTIFACTS_DIR,
            ConfigKey::ContractAddress => "resolved from artifacts",
            ConfigKey::DerivedAccounts => "1",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.env_var())
    }
}

/// Raw configuration snapshot; an empty value is present, not absent
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    values: HashMap<ConfigKey, String>,
}

impl EnvironmentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` (non-fatal) and capture every known key from the process
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Capture every known key from the process environment
    pub fn from_env() -> Self {
        let values = ConfigKey::ALL
            .iter()
            .filter_map(|key| std::env::var(key.env_var()).ok().map(|v| (*key, v)))
            .collect();
        Self { values }
    }

    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn is_present(&self, key: ConfigKey) -> bool {
        self.values.contains_key(&key)
    }
}

impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("EnvironmentConfig").field("keys", &keys).finish()
    }
}

/// Reports presence of each configuration input without network access
pub struct ConfigProbe;

impl ConfigProbe {
    /// Keys the given mode cannot run without
    pub fn required_keys(mode: NetworkMode) -> &'static [ConfigKey] {
        match mode {
            NetworkMode::Local => &[],
            NetworkMode::Remote => &[ConfigKey::ProviderApiKey],
        }
    }

    /// Probe every reported key, in report order
    pub fn probe(
        env: &EnvironmentConfig,
        mode: NetworkMode,
    ) -> Vec<(ConfigKey, Result<String, DiagnosticError>)> {
        let required = Self::required_keys(mode);
        ConfigKey::PROBED
            .iter()
            .map(|key| (*key, Self::probe_key(env, *key, required.contains(key))))
            .collect()
    }

    /// Probe one key
    pub fn probe_key(
        env: &EnvironmentConfig,
        key: ConfigKey,
        required: bool,
    ) -> Result<String, DiagnosticError> {
        match env.get(key) {
            Some(value) => Ok(Self::render(key, value)),
            None if required => Err(DiagnosticError::missing_config(format!(
                "{} is not defined",
                key.env_var()
            ))),
            None => Ok(format!("not configured ({})", key.default_note())),
        }
    }

    fn render(key: ConfigKey, value: &str) -> String {
        if value.is_empty() {
            return "(empty)".to_string();
        }
        if key.is_secret() {
            return format!("configured ({} words)", value.split_whitespace().count());
        }
        value.to_string()
    }
}

/// Recovery phrase wrapper that never prints its contents
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase(String);

impl RecoveryPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoveryPhrase(<{} words>)", self.word_count())
    }
}

/// A configuration value that could not be used
#[derive(Debug)]
pub struct ConfigIssue {
    /// Variable, flag or file the value came from
    pub source: String,
    pub error: ConfigError,
    /// Value used in its place
    pub fallback: String,
}

impl ConfigIssue {
    pub fn new(source: impl fmt::Display, error: ConfigError, fallback: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            error,
            fallback: fallback.into(),
        }
    }

    pub fn to_diagnostic(&self) -> DiagnosticError {
        DiagnosticError::missing_config(format!("{}; using {}", self.error, self.fallback))
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (using {})", self.source, self.error, self.fallback)
    }
}

/// TOML profile definition from rentals.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkProfile {
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub provider_url: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,
    #[serde(default)]
    pub expected_account: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Default profile section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultProfile {
    pub network: Option<String>,
}

/// Complete rentals.toml contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RentalsToml {
    #[serde(default)]
    pub default: Option<DefaultProfile>,
    #[serde(default)]
    pub profile: HashMap<String, NetworkProfile>,
}

impl RentalsToml {
    /// Load from an explicit path, or rentals.toml in the working directory if it exists
    pub fn load(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from("rentals.toml");
                if !default.exists() {
                    return Ok(None);
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content).map(Some)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::TomlError)
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Active network mode
    pub mode: NetworkMode,
    /// Local chain endpoint
    pub rpc_url: String,
    /// Remote provider endpoint with an `{api_key}` placeholder
    pub provider_url: String,
    /// Provider API key (present but possibly empty)
    pub api_key: Option<String>,
    /// Wallet recovery phrase
    pub mnemonic: Option<RecoveryPhrase>,
    /// Account expected to own the contract
    pub expected_account: Option<String>,
    /// Contract name in the deployment registry
    pub contract: String,
    /// Directory holding compiled contract artifacts
    pub artifacts_dir: PathBuf,
    /// Deployed address override, bypassing the artifacts
    pub contract_address: Option<String>,
    /// How many accounts to derive from the recovery phrase
    pub derived_accounts: u32,
}

impl Settings {
    /// Resolve settings from a captured environment and an optional profile file
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found, if:
    /// - The network mode is not recognized
    /// - `RENTALS_DERIVED_ACCOUNTS` is not a positive integer
    /// - An endpoint is not an http(s) URL
    pub fn resolve(
        env: &EnvironmentConfig,
        file: Option<&RentalsToml>,
        mode_override: Option<NetworkMode>,
    ) -> Result<Self, ConfigError> {
        let (settings, issues) = Self::resolve_lenient(env, file, mode_override);
        match issues.into_iter().next() {
            Some(issue) => Err(issue.error),
            None => Ok(settings),
        }
    }

    /// Resolve settings, replacing every unusable value with its default.
    ///
    /// The replaced values come back as [`ConfigIssue`]s so a diagnostic run
    /// can report them instead of aborting.
    pub fn resolve_lenient(
        env: &EnvironmentConfig,
        file: Option<&RentalsToml>,
        mode_override: Option<NetworkMode>,
    ) -> (Self, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let mode = match mode_override {
            Some(mode) => mode,
            None => {
                let name = non_empty(env.get(ConfigKey::NetworkMode))
                    .map(str::to_string)
                    .or_else(|| file.and_then(|f| f.default.as_ref()).and_then(|d| d.network.clone()))
                    .unwrap_or_else(|| NetworkMode::Local.as_str().to_string());
                NetworkMode::parse(&name).unwrap_or_else(|err| {
                    issues.push(ConfigIssue::new(ConfigKey::NetworkMode, err, NetworkMode::Local.as_str()));
                    NetworkMode::Local
                })
            }
        };

        let profile = file.and_then(|f| f.profile.get(mode.as_str()));

        let rpc_url = non_empty(env.get(ConfigKey::RpcUrl))
            .map(str::to_string)
            .or_else(|| profile.and_then(|p| p.rpc_url.clone()))
            .unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string());

        let provider_url = non_empty(env.get(ConfigKey::ProviderUrl))
            .map(str::to_string)
            .or_else(|| profile.and_then(|p| p.provider_url.clone()))
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());

        let contract = non_empty(env.get(ConfigKey::ContractName))
            .map(str::to_string)
            .or_else(|| profile.and_then(|p| p.contract.clone()))
            .unwrap_or_else(|| DEFAULT_CONTRACT.to_string());

        let artifacts_dir = non_empty(env.get(ConfigKey::ArtifactsDir))
            .map(PathBuf::from)
            .or_else(|| profile.and_then(|p| p.artifacts_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

        let expected_account = non_empty(env.get(ConfigKey::ExpectedAccount))
            .map(str::to_string)
            .or_else(|| profile.and_then(|p| p.expected_account.clone()));

        let derived_accounts = match non_empty(env.get(ConfigKey::DerivedAccounts)) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    let err = ConfigError::InvalidValue {
                        key: ConfigKey::DerivedAccounts.env_var(),
                        value: raw.to_string(),
                    };
                    issues.push(ConfigIssue::new(ConfigKey::DerivedAccounts, err, "1"));
                    1
                }
            },
            None => 1,
        };

        let rpc_url = checked_url(ConfigKey::RpcUrl, rpc_url, DEFAULT_LOCAL_RPC_URL, &mut issues);
        let provider_url = checked_url(ConfigKey::ProviderUrl, provider_url, DEFAULT_PROVIDER_URL, &mut issues);

        // Empty API key and phrase stay present so the connector can flag them
        let api_key = env.get(ConfigKey::ProviderApiKey).map(|s| s.trim().to_string());
        let mnemonic = env.get(ConfigKey::Mnemonic).map(RecoveryPhrase::new);
        let contract_address = non_empty(env.get(ConfigKey::ContractAddress)).map(str::to_string);

        let settings = Settings {
            mode,
            rpc_url,
            provider_url,
            api_key,
            mnemonic,
            expected_account,
            contract,
            artifacts_dir,
            contract_address,
            derived_accounts,
        };
        (settings, issues)
    }

    /// Provider endpoint with the API key substituted
    pub fn provider_endpoint(&self, api_key: &str) -> String {
        self.provider_url.replace(API_KEY_PLACEHOLDER, api_key)
    }

    /// Endpoint the active mode connects to, for display
    pub fn endpoint(&self) -> String {
        match self.mode {
            NetworkMode::Local => self.rpc_url.clone(),
            NetworkMode::Remote => self.provider_endpoint(self.api_key.as_deref().unwrap_or("")),
        }
    }

    /// Print the resolved configuration
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════════╗");
        println!("║           RENTALS DIAGNOSTIC CONFIGURATION RESOLVED            ║");
        println!("╚════════════════════════════════════════════════════════════════╝");
        println!("  Network mode:        {}", self.mode);
        println!("  Endpoint:            {}", self.endpoint());

        match self.api_key.as_deref() {
            Some("") => println!("  API Key:             (empty)"),
            Some(key) => println!("  API Key:             {}", key),
            None => println!("  API Key:             (not configured)"),
        }

        match &self.mnemonic {
            Some(phrase) => println!("  Mnemonic:            configured ({} words)", phrase.word_count()),
            None => println!("  Mnemonic:            (not configured)"),
        }

        if let Some(ref account) = self.expected_account {
            println!("  Expected account:    {}", account);
        } else {
            println!("  Expected account:    (not configured)");
        }

        println!("  Contract:            {}", self.contract);
        match &self.contract_address {
            Some(address) => println!("  Contract address:    {} (override)", address),
            None => println!("  Artifacts:           {}", self.artifacts_dir.display()),
        }
        println!("  Derived accounts:    {}", self.derived_accounts);
        println!("╚════════════════════════════════════════════════════════════════╝");
    }

    /// Get configuration as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// Manual Serialize impl so the recovery phrase is never written out
impl Serialize for Settings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(9))?;
        map.serialize_entry("mode", &self.mode.to_string())?;
        map.serialize_entry("endpoint", &self.endpoint())?;
        map.serialize_entry("api_key", &self.api_key)?;
        map.serialize_entry("mnemonic_configured", &self.mnemonic.is_some())?;
        map.serialize_entry("expected_account", &self.expected_account)?;
        map.serialize_entry("contract", &self.contract)?;
        map.serialize_entry("artifacts_dir", &self.artifacts_dir)?;
        map.serialize_entry("contract_address", &self.contract_address)?;
        map.serialize_entry("derived_accounts", &self.derived_accounts)?;
        map.end()
    }
}

/// Keep an http(s) endpoint, or record it and fall back to `default`
fn checked_url(key: ConfigKey, url: String, default: &str, issues: &mut Vec<ConfigIssue>) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url;
    }
    let err = ConfigError::ValidationError(format!("RPC URL must start with http:// or https://: {}", url));
    issues.push(ConfigIssue::new(key, err, default));
    default.to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_network_mode_parse() {
        assert_eq!(NetworkMode::parse("local").unwrap(), NetworkMode::Local);
        assert_eq!(NetworkMode::parse("REMOTE").unwrap(), NetworkMode::Remote);
        assert_eq!(NetworkMode::parse("sepolia").unwrap(), NetworkMode::Remote);
        assert_eq!(NetworkMode::parse("ganache").unwrap(), NetworkMode::Local);
    }

    #[test]
    fn test_network_mode_invalid() {
        assert!(NetworkMode::parse("mainnet-fork").is_err());
    }

    #[test]
    fn test_probe_empty_configuration_does_not_fail_local() {
        let results = ConfigProbe::probe(&EnvironmentConfig::new(), NetworkMode::Local);
        assert_eq!(results.len(), ConfigKey::PROBED.len());
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }

    #[test]
    fn test_probe_missing_required_key_only() {
        let env = EnvironmentConfig::new()
            .with(ConfigKey::Mnemonic, PHRASE)
            .with(ConfigKey::ExpectedAccount, "0x6DB272507Df7E9dA070F7B71d66ac7a121b88587");
        let results = ConfigProbe::probe(&env, NetworkMode::Remote);

        let failed: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, ConfigKey::ProviderApiKey);
        assert_eq!(
            failed[0].1.as_ref().unwrap_err().kind,
            ErrorKind::MissingConfig
        );

        let account = results
            .iter()
            .find(|(k, _)| *k == ConfigKey::ExpectedAccount)
            .unwrap();
        assert_eq!(
            account.1.as_ref().unwrap(),
            "0x6DB272507Df7E9dA070F7B71d66ac7a121b88587"
        );
    }

    #[test]
    fn test_probe_masks_mnemonic_and_shows_api_key() {
        let env = EnvironmentConfig::new()
            .with(ConfigKey::ProviderApiKey, "abc123")
            .with(ConfigKey::Mnemonic, PHRASE);
        let results = ConfigProbe::probe(&env, NetworkMode::Remote);
        assert_eq!(results[0].1.as_ref().unwrap(), "abc123");
        assert_eq!(results[1].1.as_ref().unwrap(), "configured (12 words)");
        assert!(!results[1].1.as_ref().unwrap().contains("junk"));
    }

    #[test]
    fn test_empty_value_is_present() {
        let env = EnvironmentConfig::new().with(ConfigKey::ProviderApiKey, "");
        assert!(env.is_present(ConfigKey::ProviderApiKey));
        let result = ConfigProbe::probe_key(&env, ConfigKey::ProviderApiKey, true);
        assert_eq!(result.unwrap(), "(empty)");
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(&EnvironmentConfig::new(), None, None).unwrap();
        assert_eq!(settings.mode, NetworkMode::Local);
        assert_eq!(settings.rpc_url, DEFAULT_LOCAL_RPC_URL);
        assert_eq!(settings.contract, DEFAULT_CONTRACT);
        assert_eq!(settings.derived_accounts, 1);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_resolve_env_overrides_profile() {
        let file = RentalsToml::parse(
            r#"
            [default]
            network = "remote"

            [profile.remote]
            provider_url = "https://example.org/v3/{api_key}"
            contract = "FromToml"
            "#,
        )
        .unwrap();
        let env = EnvironmentConfig::new()
            .with(ConfigKey::ProviderApiKey, "key")
            .with(ConfigKey::ContractName, "FromEnv");
        let settings = Settings::resolve(&env, Some(&file), None).unwrap();

        assert_eq!(settings.mode, NetworkMode::Remote);
        assert_eq!(settings.contract, "FromEnv");
        assert_eq!(settings.endpoint(), "https://example.org/v3/key");
    }

    #[test]
    fn test_resolve_mode_override_wins() {
        let env = EnvironmentConfig::new().with(ConfigKey::NetworkMode, "remote");
        let settings = Settings::resolve(&env, None, Some(NetworkMode::Local)).unwrap();
        assert_eq!(settings.mode, NetworkMode::Local);
    }

    #[test]
    fn test_resolve_invalid_rpc_url() {
        let env = EnvironmentConfig::new().with(ConfigKey::RpcUrl, "ftp://example.com");
        assert!(Settings::resolve(&env, None, None).is_err());
    }

    #[test]
    fn test_resolve_invalid_derived_accounts() {
        let env = EnvironmentConfig::new().with(ConfigKey::DerivedAccounts, "0");
        assert!(matches!(
            Settings::resolve(&env, None, None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_lenient_resolve_falls_back_per_value() {
        let env = EnvironmentConfig::new()
            .with(ConfigKey::NetworkMode, "mainnet")
            .with(ConfigKey::DerivedAccounts, "two")
            .with(ConfigKey::RpcUrl, "ftp://example.com")
            .with(ConfigKey::ContractName, "Kept");
        let (settings, issues) = Settings::resolve_lenient(&env, None, None);

        assert_eq!(settings.mode, NetworkMode::Local);
        assert_eq!(settings.derived_accounts, 1);
        assert_eq!(settings.rpc_url, DEFAULT_LOCAL_RPC_URL);
        assert_eq!(settings.contract, "Kept");

        let sources: Vec<_> = issues.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, ["RENTALS_NETWORK", "RENTALS_DERIVED_ACCOUNTS", "RENTALS_RPC_URL"]);
        let err = issues[0].to_diagnostic();
        assert_eq!(err.kind, ErrorKind::MissingConfig);
        assert!(err.message.contains("mainnet"));
        assert!(err.message.contains("using local"));
    }

    #[test]
    fn test_strict_resolve_reports_first_issue() {
        let env = EnvironmentConfig::new().with(ConfigKey::NetworkMode, "mainnet");
        assert!(matches!(
            Settings::resolve(&env, None, None),
            Err(ConfigError::InvalidNetwork(ref name)) if name == "mainnet"
        ));
    }

    #[test]
    fn test_settings_json_hides_mnemonic() {
        let env = EnvironmentConfig::new().with(ConfigKey::Mnemonic, PHRASE);
        let settings = Settings::resolve(&env, None, None).unwrap();
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"mnemonic_configured\": true"));
        assert!(!json.contains("junk"));
        assert!(!format!("{:?}", settings).contains("junk"));
    }
}
