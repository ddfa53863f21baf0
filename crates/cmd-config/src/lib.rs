//! Configuration management for CMD.
//!
//! Parses `cmd.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `discovery.root_dir`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override verbose conversion traces.
    pub verbose: Option<bool>,
    /// Override the directory searched for CMD files.
    pub root_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "cmd.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversion configuration.
    pub convert: ConvertConfig,
    /// Discovery configuration (paths are relative strings from TOML).
    discovery: DiscoveryConfigRaw,

    /// Resolved discovery configuration (set after loading).
    #[serde(skip)]
    pub discovery_resolved: DiscoveryConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Conversion configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Log the replacement queue and every rule that changes the text.
    pub verbose: bool,
}

/// Raw discovery configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DiscoveryConfigRaw {
    root_dir: Option<String>,
    exclude: Vec<String>,
}

/// Resolved discovery configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DiscoveryConfig {
    /// Directory searched for `*.cmd` files when none are named.
    pub root_dir: PathBuf,
    /// Glob patterns, relative to `root_dir`, of paths to skip.
    pub exclude: Vec<String>,
}

impl DiscoveryConfig {
    /// Compiled exclude patterns.
    ///
    /// Invalid patterns are skipped; [`Config::validate`] rejects them for
    /// loaded files.
    #[must_use]
    pub fn exclude_patterns(&self) -> Vec<glob::Pattern> {
        self.exclude
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`discovery.root_dir`").
        field: String,
        /// Error message (e.g., "${`SITE_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `cmd.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(verbose) = settings.verbose {
            self.convert.verbose = verbose;
        }
        if let Some(root_dir) = &settings.root_dir {
            self.discovery_resolved.root_dir.clone_from(root_dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        Self::discover_config_from(std::env::current_dir().ok()?)
    }

    fn discover_config_from(mut current: PathBuf) -> Option<PathBuf> {
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            convert: ConvertConfig::default(),
            discovery: DiscoveryConfigRaw::default(),
            discovery_resolved: DiscoveryConfig {
                root_dir: base.to_path_buf(),
                exclude: Vec::new(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_discovery()
    }

    fn validate_discovery(&self) -> Result<(), ConfigError> {
        require_non_empty(
            &self.discovery_resolved.root_dir.to_string_lossy(),
            "discovery.root_dir",
        )?;

        for pattern in &self.discovery_resolved.exclude {
            if let Err(err) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "discovery.exclude pattern `{pattern}` is invalid: {err}"
                )));
            }
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root_dir) = self.discovery.root_dir {
            self.discovery.root_dir = Some(expand::expand_env(root_dir, "discovery.root_dir")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    ///
    /// An explicitly empty `root_dir` is kept empty so validation reports it.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let root_dir = match self.discovery.root_dir.as_deref() {
            Some("") => PathBuf::new(),
            Some(root_dir) => config_dir.join(root_dir),
            None => config_dir.to_path_buf(),
        };

        self.discovery_resolved = DiscoveryConfig {
            root_dir,
            exclude: self.discovery.exclude.clone(),
        };

        Ok(())
    }
}
