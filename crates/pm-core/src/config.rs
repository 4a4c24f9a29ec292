//! Configuration loading and validation.
//!
//! Resolution order (highest to lowest priority):
//! 1. CLI flags (applied with [`Config::apply`])
//! 2. Explicit file (`--config` or `PROCMAN_CONFIG`)
//! 3. XDG config home (`~/.config/procman/config.toml`)
//! 4. Built-in defaults

use crate::select::ChooserKind;
use crate::view::{FilterSpec, SortKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_CONFIG: &str = "PROCMAN_CONFIG";

/// Longest accepted refresh interval: one day.
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

const CONFIG_DIR_NAME: &str = "procman";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl From<ConfigError> for pm_common::Error {
    fn from(err: ConfigError) -> Self {
        pm_common::Error::Config(err.to_string())
    }
}

/// Everything procman can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between refresh cycles.
    pub refresh_interval_secs: u64,
    pub sort: SortKey,
    /// `field=value`; absent means no filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub chooser: ChooserKind,
    pub color: bool,
    /// Where exports are written; the working directory when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    pub include_kernel_threads: bool,
    pub scan_timeout_secs: u64,
    /// Pause after an action's feedback, before the refresh sleep.
    pub feedback_pause_ms: u64,
    /// Escalate to SIGKILL when SIGTERM is ignored.
    pub force_kill: bool,
    pub kill_grace_ms: u64,
    /// Stop after this many refresh cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 2,
            sort: SortKey::Pid,
            filter: None,
            chooser: ChooserKind::Auto,
            color: true,
            export_dir: None,
            include_kernel_threads: true,
            scan_timeout_secs: 10,
            feedback_pause_ms: 1_000,
            force_kill: false,
            kill_grace_ms: 3_000,
            max_cycles: None,
        }
    }
}

/// Values given on the command line. `None` leaves the file/default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub refresh_interval_secs: Option<u64>,
    pub sort: Option<SortKey>,
    pub filter: Option<String>,
    pub chooser: Option<ChooserKind>,
    pub no_color: bool,
    pub export_dir: Option<PathBuf>,
    pub hide_kernel_threads: bool,
    pub force_kill: bool,
    pub max_cycles: Option<u64>,
}

impl Config {
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(secs) = overrides.refresh_interval_secs {
            self.refresh_interval_secs = secs;
        }
        if let Some(sort) = overrides.sort {
            self.sort = sort;
        }
        if let Some(filter) = &overrides.filter {
            self.filter = Some(filter.clone());
        }
        if let Some(chooser) = overrides.chooser {
            self.chooser = chooser;
        }
        if overrides.no_color {
            self.color = false;
        }
        if let Some(dir) = &overrides.export_dir {
            self.export_dir = Some(dir.clone());
        }
        if overrides.hide_kernel_threads {
            self.include_kernel_threads = false;
        }
        if overrides.force_kill {
            self.force_kill = true;
        }
        if let Some(cycles) = overrides.max_cycles {
            self.max_cycles = Some(cycles);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(ConfigError::Validation(format!(
                "refresh_interval_secs must be at most {MAX_REFRESH_INTERVAL_SECS}"
            )));
        }
        if self.scan_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scan_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::Validation(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        self.filter_spec()?;
        Ok(())
    }

    /// The parsed filter, if one is configured.
    pub fn filter_spec(&self) -> Result<Option<FilterSpec>, ConfigError> {
        match self.filter.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) if text.eq_ignore_ascii_case("none") => Ok(None),
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|reason| ConfigError::Validation(format!("filter: {reason}"))),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn feedback_pause(&self) -> Duration {
        Duration::from_millis(self.feedback_pause_ms)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Config with the file it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    /// `None` when built-in defaults were used.
    pub source: Option<PathBuf>,
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority). Must exist.
    pub config_path: Option<PathBuf>,
    /// Directory searched for `config.toml` instead of the XDG location.
    pub config_dir: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with_env(options, |key| std::env::var_os(key).map(PathBuf::from))
}

/// [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env(
    options: &ConfigOptions,
    env: impl Fn(&str) -> Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let explicit = options.config_path.clone().or_else(|| env(ENV_CONFIG));
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = load_config_file(&path)?;
        return Ok(ResolvedConfig {
            config,
            source: Some(path),
        });
    }

    let dir = options
        .config_dir
        .clone()
        .or_else(|| default_config_dir(&env));
    if let Some(path) = dir.map(|d| d.join(CONFIG_FILE_NAME)) {
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(ResolvedConfig {
                config,
                source: Some(path),
            });
        }
    }

    Ok(ResolvedConfig {
        config: Config::default(),
        source: None,
    })
}

fn default_config_dir(env: &impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
    let base = env("XDG_CONFIG_HOME")
        .filter(|p| p.is_absolute())
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
    Some(base.join(CONFIG_DIR_NAME))
}

/// Read and parse one config file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
