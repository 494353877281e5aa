//! Library location configuration.
//!
//! MagickCore is opened at runtime, so the only thing to configure is where
//! to find it and how to introduce ourselves to `MagickCoreGenesis`.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # library = "/usr/lib/x86_64-linux-gnu/libMagickCore-7.Q16HDRI.so.10"
//! search_names = ["libMagickCore-7.Q16HDRI.so.10", "libMagickCore-7.Q16HDRI.so", ...]
//! client_name = "magick-info"
//! ```
//!
//! When `library` is set it is the only candidate. Otherwise each entry of
//! `search_names` is handed to the dynamic loader in order, so plain sonames
//! resolve through the usual `LD_LIBRARY_PATH` / `DYLD_LIBRARY_PATH` search.
//!
//! The `MAGICK_INFO_LIBRARY` environment variable overrides `library`.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides [`MagickConfig::library`].
pub const LIBRARY_ENV: &str = "MAGICK_INFO_LIBRARY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Where to find MagickCore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MagickConfig {
    /// Explicit path to the MagickCore shared library.
    pub library: Option<PathBuf>,
    /// Library names tried in order when `library` is not set.
    pub search_names: Vec<String>,
    /// Client name passed to `MagickCoreGenesis`.
    pub client_name: String,
}

fn default_search_names() -> Vec<String> {
    [
        "libMagickCore-7.Q16HDRI.so.10",
        "libMagickCore-7.Q16HDRI.so",
        "libMagickCore-7.Q16.so.10",
        "libMagickCore-7.Q16.so",
        "libMagickCore-7.Q16HDRI.dylib",
        "libMagickCore-6.Q16.so.7",
        "libMagickCore-6.Q16.so.6",
        "libMagickCore-6.Q16.so",
        "CORE_RL_MagickCore_.dll",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for MagickConfig {
    fn default() -> Self {
        Self {
            library: None,
            search_names: default_search_names(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl MagickConfig {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.is_none() && self.search_names.is_empty() {
            return Err(ConfigError::Validation(
                "search_names must not be empty when library is unset".into(),
            ));
        }
        if self.search_names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "search_names entries must not be blank".into(),
            ));
        }
        if self.client_name.contains('\0') {
            return Err(ConfigError::Validation(
                "client_name must not contain NUL bytes".into(),
            ));
        }
        Ok(())
    }

    /// Libraries to try, in order.
    pub fn library_candidates(&self) -> Vec<PathBuf> {
        match &self.library {
            Some(path) => vec![path.clone()],
            None => self.search_names.iter().map(PathBuf::from).collect(),
        }
    }

    /// Apply the value of [`LIBRARY_ENV`], if any. Empty values are ignored.
    pub fn with_library_override(mut self, value: Option<OsString>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.library = Some(PathBuf::from(value));
        }
        self
    }
}

/// Load config from `path`, or the defaults when no path is given.
///
/// Rejects unknown keys, applies the environment override and validates the
/// result.
pub fn load_config(path: Option<&Path>) -> Result<MagickConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => MagickConfig::default(),
    };
    let config = config.with_library_override(std::env::var_os(LIBRARY_ENV));
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# magick-info configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Explicit path to the MagickCore shared library. When set, it is the only
# library tried. The MAGICK_INFO_LIBRARY environment variable overrides it.
# library = "/usr/lib/x86_64-linux-gnu/libMagickCore-7.Q16HDRI.so.10"

# Library names handed to the dynamic loader, in order, when `library` is unset.
search_names = [
    "libMagickCore-7.Q16HDRI.so.10",
    "libMagickCore-7.Q16HDRI.so",
    "libMagickCore-7.Q16.so.10",
    "libMagickCore-7.Q16.so",
    "libMagickCore-7.Q16HDRI.dylib",
    "libMagickCore-6.Q16.so.7",
    "libMagickCore-6.Q16.so.6",
    "libMagickCore-6.Q16.so",
    "CORE_RL_MagickCore_.dll",
]

# Client name passed to MagickCoreGenesis.
client_name = "magick-info"
"##
}
