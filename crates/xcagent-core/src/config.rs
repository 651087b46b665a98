//! Symbol-name configuration for the private API bridge.
//!
//! Maps each logical [`SymbolRole`] to the ordered list of external symbol
//! names to try, and records whether the role is mandatory. The built-in
//! defaults match the names the host accessibility-testing framework exports
//! today; an optional JSON file at `~/.xcagent/symbols.json` can prepend or
//! replace names when a new OS release renames them.
//!
//! # Example
//!
//! ```no_run
//! use xcagent_core::config::{SymbolConfig, SymbolRole};
//!
//! // Load (returns defaults if the file doesn't exist)
//! let config = SymbolConfig::load();
//!
//! let entry = config.entry(SymbolRole::DebugLoggerGetter).unwrap();
//! println!("trying {:?}", entry.candidates);
//! ```
//!
//! A file overriding one role looks like:
//!
//! ```json
//! {
//!   "imagePath": "/Developer/Library/Frameworks/XCTest.framework/XCTest",
//!   "symbols": {
//!     "debug-logger-getter": { "candidates": ["XCDebugLoggerV2", "XCDebugLogger"] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::symbols::{DlsymResolver, ImageScope};

const CONFIG_DIRNAME: &str = ".xcagent";
const CONFIG_FILENAME: &str = "symbols.json";

/// Environment variable that overrides the config file location.
pub const SYMBOLS_CONFIG_ENV: &str = "XCAGENT_SYMBOLS_CONFIG";

/// Errors that can occur while loading or validating symbol configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A role was configured with no names to try.
    #[error("No candidate symbol names for {0}")]
    NoCandidates(SymbolRole),

    /// A role the bridge cannot replace was marked optional.
    #[error("{0} has no stand-in and must stay mandatory")]
    MandatoryDemoted(SymbolRole),

    /// The home directory could not be determined.
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// A logical symbol the bridge needs, independent of its external name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolRole {
    /// Accessibility attribute constant for "is visible".
    IsVisibleAttribute,
    /// Accessibility attribute constant for "is element".
    IsElementAttribute,
    /// Getter for the framework's debug logger.
    DebugLoggerGetter,
    /// Setter for the framework's debug logger.
    DebugLoggerSetter,
    /// Maps string attributes to accessibility attribute ids.
    AttributesForStringAttributes,
}

impl SymbolRole {
    /// Every role, in initialization order.
    pub const ALL: [SymbolRole; 5] = [
        SymbolRole::IsVisibleAttribute,
        SymbolRole::IsElementAttribute,
        SymbolRole::DebugLoggerGetter,
        SymbolRole::DebugLoggerSetter,
        SymbolRole::AttributesForStringAttributes,
    ];

    /// Whether the bridge has a stand-in for this role.
    ///
    /// Roles without a stand-in are always mandatory.
    pub fn has_stand_in(self) -> bool {
        !matches!(
            self,
            SymbolRole::IsVisibleAttribute | SymbolRole::IsElementAttribute
        )
    }

    /// The external symbol name the host framework currently exports.
    pub fn default_symbol_name(self) -> &'static str {
        match self {
            SymbolRole::IsVisibleAttribute => "XC_kAXXCAttributeIsVisible",
            SymbolRole::IsElementAttribute => "XC_kAXXCAttributeIsElement",
            SymbolRole::DebugLoggerGetter => "XCDebugLogger",
            SymbolRole::DebugLoggerSetter => "XCSetDebugLogger",
            SymbolRole::AttributesForStringAttributes => {
                "XCAXAccessibilityAttributesForStringAttributes"
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolRole::IsVisibleAttribute => "is-visible-attribute",
            SymbolRole::IsElementAttribute => "is-element-attribute",
            SymbolRole::DebugLoggerGetter => "debug-logger-getter",
            SymbolRole::DebugLoggerSetter => "debug-logger-setter",
            SymbolRole::AttributesForStringAttributes => "attributes-for-string-attributes",
        }
    }
}

impl fmt::Display for SymbolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one role is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    /// External names to try, first match wins.
    pub candidates: Vec<String>,

    /// Whether failing to resolve any candidate aborts initialization.
    /// When omitted in a file, the role's built-in classification applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory: Option<bool>,
}

impl SymbolEntry {
    fn default_for(role: SymbolRole) -> Self {
        Self {
            candidates: vec![role.default_symbol_name().to_string()],
            mandatory: Some(!role.has_stand_in()),
        }
    }
}

/// Symbol-name configuration for the private API bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolConfig {
    /// Path of the framework image to search first. `None` searches every
    /// loaded image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    /// Search every loaded image when the configured image misses.
    #[serde(default = "default_fallback")]
    pub fallback_to_global: bool,

    /// Per-role overrides. Roles absent here use their built-in entry.
    #[serde(default)]
    pub symbols: BTreeMap<SymbolRole, SymbolEntry>,

    /// Ask the resolved string-attribute mapper for the attribute ids while
    /// loading. Only enable this when the mapper symbol points at a function
    /// with the C signature of
    /// [`AttributesForStringAttributesFn`](crate::bridge::AttributesForStringAttributesFn),
    /// such as an agent-side shim; the framework's own export takes an
    /// object and returns an object.
    #[serde(default)]
    pub map_attribute_ids: bool,
}

fn default_fallback() -> bool {
    true
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            fallback_to_global: true,
            symbols: SymbolRole::ALL
                .into_iter()
                .map(|role| (role, SymbolEntry::default_for(role)))
                .collect(),
            map_attribute_ids: false,
        }
    }
}

impl SymbolConfig {
    /// Location of the config file: `$XCAGENT_SYMBOLS_CONFIG` if set,
    /// otherwise `~/.xcagent/symbols.json`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(SYMBOLS_CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIRNAME).join(CONFIG_FILENAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load config from the default location.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be used.
    pub fn load() -> Self {
        let path = match Self::path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "using built-in symbol names");
                return Self::default();
            }
        };
        if !path.exists() {
            debug!(path = %path.display(), "no symbol config file, using built-in names");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring unusable symbol config");
            Self::default()
        })
    }

    /// Load and validate config from `path`, merged over the built-in table.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate config JSON, merged over the built-in table.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overrides: SymbolConfig = serde_json::from_str(json)?;
        let config = Self::default().merged(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn merged(mut self, overrides: SymbolConfig) -> Self {
        if overrides.image_path.is_some() {
            self.image_path = overrides.image_path;
        }
        self.fallback_to_global = overrides.fallback_to_global;
        self.map_attribute_ids = overrides.map_attribute_ids;
        for (role, mut entry) in overrides.symbols {
            if entry.mandatory.is_none() {
                entry.mandatory = Some(!role.has_stand_in());
            }
            self.symbols.insert(role, entry);
        }
        self
    }

    /// Check that every role has candidates and that roles without a
    /// stand-in remain mandatory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (role, entry) in &self.symbols {
            if entry.candidates.is_empty() {
                return Err(ConfigError::NoCandidates(*role));
            }
            if !role.has_stand_in() && entry.mandatory == Some(false) {
                return Err(ConfigError::MandatoryDemoted(*role));
            }
        }
        Ok(())
    }

    /// The lookup entry for `role`, if configured.
    pub fn entry(&self, role: SymbolRole) -> Option<&SymbolEntry> {
        self.symbols.get(&role)
    }

    /// Whether `role` must resolve for initialization to succeed.
    pub fn is_mandatory(&self, role: SymbolRole) -> bool {
        self.entry(role)
            .and_then(|entry| entry.mandatory)
            .unwrap_or(!role.has_stand_in())
    }

    /// A dynamic-linker resolver searching the configured image.
    pub fn resolver(&self) -> DlsymResolver {
        let scope = match &self.image_path {
            Some(path) => ImageScope::Image(path.clone()),
            None => ImageScope::AllLoaded,
        };
        DlsymResolver::new(scope).with_fallback(self.fallback_to_global)
    }
}
