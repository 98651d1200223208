//! Bridge configuration
//!
//! Loaded from the `[interop]` table of a TOML file:
//!
//! ```toml
//! [interop]
//! default_access = "full"        # none | read_only | full
//! ignore_dynamic = false
//! dynamic_fallback = true
//! variant_fallback = true
//!
//! [interop.identity_cache]
//! compaction_threshold = 1048576
//! compaction_interval_secs = 300
//!
//! [interop.assemblies]
//! "Contoso.Core" = "full"
//! "plugins.*" = "read_only"
//! ```
//!
//! Every key is optional.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use raya_interop_sdk::InteropError;

use crate::access::{AssemblyRules, ScriptAccessPolicy};
use crate::identity::CompactionPolicy;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read interop config: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse interop config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Semantically invalid value
    #[error("Invalid interop config: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for InteropError {
    fn from(e: ConfigError) -> Self {
        InteropError::Config(e.to_string())
    }
}

/// Identity cache tuning
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityCacheConfig {
    /// Minimum entries before expired handles are swept
    pub compaction_threshold: usize,
    /// Minimum seconds between sweeps
    pub compaction_interval_secs: u64,
}

impl Default for IdentityCacheConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: CompactionPolicy::DEFAULT_THRESHOLD,
            compaction_interval_secs: CompactionPolicy::DEFAULT_INTERVAL.as_secs(),
        }
    }
}

/// Interop bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Policy applied when no override matches
    pub default_access: ScriptAccessPolicy,
    /// Treat dynamic types as plain host types when classifying invocability
    pub ignore_dynamic: bool,
    /// Try the dynamic bridge when introspection misses
    pub dynamic_fallback: bool,
    /// Try the variant adapter when the dynamic bridge misses
    pub variant_fallback: bool,
    /// Identity cache tuning
    pub identity_cache: IdentityCacheConfig,
    /// Assembly name pattern → policy
    pub assemblies: BTreeMap<String, ScriptAccessPolicy>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_access: ScriptAccessPolicy::Full,
            ignore_dynamic: false,
            dynamic_fallback: true,
            variant_fallback: true,
            identity_cache: IdentityCacheConfig::default(),
            assemblies: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    interop: BridgeConfig,
}

impl BridgeConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.interop.validate()?;
        Ok(file.interop)
    }

    /// Check value ranges and assembly patterns
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity_cache.compaction_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "identity_cache.compaction_threshold must be positive".to_string(),
            ));
        }
        for pattern in self.assemblies.keys() {
            if !is_valid_pattern(pattern) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid assembly pattern: {}. Wildcards are only allowed as '*', '**' or a trailing '.*' / '.**'",
                    pattern
                )));
            }
        }
        Ok(())
    }

    /// Assembly rules for the policy chain
    pub fn assembly_rules(&self) -> AssemblyRules {
        let mut rules = AssemblyRules::new();
        for (pattern, policy) in &self.assemblies {
            rules.add(pattern.clone(), *policy);
        }
        rules
    }

    /// Identity cache compaction policy
    pub fn compaction_policy(&self) -> CompactionPolicy {
        CompactionPolicy {
            threshold: self.identity_cache.compaction_threshold,
            interval: Duration::from_secs(self.identity_cache.compaction_interval_secs),
        }
    }
}

fn is_valid_pattern(pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern == "*" || pattern == "**" {
        return true;
    }
    let stem = pattern
        .strip_suffix(".**")
        .or_else(|| pattern.strip_suffix(".*"))
        .unwrap_or(pattern);
    !stem.is_empty() && !stem.contains('*')
}
