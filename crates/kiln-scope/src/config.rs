use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kiln_types::{validate_scope_name, ReleaseType};

use crate::error::{ScopeError, ScopeResult};
use crate::persist::write_atomic;

/// File name of the scope configuration inside a scope directory.
pub const CONFIG_FILE: &str = "scope.toml";

/// Per-scope settings, stored as TOML in [`CONFIG_FILE`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Scope name; unscoped identifiers resolve against it.
    pub name: String,
    pub max_symlink_hops: usize,
    pub default_release_type: ReleaseType,
    /// Extra attempts after a transient transport failure.
    pub transport_retries: u32,
    pub request_timeout_ms: u64,
    pub hooks: HooksConfig,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            max_symlink_hops: 32,
            default_release_type: ReleaseType::Patch,
            transport_retries: 2,
            request_timeout_ms: 30_000,
            hooks: HooksConfig::default(),
        }
    }
}

/// External commands run after operations complete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub post_export_hook: Option<String>,
    pub post_import_hook: Option<String>,
    /// Run `ci_command` whenever this scope receives objects from a peer.
    pub ci_enable: bool,
    pub ci_command: Option<String>,
}

impl ScopeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ScopeResult<()> {
        validate_scope_name(&self.name)?;
        if self.max_symlink_hops == 0 {
            return Err(ScopeError::Config("max_symlink_hops must be at least 1".into()));
        }
        if self.hooks.ci_enable && self.hooks.ci_command.is_none() {
            return Err(ScopeError::Config("ci_enable is set but ci_command is missing".into()));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> ScopeResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| ScopeError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ScopeResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ScopeError::Config(e.to_string()))?;
        write_atomic(path, text.as_bytes())
    }
}
