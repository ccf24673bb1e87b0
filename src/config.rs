use anyhow::{Context, Result};
use declarative::PolicyRenderer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Overrides;
use crate::paths;

pub const CONFIG_FILE: &str = "grantctl.toml";
pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";

/// Contents of grantctl.toml; every key is optional
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub account_id: Option<String>,
    pub region: Option<String>,
    /// Grant specification, relative to the config directory
    pub grants: Option<String>,
    /// Local state file, relative to the config directory
    pub state: Option<String>,
}

impl ConfigFile {
    /// Load `path`, or defaults when it does not exist and was not asked for
    /// explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() && !explicit {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Effective settings after defaults, config file and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub account_id: String,
    pub region: String,
    pub grants: PathBuf,
    pub state: PathBuf,
}

impl Settings {
    /// Resolve settings from the config file and command-line overrides
    pub fn load(config: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let config_dir = paths::config_dir()?;
        let (path, explicit) = match config {
            Some(path) => (path.to_path_buf(), true),
            None => (config_dir.join(CONFIG_FILE), false),
        };
        let file = ConfigFile::load(&path, explicit)?;
        let base = path.parent().map_or(config_dir, Path::to_path_buf);
        Ok(Self::resolve(file, overrides, &base, &paths::state_dir()?))
    }

    /// Flags win over the file, the file wins over defaults
    pub fn resolve(
        file: ConfigFile,
        overrides: &Overrides,
        config_dir: &Path,
        state_dir: &Path,
    ) -> Self {
        let relative = |value: &str| {
            let path = paths::expand(value);
            if path.is_absolute() {
                path
            } else {
                config_dir.join(path)
            }
        };

        let grants = overrides.grants.clone().unwrap_or_else(|| {
            file.grants
                .as_deref()
                .map_or_else(|| config_dir.join("grants.toml"), relative)
        });
        let state = overrides.state.clone().unwrap_or_else(|| {
            file.state
                .as_deref()
                .map_or_else(|| state_dir.join("state.json"), relative)
        });

        Self {
            account_id: overrides
                .account_id
                .clone()
                .or(file.account_id)
                .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string()),
            region: overrides
                .region
                .clone()
                .or(file.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            grants,
            state,
        }
    }

    /// Audit log of apply events, kept next to the state file
    pub fn events_path(&self) -> PathBuf {
        self.state
            .parent()
            .map_or_else(|| PathBuf::from("events.jsonl"), |dir| dir.join("events.jsonl"))
    }

    pub fn renderer(&self) -> PolicyRenderer {
        PolicyRenderer::new(&self.account_id, &self.region)
    }
}
