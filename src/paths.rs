//! Where grantctl keeps its files
//!
//! # Environment Variables
//!
//! - `GRANTCTL_CONFIG_DIR` - Override config directory (grantctl.toml, grants)
//! - `GRANTCTL_STATE_DIR` - Override state directory (state.json, events.jsonl)
//!
//! Otherwise `XDG_CONFIG_HOME` / `XDG_STATE_HOME` are honored, then the
//! platform default (`~/.config/grantctl`, `~/.local/state/grantctl`, or the
//! roaming/local app data directories on Windows).

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "GRANTCTL_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "GRANTCTL_STATE_DIR";

const APP: &str = "grantctl";

/// The two directories grantctl uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Config,
    State,
}

impl Dir {
    const fn override_var(self) -> &'static str {
        match self {
            Self::Config => ENV_CONFIG_DIR,
            Self::State => ENV_STATE_DIR,
        }
    }

    const fn xdg_var(self) -> &'static str {
        match self {
            Self::Config => "XDG_CONFIG_HOME",
            Self::State => "XDG_STATE_HOME",
        }
    }

    /// Location under the home directory
    fn home_default(self) -> PathBuf {
        match self {
            Self::Config => PathBuf::from(".config").join(APP),
            Self::State => PathBuf::from(".local").join("state").join(APP),
        }
    }

    #[cfg(windows)]
    fn platform_base(self) -> Option<PathBuf> {
        match self {
            Self::Config => dirs::config_dir(),
            Self::State => dirs::data_local_dir(),
        }
    }

    fn resolve(self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(self.override_var()) {
            let path = expand(&dir);
            log::debug!("Using {} from {}: {}", self.label(), self.override_var(), path.display());
            return Ok(path);
        }

        if let Ok(base) = std::env::var(self.xdg_var()) {
            let path = PathBuf::from(base).join(APP);
            log::debug!("Using {} from {}: {}", self.label(), self.xdg_var(), path.display());
            return Ok(path);
        }

        #[cfg(windows)]
        {
            if let Some(base) = self.platform_base() {
                return Ok(base.join(APP));
            }
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;
        let path = home.join(self.home_default());
        log::debug!("Using default {}: {}", self.label(), path.display());
        Ok(path)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Config => "config dir",
            Self::State => "state dir",
        }
    }
}

/// Directory holding grantctl.toml and, by default, the grant specification
pub fn config_dir() -> Result<PathBuf> {
    Dir::Config.resolve()
}

/// Directory holding the local state and the events log
pub fn state_dir() -> Result<PathBuf> {
    Dir::State.resolve()
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `vars` set (Some) or removed (None), restoring them after
    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let saved: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();
        for (key, value) in vars {
            // SAFETY: each test touches its own variables
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in saved {
            // SAFETY: as above
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
        result
    }

    #[test]
    fn test_config_dir_override() {
        with_env(&[(ENV_CONFIG_DIR, Some("/srv/grants"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/srv/grants"));
        });
    }

    #[test]
    fn test_config_dir_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, Some("~/access/grantctl-tilde-test"))], || {
            assert_eq!(
                config_dir().unwrap(),
                home.join("access").join("grantctl-tilde-test")
            );
        });
    }

    #[test]
    fn test_state_dir_from_xdg() {
        with_env(
            &[
                (ENV_STATE_DIR, None),
                ("XDG_STATE_HOME", Some("/tmp/xdg-state-test")),
            ],
            || {
                assert_eq!(
                    state_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-state-test/grantctl")
                );
            },
        );
    }

    #[test]
    fn test_home_defaults() {
        assert_eq!(
            Dir::State.home_default(),
            PathBuf::from(".local").join("state").join("grantctl")
        );
        assert_eq!(
            Dir::Config.home_default(),
            PathBuf::from(".config").join("grantctl")
        );
    }

    #[test]
    fn test_expand() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/grants.toml"), home.join("grants.toml"));
        assert_eq!(
            expand("/path/$NONEXISTENT_VAR_12345/file"),
            PathBuf::from("/path/$NONEXISTENT_VAR_12345/file")
        );
    }
}
