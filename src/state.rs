use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{MemoryIdentity, MemoryLogin, MemoryWarehouse};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Local stand-in for the three external systems, persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default)]
    pub warehouse: MemoryWarehouse,

    pub identity: MemoryIdentity,

    #[serde(default)]
    pub login: MemoryLogin,

    /// Last time the state was written
    pub last_updated: Option<DateTime<Utc>>,
}

impl LocalState {
    pub fn new(account_id: &str) -> Self {
        Self {
            warehouse: MemoryWarehouse::new(),
            identity: MemoryIdentity::new(account_id),
            login: MemoryLogin::new(),
            last_updated: None,
        }
    }

    /// Load state from disk, or start empty if the file doesn't exist.
    ///
    /// A file written for another account is refused.
    pub fn load(path: &Path, account_id: &str) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, starting empty");
            return Ok(Self::new(account_id));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.identity.account_id() != account_id {
            bail!(
                "State file {} belongs to account {}, not the configured account {}",
                path.display(),
                state.identity.account_id(),
                account_id
            );
        }

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{LoginBackend, WarehouseBackend};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = LocalState::load(&dir.path().join("state.json"), "1").unwrap();
        assert_eq!(state.identity.account_id(), "1");
        assert!(state.warehouse.observe().unwrap().is_empty());
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = LocalState::new("1");
        state.warehouse.create_cluster("dev").unwrap();
        state.login.assign("jwr@lunar.app", "bianalyst").unwrap();
        state.save(&path).unwrap();

        let loaded = LocalState::load(&path, "1").unwrap();
        assert!(loaded.last_updated.is_some());
        assert!(loaded.warehouse.observe().unwrap().lookup_cluster("dev").is_some());
        let logins = loaded.login.observe().unwrap();
        assert!(
            logins
                .lookup_user("jwr@lunar.app")
                .unwrap()
                .is_assigned("bianalyst")
        );
        // the journal is per run
        assert!(loaded.warehouse.journal().is_empty());
    }

    #[test]
    fn test_other_account_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        LocalState::new("111").save(&path).unwrap();

        let err = LocalState::load(&path, "222").unwrap_err();
        assert!(err.to_string().contains("belongs to account 111"));
        assert!(LocalState::load(&path, "111").is_ok());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = LocalState::load(&path, "1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
