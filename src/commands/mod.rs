//! Subcommand implementations

pub mod apply;
pub mod plan;
pub mod show;

use anyhow::{Context as _, Result};

use crate::config::Settings;
use crate::grants::GrantSpec;
use crate::resolver::{Desired, resolve};
use crate::state::LocalState;

/// Everything a reconciliation command works on
pub struct Session {
    pub settings: Settings,
    pub desired: Desired,
    pub state: LocalState,
}

impl Session {
    /// Load the grants, resolve them and load the local state
    pub fn open(settings: Settings) -> Result<Self> {
        let desired = resolve_grants(&settings)?;
        let state = LocalState::load(&settings.state, &settings.account_id)?;
        Ok(Self {
            settings,
            desired,
            state,
        })
    }
}

pub fn resolve_grants(settings: &Settings) -> Result<Desired> {
    let spec = GrantSpec::load(&settings.grants)?;
    resolve(&spec)
        .with_context(|| format!("Failed to resolve {}", settings.grants.display()))
}
