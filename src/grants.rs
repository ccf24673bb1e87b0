//! The grant specification: who may reach which data, and through which role.
//!
//! Read from TOML or JSON depending on the file extension:
//!
//! ```toml
//! [[databases]]
//! cluster = "dev"
//! name = "jwr"
//!
//! [[roles]]
//! name = "bianalyst"
//! acl = ["public"]
//! databases = [{ cluster = "dev", name = "jwr" }]
//! dev_databases = [{ cluster = "dev" }]
//! external_databases = [{ name = "glue_lake", short_name = "lake" }]
//! policies = ["arn:aws:iam::aws:policy/ReadOnlyAccess"]
//!
//! [[users]]
//! email = "jwr@lunar.app"
//! username = "jwr"
//! roles = ["bianalyst"]
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantSpec {
    #[serde(default)]
    pub databases: Vec<DatabaseRef>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub users: Vec<UserSpec>,
}

/// A database on a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseRef {
    pub cluster: String,
    pub name: String,
}

/// A cluster on which every user of a role gets a personal database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevDatabaseRef {
    pub cluster: String,
}

/// A catalog database exposed in the warehouse as an external schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalDatabaseRef {
    /// Catalog database name
    pub name: String,
    /// Schema name inside the warehouse
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpec {
    pub name: String,
    /// Schemas the role's group may use
    #[serde(default)]
    pub acl: Vec<String>,
    #[serde(default)]
    pub databases: Vec<DatabaseRef>,
    #[serde(default)]
    pub dev_databases: Vec<DevDatabaseRef>,
    #[serde(default)]
    pub external_databases: Vec<ExternalDatabaseRef>,
    /// Managed policy ARNs attached to the role as-is
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserSpec {
    pub email: String,
    /// Prefix of the user's warehouse logins
    pub username: String,
    /// Names of roles the user may assume
    #[serde(default)]
    pub roles: Vec<String>,
}

impl GrantSpec {
    /// Load a specification, picking the format from the extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read grant specification {}", path.display()))?;
        let spec = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?,
            Some("toml") | None => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?,
            Some(other) => bail!(
                "Unsupported grant specification format '.{other}' (expected .toml or .json)"
            ),
        };
        log::debug!("Loaded grant specification from {}", path.display());
        Ok(spec)
    }

    pub fn role(&self, name: &str) -> Option<&RoleSpec> {
        self.roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}
