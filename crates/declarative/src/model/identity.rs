//! Identity model: roles and the database login policies attached to them.

use serde::{Deserialize, Serialize};

use super::name::{Keyed, Named, normalize};

/// One (cluster, database-or-username) pair a login policy allows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseAccess {
    pub cluster_identifier: String,
    pub name: String,
}

/// Permits one subject to obtain credentials for a set of databases
/// under a single database-login username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseLoginPolicy {
    pub database_username: String,
    pub email: String,
    databases: Vec<DatabaseAccess>,
}

/// A role that can be assumed to obtain temporary warehouse credentials
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    login_policies: Named<DatabaseLoginPolicy>,
    managed_policies: Vec<String>,
}

/// Every declared role
#[derive(Debug, Clone, Default)]
pub struct IdentityModel {
    roles: Named<Role>,
}

impl Keyed for DatabaseLoginPolicy {
    fn key(&self) -> &str {
        &self.database_username
    }
}

impl Keyed for Role {
    fn key(&self) -> &str {
        &self.name
    }
}

impl IdentityModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_role(&mut self, name: &str) -> &mut Role {
        self.roles.declare_with(name, Role::new)
    }

    pub fn lookup_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn roles(&self) -> &Named<Role> {
        &self.roles
    }
}

impl Role {
    fn new(name: String) -> Self {
        Self {
            name,
            login_policies: Named::new(),
            managed_policies: Vec::new(),
        }
    }

    /// Declare the login policy for `database_username`, authorizing `email`.
    pub fn declare_login_policy(
        &mut self,
        email: &str,
        database_username: &str,
    ) -> &mut DatabaseLoginPolicy {
        self.login_policies.declare_with(database_username, |database_username| {
            DatabaseLoginPolicy {
                database_username,
                email: email.to_string(),
                databases: Vec::new(),
            }
        })
    }

    pub fn lookup_login_policy(&self, database_username: &str) -> Option<&DatabaseLoginPolicy> {
        self.login_policies.get(database_username)
    }

    pub fn login_policies(&self) -> &Named<DatabaseLoginPolicy> {
        &self.login_policies
    }

    /// Reference a managed policy by ARN. ARNs are compared verbatim.
    pub fn reference_policy(&mut self, arn: &str) {
        if !self.managed_policies.iter().any(|p| p == arn) {
            self.managed_policies.push(arn.to_string());
        }
    }

    pub fn managed_policies(&self) -> &[String] {
        &self.managed_policies
    }

    pub fn references_policy(&self, arn: &str) -> bool {
        self.managed_policies.iter().any(|p| p == arn)
    }
}

impl DatabaseLoginPolicy {
    /// The policy is named after the database-login username
    pub fn name(&self) -> &str {
        &self.database_username
    }

    /// Allow logging into `name` on `cluster_identifier`. Repeats are ignored.
    pub fn allow(&mut self, cluster_identifier: &str, name: &str) {
        let access = DatabaseAccess {
            cluster_identifier: normalize(cluster_identifier),
            name: normalize(name),
        };
        if !self.databases.contains(&access) {
            self.databases.push(access);
        }
    }

    /// Allow-entries in declaration order
    pub fn databases(&self) -> &[DatabaseAccess] {
        &self.databases
    }
}
