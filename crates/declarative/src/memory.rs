//! In-memory backends.
//!
//! These hold the state of each external system in plain collections and
//! enforce the same referential rules the real control planes do: a child
//! cannot be created under a missing parent, and a parent cannot be removed
//! while something still depends on it. Every successful call is appended
//! to a journal so tests can assert on the exact call sequence, and a call
//! can be made to fail on demand.
//!
//! The state serializes with serde, which lets the CLI keep a local
//! stand-in for each system between runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backend::{AttachedPolicy, IdentityBackend, LoginBackend, RoleInfo, WarehouseBackend};
use crate::error::{Error, Result};
use crate::model::{LoginModel, WarehouseModel};
use crate::policy::LOGIN_POLICY_PATH;
use crate::types::{Grant, Scope};

/// Records calls and injects failures
#[derive(Debug, Clone, Default)]
struct Journal {
    calls: Vec<String>,
    fail_on: Option<String>,
}

impl Journal {
    fn check(&self, system: &'static str, call: &str) -> Result<()> {
        match &self.fail_on {
            Some(prefix) if call.starts_with(prefix.as_str()) => {
                Err(Error::backend(system, format!("injected failure on `{call}`")))
            }
            _ => Ok(()),
        }
    }

    fn record(&mut self, call: String) {
        log::trace!("{call}");
        self.calls.push(call);
    }
}

// ============================================================================
// Warehouse
// ============================================================================

const WAREHOUSE: &str = "warehouse";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GroupState {
    name: String,
    #[serde(default)]
    grants: Vec<Grant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserState {
    name: String,
    #[serde(default)]
    group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExternalSchemaState {
    name: String,
    catalog: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Members {
    #[serde(default)]
    groups: Vec<GroupState>,
    #[serde(default)]
    users: Vec<UserState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseState {
    name: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    external_schemas: Vec<ExternalSchemaState>,
    #[serde(flatten)]
    members: Members,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ClusterState {
    identifier: String,
    #[serde(default)]
    databases: Vec<DatabaseState>,
    #[serde(flatten)]
    members: Members,
}

/// In-memory warehouse system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryWarehouse {
    #[serde(default)]
    clusters: Vec<ClusterState>,
    #[serde(skip)]
    journal: Journal,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful calls in order
    pub fn journal(&self) -> &[String] {
        &self.journal.calls
    }

    pub fn clear_journal(&mut self) {
        self.journal.calls.clear();
    }

    /// Make every call whose journal line starts with `call` fail
    pub fn fail_on(&mut self, call: &str) {
        self.journal.fail_on = Some(call.to_string());
    }

    pub fn clear_failure(&mut self) {
        self.journal.fail_on = None;
    }

    fn cluster_mut(&mut self, cluster: &str) -> Result<&mut ClusterState> {
        self.clusters
            .iter_mut()
            .find(|c| c.identifier == cluster)
            .ok_or_else(|| Error::not_found("cluster", cluster))
    }

    fn database_mut(&mut self, cluster: &str, database: &str) -> Result<&mut DatabaseState> {
        self.cluster_mut(cluster)?
            .databases
            .iter_mut()
            .find(|d| d.name == database)
            .ok_or_else(|| Error::not_found("database", format!("{cluster}/{database}")))
    }

    fn members_mut(&mut self, scope: &Scope) -> Result<&mut Members> {
        match scope {
            Scope::Cluster { cluster } => Ok(&mut self.cluster_mut(cluster)?.members),
            Scope::Database { cluster, database } => {
                Ok(&mut self.database_mut(cluster, database)?.members)
            }
        }
    }

    fn group_mut(&mut self, scope: &Scope, group: &str) -> Result<&mut GroupState> {
        self.members_mut(scope)?
            .groups
            .iter_mut()
            .find(|g| g.name == group)
            .ok_or_else(|| Error::not_found("group", scope.qualify(group)))
    }

    /// Fails unless `owner` is a user of `cluster`
    fn require_owner(&mut self, cluster: &str, owner: Option<&str>) -> Result<()> {
        let Some(owner) = owner else {
            return Ok(());
        };
        let state = self.cluster_mut(cluster)?;
        if !state.members.users.iter().any(|u| u.name == owner) {
            return Err(Error::not_found("user", Scope::cluster(cluster).qualify(owner)));
        }
        Ok(())
    }

    fn run<T>(
        &mut self,
        call: String,
        primitive: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.journal.check(WAREHOUSE, &call)?;
        let value = primitive(self)?;
        self.journal.record(call);
        Ok(value)
    }
}

fn conflict(system: &'static str, what: impl std::fmt::Display) -> Error {
    Error::backend(system, format!("{what} still has dependents"))
}

impl WarehouseBackend for MemoryWarehouse {
    fn observe(&self) -> Result<WarehouseModel> {
        self.journal.check(WAREHOUSE, "observe")?;
        let mut model = WarehouseModel::new();
        for state in &self.clusters {
            let cluster = model.declare_cluster(&state.identifier);
            for group in &state.members.groups {
                let declared = cluster.declare_group(&group.name);
                for grant in &group.grants {
                    match grant {
                        Grant::Schema { name } => declared.grant_schema(name),
                        Grant::External { name, catalog } => {
                            declared.grant_external_schema(name, catalog);
                        }
                    }
                }
            }
            for db in &state.databases {
                let database = match &db.owner {
                    Some(owner) => cluster.declare_database_with_owner(&db.name, owner),
                    None => cluster.declare_database(&db.name),
                };
                for schema in &db.external_schemas {
                    database.declare_external_schema(&schema.name, &schema.catalog);
                }
                for group in &db.members.groups {
                    let declared = database.declare_group(&group.name);
                    for grant in &group.grants {
                        match grant {
                            Grant::Schema { name } => declared.grant_schema(name),
                            Grant::External { name, catalog } => {
                                declared.grant_external_schema(name, catalog);
                            }
                        }
                    }
                }
                for user in &db.members.users {
                    database.declare_user(&user.name, user.group.as_deref());
                }
            }
            for user in &state.members.users {
                cluster.declare_user(&user.name, user.group.as_deref());
            }
        }
        Ok(model)
    }

    fn create_cluster(&mut self, cluster: &str) -> Result<()> {
        self.run(format!("create_cluster {cluster}"), |w| {
            if !w.clusters.iter().any(|c| c.identifier == cluster) {
                w.clusters.push(ClusterState {
                    identifier: cluster.to_string(),
                    ..Default::default()
                });
            }
            Ok(())
        })
    }

    fn delete_cluster(&mut self, cluster: &str) -> Result<()> {
        self.run(format!("delete_cluster {cluster}"), |w| {
            if let Some(state) = w.clusters.iter().find(|c| c.identifier == cluster)
                && (!state.databases.is_empty()
                    || !state.members.groups.is_empty()
                    || !state.members.users.is_empty())
            {
                return Err(conflict(WAREHOUSE, format!("cluster {cluster}")));
            }
            w.clusters.retain(|c| c.identifier != cluster);
            Ok(())
        })
    }

    fn create_database(
        &mut self,
        cluster: &str,
        database: &str,
        owner: Option<&str>,
    ) -> Result<()> {
        self.run(format!("create_database {cluster}/{database}"), |w| {
            w.require_owner(cluster, owner)?;
            let state = w.cluster_mut(cluster)?;
            if !state.databases.iter().any(|d| d.name == database) {
                state.databases.push(DatabaseState {
                    name: database.to_string(),
                    owner: owner.map(str::to_string),
                    ..Default::default()
                });
            }
            Ok(())
        })
    }

    fn alter_database_owner(
        &mut self,
        cluster: &str,
        database: &str,
        owner: Option<&str>,
    ) -> Result<()> {
        self.run(format!("alter_database_owner {cluster}/{database}"), |w| {
            w.require_owner(cluster, owner)?;
            w.database_mut(cluster, database)?.owner = owner.map(str::to_string);
            Ok(())
        })
    }

    fn drop_database(&mut self, cluster: &str, database: &str) -> Result<()> {
        self.run(format!("drop_database {cluster}/{database}"), |w| {
            let state = w.cluster_mut(cluster)?;
            if let Some(db) = state.databases.iter().find(|d| d.name == database)
                && (!db.members.groups.is_empty()
                    || !db.members.users.is_empty()
                    || !db.external_schemas.is_empty())
            {
                return Err(conflict(WAREHOUSE, format!("database {cluster}/{database}")));
            }
            state.databases.retain(|d| d.name != database);
            Ok(())
        })
    }

    fn create_external_schema(
        &mut self,
        cluster: &str,
        database: &str,
        schema: &str,
        catalog: &str,
    ) -> Result<()> {
        self.run(
            format!("create_external_schema {cluster}/{database}/{schema}"),
            |w| {
                let db = w.database_mut(cluster, database)?;
                if !db.external_schemas.iter().any(|s| s.name == schema) {
                    db.external_schemas.push(ExternalSchemaState {
                        name: schema.to_string(),
                        catalog: catalog.to_string(),
                    });
                }
                Ok(())
            },
        )
    }

    fn drop_external_schema(&mut self, cluster: &str, database: &str, schema: &str) -> Result<()> {
        self.run(
            format!("drop_external_schema {cluster}/{database}/{schema}"),
            |w| {
                w.database_mut(cluster, database)?
                    .external_schemas
                    .retain(|s| s.name != schema);
                Ok(())
            },
        )
    }

    fn create_group(&mut self, scope: &Scope, group: &str) -> Result<()> {
        self.run(format!("create_group {}", scope.qualify(group)), |w| {
            let members = w.members_mut(scope)?;
            if !members.groups.iter().any(|g| g.name == group) {
                members.groups.push(GroupState {
                    name: group.to_string(),
                    grants: Vec::new(),
                });
            }
            Ok(())
        })
    }

    fn drop_group(&mut self, scope: &Scope, group: &str) -> Result<()> {
        self.run(format!("drop_group {}", scope.qualify(group)), |w| {
            let members = w.members_mut(scope)?;
            if members
                .users
                .iter()
                .any(|u| u.group.as_deref() == Some(group))
            {
                return Err(conflict(WAREHOUSE, format!("group {}", scope.qualify(group))));
            }
            members.groups.retain(|g| g.name != group);
            Ok(())
        })
    }

    fn grant(&mut self, scope: &Scope, group: &str, grant: &Grant) -> Result<()> {
        self.run(
            format!("grant {} on {}", scope.qualify(group), grant.name()),
            |w| {
                if let Grant::External { name, .. } = grant {
                    let cluster = scope.cluster_identifier();
                    let exists = w
                        .cluster_mut(cluster)?
                        .databases
                        .iter()
                        .any(|d| d.external_schemas.iter().any(|s| s.name == *name));
                    if !exists {
                        return Err(Error::not_found(
                            "external schema",
                            Scope::cluster(cluster).qualify(name),
                        ));
                    }
                }
                let state = w.group_mut(scope, group)?;
                if !state.grants.iter().any(|g| g.name() == grant.name()) {
                    state.grants.push(grant.clone());
                }
                Ok(())
            },
        )
    }

    fn revoke(&mut self, scope: &Scope, group: &str, grant: &Grant) -> Result<()> {
        self.run(
            format!("revoke {} on {}", scope.qualify(group), grant.name()),
            |w| {
                w.group_mut(scope, group)?
                    .grants
                    .retain(|g| g.name() != grant.name());
                Ok(())
            },
        )
    }

    fn create_user(&mut self, scope: &Scope, user: &str, group: Option<&str>) -> Result<()> {
        self.run(format!("create_user {}", scope.qualify(user)), |w| {
            let members = w.members_mut(scope)?;
            if let Some(group) = group
                && !members.groups.iter().any(|g| g.name == group)
            {
                return Err(Error::not_found("group", scope.qualify(group)));
            }
            if !members.users.iter().any(|u| u.name == user) {
                members.users.push(UserState {
                    name: user.to_string(),
                    group: group.map(str::to_string),
                });
            }
            Ok(())
        })
    }

    fn alter_user_group(&mut self, scope: &Scope, user: &str, group: Option<&str>) -> Result<()> {
        self.run(format!("alter_user_group {}", scope.qualify(user)), |w| {
            let members = w.members_mut(scope)?;
            if let Some(group) = group
                && !members.groups.iter().any(|g| g.name == group)
            {
                return Err(Error::not_found("group", scope.qualify(group)));
            }
            let state = members
                .users
                .iter_mut()
                .find(|u| u.name == user)
                .ok_or_else(|| Error::not_found("user", scope.qualify(user)))?;
            state.group = group.map(str::to_string);
            Ok(())
        })
    }

    fn drop_user(&mut self, scope: &Scope, user: &str) -> Result<()> {
        self.run(format!("drop_user {}", scope.qualify(user)), |w| {
            if let Scope::Cluster { cluster } = scope
                && let Some(owned) = w
                    .cluster_mut(cluster)?
                    .databases
                    .iter()
                    .find(|d| d.owner.as_deref() == Some(user))
            {
                return Err(conflict(
                    WAREHOUSE,
                    format!("user {} owning database {}", scope.qualify(user), owned.name),
                ));
            }
            w.members_mut(scope)?.users.retain(|u| u.name != user);
            Ok(())
        })
    }
}

// ============================================================================
// Identity
// ============================================================================

const IDENTITY: &str = "identity";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleState {
    name: String,
    arn: String,
    #[serde(default)]
    attached: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyState {
    name: String,
    arn: String,
    document: String,
}

/// In-memory identity system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIdentity {
    account_id: String,
    #[serde(default)]
    roles: Vec<RoleState>,
    #[serde(default)]
    policies: Vec<PolicyState>,
    #[serde(skip)]
    journal: Journal,
}

impl MemoryIdentity {
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            ..Default::default()
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Successful calls in order
    pub fn journal(&self) -> &[String] {
        &self.journal.calls
    }

    pub fn clear_journal(&mut self) {
        self.journal.calls.clear();
    }

    /// Make every call whose journal line starts with `call` fail
    pub fn fail_on(&mut self, call: &str) {
        self.journal.fail_on = Some(call.to_string());
    }

    pub fn clear_failure(&mut self) {
        self.journal.fail_on = None;
    }

    /// Stored document of the policy named `name`
    pub fn document(&self, name: &str) -> Option<&str> {
        self.policies
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.document.as_str())
    }

    /// Seed a customer policy managed outside the login path, returning its ARN
    pub fn create_managed_policy(&mut self, name: &str, document: &str) -> String {
        let arn = format!("{}{}", self.customer_prefix(), name);
        self.policies.retain(|p| p.arn != arn);
        self.policies.push(PolicyState {
            name: name.to_string(),
            arn: arn.clone(),
            document: document.to_string(),
        });
        arn
    }

    fn customer_prefix(&self) -> String {
        format!("arn:aws:iam::{}:policy/", self.account_id)
    }

    fn role_mut(&mut self, name: &str) -> Result<&mut RoleState> {
        self.roles
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::not_found("role", name))
    }

    fn run<T>(
        &mut self,
        call: String,
        primitive: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.journal.check(IDENTITY, &call)?;
        let value = primitive(self)?;
        self.journal.record(call);
        Ok(value)
    }
}

fn policy_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

impl IdentityBackend for MemoryIdentity {
    fn list_roles(&self) -> Result<Vec<RoleInfo>> {
        self.journal.check(IDENTITY, "list_roles")?;
        Ok(self
            .roles
            .iter()
            .map(|r| RoleInfo {
                name: r.name.clone(),
                arn: r.arn.clone(),
            })
            .collect())
    }

    fn create_or_update_login_role(&mut self, name: &str) -> Result<RoleInfo> {
        self.run(format!("create_role {name}"), |i| {
            let arn = format!("arn:aws:iam::{}:role/{}", i.account_id, name);
            if !i.roles.iter().any(|r| r.name == name) {
                i.roles.push(RoleState {
                    name: name.to_string(),
                    arn: arn.clone(),
                    attached: Vec::new(),
                });
            }
            Ok(RoleInfo {
                name: name.to_string(),
                arn,
            })
        })
    }

    fn delete_login_role(&mut self, role: &RoleInfo) -> Result<()> {
        self.run(format!("delete_role {}", role.name), |i| {
            if let Some(state) = i.roles.iter().find(|r| r.name == role.name)
                && !state.attached.is_empty()
            {
                return Err(conflict(IDENTITY, format!("role {}", role.name)));
            }
            i.roles.retain(|r| r.name != role.name);
            Ok(())
        })
    }

    fn list_attached_policies(&self, role: &RoleInfo) -> Result<Vec<AttachedPolicy>> {
        self.journal
            .check(IDENTITY, &format!("list_attached {}", role.name))?;
        let state = self
            .roles
            .iter()
            .find(|r| r.name == role.name)
            .ok_or_else(|| Error::not_found("role", &role.name))?;
        Ok(state
            .attached
            .iter()
            .map(|arn| AttachedPolicy {
                name: policy_name(arn).to_string(),
                arn: arn.clone(),
            })
            .collect())
    }

    fn create_or_update_policy(&mut self, name: &str, document: &str) -> Result<AttachedPolicy> {
        self.run(format!("create_policy {name}"), |i| {
            let arn = format!(
                "arn:aws:iam::{}:policy{LOGIN_POLICY_PATH}{name}",
                i.account_id
            );
            match i.policies.iter_mut().find(|p| p.arn == arn) {
                Some(existing) => existing.document = document.to_string(),
                None => i.policies.push(PolicyState {
                    name: name.to_string(),
                    arn: arn.clone(),
                    document: document.to_string(),
                }),
            }
            Ok(AttachedPolicy {
                name: name.to_string(),
                arn,
            })
        })
    }

    fn attach_policy(&mut self, role: &RoleInfo, arn: &str) -> Result<()> {
        self.run(format!("attach {} {}", policy_name(arn), role.name), |i| {
            let customer = arn.starts_with(&i.customer_prefix());
            if customer && !i.policies.iter().any(|p| p.arn == arn) {
                return Err(Error::not_found("policy", arn));
            }
            let state = i.role_mut(&role.name)?;
            if !state.attached.iter().any(|a| a == arn) {
                state.attached.push(arn.to_string());
            }
            Ok(())
        })
    }

    fn detach_policy(&mut self, role: &RoleInfo, arn: &str) -> Result<()> {
        self.run(format!("detach {} {}", policy_name(arn), role.name), |i| {
            i.role_mut(&role.name)?.attached.retain(|a| a != arn);
            Ok(())
        })
    }

    fn delete_policy(&mut self, arn: &str) -> Result<()> {
        self.run(format!("delete_policy {}", policy_name(arn)), |i| {
            if i.roles.iter().any(|r| r.attached.iter().any(|a| a == arn)) {
                return Err(conflict(IDENTITY, format!("policy {arn}")));
            }
            i.policies.retain(|p| p.arn != arn);
            Ok(())
        })
    }

    fn policy_documents(&self) -> Result<HashMap<String, String>> {
        self.journal.check(IDENTITY, "policy_documents")?;
        Ok(self
            .policies
            .iter()
            .map(|p| (p.name.clone(), p.document.clone()))
            .collect())
    }
}

// ============================================================================
// Workspace login
// ============================================================================

const LOGIN: &str = "login";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoginState {
    email: String,
    #[serde(default)]
    roles: Vec<String>,
}

/// In-memory workspace-login system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLogin {
    #[serde(default)]
    users: Vec<LoginState>,
    #[serde(skip)]
    journal: Journal,
}

impl MemoryLogin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful calls in order
    pub fn journal(&self) -> &[String] {
        &self.journal.calls
    }

    /// Make every call whose journal line starts with `call` fail
    pub fn fail_on(&mut self, call: &str) {
        self.journal.fail_on = Some(call.to_string());
    }
}

impl LoginBackend for MemoryLogin {
    fn observe(&self) -> Result<LoginModel> {
        self.journal.check(LOGIN, "observe")?;
        let mut model = LoginModel::new();
        for state in &self.users {
            let user = model.declare_user(&state.email);
            for role in &state.roles {
                user.assign(role);
            }
        }
        Ok(model)
    }

    fn assign(&mut self, email: &str, role: &str) -> Result<()> {
        let call = format!("assign {role} {email}");
        self.journal.check(LOGIN, &call)?;
        let index = match self.users.iter().position(|u| u.email == email) {
            Some(index) => index,
            None => {
                self.users.push(LoginState {
                    email: email.to_string(),
                    roles: Vec::new(),
                });
                self.users.len() - 1
            }
        };
        let roles = &mut self.users[index].roles;
        if !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
        self.journal.record(call);
        Ok(())
    }

    fn unassign(&mut self, email: &str, role: &str) -> Result<()> {
        let call = format!("unassign {role} {email}");
        self.journal.check(LOGIN, &call)?;
        if let Some(user) = self.users.iter_mut().find(|u| u.email == email) {
            user.roles.retain(|r| r != role);
        }
        self.users.retain(|u| !u.roles.is_empty());
        self.journal.record(call);
        Ok(())
    }
}
