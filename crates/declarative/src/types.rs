//! Core types: the operation vocabulary shared by plans, executors and events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a planned mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Create,
    Update,
    Delete,
}

impl Change {
    /// Single-character marker used in plan renderings
    pub fn symbol(&self) -> char {
        match self {
            Self::Create => '+',
            Self::Update => '~',
            Self::Delete => '-',
        }
    }
}

/// Kind of entity an operation or event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Cluster,
    Database,
    ExternalSchema,
    Group,
    User,
    Role,
    Policy,
    ManagedPolicy,
    Login,
}

impl Entity {
    /// Lower-case noun used in plan lines and log messages
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Database => "database",
            Self::ExternalSchema => "external schema",
            Self::Group => "group",
            Self::User => "user",
            Self::Role => "role",
            Self::Policy => "policy",
            Self::ManagedPolicy => "managed policy",
            Self::Login => "login",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cluster => "Cluster",
            Self::Database => "Database",
            Self::ExternalSchema => "ExternalSchema",
            Self::Group => "Group",
            Self::User => "User",
            Self::Role => "Role",
            Self::Policy => "Policy",
            Self::ManagedPolicy => "ManagedPolicy",
            Self::Login => "Login",
        };
        f.write_str(name)
    }
}

/// Where a warehouse group or user lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Scope {
    Cluster { cluster: String },
    Database { cluster: String, database: String },
}

impl Scope {
    pub fn cluster(cluster: &str) -> Self {
        Self::Cluster {
            cluster: cluster.to_string(),
        }
    }

    pub fn database(cluster: &str, database: &str) -> Self {
        Self::Database {
            cluster: cluster.to_string(),
            database: database.to_string(),
        }
    }

    pub fn cluster_identifier(&self) -> &str {
        match self {
            Self::Cluster { cluster } | Self::Database { cluster, .. } => cluster,
        }
    }

    /// Qualify `name` with this scope, e.g. `dev/jwr/bianalyst`
    pub fn qualify(&self, name: &str) -> String {
        format!("{self}/{name}")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster { cluster } => write!(f, "{cluster}"),
            Self::Database { cluster, database } => write!(f, "{cluster}/{database}"),
        }
    }
}

/// A schema usage grant held by a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grant {
    Schema { name: String },
    External { name: String, catalog: String },
}

impl Grant {
    pub fn name(&self) -> &str {
        match self {
            Self::Schema { name } | Self::External { name, .. } => name,
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { name } => write!(f, "{name}"),
            Self::External { name, catalog } => write!(f, "{name} <- {catalog}"),
        }
    }
}

/// Common view over the per-system operation enums
pub trait Operation: fmt::Debug {
    fn change(&self) -> Change;

    fn entity(&self) -> Entity;

    /// Scope heading the operation is grouped under when rendered
    fn scope(&self) -> String;

    /// Name of the entity the operation targets
    fn target(&self) -> String;

    /// Extra detail shown after the target, if any
    fn detail(&self) -> Option<String> {
        None
    }
}

/// A mutation against the warehouse system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WarehouseOp {
    CreateCluster {
        cluster: String,
    },
    DeleteCluster {
        cluster: String,
    },
    CreateDatabase {
        cluster: String,
        database: String,
        owner: Option<String>,
    },
    UpdateDatabase {
        cluster: String,
        database: String,
        owner: Option<String>,
    },
    DeleteDatabase {
        cluster: String,
        database: String,
    },
    CreateExternalSchema {
        cluster: String,
        database: String,
        schema: String,
        catalog: String,
    },
    DeleteExternalSchema {
        cluster: String,
        database: String,
        schema: String,
    },
    CreateGroup {
        scope: Scope,
        group: String,
        grants: Vec<Grant>,
    },
    UpdateGroup {
        scope: Scope,
        group: String,
        grant: Vec<Grant>,
        revoke: Vec<Grant>,
    },
    DeleteGroup {
        scope: Scope,
        group: String,
    },
    CreateUser {
        scope: Scope,
        user: String,
        group: Option<String>,
    },
    UpdateUser {
        scope: Scope,
        user: String,
        from: Option<String>,
        to: Option<String>,
    },
    DeleteUser {
        scope: Scope,
        user: String,
    },
}

fn join(grants: &[Grant]) -> String {
    grants
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Operation for WarehouseOp {
    fn change(&self) -> Change {
        match self {
            Self::CreateCluster { .. }
            | Self::CreateDatabase { .. }
            | Self::CreateExternalSchema { .. }
            | Self::CreateGroup { .. }
            | Self::CreateUser { .. } => Change::Create,
            Self::UpdateDatabase { .. } | Self::UpdateGroup { .. } | Self::UpdateUser { .. } => {
                Change::Update
            }
            Self::DeleteCluster { .. }
            | Self::DeleteDatabase { .. }
            | Self::DeleteExternalSchema { .. }
            | Self::DeleteGroup { .. }
            | Self::DeleteUser { .. } => Change::Delete,
        }
    }

    fn entity(&self) -> Entity {
        match self {
            Self::CreateCluster { .. } | Self::DeleteCluster { .. } => Entity::Cluster,
            Self::CreateDatabase { .. }
            | Self::UpdateDatabase { .. }
            | Self::DeleteDatabase { .. } => Entity::Database,
            Self::CreateExternalSchema { .. } | Self::DeleteExternalSchema { .. } => {
                Entity::ExternalSchema
            }
            Self::CreateGroup { .. } | Self::UpdateGroup { .. } | Self::DeleteGroup { .. } => {
                Entity::Group
            }
            Self::CreateUser { .. } | Self::UpdateUser { .. } | Self::DeleteUser { .. } => {
                Entity::User
            }
        }
    }

    fn scope(&self) -> String {
        match self {
            Self::CreateCluster { cluster } | Self::DeleteCluster { cluster } => cluster.clone(),
            Self::CreateDatabase {
                cluster, database, ..
            }
            | Self::UpdateDatabase {
                cluster, database, ..
            }
            | Self::DeleteDatabase { cluster, database }
            | Self::CreateExternalSchema {
                cluster, database, ..
            }
            | Self::DeleteExternalSchema {
                cluster, database, ..
            } => format!("{cluster}/{database}"),
            Self::CreateGroup { scope, .. }
            | Self::UpdateGroup { scope, .. }
            | Self::DeleteGroup { scope, .. }
            | Self::CreateUser { scope, .. }
            | Self::UpdateUser { scope, .. }
            | Self::DeleteUser { scope, .. } => scope.to_string(),
        }
    }

    fn target(&self) -> String {
        match self {
            Self::CreateCluster { cluster } | Self::DeleteCluster { cluster } => cluster.clone(),
            Self::CreateDatabase { database, .. }
            | Self::UpdateDatabase { database, .. }
            | Self::DeleteDatabase { database, .. } => database.clone(),
            Self::CreateExternalSchema { schema, .. } | Self::DeleteExternalSchema { schema, .. } => {
                schema.clone()
            }
            Self::CreateGroup { group, .. }
            | Self::UpdateGroup { group, .. }
            | Self::DeleteGroup { group, .. } => group.clone(),
            Self::CreateUser { user, .. }
            | Self::UpdateUser { user, .. }
            | Self::DeleteUser { user, .. } => user.clone(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::CreateDatabase {
                owner: Some(owner), ..
            } => Some(format!("owner {owner}")),
            Self::UpdateDatabase { owner, .. } => Some(format!(
                "owner -> {}",
                owner.as_deref().unwrap_or("(default)")
            )),
            Self::CreateExternalSchema { catalog, .. } => Some(format!("catalog {catalog}")),
            Self::CreateGroup { grants, .. } if !grants.is_empty() => {
                Some(format!("grant {}", join(grants)))
            }
            Self::UpdateGroup { grant, revoke, .. } => {
                let mut parts = Vec::new();
                if !grant.is_empty() {
                    parts.push(format!("grant {}", join(grant)));
                }
                if !revoke.is_empty() {
                    parts.push(format!("revoke {}", join(revoke)));
                }
                Some(parts.join("; "))
            }
            Self::CreateUser {
                group: Some(group), ..
            } => Some(format!("member of {group}")),
            Self::UpdateUser { from, to, .. } => Some(format!(
                "member of {} -> {}",
                from.as_deref().unwrap_or("(none)"),
                to.as_deref().unwrap_or("(none)")
            )),
            _ => None,
        }
    }
}

/// A mutation against the identity system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IdentityOp {
    CreateRole {
        role: String,
    },
    DeleteRole {
        role: String,
    },
    CreatePolicy {
        role: String,
        policy: String,
        document: String,
    },
    UpdatePolicy {
        role: String,
        policy: String,
        previous: Option<String>,
        document: String,
    },
    DeletePolicy {
        role: String,
        policy: String,
    },
    AttachManagedPolicy {
        role: String,
        arn: String,
    },
    DetachManagedPolicy {
        role: String,
        arn: String,
    },
}

impl Operation for IdentityOp {
    fn change(&self) -> Change {
        match self {
            Self::CreateRole { .. }
            | Self::CreatePolicy { .. }
            | Self::AttachManagedPolicy { .. } => Change::Create,
            Self::UpdatePolicy { .. } => Change::Update,
            Self::DeleteRole { .. }
            | Self::DeletePolicy { .. }
            | Self::DetachManagedPolicy { .. } => Change::Delete,
        }
    }

    fn entity(&self) -> Entity {
        match self {
            Self::CreateRole { .. } | Self::DeleteRole { .. } => Entity::Role,
            Self::CreatePolicy { .. } | Self::UpdatePolicy { .. } | Self::DeletePolicy { .. } => {
                Entity::Policy
            }
            Self::AttachManagedPolicy { .. } | Self::DetachManagedPolicy { .. } => {
                Entity::ManagedPolicy
            }
        }
    }

    fn scope(&self) -> String {
        match self {
            Self::CreateRole { role }
            | Self::DeleteRole { role }
            | Self::CreatePolicy { role, .. }
            | Self::UpdatePolicy { role, .. }
            | Self::DeletePolicy { role, .. }
            | Self::AttachManagedPolicy { role, .. }
            | Self::DetachManagedPolicy { role, .. } => role.clone(),
        }
    }

    fn target(&self) -> String {
        match self {
            Self::CreateRole { role } | Self::DeleteRole { role } => role.clone(),
            Self::CreatePolicy { policy, .. }
            | Self::UpdatePolicy { policy, .. }
            | Self::DeletePolicy { policy, .. } => policy.clone(),
            Self::AttachManagedPolicy { arn, .. } | Self::DetachManagedPolicy { arn, .. } => {
                arn.clone()
            }
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::AttachManagedPolicy { .. } => Some("attach".to_string()),
            Self::DetachManagedPolicy { .. } => Some("detach".to_string()),
            Self::UpdatePolicy { .. } => Some("document changed".to_string()),
            _ => None,
        }
    }
}

/// A mutation against the workspace-login system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LoginOp {
    UpdateAssignments {
        email: String,
        assign: Vec<String>,
        unassign: Vec<String>,
    },
}

impl Operation for LoginOp {
    fn change(&self) -> Change {
        Change::Update
    }

    fn entity(&self) -> Entity {
        Entity::Login
    }

    fn scope(&self) -> String {
        "logins".to_string()
    }

    fn target(&self) -> String {
        match self {
            Self::UpdateAssignments { email, .. } => email.clone(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::UpdateAssignments {
                assign, unassign, ..
            } => {
                let mut parts = Vec::new();
                if !assign.is_empty() {
                    parts.push(format!("assign {}", assign.join(", ")));
                }
                if !unassign.is_empty() {
                    parts.push(format!("unassign {}", unassign.join(", ")));
                }
                Some(parts.join("; "))
            }
        }
    }
}

/// Options for a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Observe and plan, but make no changes
    pub dry_run: bool,
}

/// Counts of executed mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub no_change: usize,
}

impl ApplySummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ApplySummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.no_change += other.no_change;
    }

    /// Count one executed change
    pub fn add(&mut self, change: Change) {
        match change {
            Change::Create => self.created += 1,
            Change::Update => self.modified += 1,
            Change::Delete => self.removed += 1,
        }
    }
}
