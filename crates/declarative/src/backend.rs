//! Backend abstraction for the external systems.
//!
//! Each trait exposes the thin list/create/update/delete primitives of one
//! system. The appliers drive these in plan order; implementations only
//! have to perform the single call asked of them. Primitives are expected to
//! be idempotent: creating something that exists or deleting something that
//! is gone succeeds.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{LoginModel, WarehouseModel};
use crate::types::{Grant, Scope};

/// Primitives of the warehouse system
pub trait WarehouseBackend {
    /// List clusters, databases, groups, users and grants as a model.
    fn observe(&self) -> Result<WarehouseModel>;

    fn create_cluster(&mut self, cluster: &str) -> Result<()>;

    fn delete_cluster(&mut self, cluster: &str) -> Result<()>;

    fn create_database(&mut self, cluster: &str, database: &str, owner: Option<&str>)
    -> Result<()>;

    fn alter_database_owner(
        &mut self,
        cluster: &str,
        database: &str,
        owner: Option<&str>,
    ) -> Result<()>;

    fn drop_database(&mut self, cluster: &str, database: &str) -> Result<()>;

    fn create_external_schema(
        &mut self,
        cluster: &str,
        database: &str,
        schema: &str,
        catalog: &str,
    ) -> Result<()>;

    fn drop_external_schema(&mut self, cluster: &str, database: &str, schema: &str)
    -> Result<()>;

    fn create_group(&mut self, scope: &Scope, group: &str) -> Result<()>;

    fn drop_group(&mut self, scope: &Scope, group: &str) -> Result<()>;

    fn grant(&mut self, scope: &Scope, group: &str, grant: &Grant) -> Result<()>;

    fn revoke(&mut self, scope: &Scope, group: &str, grant: &Grant) -> Result<()>;

    fn create_user(&mut self, scope: &Scope, user: &str, group: Option<&str>) -> Result<()>;

    /// Move `user` out of its current group and into `group`, if any.
    fn alter_user_group(&mut self, scope: &Scope, user: &str, group: Option<&str>) -> Result<()>;

    fn drop_user(&mut self, scope: &Scope, user: &str) -> Result<()>;
}

/// A role as listed by the identity system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub arn: String,
}

/// A policy attached to a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedPolicy {
    pub name: String,
    pub arn: String,
}

/// Primitives of the identity system
pub trait IdentityBackend {
    fn list_roles(&self) -> Result<Vec<RoleInfo>>;

    /// Create a role that can be assumed through the workspace login, or
    /// return the existing one.
    fn create_or_update_login_role(&mut self, name: &str) -> Result<RoleInfo>;

    /// Delete a role. Fails while policies are still attached.
    fn delete_login_role(&mut self, role: &RoleInfo) -> Result<()>;

    fn list_attached_policies(&self, role: &RoleInfo) -> Result<Vec<AttachedPolicy>>;

    /// Store `document` as the login policy `name` under
    /// [`LOGIN_POLICY_PATH`](crate::policy::LOGIN_POLICY_PATH), creating the
    /// policy if needed.
    fn create_or_update_policy(&mut self, name: &str, document: &str) -> Result<AttachedPolicy>;

    fn attach_policy(&mut self, role: &RoleInfo, arn: &str) -> Result<()>;

    fn detach_policy(&mut self, role: &RoleInfo, arn: &str) -> Result<()>;

    /// Delete a policy. Fails while it is still attached.
    fn delete_policy(&mut self, arn: &str) -> Result<()>;

    /// Current document of every customer policy, keyed by policy name.
    fn policy_documents(&self) -> Result<HashMap<String, String>>;
}

/// Primitives of the workspace-login system
pub trait LoginBackend {
    /// List every login and the roles it may sign in with.
    fn observe(&self) -> Result<LoginModel>;

    fn assign(&mut self, email: &str, role: &str) -> Result<()>;

    fn unassign(&mut self, email: &str, role: &str) -> Result<()>;
}
