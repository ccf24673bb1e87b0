//! Resolve a grant specification into the desired model of every system.

use declarative::{IdentityModel, LoginModel, WarehouseModel};
use thiserror::Error;

use crate::grants::{GrantSpec, RoleSpec, UserSpec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("user {user} is assigned to undeclared role {role}")]
    UnknownRole { user: String, role: String },
}

/// Desired state of the three systems
#[derive(Debug, Clone, Default)]
pub struct Desired {
    pub warehouse: WarehouseModel,
    pub identity: IdentityModel,
    pub login: LoginModel,
}

/// Warehouse login of `user` when acting as `role`
pub fn login_username(user: &UserSpec, role: &RoleSpec) -> String {
    format!("{}_{}", user.username, role.name)
}

pub fn resolve(spec: &GrantSpec) -> Result<Desired, ResolveError> {
    let mut desired = Desired::default();

    for db in &spec.databases {
        desired
            .warehouse
            .declare_cluster(&db.cluster)
            .declare_database(&db.name);
    }

    for role in &spec.roles {
        desired.identity.declare_role(&role.name);
    }

    for user in &spec.users {
        desired.login.declare_user(&user.email);

        for assigned in &user.roles {
            let role = spec.role(assigned).ok_or_else(|| ResolveError::UnknownRole {
                user: user.email.clone(),
                role: assigned.clone(),
            })?;
            resolve_assignment(&mut desired, user, role);
        }
    }

    log::debug!(
        "Resolved {} clusters, {} roles, {} logins",
        desired.warehouse.clusters().len(),
        desired.identity.roles().len(),
        desired.login.users().len()
    );
    Ok(desired)
}

fn resolve_assignment(desired: &mut Desired, user: &UserSpec, role: &RoleSpec) {
    let username = login_username(user, role);

    desired.login.declare_user(&user.email).assign(&role.name);

    let identity_role = desired.identity.declare_role(&role.name);
    for arn in &role.policies {
        identity_role.reference_policy(arn);
    }
    let policy = identity_role.declare_login_policy(&user.email, &username);

    for db in &role.databases {
        policy.allow(&db.cluster, &db.name);

        let cluster = desired.warehouse.declare_cluster(&db.cluster);
        let group = cluster.declare_group(&role.name);
        for schema in &role.acl {
            group.grant_schema(schema);
        }
        for external in &role.external_databases {
            group.grant_external_schema(&external.short_name, &external.name);
        }
        cluster.declare_user(&username, Some(&role.name));

        let database = cluster.declare_database(&db.name);
        for external in &role.external_databases {
            database.declare_external_schema(&external.short_name, &external.name);
        }
        database.declare_group(&role.name);
        database.declare_user(&username, None);
    }

    for dev in &role.dev_databases {
        policy.allow(&dev.cluster, &user.username);

        let cluster = desired.warehouse.declare_cluster(&dev.cluster);
        let group = cluster.declare_group(&role.name);
        for external in &role.external_databases {
            group.grant_external_schema(&external.short_name, &external.name);
        }
        cluster.declare_user(&username, Some(&role.name));

        let database = cluster.declare_database_with_owner(&user.username, &username);
        for external in &role.external_databases {
            database.declare_external_schema(&external.short_name, &external.name);
        }
        database.declare_group(&role.name);
        database.declare_user(&username, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::{DatabaseRef, DevDatabaseRef, ExternalDatabaseRef};
    use declarative::{Grant, PolicyRenderer, WarehouseOp, diff_warehouse};

    fn role(name: &str) -> RoleSpec {
        RoleSpec {
            name: name.into(),
            acl: vec!["public".into()],
            databases: vec![DatabaseRef {
                cluster: "dev".into(),
                name: "jwr".into(),
            }],
            dev_databases: vec![],
            external_databases: vec![],
            policies: vec![],
        }
    }

    fn user(username: &str, roles: &[&str]) -> UserSpec {
        UserSpec {
            email: format!("{username}@lunar.app"),
            username: username.into(),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    fn spec() -> GrantSpec {
        GrantSpec {
            databases: vec![DatabaseRef {
                cluster: "dev".into(),
                name: "jwr".into(),
            }],
            roles: vec![role("bianalyst")],
            users: vec![user("jwr", &["bianalyst"])],
        }
    }

    #[test]
    fn test_user_role_pair_fans_out_to_every_system() {
        let desired = resolve(&spec()).unwrap();

        let login = desired.login.lookup_user("jwr@lunar.app").unwrap();
        assert_eq!(login.roles(), ["bianalyst"]);

        let role = desired.identity.lookup_role("bianalyst").unwrap();
        let policy = role.lookup_login_policy("jwr_bianalyst").unwrap();
        assert_eq!(policy.email, "jwr@lunar.app");
        assert_eq!(policy.databases().len(), 1);
        assert_eq!(policy.databases()[0].name, "jwr");

        let cluster = desired.warehouse.lookup_cluster("dev").unwrap();
        assert_eq!(
            cluster.lookup_group("bianalyst").unwrap().granted(),
            vec!["public"]
        );
        assert_eq!(
            cluster.lookup_user("jwr_bianalyst").unwrap().group.as_deref(),
            Some("bianalyst")
        );
        let database = cluster.lookup_database("jwr").unwrap();
        assert!(database.lookup_group("bianalyst").is_some());
        assert!(database.lookup_user("jwr_bianalyst").unwrap().group.is_none());
    }

    #[test]
    fn test_resolved_warehouse_plans_groups_before_members() {
        let desired = resolve(&spec()).unwrap();
        let plan = diff_warehouse(&WarehouseModel::new(), &desired.warehouse);
        assert_eq!(
            plan.steps()[..2],
            [
                WarehouseOp::CreateCluster {
                    cluster: "dev".into()
                },
                WarehouseOp::CreateGroup {
                    scope: declarative::Scope::cluster("dev"),
                    group: "bianalyst".into(),
                    grants: vec![Grant::Schema {
                        name: "public".into()
                    }],
                },
            ]
        );
    }

    #[test]
    fn test_dev_database_is_personal_and_owned() {
        let mut spec = spec();
        spec.roles[0].dev_databases.push(DevDatabaseRef {
            cluster: "dev".into(),
        });
        spec.roles[0].external_databases.push(ExternalDatabaseRef {
            name: "glue_lake".into(),
            short_name: "lake".into(),
        });

        let desired = resolve(&spec).unwrap();
        let cluster = desired.warehouse.lookup_cluster("dev").unwrap();
        // username "jwr" coincides with the shared database; first write wins
        let database = cluster.lookup_database("jwr").unwrap();
        assert_eq!(database.owner, None);
        assert_eq!(
            database.lookup_external_schema("lake").unwrap().catalog,
            "glue_lake"
        );
        assert_eq!(
            cluster.lookup_group("bianalyst").unwrap().granted(),
            vec!["public", "lake"]
        );

        let mut spec = spec;
        spec.users.push(user("alice", &["bianalyst"]));
        let desired = resolve(&spec).unwrap();
        let personal = desired.warehouse.lookup_database("dev", "alice").unwrap();
        assert_eq!(personal.owner.as_deref(), Some("alice_bianalyst"));

        let policy = desired
            .identity
            .lookup_role("bianalyst")
            .unwrap()
            .lookup_login_policy("alice_bianalyst")
            .unwrap();
        let document = PolicyRenderer::new("1", "eu-west-1").render(policy).unwrap();
        assert!(document.contains("dbname:dev/jwr"));
        assert!(document.contains("dbname:dev/alice"));
    }

    #[test]
    fn test_personal_databases_apply_and_tear_down() {
        use declarative::{
            ExecuteOptions, MemoryWarehouse, NoEvents, WarehouseApplier, WarehouseBackend,
        };

        let mut spec = spec();
        spec.roles[0].dev_databases.push(DevDatabaseRef {
            cluster: "dev".into(),
        });
        spec.roles[0].external_databases.push(ExternalDatabaseRef {
            name: "glue_lake".into(),
            short_name: "lake".into(),
        });
        spec.users.push(user("alice", &["bianalyst"]));
        let desired = resolve(&spec).unwrap();

        let mut warehouse = MemoryWarehouse::new();
        WarehouseApplier::new(&mut warehouse, NoEvents)
            .apply(&desired.warehouse, &ExecuteOptions::default())
            .unwrap();
        let plan = WarehouseApplier::new(&mut warehouse, NoEvents)
            .plan(&desired.warehouse)
            .unwrap();
        assert!(plan.is_empty(), "not converged: {plan}");

        WarehouseApplier::new(&mut warehouse, NoEvents)
            .apply(&WarehouseModel::new(), &ExecuteOptions::default())
            .unwrap();
        assert!(warehouse.observe().unwrap().is_empty());
    }

    #[test]
    fn test_managed_policies_are_referenced() {
        let mut spec = spec();
        spec.roles[0]
            .policies
            .push("arn:aws:iam::aws:policy/ReadOnlyAccess".into());
        let desired = resolve(&spec).unwrap();
        assert!(
            desired
                .identity
                .lookup_role("bianalyst")
                .unwrap()
                .references_policy("arn:aws:iam::aws:policy/ReadOnlyAccess")
        );
    }

    #[test]
    fn test_roles_without_users_still_exist() {
        let mut spec = spec();
        spec.roles.push(role("engineer"));
        let desired = resolve(&spec).unwrap();
        let engineer = desired.identity.lookup_role("engineer").unwrap();
        assert!(engineer.login_policies().is_empty());
    }

    #[test]
    fn test_unknown_role_is_an_error() {
        let mut spec = spec();
        spec.users.push(user("bob", &["finance"]));
        assert_eq!(
            resolve(&spec).unwrap_err(),
            ResolveError::UnknownRole {
                user: "bob@lunar.app".into(),
                role: "finance".into(),
            }
        );
    }
}
