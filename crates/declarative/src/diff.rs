//! Plan builders: compare a current model with a desired model
//!
//! Both trees are walked scope by scope. Entities only in the desired tree
//! are created parent-first, entities only in the current tree are deleted
//! child-first, and entities in both are recursed into and compared on
//! their leaf attributes. Sibling order follows the insertion order of the
//! tree the entity comes from, so identical inputs always yield identical
//! plans.
//!
//! Within one cluster the plan is laid out in phases so that references
//! always point at something that exists:
//!
//! 1. cluster groups (create / update grants on schemas that already exist)
//! 2. databases, their external schemas and groups; a new database only gets
//!    its owner here if that user already exists
//! 3. grants on external schemas created in phase 2
//! 4. cluster users (create / update membership)
//! 5. database owners
//! 6. database users
//! 7. removal in reverse: database users, external grants held by groups
//!    that are going away, database groups and external schemas, databases,
//!    cluster users, cluster groups

use crate::model::{Cluster, Database, Group, LoginModel, User, WarehouseModel};
use crate::planner::Plan;
use crate::types::{Grant, LoginOp, Scope, WarehouseOp};

/// Grants held back until their external schema exists
type Deferred = (Scope, String, Vec<Grant>);

/// Build the ordered warehouse plan turning `current` into `desired`.
pub fn diff_warehouse(current: &WarehouseModel, desired: &WarehouseModel) -> Plan<WarehouseOp> {
    let mut plan = Plan::new();

    for cluster in desired.clusters() {
        let existing = current.lookup_cluster(&cluster.identifier);
        if existing.is_none() {
            plan.push(WarehouseOp::CreateCluster {
                cluster: cluster.identifier.clone(),
            });
        }
        converge_cluster(&mut plan, existing, Some(cluster));
    }

    for cluster in current.clusters() {
        if desired.lookup_cluster(&cluster.identifier).is_none() {
            converge_cluster(&mut plan, Some(cluster), None);
            plan.push(WarehouseOp::DeleteCluster {
                cluster: cluster.identifier.clone(),
            });
        }
    }

    log::debug!("Warehouse plan has {} steps", plan.len());
    plan
}

fn converge_cluster(
    plan: &mut Plan<WarehouseOp>,
    current: Option<&Cluster>,
    desired: Option<&Cluster>,
) {
    let cluster = match (current, desired) {
        (_, Some(d)) => d.identifier.as_str(),
        (Some(c), None) => c.identifier.as_str(),
        (None, None) => return,
    };
    let cluster_scope = Scope::cluster(cluster);

    if let Some(desired) = desired {
        let ready = |grant: &Grant| match grant {
            Grant::Schema { .. } => true,
            Grant::External { name, .. } => current.is_some_and(|c| has_external_schema(c, name)),
        };
        let mut deferred: Vec<Deferred> = Vec::new();

        // 1. cluster groups
        for group in desired.groups() {
            let existing = current.and_then(|c| c.lookup_group(&group.name));
            deferred.extend(converge_group(plan, &cluster_scope, existing, group, &ready));
        }

        // 2. databases with their external schemas and groups
        for database in desired.databases() {
            let existing = current.and_then(|c| c.lookup_database(&database.name));
            let owner = database
                .owner
                .clone()
                .filter(|owner| current.is_some_and(|c| c.lookup_user(owner).is_some()));
            deferred.extend(converge_database(plan, cluster, existing, database, owner, &ready));
        }

        // 3. external grants
        for (scope, group, grant) in deferred {
            plan.push(WarehouseOp::UpdateGroup {
                scope,
                group,
                grant,
                revoke: Vec::new(),
            });
        }

        // 4. cluster users
        for user in desired.users() {
            let existing = current.and_then(|c| c.lookup_user(&user.name));
            converge_user(plan, &cluster_scope, existing, user);
        }

        // 5. database owners
        for database in desired.databases() {
            let Some(owner) = &database.owner else {
                continue;
            };
            let existing = current.and_then(|c| c.lookup_database(&database.name));
            let owned = match existing {
                Some(existing) => existing.owner.as_ref() == Some(owner),
                None => current.is_some_and(|c| c.lookup_user(owner).is_some()),
            };
            if !owned {
                plan.push(WarehouseOp::UpdateDatabase {
                    cluster: cluster.to_string(),
                    database: database.name.clone(),
                    owner: Some(owner.clone()),
                });
            }
        }

        // 6. database users
        for database in desired.databases() {
            let scope = Scope::database(cluster, &database.name);
            let existing = current.and_then(|c| c.lookup_database(&database.name));
            for user in database.users() {
                let existing = existing.and_then(|d| d.lookup_user(&user.name));
                converge_user(plan, &scope, existing, user);
            }
        }
    }

    let Some(current) = current else {
        return;
    };

    // 7. removals, referrers before what they refer to
    for database in current.databases() {
        let wanted = desired.and_then(|d| d.lookup_database(&database.name));
        let scope = Scope::database(cluster, &database.name);
        for user in database.users() {
            if wanted.is_none_or(|w| w.lookup_user(&user.name).is_none()) {
                plan.push(WarehouseOp::DeleteUser {
                    scope: scope.clone(),
                    user: user.name.clone(),
                });
            }
        }
    }

    for group in current.groups() {
        if desired.is_some_and(|d| d.lookup_group(&group.name).is_some()) {
            continue;
        }
        let revoke: Vec<Grant> = group
            .granted_external_schemas()
            .iter()
            .filter(|s| desired.is_none_or(|d| !has_external_schema(d, &s.name)))
            .map(|s| Grant::External {
                name: s.name.clone(),
                catalog: s.catalog.clone(),
            })
            .collect();
        if !revoke.is_empty() {
            plan.push(WarehouseOp::UpdateGroup {
                scope: cluster_scope.clone(),
                group: group.name.clone(),
                grant: Vec::new(),
                revoke,
            });
        }
    }

    for database in current.databases() {
        let wanted = desired.and_then(|d| d.lookup_database(&database.name));
        remove_database_children(plan, cluster, database, wanted);
        if wanted.is_none() {
            plan.push(WarehouseOp::DeleteDatabase {
                cluster: cluster.to_string(),
                database: database.name.clone(),
            });
        }
    }

    for user in current.users() {
        if desired.is_none_or(|d| d.lookup_user(&user.name).is_none()) {
            plan.push(WarehouseOp::DeleteUser {
                scope: cluster_scope.clone(),
                user: user.name.clone(),
            });
        }
    }

    for group in current.groups() {
        if desired.is_none_or(|d| d.lookup_group(&group.name).is_none()) {
            plan.push(WarehouseOp::DeleteGroup {
                scope: cluster_scope.clone(),
                group: group.name.clone(),
            });
        }
    }
}

/// Whether any database of `cluster` holds the external schema `name`
fn has_external_schema(cluster: &Cluster, name: &str) -> bool {
    cluster
        .databases()
        .iter()
        .any(|d| d.lookup_external_schema(name).is_some())
}

/// Converge one database and its children. `owner` is the owner to set at
/// creation; any other owner change is left to the owner phase.
fn converge_database(
    plan: &mut Plan<WarehouseOp>,
    cluster: &str,
    current: Option<&Database>,
    desired: &Database,
    owner: Option<String>,
    ready: &impl Fn(&Grant) -> bool,
) -> Vec<Deferred> {
    if current.is_none() {
        plan.push(WarehouseOp::CreateDatabase {
            cluster: cluster.to_string(),
            database: desired.name.clone(),
            owner,
        });
    }

    for schema in desired.external_schemas() {
        let existing = current.and_then(|d| d.lookup_external_schema(&schema.name));
        match existing {
            Some(existing) if existing.catalog == schema.catalog => {}
            Some(_) => {
                // External schemas cannot be re-pointed in place
                plan.push(WarehouseOp::DeleteExternalSchema {
                    cluster: cluster.to_string(),
                    database: desired.name.clone(),
                    schema: schema.name.clone(),
                });
                plan.push(WarehouseOp::CreateExternalSchema {
                    cluster: cluster.to_string(),
                    database: desired.name.clone(),
                    schema: schema.name.clone(),
                    catalog: schema.catalog.clone(),
                });
            }
            None => plan.push(WarehouseOp::CreateExternalSchema {
                cluster: cluster.to_string(),
                database: desired.name.clone(),
                schema: schema.name.clone(),
                catalog: schema.catalog.clone(),
            }),
        }
    }

    let scope = Scope::database(cluster, &desired.name);
    desired
        .groups()
        .iter()
        .filter_map(|group| {
            let existing = current.and_then(|d| d.lookup_group(&group.name));
            converge_group(plan, &scope, existing, group, ready)
        })
        .collect()
}

fn remove_database_children(
    plan: &mut Plan<WarehouseOp>,
    cluster: &str,
    current: &Database,
    desired: Option<&Database>,
) {
    let scope = Scope::database(cluster, &current.name);
    for group in current.groups() {
        if desired.is_none_or(|d| d.lookup_group(&group.name).is_none()) {
            plan.push(WarehouseOp::DeleteGroup {
                scope: scope.clone(),
                group: group.name.clone(),
            });
        }
    }
    for schema in current.external_schemas() {
        if desired.is_none_or(|d| d.lookup_external_schema(&schema.name).is_none()) {
            plan.push(WarehouseOp::DeleteExternalSchema {
                cluster: cluster.to_string(),
                database: current.name.clone(),
                schema: schema.name.clone(),
            });
        }
    }
}

/// Create or update `desired`, granting only what `ready` accepts. Returns
/// the grants held back, if any.
fn converge_group(
    plan: &mut Plan<WarehouseOp>,
    scope: &Scope,
    current: Option<&Group>,
    desired: &Group,
    ready: &impl Fn(&Grant) -> bool,
) -> Option<Deferred> {
    let deferred = match current {
        None => {
            let (grants, deferred): (Vec<Grant>, Vec<Grant>) =
                grants_of(desired).into_iter().partition(ready);
            plan.push(WarehouseOp::CreateGroup {
                scope: scope.clone(),
                group: desired.name.clone(),
                grants,
            });
            deferred
        }
        Some(existing) => {
            let (grant, revoke) = grant_changes(existing, desired);
            let (grant, deferred): (Vec<Grant>, Vec<Grant>) = grant.into_iter().partition(ready);
            if !grant.is_empty() || !revoke.is_empty() {
                plan.push(WarehouseOp::UpdateGroup {
                    scope: scope.clone(),
                    group: desired.name.clone(),
                    grant,
                    revoke,
                });
            }
            deferred
        }
    };
    (!deferred.is_empty()).then(|| (scope.clone(), desired.name.clone(), deferred))
}

fn converge_user(plan: &mut Plan<WarehouseOp>, scope: &Scope, current: Option<&User>, desired: &User) {
    match current {
        None => plan.push(WarehouseOp::CreateUser {
            scope: scope.clone(),
            user: desired.name.clone(),
            group: desired.group.clone(),
        }),
        Some(existing) if existing.group != desired.group => {
            plan.push(WarehouseOp::UpdateUser {
                scope: scope.clone(),
                user: desired.name.clone(),
                from: existing.group.clone(),
                to: desired.group.clone(),
            });
        }
        Some(_) => {}
    }
}

/// Every grant held by `group`, regular schemas first
pub fn grants_of(group: &Group) -> Vec<Grant> {
    let schemas = group.granted_schemas().iter().map(|s| Grant::Schema {
        name: s.name.clone(),
    });
    let external = group
        .granted_external_schemas()
        .iter()
        .map(|s| Grant::External {
            name: s.name.clone(),
            catalog: s.catalog.clone(),
        });
    schemas.chain(external).collect()
}

/// Grants to add and grants to revoke to move `current` to `desired`
fn grant_changes(current: &Group, desired: &Group) -> (Vec<Grant>, Vec<Grant>) {
    let grant = grants_of(desired)
        .into_iter()
        .filter(|g| !holds(current, g))
        .collect();
    let revoke = grants_of(current)
        .into_iter()
        .filter(|g| !holds(desired, g))
        .collect();
    (grant, revoke)
}

fn holds(group: &Group, grant: &Grant) -> bool {
    match grant {
        Grant::Schema { name } => group.lookup_granted_schema(name).is_some(),
        Grant::External { name, .. } => group.lookup_granted_external_schema(name).is_some(),
    }
}

/// Build the login-assignment plan turning `current` into `desired`.
pub fn diff_logins(current: &LoginModel, desired: &LoginModel) -> Plan<LoginOp> {
    let mut plan = Plan::new();

    for user in desired.users() {
        let existing = current.lookup_user(&user.email);
        let assign: Vec<String> = user
            .roles()
            .iter()
            .filter(|role| existing.is_none_or(|e| !e.is_assigned(role)))
            .cloned()
            .collect();
        let unassign: Vec<String> = existing
            .map(|e| {
                e.roles()
                    .iter()
                    .filter(|role| !user.is_assigned(role))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !assign.is_empty() || !unassign.is_empty() {
            plan.push(LoginOp::UpdateAssignments {
                email: user.email.clone(),
                assign,
                unassign,
            });
        }
    }

    for user in current.users() {
        if desired.lookup_user(&user.email).is_none() && !user.roles().is_empty() {
            plan.push(LoginOp::UpdateAssignments {
                email: user.email.clone(),
                assign: Vec::new(),
                unassign: user.roles().to_vec(),
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Change, Operation};

    fn bianalyst_desired() -> WarehouseModel {
        let mut model = WarehouseModel::new();
        let cluster = model.declare_cluster("dev");
        cluster.declare_group("bianalyst").grant_schema("public");
        let database = cluster.declare_database("jwr");
        database.declare_group("bianalyst");
        cluster.declare_user("jwr_bianalyst", Some("bianalyst"));
        cluster.declare_user("jwr_bianalyst2", Some("bianalyst"));
        cluster
            .lookup_database_mut("jwr")
            .unwrap()
            .declare_user("jwr_bianalyst", None);
        model
    }

    /// bianalyst plus a personal database owned by a cluster user and an
    /// external schema granted to the cluster group
    fn personal_desired() -> WarehouseModel {
        let mut model = bianalyst_desired();
        let cluster = model.lookup_cluster_mut("dev").unwrap();
        cluster
            .lookup_group_mut("bianalyst")
            .unwrap()
            .grant_external_schema("lake", "glue_lake");
        cluster.declare_user("alice_bianalyst", Some("bianalyst"));
        let database = cluster.declare_database_with_owner("alice", "alice_bianalyst");
        database.declare_external_schema("lake", "glue_lake");
        database.declare_group("bianalyst");
        database.declare_user("alice_bianalyst", None);
        model
    }

    fn any_before(
        plan: &Plan<WarehouseOp>,
        index: usize,
        pred: impl Fn(&WarehouseOp) -> bool,
    ) -> bool {
        plan.iter().take(index).any(pred)
    }

    /// Every owner, external grant and membership in `plan` points at
    /// something that exists when the step runs, and nothing is deleted while
    /// a step before it still leaves a reference behind.
    fn assert_references_resolve(current: &WarehouseModel, plan: &Plan<WarehouseOp>) {
        for (index, step) in plan.iter().enumerate() {
            match step {
                WarehouseOp::CreateDatabase {
                    cluster,
                    owner: Some(owner),
                    ..
                }
                | WarehouseOp::UpdateDatabase {
                    cluster,
                    owner: Some(owner),
                    ..
                } => {
                    let existed = current
                        .lookup_cluster(cluster)
                        .is_some_and(|c| c.lookup_user(owner).is_some());
                    let created = any_before(plan, index, |op| {
                        matches!(op, WarehouseOp::CreateUser { scope: Scope::Cluster { cluster: c }, user, .. }
                            if c == cluster && user == owner)
                    });
                    assert!(existed || created, "{step:?} runs before its owner exists");
                }
                WarehouseOp::CreateGroup {
                    scope, grants: g, ..
                }
                | WarehouseOp::UpdateGroup { scope, grant: g, .. } => {
                    let cluster = scope.cluster_identifier();
                    for grant in g {
                        let Grant::External { name, .. } = grant else {
                            continue;
                        };
                        let existed = current
                            .lookup_cluster(cluster)
                            .is_some_and(|c| has_external_schema(c, name));
                        let created = any_before(plan, index, |op| {
                            matches!(op, WarehouseOp::CreateExternalSchema { cluster: c, schema, .. }
                                if c == cluster && schema == name)
                        });
                        assert!(existed || created, "{step:?} grants {name} before it exists");
                    }
                }
                WarehouseOp::CreateUser {
                    scope,
                    group: Some(group),
                    ..
                } => {
                    let created = any_before(plan, index, |op| {
                        matches!(op, WarehouseOp::CreateGroup { scope: s, group: g, .. }
                            if s == scope && g == group)
                    });
                    let existed = match scope {
                        Scope::Cluster { cluster } => current
                            .lookup_cluster(cluster)
                            .is_some_and(|c| c.lookup_group(group).is_some()),
                        Scope::Database { cluster, database } => current
                            .lookup_database(cluster, database)
                            .is_some_and(|d| d.lookup_group(group).is_some()),
                    };
                    assert!(existed || created, "{step:?} joins a missing group");
                }
                WarehouseOp::DeleteUser {
                    scope: Scope::Cluster { cluster },
                    user,
                } => {
                    let Some(state) = current.lookup_cluster(cluster) else {
                        continue;
                    };
                    let owned = state
                        .databases()
                        .iter()
                        .filter(|d| d.owner.as_ref() == Some(user));
                    for database in owned {
                        let released = any_before(plan, index, |op| match op {
                            WarehouseOp::DeleteDatabase {
                                cluster: c,
                                database: d,
                            }
                            | WarehouseOp::UpdateDatabase {
                                cluster: c,
                                database: d,
                                ..
                            } => c == cluster && *d == database.name,
                            _ => false,
                        });
                        assert!(released, "{step:?} while it owns {}", database.name);
                    }
                }
                WarehouseOp::DeleteExternalSchema {
                    cluster, schema, ..
                } => {
                    let Some(state) = current.lookup_cluster(cluster) else {
                        continue;
                    };
                    let replaced = plan.iter().skip(index + 1).any(|op| {
                        matches!(op, WarehouseOp::CreateExternalSchema { cluster: c, schema: s, .. }
                            if c == cluster && s == schema)
                    });
                    let holders = state
                        .groups()
                        .iter()
                        .filter(|g| g.lookup_granted_external_schema(schema).is_some());
                    for holder in holders {
                        let released = any_before(plan, index, |op| match op {
                            WarehouseOp::UpdateGroup {
                                scope: Scope::Cluster { cluster: c },
                                group,
                                revoke,
                                ..
                            } => {
                                c == cluster
                                    && *group == holder.name
                                    && revoke.iter().any(|g| g.name() == schema.as_str())
                            }
                            WarehouseOp::DeleteGroup {
                                scope: Scope::Cluster { cluster: c },
                                group,
                            } => c == cluster && *group == holder.name,
                            _ => false,
                        });
                        assert!(
                            released || replaced,
                            "{step:?} while {} still holds a grant",
                            holder.name
                        );
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_empty_current_creates_parent_first() {
        let plan = diff_warehouse(&WarehouseModel::new(), &bianalyst_desired());

        let expected = vec![
            WarehouseOp::CreateCluster {
                cluster: "dev".into(),
            },
            WarehouseOp::CreateGroup {
                scope: Scope::cluster("dev"),
                group: "bianalyst".into(),
                grants: vec![Grant::Schema {
                    name: "public".into(),
                }],
            },
            WarehouseOp::CreateDatabase {
                cluster: "dev".into(),
                database: "jwr".into(),
                owner: None,
            },
            WarehouseOp::CreateGroup {
                scope: Scope::database("dev", "jwr"),
                group: "bianalyst".into(),
                grants: vec![],
            },
            WarehouseOp::CreateUser {
                scope: Scope::cluster("dev"),
                user: "jwr_bianalyst".into(),
                group: Some("bianalyst".into()),
            },
            WarehouseOp::CreateUser {
                scope: Scope::cluster("dev"),
                user: "jwr_bianalyst2".into(),
                group: Some("bianalyst".into()),
            },
            WarehouseOp::CreateUser {
                scope: Scope::database("dev", "jwr"),
                user: "jwr_bianalyst".into(),
                group: None,
            },
        ];
        assert_eq!(plan.steps(), expected.as_slice());
        assert_eq!(plan.summary().removals, 0);
    }

    #[test]
    fn test_identical_models_produce_empty_plan() {
        let plan = diff_warehouse(&bianalyst_desired(), &bianalyst_desired());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_teardown_deletes_children_first() {
        let plan = diff_warehouse(&bianalyst_desired(), &WarehouseModel::new());
        let position = |op: WarehouseOp| plan.position(|step| *step == op).unwrap();

        let db_user = position(WarehouseOp::DeleteUser {
            scope: Scope::database("dev", "jwr"),
            user: "jwr_bianalyst".into(),
        });
        let cluster_user = position(WarehouseOp::DeleteUser {
            scope: Scope::cluster("dev"),
            user: "jwr_bianalyst".into(),
        });
        let db_group = position(WarehouseOp::DeleteGroup {
            scope: Scope::database("dev", "jwr"),
            group: "bianalyst".into(),
        });
        let database = position(WarehouseOp::DeleteDatabase {
            cluster: "dev".into(),
            database: "jwr".into(),
        });
        let cluster_group = position(WarehouseOp::DeleteGroup {
            scope: Scope::cluster("dev"),
            group: "bianalyst".into(),
        });
        let cluster = position(WarehouseOp::DeleteCluster {
            cluster: "dev".into(),
        });

        assert!(db_user < database);
        assert!(db_group < database);
        assert!(cluster_user < cluster_group);
        assert!(database < cluster);
        assert!(cluster_group < cluster);
        assert_eq!(cluster, plan.len() - 1);
        assert!(plan.iter().all(|op| op.change() == Change::Delete));
    }

    #[test]
    fn test_every_create_precedes_references() {
        let mut current = WarehouseModel::new();
        current.declare_cluster("prod").declare_group("legacy");

        let mut desired = bianalyst_desired();
        let prod = desired.declare_cluster("prod");
        prod.declare_group("finance").grant_schema("ledger");
        prod.declare_database_with_owner("alice", "alice_finance")
            .declare_group("finance");
        prod.declare_user("alice_finance", Some("finance"));

        let plan = diff_warehouse(&current, &desired);
        assert_references_resolve(&current, &plan);

        for (index, step) in plan.iter().enumerate() {
            if step.change() != Change::Create {
                continue;
            }
            // the cluster hosting the entity is created earlier or already exists
            let cluster = step.scope().split('/').next().unwrap().to_string();
            if let Some(parent) = plan.position(|op| {
                *op == WarehouseOp::CreateCluster {
                    cluster: cluster.clone(),
                }
            }) {
                assert!(parent <= index, "{step:?} precedes its cluster");
            }
            if let WarehouseOp::CreateUser {
                scope,
                group: Some(group),
                ..
            } = step
            {
                let group_created = plan
                    .position(|op| {
                        matches!(op, WarehouseOp::CreateGroup { scope: s, group: g, .. }
                            if s == scope && g == group)
                    })
                    .unwrap();
                assert!(group_created < index);
            }
        }

        let legacy = plan
            .position(|op| {
                matches!(op, WarehouseOp::DeleteGroup { group, .. } if group == "legacy")
            })
            .unwrap();
        assert!(plan.iter().skip(legacy + 1).all(|op| op.change() == Change::Delete));
    }

    #[test]
    fn test_owner_and_external_grant_wait_for_their_targets() {
        let desired = personal_desired();
        let plan = diff_warehouse(&WarehouseModel::new(), &desired);
        assert_references_resolve(&WarehouseModel::new(), &plan);

        let position = |op: WarehouseOp| plan.position(|step| *step == op).unwrap();
        let group = position(WarehouseOp::CreateGroup {
            scope: Scope::cluster("dev"),
            group: "bianalyst".into(),
            grants: vec![Grant::Schema {
                name: "public".into(),
            }],
        });
        let database = position(WarehouseOp::CreateDatabase {
            cluster: "dev".into(),
            database: "alice".into(),
            owner: None,
        });
        let schema = position(WarehouseOp::CreateExternalSchema {
            cluster: "dev".into(),
            database: "alice".into(),
            schema: "lake".into(),
            catalog: "glue_lake".into(),
        });
        let grant = position(WarehouseOp::UpdateGroup {
            scope: Scope::cluster("dev"),
            group: "bianalyst".into(),
            grant: vec![Grant::External {
                name: "lake".into(),
                catalog: "glue_lake".into(),
            }],
            revoke: vec![],
        });
        let owner = position(WarehouseOp::CreateUser {
            scope: Scope::cluster("dev"),
            user: "alice_bianalyst".into(),
            group: Some("bianalyst".into()),
        });
        let owned = position(WarehouseOp::UpdateDatabase {
            cluster: "dev".into(),
            database: "alice".into(),
            owner: Some("alice_bianalyst".into()),
        });
        assert!(group < database && database < schema);
        assert!(schema < grant && grant < owner && owner < owned);

        // converged: nothing left to do
        assert!(diff_warehouse(&desired, &desired).is_empty());
    }

    #[test]
    fn test_teardown_releases_owner_and_external_grant_first() {
        let current = personal_desired();
        let plan = diff_warehouse(&current, &WarehouseModel::new());
        assert_references_resolve(&current, &plan);

        let position = |op: WarehouseOp| plan.position(|step| *step == op).unwrap();
        let revoke = position(WarehouseOp::UpdateGroup {
            scope: Scope::cluster("dev"),
            group: "bianalyst".into(),
            grant: vec![],
            revoke: vec![Grant::External {
                name: "lake".into(),
                catalog: "glue_lake".into(),
            }],
        });
        let schema = position(WarehouseOp::DeleteExternalSchema {
            cluster: "dev".into(),
            database: "alice".into(),
            schema: "lake".into(),
        });
        let database = position(WarehouseOp::DeleteDatabase {
            cluster: "dev".into(),
            database: "alice".into(),
        });
        let owner = position(WarehouseOp::DeleteUser {
            scope: Scope::cluster("dev"),
            user: "alice_bianalyst".into(),
        });
        let group = position(WarehouseOp::DeleteGroup {
            scope: Scope::cluster("dev"),
            group: "bianalyst".into(),
        });
        assert!(revoke < schema && schema < database);
        assert!(database < owner && owner < group);
    }

    #[test]
    fn test_existing_owner_is_set_at_creation() {
        let mut current = WarehouseModel::new();
        current.declare_cluster("dev").declare_user("alice_bianalyst", None);

        let mut desired = WarehouseModel::new();
        let cluster = desired.declare_cluster("dev");
        cluster.declare_user("alice_bianalyst", None);
        cluster.declare_database_with_owner("alice", "alice_bianalyst");

        let plan = diff_warehouse(&current, &desired);
        assert_eq!(
            plan.steps(),
            [WarehouseOp::CreateDatabase {
                cluster: "dev".into(),
                database: "alice".into(),
                owner: Some("alice_bianalyst".into()),
            }]
        );
    }

    #[test]
    fn test_group_grant_changes_are_updates() {
        let mut current = WarehouseModel::new();
        let cluster = current.declare_cluster("dev");
        cluster
            .declare_database("jwr")
            .declare_external_schema("lake", "glue_lake");
        let group = cluster.declare_group("bianalyst");
        group.grant_schema("public");
        group.grant_schema("staging");

        let mut desired = WarehouseModel::new();
        let cluster = desired.declare_cluster("dev");
        cluster
            .declare_database("jwr")
            .declare_external_schema("lake", "glue_lake");
        let group = cluster.declare_group("BIAnalyst");
        group.grant_schema("PUBLIC");
        group.grant_external_schema("lake", "glue_lake");

        let plan = diff_warehouse(&current, &desired);
        assert_eq!(
            plan.steps(),
            [WarehouseOp::UpdateGroup {
                scope: Scope::cluster("dev"),
                group: "bianalyst".into(),
                grant: vec![Grant::External {
                    name: "lake".into(),
                    catalog: "glue_lake".into(),
                }],
                revoke: vec![Grant::Schema {
                    name: "staging".into(),
                }],
            }]
        );
    }

    #[test]
    fn test_membership_moves_before_group_removal() {
        let mut current = WarehouseModel::new();
        let cluster = current.declare_cluster("dev");
        cluster.declare_group("old");
        cluster.declare_user("jwr", Some("old"));

        let mut desired = WarehouseModel::new();
        let cluster = desired.declare_cluster("dev");
        cluster.declare_group("new");
        cluster.declare_user("jwr", Some("new"));

        let plan = diff_warehouse(&current, &desired);
        assert_eq!(
            plan.steps(),
            [
                WarehouseOp::CreateGroup {
                    scope: Scope::cluster("dev"),
                    group: "new".into(),
                    grants: vec![],
                },
                WarehouseOp::UpdateUser {
                    scope: Scope::cluster("dev"),
                    user: "jwr".into(),
                    from: Some("old".into()),
                    to: Some("new".into()),
                },
                WarehouseOp::DeleteGroup {
                    scope: Scope::cluster("dev"),
                    group: "old".into(),
                },
            ]
        );
    }

    #[test]
    fn test_moved_group_is_delete_and_create() {
        let mut current = WarehouseModel::new();
        current
            .declare_cluster("dev")
            .declare_database("jwr")
            .declare_group("bianalyst");

        let mut desired = WarehouseModel::new();
        let cluster = desired.declare_cluster("dev");
        cluster.declare_database("jwr");
        cluster.declare_group("bianalyst");

        let plan = diff_warehouse(&current, &desired);
        assert_eq!(
            plan.steps(),
            [
                WarehouseOp::CreateGroup {
                    scope: Scope::cluster("dev"),
                    group: "bianalyst".into(),
                    grants: vec![],
                },
                WarehouseOp::DeleteGroup {
                    scope: Scope::database("dev", "jwr"),
                    group: "bianalyst".into(),
                },
            ]
        );
    }

    #[test]
    fn test_database_owner_and_external_schema_changes() {
        let mut current = WarehouseModel::new();
        let cluster = current.declare_cluster("dev");
        cluster.declare_user("someone", None);
        cluster
            .declare_database_with_owner("jwr", "someone")
            .declare_external_schema("lake", "glue_old");

        let mut desired = WarehouseModel::new();
        let cluster = desired.declare_cluster("dev");
        cluster.declare_user("jwr_bianalyst", None);
        cluster
            .declare_database_with_owner("jwr", "jwr_bianalyst")
            .declare_external_schema("lake", "glue_new");

        let plan = diff_warehouse(&current, &desired);
        assert_references_resolve(&current, &plan);
        assert_eq!(
            plan.steps(),
            [
                WarehouseOp::DeleteExternalSchema {
                    cluster: "dev".into(),
                    database: "jwr".into(),
                    schema: "lake".into(),
                },
                WarehouseOp::CreateExternalSchema {
                    cluster: "dev".into(),
                    database: "jwr".into(),
                    schema: "lake".into(),
                    catalog: "glue_new".into(),
                },
                WarehouseOp::CreateUser {
                    scope: Scope::cluster("dev"),
                    user: "jwr_bianalyst".into(),
                    group: None,
                },
                WarehouseOp::UpdateDatabase {
                    cluster: "dev".into(),
                    database: "jwr".into(),
                    owner: Some("jwr_bianalyst".into()),
                },
                WarehouseOp::DeleteUser {
                    scope: Scope::cluster("dev"),
                    user: "someone".into(),
                },
            ]
        );
    }

    #[test]
    fn test_login_assignments() {
        let mut current = LoginModel::new();
        current.declare_user("alice@example.com").assign("analyst");
        current.declare_user("bob@example.com").assign("engineer");

        let mut desired = LoginModel::new();
        let alice = desired.declare_user("Alice@example.com");
        alice.assign("analyst");
        alice.assign("engineer");
        desired.declare_user("carol@example.com").assign("analyst");

        let plan = diff_logins(&current, &desired);
        assert_eq!(
            plan.steps(),
            [
                LoginOp::UpdateAssignments {
                    email: "alice@example.com".into(),
                    assign: vec!["engineer".into()],
                    unassign: vec![],
                },
                LoginOp::UpdateAssignments {
                    email: "carol@example.com".into(),
                    assign: vec!["analyst".into()],
                    unassign: vec![],
                },
                LoginOp::UpdateAssignments {
                    email: "bob@example.com".into(),
                    assign: vec![],
                    unassign: vec!["engineer".into()],
                },
            ]
        );
    }
}
