use super::{Applied, failed, verb};
use crate::backend::WarehouseBackend;
use crate::context::{ApplyEvent, EventSink};
use crate::diff::diff_warehouse;
use crate::error::{Result, ResultExt};
use crate::model::WarehouseModel;
use crate::planner::Plan;
use crate::types::{ApplySummary, Entity, ExecuteOptions, Operation, Scope, WarehouseOp};

/// Converges the warehouse system towards a desired model
pub struct WarehouseApplier<'a, B: ?Sized, S> {
    backend: &'a mut B,
    events: S,
    completed: ApplySummary,
}

impl<'a, B, S> WarehouseApplier<'a, B, S>
where
    B: WarehouseBackend + ?Sized,
    S: EventSink,
{
    pub fn new(backend: &'a mut B, events: S) -> Self {
        Self {
            backend,
            events,
            completed: ApplySummary::default(),
        }
    }

    /// Changes made by the last run, including one that failed part way
    pub fn completed(&self) -> &ApplySummary {
        &self.completed
    }

    /// Observe the warehouse and diff it against `desired`
    pub fn plan(&self, desired: &WarehouseModel) -> Result<Plan<WarehouseOp>> {
        let current = self.backend.observe().observing("warehouse state")?;
        Ok(diff_warehouse(&current, desired))
    }

    /// Plan, then execute unless this is a dry run
    pub fn apply(
        &mut self,
        desired: &WarehouseModel,
        opts: &ExecuteOptions,
    ) -> Result<Applied<WarehouseOp>> {
        self.completed = ApplySummary::default();
        let plan = self.plan(desired)?;
        if opts.dry_run || plan.is_empty() {
            return Ok(Applied::planned(plan));
        }
        let summary = self.execute(&plan)?;
        Ok(Applied { plan, summary })
    }

    /// Run every step in order, halting on the first failure
    pub fn execute(&mut self, plan: &Plan<WarehouseOp>) -> Result<ApplySummary> {
        self.completed = ApplySummary::default();
        for op in plan {
            let name = event_name(op);
            log::info!("{} {} {}", verb(op.change()), op.entity().noun(), name);
            self.perform(op)
                .during(&failed(op.change(), op.entity()), &name)?;
            self.completed.add(op.change());
            self.events
                .emit(ApplyEvent::new(op.entity(), op.change().into(), name));
        }
        Ok(self.completed.clone())
    }

    fn perform(&mut self, op: &WarehouseOp) -> Result<()> {
        let backend = &mut *self.backend;
        match op {
            WarehouseOp::CreateCluster { cluster } => backend.create_cluster(cluster),
            WarehouseOp::DeleteCluster { cluster } => backend.delete_cluster(cluster),
            WarehouseOp::CreateDatabase {
                cluster,
                database,
                owner,
            } => backend.create_database(cluster, database, owner.as_deref()),
            WarehouseOp::UpdateDatabase {
                cluster,
                database,
                owner,
            } => backend.alter_database_owner(cluster, database, owner.as_deref()),
            WarehouseOp::DeleteDatabase { cluster, database } => {
                backend.drop_database(cluster, database)
            }
            WarehouseOp::CreateExternalSchema {
                cluster,
                database,
                schema,
                catalog,
            } => backend.create_external_schema(cluster, database, schema, catalog),
            WarehouseOp::DeleteExternalSchema {
                cluster,
                database,
                schema,
            } => backend.drop_external_schema(cluster, database, schema),
            WarehouseOp::CreateGroup {
                scope,
                group,
                grants,
            } => {
                backend.create_group(scope, group)?;
                for grant in grants {
                    backend.grant(scope, group, grant)?;
                }
                Ok(())
            }
            WarehouseOp::UpdateGroup {
                scope,
                group,
                grant,
                revoke,
            } => {
                for g in grant {
                    backend.grant(scope, group, g)?;
                }
                for g in revoke {
                    backend.revoke(scope, group, g)?;
                }
                Ok(())
            }
            WarehouseOp::DeleteGroup { scope, group } => backend.drop_group(scope, group),
            WarehouseOp::CreateUser { scope, user, group } => {
                backend.create_user(scope, user, group.as_deref())
            }
            WarehouseOp::UpdateUser {
                scope, user, to, ..
            } => backend.alter_user_group(scope, user, to.as_deref()),
            WarehouseOp::DeleteUser { scope, user } => backend.drop_user(scope, user),
        }
    }
}

/// Fully qualified name of the entity an operation touches, e.g. `dev/jwr/bianalyst`
fn event_name(op: &WarehouseOp) -> String {
    match op {
        WarehouseOp::CreateGroup { scope, group, .. }
        | WarehouseOp::UpdateGroup { scope, group, .. }
        | WarehouseOp::DeleteGroup { scope, group } => scope.qualify(group),
        WarehouseOp::CreateUser { scope, user, .. }
        | WarehouseOp::UpdateUser { scope, user, .. }
        | WarehouseOp::DeleteUser { scope, user } => scope.qualify(user),
        WarehouseOp::CreateExternalSchema {
            cluster,
            database,
            schema,
            ..
        }
        | WarehouseOp::DeleteExternalSchema {
            cluster,
            database,
            schema,
        } => Scope::database(cluster, database).qualify(schema),
        _ if op.entity() == Entity::Database || op.entity() == Entity::Cluster => op.scope(),
        _ => op.target(),
    }
}
