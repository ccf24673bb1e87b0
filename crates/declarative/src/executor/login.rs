use super::Applied;
use crate::backend::LoginBackend;
use crate::context::{ApplyEvent, EventKind, EventSink};
use crate::diff::diff_logins;
use crate::error::{Result, ResultExt};
use crate::model::LoginModel;
use crate::planner::Plan;
use crate::types::{ApplySummary, Entity, ExecuteOptions, LoginOp};

/// Converges which roles each workspace login may sign in with
pub struct LoginApplier<'a, B: ?Sized, S> {
    backend: &'a mut B,
    events: S,
    completed: ApplySummary,
}

impl<'a, B, S> LoginApplier<'a, B, S>
where
    B: LoginBackend + ?Sized,
    S: EventSink,
{
    pub fn new(backend: &'a mut B, events: S) -> Self {
        Self {
            backend,
            events,
            completed: ApplySummary::default(),
        }
    }

    /// Logins updated by the last run, including one that failed part way
    pub fn completed(&self) -> &ApplySummary {
        &self.completed
    }

    pub fn plan(&self, desired: &LoginModel) -> Result<Plan<LoginOp>> {
        let current = self.backend.observe().observing("login assignments")?;
        Ok(diff_logins(&current, desired))
    }

    pub fn apply(&mut self, desired: &LoginModel, opts: &ExecuteOptions) -> Result<Applied<LoginOp>> {
        self.completed = ApplySummary::default();
        let plan = self.plan(desired)?;
        if opts.dry_run || plan.is_empty() {
            return Ok(Applied::planned(plan));
        }
        let summary = self.execute(&plan)?;
        Ok(Applied { plan, summary })
    }

    pub fn execute(&mut self, plan: &Plan<LoginOp>) -> Result<ApplySummary> {
        self.completed = ApplySummary::default();
        for op in plan {
            let LoginOp::UpdateAssignments {
                email,
                assign,
                unassign,
            } = op;
            log::info!("Updating role assignments of {email}");
            for role in assign {
                self.backend
                    .assign(email, role)
                    .during("failed assigning role", role)
                    .during("failed updating login", email)?;
            }
            for role in unassign {
                self.backend
                    .unassign(email, role)
                    .during("failed unassigning role", role)
                    .during("failed updating login", email)?;
            }
            self.completed.modified += 1;
            self.events
                .emit(ApplyEvent::new(Entity::Login, EventKind::Updated, email));
        }
        Ok(self.completed.clone())
    }
}
