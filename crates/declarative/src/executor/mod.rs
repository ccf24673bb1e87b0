//! Apply executors - turn plans into backend primitive calls
//!
//! One applier per external system. Each applier borrows its backend, takes
//! an injected [`EventSink`](crate::context::EventSink), and runs strictly
//! sequentially: the first failing primitive aborts the run with an error
//! naming the operation and the entity, leaving the system in the state the
//! last completed operation produced. Re-running the whole reconciliation is
//! the recovery path.

mod identity;
mod login;
mod warehouse;

pub use identity::IdentityApplier;
pub use login::LoginApplier;
pub use warehouse::WarehouseApplier;

use crate::planner::Plan;
use crate::types::{ApplySummary, Change, Entity};

/// Outcome of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<Op> {
    /// Operations executed, or that would have been in a dry run
    pub plan: Plan<Op>,
    pub summary: ApplySummary,
}

impl<Op> Applied<Op> {
    fn planned(plan: Plan<Op>) -> Self {
        Self {
            plan,
            summary: ApplySummary::default(),
        }
    }
}

/// Progressive verb for log lines, e.g. `Creating`
fn verb(change: Change) -> &'static str {
    match change {
        Change::Create => "Creating",
        Change::Update => "Updating",
        Change::Delete => "Deleting",
    }
}

/// Action text for error context, e.g. `failed creating group`
fn failed(change: Change, entity: Entity) -> String {
    format!("failed {} {}", verb(change).to_lowercase(), entity.noun())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_action_text() {
        assert_eq!(
            failed(Change::Delete, Entity::ExternalSchema),
            "failed deleting external schema"
        );
        assert_eq!(verb(Change::Update), "Updating");
    }
}
