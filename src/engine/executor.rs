//! Parallel reconciliation across systems
//!
//! The three systems share nothing, so each gets its own applier, event log
//! and spinner on a rayon scope. Inside a system the applier runs its plan
//! strictly in order.

use declarative::{
    ApplyEvent, ApplySummary, EventLog, ExecuteOptions, IdentityApplier, LoginApplier,
    PolicyRenderer, WarehouseApplier,
};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};

use crate::cli::System;
use crate::progress;
use crate::resolver::Desired;
use crate::state::LocalState;

/// Result of converging one system
#[derive(Debug)]
pub struct SystemOutcome {
    pub system: System,
    pub summary: ApplySummary,
    /// Events of the mutations that completed, including on failure
    pub events: Vec<ApplyEvent>,
    pub error: Option<declarative::Error>,
}

impl SystemOutcome {
    /// `summary` counts the completed mutations, also when `result` failed
    fn new<T>(
        system: System,
        result: declarative::Result<T>,
        summary: ApplySummary,
        events: EventLog,
        pb: &ProgressBar,
    ) -> Self {
        let error = match result {
            Ok(_) => {
                progress::finish_success(
                    pb,
                    &format!("{}: {} changes", system.name(), summary.total_changes()),
                );
                None
            }
            Err(err) => {
                progress::finish_error(
                    pb,
                    &format!(
                        "{} failed after {} changes",
                        system.name(),
                        summary.total_changes()
                    ),
                );
                log::error!("{} failed: {err}", system.name());
                Some(err)
            }
        };
        Self {
            system,
            summary,
            events: events.into_events(),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Converge the selected systems in parallel; outcomes follow `systems` order
pub fn apply(
    state: &mut LocalState,
    desired: &Desired,
    renderer: &PolicyRenderer,
    systems: &[System],
    quiet: bool,
) -> Vec<SystemOutcome> {
    let multi = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    let opts = ExecuteOptions::default();

    let LocalState {
        warehouse,
        identity,
        login,
        ..
    } = state;

    let mut warehouse_outcome = None;
    let mut identity_outcome = None;
    let mut login_outcome = None;

    rayon::scope(|s| {
        if systems.contains(&System::Warehouse) {
            let pb = multi.add(progress::spinner("Converging warehouse..."));
            let opts = &opts;
            let out = &mut warehouse_outcome;
            s.spawn(move |_| {
                let mut events = EventLog::new();
                let mut applier = WarehouseApplier::new(warehouse, &mut events);
                let result = applier.apply(&desired.warehouse, opts);
                let summary = applier.completed().clone();
                *out = Some(SystemOutcome::new(
                    System::Warehouse,
                    result,
                    summary,
                    events,
                    &pb,
                ));
            });
        }

        if systems.contains(&System::Identity) {
            let pb = multi.add(progress::spinner("Converging identity..."));
            let opts = &opts;
            let out = &mut identity_outcome;
            s.spawn(move |_| {
                let mut events = EventLog::new();
                let mut applier = IdentityApplier::new(identity, renderer.clone(), &mut events);
                let result = applier.apply(&desired.identity, opts);
                let summary = applier.completed().clone();
                *out = Some(SystemOutcome::new(
                    System::Identity,
                    result,
                    summary,
                    events,
                    &pb,
                ));
            });
        }

        if systems.contains(&System::Login) {
            let pb = multi.add(progress::spinner("Converging login..."));
            let opts = &opts;
            let out = &mut login_outcome;
            s.spawn(move |_| {
                let mut events = EventLog::new();
                let mut applier = LoginApplier::new(login, &mut events);
                let result = applier.apply(&desired.login, opts);
                let summary = applier.completed().clone();
                *out = Some(SystemOutcome::new(
                    System::Login,
                    result,
                    summary,
                    events,
                    &pb,
                ));
            });
        }
    });

    let mut outcomes: Vec<SystemOutcome> = [warehouse_outcome, identity_outcome, login_outcome]
        .into_iter()
        .flatten()
        .collect();
    outcomes.sort_by_key(|o| systems.iter().position(|s| *s == o.system));
    outcomes
}
