use anyhow::Result;
use declarative::{AutoConfirm, ConfirmCallback};
use dialoguer::Confirm;

use super::Session;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Settings;
use crate::engine::{self, SystemOutcome, differ, events};
use crate::ui;

/// Asks on the terminal
struct TerminalConfirm;

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> declarative::Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(|e| declarative::Error::Io(std::io::Error::other(e)))
    }
}

pub fn run(ctx: &Context, settings: Settings, args: &ApplyArgs) -> Result<()> {
    let mut confirm: Box<dyn ConfirmCallback> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalConfirm)
    };
    converge(ctx, settings, args, confirm.as_mut())
}

fn converge(
    ctx: &Context,
    settings: Settings,
    args: &ApplyArgs,
    confirm: &mut dyn ConfirmCallback,
) -> Result<()> {
    let mut session = Session::open(settings)?;
    let renderer = session.settings.renderer();
    let systems = args.target.selected();

    let plans = engine::plan(&mut session.state, &session.desired, &renderer, &systems)?;
    if !ctx.quiet {
        differ::display_plans(&plans, ctx.verbose > 0);
    }

    if !plans.has_changes() {
        return Ok(());
    }

    if args.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    println!();
    if !confirm.confirm("Apply these changes?")? {
        ui::error("Aborted");
        return Ok(());
    }

    let outcomes = engine::apply(
        &mut session.state,
        &session.desired,
        &renderer,
        &systems,
        ctx.quiet,
    );

    session.state.save(&session.settings.state)?;
    let written = events::append(&session.settings.events_path(), &outcomes)?;
    log::info!("Recorded {written} events");

    if !ctx.quiet {
        print_events(&outcomes);
    }
    print_summary(&outcomes);

    let mut failures = outcomes.into_iter().filter_map(|o| {
        let system = o.system;
        o.error.map(|err| (system, err))
    });
    if let Some((system, err)) = failures.next() {
        let others = failures.count();
        let err = anyhow::Error::new(err).context(format!("{} reconciliation failed", system.name()));
        if others > 0 {
            ui::error(&format!("{others} more system(s) failed, see the log above"));
        }
        return Err(err);
    }
    Ok(())
}

fn print_events(outcomes: &[SystemOutcome]) {
    for outcome in outcomes.iter().filter(|o| !o.events.is_empty()) {
        ui::section(outcome.system.name());
        for event in &outcome.events {
            println!("  {}", ui::event_line(event));
        }
    }
}

fn print_summary(outcomes: &[SystemOutcome]) {
    let mut total = declarative::ApplySummary::default();
    for outcome in outcomes {
        total.merge(&outcome.summary);
    }

    println!();
    if outcomes.iter().all(SystemOutcome::is_success) {
        ui::success("Grants applied successfully!");
    } else {
        ui::warn("Grants applied with errors");
    }

    if total.created > 0 {
        println!("    • {} created", total.created);
    }
    if total.modified > 0 {
        println!("    • {} modified", total.modified);
    }
    if total.removed > 0 {
        println!("    • {} removed", total.removed);
    }
    if total.no_change > 0 {
        println!("    • {} unchanged", total.no_change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SystemArgs;
    use crate::commands::tests::settings;
    use crate::state::LocalState;
    use declarative::{AutoDecline, WarehouseBackend};
    use std::fs;
    use tempfile::TempDir;

    const GRANTS: &str = r#"
[[databases]]
cluster = "dev"
name = "jwr"

[[roles]]
name = "bianalyst"
acl = ["public"]
databases = [{ cluster = "dev", name = "jwr" }]

[[users]]
email = "jwr@lunar.app"
username = "jwr"
roles = ["bianalyst"]
"#;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    fn args(dry_run: bool) -> ApplyArgs {
        ApplyArgs {
            yes: true,
            dry_run,
            target: SystemArgs::default(),
        }
    }

    #[test]
    fn test_apply_saves_state_and_events() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, GRANTS);
        let state_path = settings.state.clone();
        let events_path = settings.events_path();

        converge(&ctx(), settings, &args(false), &mut AutoConfirm).unwrap();

        let state = LocalState::load(&state_path, "1").unwrap();
        assert!(
            state
                .warehouse
                .observe()
                .unwrap()
                .lookup_database("dev", "jwr")
                .is_some()
        );
        let events = fs::read_to_string(events_path).unwrap();
        assert!(events.lines().count() > 3);
        assert!(events.contains("\"system\":\"login\""));
    }

    #[test]
    fn test_dry_run_and_decline_change_nothing() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, GRANTS);
        let state_path = settings.state.clone();

        converge(&ctx(), settings.clone(), &args(true), &mut AutoConfirm).unwrap();
        assert!(!state_path.exists());

        converge(&ctx(), settings, &args(false), &mut AutoDecline).unwrap();
        assert!(!state_path.exists());
    }
}
