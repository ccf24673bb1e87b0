//! Plan display - grantctl-specific UI

use colored::{ColoredString, Colorize};
use declarative::{Change, IdentityOp, Operation, Plan};
use similar::{ChangeTag, TextDiff};

use super::planner::SystemPlans;
use crate::cli::System;

/// Display every planned system, grouped by scope
pub fn display_plans(plans: &SystemPlans, verbose: bool) {
    if let Some(plan) = &plans.warehouse {
        display_plan(System::Warehouse, plan, |_| Vec::new());
    }
    if let Some(plan) = &plans.identity {
        display_plan(System::Identity, plan, |op| policy_lines(op, verbose));
    }
    if let Some(plan) = &plans.login {
        display_plan(System::Login, plan, |_| Vec::new());
    }

    let summary = plans.summary();
    println!();
    if summary.has_changes() {
        println!(
            "  Plan: {} to create, {} to update, {} to delete",
            summary.additions.to_string().green(),
            summary.modifications.to_string().yellow(),
            summary.removals.to_string().red()
        );
    } else {
        println!("  {} No changes needed", "✓".green());
    }
}

fn display_plan<Op, F>(system: System, plan: &Plan<Op>, extra: F)
where
    Op: Operation,
    F: Fn(&Op) -> Vec<String>,
{
    println!();
    println!("{}", system.name().cyan().bold());

    if plan.is_empty() {
        println!("  {}", "No changes".dimmed());
        return;
    }

    for (scope, ops) in plan.grouped() {
        println!("  {}", scope.bold());
        for op in ops {
            println!("    {}", line(op));
            for detail in extra(op) {
                println!("        {detail}");
            }
        }
    }
}

fn symbol(change: Change) -> ColoredString {
    let symbol = change.symbol().to_string();
    match change {
        Change::Create => symbol.green(),
        Change::Update => symbol.yellow(),
        Change::Delete => symbol.red(),
    }
}

/// One step, e.g. `+ group bianalyst (grant public)`
fn line<Op: Operation>(op: &Op) -> String {
    let head = format!("{} {} {}", symbol(op.change()), op.entity().noun(), op.target());
    match op.detail() {
        Some(detail) if !detail.is_empty() => {
            format!("{head} {}", format!("({detail})").dimmed())
        }
        _ => head,
    }
}

/// Document lines shown under a policy step
fn policy_lines(op: &IdentityOp, verbose: bool) -> Vec<String> {
    match op {
        IdentityOp::UpdatePolicy {
            previous: Some(previous),
            document,
            ..
        } => colorize(&policy_diff(previous, document)),
        IdentityOp::CreatePolicy { document, .. } if verbose => document
            .lines()
            .map(|l| format!("+{l}").green().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Unified diff of two policy documents, `-`/`+`/` ` prefixed
pub fn policy_diff(previous: &str, document: &str) -> Vec<String> {
    let diff = TextDiff::from_lines(previous, document);
    diff.iter_all_changes()
        .map(|change| {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            format!("{sign}{}", change.value().trim_end_matches('\n'))
        })
        .collect()
}

fn colorize(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| match l.chars().next() {
            Some('-') => l.red().to_string(),
            Some('+') => l.green().to_string(),
            _ => l.dimmed().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Scope, WarehouseOp};

    #[test]
    fn test_policy_diff_marks_changed_lines() {
        let previous = "{\n  \"a\": 1,\n  \"b\": 2\n}\n";
        let document = "{\n  \"a\": 1,\n  \"b\": 3\n}\n";
        let diff = policy_diff(previous, document);

        assert!(diff.contains(&"-  \"b\": 2".to_string()));
        assert!(diff.contains(&"+  \"b\": 3".to_string()));
        assert!(diff.contains(&"   \"a\": 1,".to_string()));
        assert_eq!(diff.iter().filter(|l| l.starts_with('-')).count(), 1);
    }

    #[test]
    fn test_line_includes_detail() {
        colored::control::set_override(false);
        let op = WarehouseOp::CreateUser {
            scope: Scope::cluster("dev"),
            user: "jwr_bianalyst".into(),
            group: Some("bianalyst".into()),
        };
        assert_eq!(line(&op), "+ user jwr_bianalyst (member of bianalyst)");
    }

    #[test]
    fn test_update_without_previous_has_no_diff() {
        let op = IdentityOp::UpdatePolicy {
            role: "analyst".into(),
            policy: "alice_analyst".into(),
            previous: None,
            document: "{}".into(),
        };
        assert!(policy_lines(&op, true).is_empty());

        let create = IdentityOp::CreatePolicy {
            role: "analyst".into(),
            policy: "alice_analyst".into(),
            document: "{\n}".into(),
        };
        assert!(policy_lines(&create, false).is_empty());
        assert_eq!(policy_lines(&create, true).len(), 2);
    }
}
