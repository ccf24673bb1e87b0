//! Plans - strictly ordered sequences of mutations

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Change, Operation};

/// An ordered sequence of operations against one external system
///
/// Steps execute in order. The plan builder guarantees that every create of
/// an entity precedes operations referencing it, and every delete of an
/// entity follows the removal of everything referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan<Op> {
    steps: Vec<Op>,
}

impl<Op> Plan<Op> {
    /// Create an empty plan
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step
    pub fn push(&mut self, op: Op) {
        self.steps.push(op);
    }

    pub fn steps(&self) -> &[Op] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Position of the first step matching `predicate`
    pub fn position<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&Op) -> bool,
    {
        self.steps.iter().position(predicate)
    }
}

impl<Op: Operation> Plan<Op> {
    /// Count steps by direction
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for step in &self.steps {
            match step.change() {
                Change::Create => summary.additions += 1,
                Change::Update => summary.modifications += 1,
                Change::Delete => summary.removals += 1,
            }
        }
        summary
    }

    /// Consecutive steps sharing a scope, in plan order
    pub fn grouped(&self) -> Vec<(String, Vec<&Op>)> {
        let mut groups: Vec<(String, Vec<&Op>)> = Vec::new();
        for step in &self.steps {
            let scope = step.scope();
            if let Some((current, ops)) = groups.last_mut()
                && *current == scope
            {
                ops.push(step);
                continue;
            }
            groups.push((scope, vec![step]));
        }
        groups
    }
}

impl<Op> Default for Plan<Op> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Op> FromIterator<Op> for Plan<Op> {
    fn from_iter<I: IntoIterator<Item = Op>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl<'a, Op> IntoIterator for &'a Plan<Op> {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Render one step as `+ group bianalyst (grant public)`
pub fn describe<Op: Operation>(op: &Op) -> String {
    let entity = op.entity().noun();
    match op.detail() {
        Some(detail) if !detail.is_empty() => {
            format!("{} {} {} ({})", op.change().symbol(), entity, op.target(), detail)
        }
        _ => format!("{} {} {}", op.change().symbol(), entity, op.target()),
    }
}

/// Plain-text dry-run rendering, grouped by scope
impl<Op: Operation> fmt::Display for Plan<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return writeln!(f, "No changes");
        }
        for (scope, ops) in self.grouped() {
            writeln!(f, "{scope}")?;
            for op in ops {
                writeln!(f, "  {}", describe(op))?;
            }
        }
        let summary = self.summary();
        writeln!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            summary.additions, summary.modifications, summary.removals
        )
    }
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Number of entities to create
    pub additions: usize,
    /// Number of entities to delete
    pub removals: usize,
    /// Number of entities to update
    pub modifications: usize,
}

impl PlanSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
