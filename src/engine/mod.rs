//! Reconciliation engine for grantctl
//!
//! The engine orchestrates:
//! 1. Planning - Compare each selected system with the resolved grants
//! 2. Rendering - Show the plans as colored text or JSON
//! 3. Executing - Converge the systems in parallel, one applier per system
//! 4. Auditing - Append the executed events to the events log

pub mod differ;
pub mod events;
pub mod executor;
pub mod planner;

pub use executor::{SystemOutcome, apply};
pub use planner::plan;
