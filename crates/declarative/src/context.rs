//! Apply events and caller-provided capabilities
//!
//! Appliers never record events globally. The caller injects an
//! [`EventSink`] at construction and receives one [`ApplyEvent`] per
//! executed mutation; tests substitute an [`EventLog`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::{Change, Entity};

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl From<Change> for EventKind {
    fn from(change: Change) -> Self {
        match change {
            Change::Create => Self::Created,
            Change::Update => Self::Updated,
            Change::Delete => Self::Deleted,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// One executed mutation, e.g. `PolicyUpdated alice_analyst`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyEvent {
    pub entity: Entity,
    pub kind: EventKind,
    pub name: String,
}

impl ApplyEvent {
    pub fn new(entity: Entity, kind: EventKind, name: impl Into<String>) -> Self {
        Self {
            entity,
            kind,
            name: name.into(),
        }
    }

    /// Event label such as `RoleCreated`
    pub fn label(&self) -> String {
        format!("{}{}", self.entity, self.kind)
    }
}

impl fmt::Display for ApplyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.entity, self.kind, self.name)
    }
}

/// Receives one event per executed mutation
///
/// Events are for auditing only; appliers never read them back.
pub trait EventSink: Send {
    fn emit(&mut self, event: ApplyEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: ApplyEvent) {
        (**self).emit(event);
    }
}

/// Discards every event
pub struct NoEvents;

impl EventSink for NoEvents {
    fn emit(&mut self, _event: ApplyEvent) {}
}

/// Collects events in emission order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ApplyEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ApplyEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Rendered events, e.g. `["RoleCreated analyst"]`
    pub fn rendered(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    /// Names of the entities that saw `kind` happen to them
    pub fn names(&self, entity: Entity, kind: EventKind) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.entity == entity && e.kind == kind)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn into_events(self) -> Vec<ApplyEvent> {
        self.events
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: ApplyEvent) {
        self.events.push(event);
    }
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
