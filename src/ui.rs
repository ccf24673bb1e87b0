//! Terminal output helpers

use colored::{ColoredString, Colorize};
use declarative::{ApplyEvent, EventKind};

/// Kind of a one-line status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Info,
    Success,
    Warn,
    Error,
}

impl Status {
    fn symbol(self) -> ColoredString {
        match self {
            Self::Info => "ℹ".blue(),
            Self::Success => "✓".green(),
            Self::Warn => "⚠".yellow(),
            Self::Error => "✗".red(),
        }
    }
}

/// `✓ msg` and friends; errors go to stderr
pub fn status(kind: Status, msg: &str) {
    match kind {
        Status::Error => eprintln!("{} {}", kind.symbol(), msg),
        _ => println!("{} {}", kind.symbol(), msg),
    }
}

pub fn info(msg: &str) {
    status(Status::Info, msg);
}

pub fn success(msg: &str) {
    status(Status::Success, msg);
}

pub fn warn(msg: &str) {
    status(Status::Warn, msg);
}

pub fn error(msg: &str) {
    status(Status::Error, msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One executed event, colored by what happened
pub fn event_line(event: &ApplyEvent) -> String {
    let label = event.label();
    let label = match event.kind {
        EventKind::Created => label.green(),
        EventKind::Updated => label.yellow(),
        EventKind::Deleted => label.red(),
    };
    format!("{label} {}", event.name)
}
