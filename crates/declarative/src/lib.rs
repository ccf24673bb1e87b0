//! # Declarative
//!
//! Declarative access-grant reconciliation for a data warehouse, the
//! identity system that issues warehouse credentials, and the workspace
//! login that exposes identity roles to people.
//!
//! ## Core Concepts
//!
//! - **Model**: a name-keyed, insertion-ordered tree describing one system
//!   (clusters/databases/groups/users, roles/login policies, logins)
//! - **Plan**: the strictly ordered mutations turning a current model into a
//!   desired one, creating parents first and deleting children first
//! - **Backend**: the thin list/create/update/delete primitives of a system
//! - **Applier**: observes a backend, plans, and executes the plan in order,
//!   reporting one [`ApplyEvent`] per executed mutation to an injected
//!   [`EventSink`]
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     EventLog, ExecuteOptions, MemoryWarehouse, WarehouseApplier, WarehouseModel,
//! };
//!
//! let mut desired = WarehouseModel::new();
//! let cluster = desired.declare_cluster("dev");
//! cluster.declare_group("bianalyst").grant_schema("public");
//! cluster.declare_user("jwr_bianalyst", Some("bianalyst"));
//!
//! let mut warehouse = MemoryWarehouse::new();
//! let mut events = EventLog::new();
//! let applied = WarehouseApplier::new(&mut warehouse, &mut events)
//!     .apply(&desired, &ExecuteOptions::default())
//!     .unwrap();
//!
//! assert_eq!(applied.summary.created, 3);
//! assert_eq!(events.rendered()[0], "ClusterCreated dev");
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`WarehouseBackend`], [`IdentityBackend`], [`LoginBackend`]: system primitives
//! - [`EventSink`]: receives apply events
//! - [`ConfirmCallback`]: handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on specific
//! cloud clients or UI frameworks.

pub mod backend;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod memory;
pub mod model;
pub mod planner;
pub mod policy;
pub mod types;

// Re-export main types at crate root
pub use backend::{AttachedPolicy, IdentityBackend, LoginBackend, RoleInfo, WarehouseBackend};
pub use context::{
    ApplyEvent, AutoConfirm, AutoDecline, ConfirmCallback, EventKind, EventLog, EventSink,
    NoEvents,
};
pub use diff::{diff_logins, diff_warehouse};
pub use error::{Error, Result, ResultExt};
pub use executor::{Applied, IdentityApplier, LoginApplier, WarehouseApplier};
pub use memory::{MemoryIdentity, MemoryLogin, MemoryWarehouse};
pub use model::{
    Cluster, Database, DatabaseAccess, DatabaseLoginPolicy, ExternalSchema, Group,
    IdentityModel, LoginModel, LoginUser, Role, Schema, User, WarehouseModel,
};
pub use planner::{Plan, PlanSummary, describe};
pub use policy::PolicyRenderer;
pub use types::{
    ApplySummary, Change, Entity, ExecuteOptions, Grant, IdentityOp, LoginOp, Operation, Scope,
    WarehouseOp,
};
