//! Declarative models for the three external systems.
//!
//! Entities are only ever built through `declare_*` calls, which return the
//! existing entity when the normalized name is already present. Models are
//! read-only once handed to the plan builder or an applier.

pub mod identity;
pub mod login;
pub mod name;
pub mod warehouse;

pub use identity::{DatabaseAccess, DatabaseLoginPolicy, IdentityModel, Role};
pub use login::{LoginModel, LoginUser};
pub use name::{Keyed, Named, normalize};
pub use warehouse::{Cluster, Database, ExternalSchema, Group, Schema, User, WarehouseModel};
