//! `crm-core`: shared building blocks for every CRM crate.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP, no storage).

pub mod error;
pub mod id;
pub mod loadable;
pub mod money;
pub mod record;
pub mod validate;

pub use error::{DomainError, DomainResult};
pub use id::{OrganizationId, RecordId, UserId};
pub use loadable::Loadable;
pub use money::Cents;
pub use record::{Ordering, Record, RecordMessages, Relation, Validate};
