//! Remote data store boundary.
//!
//! Table-level reads and writes against the hosted database, always on behalf
//! of a [`Caller`] so the store's row-level security sees who is asking.

pub mod in_memory;
pub mod postgrest;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgrest::PostgrestStore;
pub use query::{Filter, Select};
pub use r#trait::{Caller, RemoteStore, StoreError};
