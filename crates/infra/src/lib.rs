//! Infrastructure layer: remote store, auth provider clients, query cache,
//! notifications and the data-access repository.
//!
//! Domain crates stay free of IO; everything that talks to the hosted backend
//! (or emulates it in memory for dev and tests) lives here behind the ports
//! defined in `crm-auth`, `crm-tenancy` and `crm-onboarding`.

pub mod adapters;
pub mod cache;
pub mod gotrue;
pub mod memory_auth;
pub mod notify;
pub mod repository;
pub mod store;

pub use adapters::{StoreMemberships, StoreOnboarding, StoreProfiles};
pub use cache::{InMemoryQueryCache, QueryCache};
pub use gotrue::GoTrueClient;
pub use memory_auth::InMemoryAuthProvider;
pub use notify::{Notification, NotificationQueue, Variant};
pub use repository::{DataContext, DataError, DataServices, Repository, SubmissionTicket, Submissions};
pub use store::{Caller, Filter, InMemoryStore, PostgrestStore, RemoteStore, Select, StoreError};
