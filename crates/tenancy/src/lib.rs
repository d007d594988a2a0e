//! `crm-tenancy`: organization membership and the organization gate.
//!
//! Every tenant-scoped read or write waits for [`OrganizationResolver`] to
//! produce an organization; [`gate`] turns its state into exactly one view.

pub mod gate;
pub mod organization;
pub mod resolver;

pub use gate::{OrganizationGate, OrganizationGateView, evaluate};
pub use organization::{Membership, Organization, OrganizationPatch, ResolvedOrganization};
pub use resolver::{LookupError, MembershipSource, OrganizationResolver, OrganizationState};
