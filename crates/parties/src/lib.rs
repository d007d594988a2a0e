//! Parties: contacts (people) and entreprises (companies).
//!
//! Plain row/insert/patch types with their validation rules; storage lives in
//! `crm-infra`.

pub mod contact;
pub mod entreprise;

pub use contact::{Contact, ContactPatch, ContactSummary, ContactType, NewContact};
pub use entreprise::{Entreprise, EntreprisePatch, EntrepriseSummary, NewEntreprise};
