//! Invoicing: factures (invoices) and the paiements (payments) settling them.

pub mod facture;
pub mod paiement;

pub use facture::{Facture, FacturePatch, FactureStatus, NewFacture};
pub use paiement::{NewPaiement, Paiement, PaiementPatch, PaiementStatus};
