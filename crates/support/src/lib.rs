//! Follow-up work: internal tasks (`taches`) and customer claims
//! (`reclamations`).

pub mod reclamation;
pub mod tache;

pub use reclamation::{NewReclamation, Reclamation, ReclamationPatch, ReclamationStatus};
pub use tache::{NewTache, Tache, TachePatch, TacheStatus};
