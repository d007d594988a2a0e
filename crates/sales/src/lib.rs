//! Sales: quotes (`devis`) with their lines, and delivered services
//! (`prestations`).

pub mod devis;
pub mod prestation;

pub use devis::{Devis, DevisItem, DevisItemPatch, DevisPatch, DevisStatus, NewDevis, NewDevisItem};
pub use prestation::{NewPrestation, Prestation, PrestationPatch, PrestationStatus};
