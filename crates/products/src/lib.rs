//! Product and service catalogue.

pub mod catalogue;

pub use catalogue::{CatalogueItem, CatalogueItemPatch, CatalogueSummary, NewCatalogueItem};
