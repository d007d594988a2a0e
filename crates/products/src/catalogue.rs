use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{Cents, DomainResult, Ordering, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};

/// `catalogue` row: a product or service that can be quoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueItem {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub reference: String,
    pub nom: String,
    pub description: Option<String>,
    pub classification: Option<String>,
    /// Unit price before tax.
    pub prix_unitaire_ht: Option<Cents>,
    pub statut: Option<String>,
    pub fiche_produit: Option<String>,
    pub lien_pdf: Option<String>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Catalogue columns embedded into quote lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueSummary {
    pub nom: String,
    pub reference: String,
}

impl CatalogueSummary {
    pub const RELATION: Relation = Relation {
        table: "catalogue",
        foreign_key: "catalogue_id",
        columns: &["nom", "reference"],
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCatalogueItem {
    pub reference: String,
    pub nom: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prix_unitaire_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiche_produit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lien_pdf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewCatalogueItem {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("reference", &self.reference)?;
        validate::require_non_empty("nom", &self.nom)?;
        validate::non_negative_amount("prix_unitaire_ht", self.prix_unitaire_ht)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prix_unitaire_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for CatalogueItemPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("reference", self.reference.as_deref())?;
        validate::non_empty_if_present("nom", self.nom.as_deref())?;
        validate::non_negative_amount("prix_unitaire_ht", self.prix_unitaire_ht)
    }
}

impl Record for CatalogueItem {
    type Create = NewCatalogueItem;
    type Patch = CatalogueItemPatch;

    const TABLE: &'static str = "catalogue";
    const ORDER: Ordering = Ordering::asc("nom");
    const DELETABLE: bool = true;
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Produit ajouté", "Le produit a été ajouté au catalogue avec succès."),
        updated: ("Produit modifié", "Le produit a été modifié avec succès."),
        deleted: ("Produit supprimé", "Le produit a été supprimé du catalogue."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(prix: Option<Cents>) -> NewCatalogueItem {
        NewCatalogueItem {
            reference: "FORM-01".to_string(),
            nom: "Formation".to_string(),
            prix_unitaire_ht: prix,
            ..NewCatalogueItem::default()
        }
    }

    #[test]
    fn catalogue_lists_by_name() {
        assert_eq!(CatalogueItem::ORDER, Ordering::asc("nom"));
        assert!(CatalogueItem::DELETABLE);
    }

    #[test]
    fn reference_and_name_are_required() {
        assert!(item(Some(Cents::new(12_000))).validate().is_ok());
        let mut missing = item(None);
        missing.reference.clear();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn row_without_optional_columns_deserializes() {
        let row: CatalogueItem = serde_json::from_value(serde_json::json!({
            "id": RecordId::new(),
            "organization_id": null,
            "reference": "X",
            "nom": "Audit"
        }))
        .unwrap();
        assert_eq!(row.prix_unitaire_ht, None);
        assert_eq!(row.organization_id(), None);
    }

    proptest! {
        #[test]
        fn negative_prices_are_rejected(prix in -100_000_000_000i64..0) {
            prop_assert!(item(Some(Cents::new(prix))).validate().is_err());
        }
    }
}
