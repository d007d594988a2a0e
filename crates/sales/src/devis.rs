use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{Cents, DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};
use crm_parties::{ContactSummary, EntrepriseSummary};
use crm_products::CatalogueSummary;

/// Quote lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevisStatus {
    Brouillon,
    Envoye,
    Accepte,
    Refuse,
    Expire,
}

impl DevisStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            DevisStatus::Brouillon => "Brouillon",
            DevisStatus::Envoye => "Envoyé",
            DevisStatus::Accepte => "Accepté",
            DevisStatus::Refuse => "Refusé",
            DevisStatus::Expire => "Expiré",
        }
    }

    /// Still awaiting a decision from the customer.
    pub fn is_open(self) -> bool {
        matches!(self, DevisStatus::Brouillon | DevisStatus::Envoye)
    }
}

/// `devis` row (quote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devis {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub numero_devis: String,
    pub date_emission: Option<NaiveDate>,
    pub contact_id: Option<RecordId>,
    pub entreprise_id: Option<RecordId>,
    pub statut: Option<DevisStatus>,
    pub montant_ht: Option<Cents>,
    pub montant_tva: Option<Cents>,
    pub montant_ttc: Option<Cents>,
    /// Locked quotes are no longer edited from the UI.
    pub verrouille: Option<bool>,
    pub canal_acquisition: Option<String>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

impl Devis {
    /// A quote without a status is a draft.
    pub fn status(&self) -> DevisStatus {
        self.statut.unwrap_or(DevisStatus::Brouillon)
    }

    pub fn is_locked(&self) -> bool {
        self.verrouille.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDevis {
    pub numero_devis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_emission: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<DevisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_tva: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ttc: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canal_acquisition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl NewDevis {
    /// Fill the amounts from quote lines and a VAT rate (e.g. `0.2`).
    pub fn with_totals(mut self, items: &[NewDevisItem], tva_rate: f64) -> Self {
        let ht: Cents = items.iter().map(NewDevisItem::total_ht).sum();
        let tva = ht.scale(tva_rate);
        self.montant_ht = Some(ht);
        self.montant_tva = Some(tva);
        self.montant_ttc = Some(ht + tva);
        self
    }
}

impl Validate for NewDevis {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("numero_devis", &self.numero_devis)?;
        validate::non_negative_amount("montant_ht", self.montant_ht)?;
        validate::non_negative_amount("montant_tva", self.montant_tva)?;
        validate::non_negative_amount("montant_ttc", self.montant_ttc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevisPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_devis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_emission: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<DevisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_tva: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ttc: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verrouille: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canal_acquisition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for DevisPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("numero_devis", self.numero_devis.as_deref())?;
        validate::non_negative_amount("montant_ht", self.montant_ht)?;
        validate::non_negative_amount("montant_tva", self.montant_tva)?;
        validate::non_negative_amount("montant_ttc", self.montant_ttc)
    }
}

impl Record for Devis {
    type Create = NewDevis;
    type Patch = DevisPatch;

    const TABLE: &'static str = "devis";
    const RELATIONS: &'static [Relation] = &[ContactSummary::RELATION, EntrepriseSummary::RELATION];
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Devis créé", "Le devis a été créé avec succès."),
        updated: ("Devis modifié", "Le devis a été modifié avec succès."),
        deleted: ("Devis supprimé", "Le devis a été supprimé avec succès."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}

/// `devis_items` row (quote line). Lines have no organization column; they
/// are visible through their parent quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevisItem {
    pub id: RecordId,
    pub devis_id: Option<RecordId>,
    pub catalogue_id: Option<RecordId>,
    pub quantite: f64,
    pub prix_unitaire: Option<Cents>,
    /// Discount in percent.
    pub remise: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalogue: Option<CatalogueSummary>,
}

impl DevisItem {
    pub fn total_ht(&self) -> Cents {
        line_total(self.quantite, self.prix_unitaire, self.remise)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDevisItem {
    pub devis_id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalogue_id: Option<RecordId>,
    pub quantite: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prix_unitaire: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remise: Option<f64>,
}

impl NewDevisItem {
    pub fn total_ht(&self) -> Cents {
        line_total(self.quantite, self.prix_unitaire, self.remise)
    }
}

impl Validate for NewDevisItem {
    fn validate(&self) -> DomainResult<()> {
        validate::non_negative("quantite", Some(self.quantite))?;
        validate::non_negative_amount("prix_unitaire", self.prix_unitaire)?;
        validate_remise(self.remise)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevisItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantite: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prix_unitaire: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remise: Option<f64>,
}

impl Validate for DevisItemPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_negative("quantite", self.quantite)?;
        validate::non_negative_amount("prix_unitaire", self.prix_unitaire)?;
        validate_remise(self.remise)
    }
}

impl Record for DevisItem {
    type Create = NewDevisItem;
    type Patch = DevisItemPatch;

    const TABLE: &'static str = "devis_items";
    const RELATIONS: &'static [Relation] = &[CatalogueSummary::RELATION];
    const ORDER: crm_core::Ordering = crm_core::Ordering::asc("created_at");
    const TENANT_SCOPED: bool = false;
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Ligne ajoutée", "La ligne a été ajoutée au devis."),
        updated: ("Ligne modifiée", "La ligne du devis a été modifiée."),
        deleted: ("Ligne supprimée", "La ligne a été retirée du devis."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        None
    }
}

fn validate_remise(remise: Option<f64>) -> DomainResult<()> {
    validate::non_negative("remise", remise)?;
    if remise.is_some_and(|r| r > 100.0) {
        return Err(crm_core::DomainError::validation("remise must not exceed 100%"));
    }
    Ok(())
}

/// Net amount of one line, rounded to the cent.
fn line_total(quantite: f64, prix_unitaire: Option<Cents>, remise: Option<f64>) -> Cents {
    prix_unitaire
        .unwrap_or(Cents::ZERO)
        .scale(quantite * (1.0 - remise.unwrap_or(0.0) / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(quantite: f64, prix: i64, remise: Option<f64>) -> NewDevisItem {
        NewDevisItem {
            devis_id: RecordId::new(),
            catalogue_id: None,
            quantite,
            prix_unitaire: Some(Cents::new(prix)),
            remise,
        }
    }

    #[test]
    fn totals_are_computed_from_lines() {
        let devis = NewDevis {
            numero_devis: "D-2024-001".to_string(),
            ..NewDevis::default()
        }
        .with_totals(&[line(2.0, 10_000, None), line(1.0, 5_000, Some(10.0))], 0.2);

        assert_eq!(devis.montant_ht, Some(Cents::new(24_500)));
        assert_eq!(devis.montant_tva, Some(Cents::new(4_900)));
        assert_eq!(devis.montant_ttc, Some(Cents::new(29_400)));
        assert!(devis.validate().is_ok());
    }

    #[test]
    fn totals_add_up_to_the_cent() {
        // 3 × 0,33 € at 20 %: every amount is rounded once, TTC is exact.
        let devis = NewDevis {
            numero_devis: "D-2024-002".to_string(),
            ..NewDevis::default()
        }
        .with_totals(&[line(3.0, 33, None), line(1.0, 1, None)], 0.2);

        let (ht, tva, ttc) = (devis.montant_ht.unwrap(), devis.montant_tva.unwrap(), devis.montant_ttc.unwrap());
        assert_eq!(ht, Cents::new(100));
        assert_eq!(tva, Cents::new(20));
        assert_eq!(ttc.cents(), ht.cents() + tva.cents());
    }

    #[test]
    fn line_amounts_round_trip_as_decimal_euros() {
        let item = line(1.5, 1_999, Some(5.0));
        let wire = serde_json::to_value(&item).unwrap();
        assert_eq!(wire["prix_unitaire"], serde_json::json!(19.99));
        assert_eq!(item.total_ht(), Cents::new(2_849));
    }

    #[test]
    fn missing_status_reads_as_draft() {
        let devis: Devis = serde_json::from_value(serde_json::json!({
            "id": RecordId::new(),
            "organization_id": OrganizationId::new(),
            "numero_devis": "D-1",
            "contacts": { "nom": "Martin", "prenom": null },
            "entreprises": null
        }))
        .unwrap();
        assert_eq!(devis.status(), DevisStatus::Brouillon);
        assert!(devis.status().is_open());
        assert!(!devis.is_locked());
        assert_eq!(devis.contacts.map(|c| c.nom), Some("Martin".to_string()));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(DevisStatus::Accepte).unwrap(), "accepte");
        assert!(!DevisStatus::Refuse.is_open());
    }

    #[test]
    fn lines_are_not_tenant_scoped() {
        assert!(!DevisItem::TENANT_SCOPED);
        assert!(Devis::TENANT_SCOPED);
    }

    #[test]
    fn discount_over_hundred_percent_is_rejected() {
        assert!(line(1.0, 1_000, Some(100.0)).validate().is_ok());
        assert!(line(1.0, 1_000, Some(120.0)).validate().is_err());
        assert!(line(1.0, -1, None).validate().is_err());
    }

    proptest! {
        #[test]
        fn line_total_never_exceeds_gross(q in 0u32..1000, p in 0i64..1_000_000, r in 0.0f64..100.0) {
            let l = line(f64::from(q), p, Some(r));
            prop_assert!(l.total_ht().cents() <= i64::from(q) * p);
            prop_assert!(!l.total_ht().is_negative());
        }
    }
}
