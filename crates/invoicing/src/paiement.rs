use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{Cents, DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};
use crm_parties::{ContactSummary, EntrepriseSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaiementStatus {
    EnAttente,
    Recu,
    Rapproche,
}

impl PaiementStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            PaiementStatus::EnAttente => "En attente",
            PaiementStatus::Recu => "Reçu",
            PaiementStatus::Rapproche => "Rapproché",
        }
    }

    /// Money actually received (reconciled or not).
    pub fn is_received(self) -> bool {
        matches!(self, PaiementStatus::Recu | PaiementStatus::Rapproche)
    }
}

/// `paiements` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paiement {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub reference_paiement: String,
    pub facture_id: Option<RecordId>,
    pub contact_id: Option<RecordId>,
    pub entreprise_id: Option<RecordId>,
    pub statut: Option<PaiementStatus>,
    pub montant: Option<Cents>,
    pub reste_a_payer: Option<Cents>,
    pub type_paiement: Option<String>,
    pub date_paiement: Option<NaiveDate>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

impl Paiement {
    pub fn status(&self) -> PaiementStatus {
        self.statut.unwrap_or(PaiementStatus::EnAttente)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPaiement {
    pub reference_paiement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facture_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<PaiementStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reste_a_payer: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_paiement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_paiement: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewPaiement {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("reference_paiement", &self.reference_paiement)?;
        validate::non_negative_amount("montant", self.montant)?;
        validate::non_negative_amount("reste_a_payer", self.reste_a_payer)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaiementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<PaiementStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reste_a_payer: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_paiement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_paiement: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for PaiementPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_negative_amount("montant", self.montant)?;
        validate::non_negative_amount("reste_a_payer", self.reste_a_payer)
    }
}

impl Record for Paiement {
    type Create = NewPaiement;
    type Patch = PaiementPatch;

    const TABLE: &'static str = "paiements";
    const RELATIONS: &'static [Relation] = &[ContactSummary::RELATION, EntrepriseSummary::RELATION];
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Paiement créé", "Le paiement a été créé avec succès."),
        updated: ("Paiement modifié", "Le paiement a été modifié avec succès."),
        deleted: ("Paiement supprimé", "Le paiement a été supprimé avec succès."),
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

    #[test]
    fn pending_is_the_default_status() {
        let row: Paiement = serde_json::from_value(serde_json::json!({
            "id": RecordId::new(),
            "organization_id": OrganizationId::new(),
            "reference_paiement": "VIR-001",
            "montant": 50.0
        }))
        .unwrap();
        assert_eq!(row.montant, Some(Cents::new(5_000)));
        assert_eq!(row.status(), PaiementStatus::EnAttente);
        assert!(!row.status().is_received());
        assert!(PaiementStatus::Rapproche.is_received());
    }

    proptest! {
        #[test]
        fn reference_is_required(reference in "\\s{0,4}") {
            let input = NewPaiement { reference_paiement: reference, ..NewPaiement::default() };
            prop_assert!(input.validate().is_err());
        }
    }
}
