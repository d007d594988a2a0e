use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{Cents, DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};
use crm_parties::{ContactSummary, EntrepriseSummary};

/// Invoice lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactureStatus {
    Brouillon,
    Envoyee,
    Payee,
    EnRetard,
    Annulee,
}

impl FactureStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            FactureStatus::Brouillon => "Brouillon",
            FactureStatus::Envoyee => "Envoyée",
            FactureStatus::Payee => "Payée",
            FactureStatus::EnRetard => "En retard",
            FactureStatus::Annulee => "Annulée",
        }
    }

    /// Issued and still expecting money.
    pub fn is_outstanding(self) -> bool {
        matches!(self, FactureStatus::Envoyee | FactureStatus::EnRetard)
    }
}

/// `factures` row (invoice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facture {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub numero_facture: String,
    pub devis_id: Option<RecordId>,
    pub prestation_id: Option<RecordId>,
    pub contact_id: Option<RecordId>,
    pub entreprise_id: Option<RecordId>,
    pub statut: Option<FactureStatus>,
    pub date_emission: Option<NaiveDate>,
    pub date_echeance: Option<NaiveDate>,
    pub montant_ht: Option<Cents>,
    pub montant_tva: Option<Cents>,
    pub montant_ttc: Option<Cents>,
    pub conditions_paiement: Option<String>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

impl Facture {
    pub fn status(&self) -> FactureStatus {
        self.statut.unwrap_or(FactureStatus::Brouillon)
    }

    /// Past its due date on `today` without being paid or cancelled.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status() == FactureStatus::EnRetard
            || (self.status().is_outstanding() && self.date_echeance.is_some_and(|d| d < today))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFacture {
    pub numero_facture: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devis_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prestation_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<FactureStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_emission: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_tva: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ttc: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions_paiement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewFacture {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("numero_facture", &self.numero_facture)?;
        validate::non_negative_amount("montant_ht", self.montant_ht)?;
        validate::non_negative_amount("montant_tva", self.montant_tva)?;
        validate::non_negative_amount("montant_ttc", self.montant_ttc)?;
        validate::ordered(
            "date_emission",
            self.date_emission.as_ref(),
            "date_echeance",
            self.date_echeance.as_ref(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacturePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<FactureStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ht: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_tva: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant_ttc: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions_paiement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for FacturePatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_negative_amount("montant_ht", self.montant_ht)?;
        validate::non_negative_amount("montant_tva", self.montant_tva)?;
        validate::non_negative_amount("montant_ttc", self.montant_ttc)
    }
}

impl Record for Facture {
    type Create = NewFacture;
    type Patch = FacturePatch;

    const TABLE: &'static str = "factures";
    const RELATIONS: &'static [Relation] = &[ContactSummary::RELATION, EntrepriseSummary::RELATION];
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Facture créée", "La facture a été créée avec succès."),
        updated: ("Facture modifiée", "La facture a été modifiée avec succès."),
        deleted: ("Facture supprimée", "La facture a été supprimée avec succès."),
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

    fn facture(statut: FactureStatus, echeance: Option<NaiveDate>) -> Facture {
        Facture {
            id: RecordId::new(),
            organization_id: Some(OrganizationId::new()),
            numero_facture: "F-1".to_string(),
            devis_id: None,
            prestation_id: None,
            contact_id: None,
            entreprise_id: None,
            statut: Some(statut),
            date_emission: None,
            date_echeance: echeance,
            montant_ht: None,
            montant_tva: None,
            montant_ttc: Some(Cents::new(12_000)),
            conditions_paiement: None,
            commentaires: None,
            created_at: None,
            updated_at: None,
            contacts: None,
            entreprises: None,
        }
    }

    #[test]
    fn overdue_only_when_outstanding_and_past_due() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let past = NaiveDate::from_ymd_opt(2024, 5, 1);
        let future = NaiveDate::from_ymd_opt(2024, 7, 1);

        assert!(facture(FactureStatus::Envoyee, past).is_overdue(today));
        assert!(!facture(FactureStatus::Envoyee, future).is_overdue(today));
        assert!(!facture(FactureStatus::Payee, past).is_overdue(today));
        assert!(facture(FactureStatus::EnRetard, None).is_overdue(today));
    }

    #[test]
    fn due_date_cannot_precede_emission() {
        let input = NewFacture {
            numero_facture: "F-2".to_string(),
            date_emission: NaiveDate::from_ymd_opt(2024, 5, 1),
            date_echeance: NaiveDate::from_ymd_opt(2024, 4, 1),
            ..NewFacture::default()
        };
        assert!(input.validate().is_err());
    }
}
