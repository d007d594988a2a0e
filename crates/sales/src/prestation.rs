use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{Cents, DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};
use crm_parties::{ContactSummary, EntrepriseSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrestationStatus {
    Planifie,
    EnCours,
    Termine,
    Annule,
}

impl PrestationStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            PrestationStatus::Planifie => "Planifiée",
            PrestationStatus::EnCours => "En cours",
            PrestationStatus::Termine => "Terminée",
            PrestationStatus::Annule => "Annulée",
        }
    }
}

/// `prestations` row: a service delivered to a customer, usually from an
/// accepted quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prestation {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub reference: String,
    pub designation: String,
    pub devis_id: Option<RecordId>,
    pub contact_id: Option<RecordId>,
    pub entreprise_id: Option<RecordId>,
    pub statut: Option<PrestationStatus>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub montant: Option<Cents>,
    pub localisation: Option<String>,
    pub intervenants: Option<Vec<String>>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPrestation {
    pub reference: String,
    pub designation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devis_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<PrestationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localisation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervenants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewPrestation {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("reference", &self.reference)?;
        validate::require_non_empty("designation", &self.designation)?;
        validate::non_negative_amount("montant", self.montant)?;
        validate::ordered("date_debut", self.date_debut.as_ref(), "date_fin", self.date_fin.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrestationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<PrestationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montant: Option<Cents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localisation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervenants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for PrestationPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("designation", self.designation.as_deref())?;
        validate::non_negative_amount("montant", self.montant)?;
        validate::ordered("date_debut", self.date_debut.as_ref(), "date_fin", self.date_fin.as_ref())
    }
}

impl Record for Prestation {
    type Create = NewPrestation;
    type Patch = PrestationPatch;

    const TABLE: &'static str = "prestations";
    const RELATIONS: &'static [Relation] = &[ContactSummary::RELATION, EntrepriseSummary::RELATION];
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Prestation créée", "La prestation a été créée avec succès."),
        updated: ("Prestation modifiée", "La prestation a été modifiée avec succès."),
        deleted: ("Prestation supprimée", "La prestation a été supprimée avec succès."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}
