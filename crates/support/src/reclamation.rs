use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};
use crm_parties::{ContactSummary, EntrepriseSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclamationStatus {
    PriseEnCompte,
    EnCours,
    Traitee,
    Rejetee,
}

impl ReclamationStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            ReclamationStatus::PriseEnCompte => "Prise en compte",
            ReclamationStatus::EnCours => "En cours",
            ReclamationStatus::Traitee => "Traitée",
            ReclamationStatus::Rejetee => "Rejetée",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, ReclamationStatus::PriseEnCompte | ReclamationStatus::EnCours)
    }
}

/// `reclamations` row (customer claim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reclamation {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub numero_reclamation: String,
    pub contact_id: Option<RecordId>,
    pub entreprise_id: Option<RecordId>,
    pub statut: Option<ReclamationStatus>,
    pub theme: Option<String>,
    pub type_theme: Option<String>,
    pub description: Option<String>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

impl Reclamation {
    pub fn status(&self) -> ReclamationStatus {
        self.statut.unwrap_or(ReclamationStatus::PriseEnCompte)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewReclamation {
    pub numero_reclamation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<ReclamationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewReclamation {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("numero_reclamation", &self.numero_reclamation)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReclamationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<ReclamationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for ReclamationPatch {
    fn validate(&self) -> DomainResult<()> {
        Ok(())
    }
}

impl Record for Reclamation {
    type Create = NewReclamation;
    type Patch = ReclamationPatch;

    const TABLE: &'static str = "reclamations";
    const RELATIONS: &'static [Relation] = &[ContactSummary::RELATION, EntrepriseSummary::RELATION];
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Réclamation créée", "La réclamation a été créée avec succès."),
        updated: ("Réclamation modifiée", "La réclamation a été modifiée avec succès."),
        deleted: ("Réclamation supprimée", "La réclamation a été supprimée avec succès."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}
