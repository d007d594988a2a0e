use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, Validate, validate};

/// `entreprises` row (company).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entreprise {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub raison_sociale: String,
    pub siren: Option<String>,
    pub siret: Option<String>,
    pub secteur: Option<String>,
    pub taille: Option<String>,
    pub type_relation: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub code_postal: Option<String>,
    pub site_web: Option<String>,
    pub tva: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub banque: Option<String>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Company name embedded into other rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrepriseSummary {
    pub raison_sociale: String,
}

impl EntrepriseSummary {
    pub const RELATION: Relation = Relation {
        table: "entreprises",
        foreign_key: "entreprise_id",
        columns: &["raison_sociale"],
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntreprise {
    pub raison_sociale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siren: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secteur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adresse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ville: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_postal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_web: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tva: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banque: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewEntreprise {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("raison_sociale", &self.raison_sociale)?;
        validate::digits("siren", self.siren.as_deref(), 9)?;
        validate::digits("siret", self.siret.as_deref(), 14)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntreprisePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raison_sociale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siren: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secteur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adresse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ville: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_postal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_web: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tva: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for EntreprisePatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("raison_sociale", self.raison_sociale.as_deref())?;
        validate::digits("siren", self.siren.as_deref(), 9)?;
        validate::digits("siret", self.siret.as_deref(), 14)
    }
}

impl Record for Entreprise {
    type Create = NewEntreprise;
    type Patch = EntreprisePatch;

    const TABLE: &'static str = "entreprises";
    const DELETABLE: bool = true;
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Entreprise créée", "L'entreprise a été créée avec succès."),
        updated: ("Entreprise mise à jour", "L'entreprise a été mise à jour avec succès."),
        deleted: ("Entreprise supprimée", "L'entreprise a été supprimée avec succès."),
    };

    fn id(&self) -> RecordId {
        self.id
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}
