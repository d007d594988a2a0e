use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{DomainResult, OrganizationId, Record, RecordId, RecordMessages, Relation, UserId, Validate, validate};

use crate::EntrepriseSummary;

/// Person or company contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Particulier,
    Entreprise,
}

/// `contacts` row, with the linked company name embedded for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub nom: String,
    pub prenom: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ContactType>,
    pub entreprise_id: Option<RecordId>,
    pub collaborateur_id: Option<UserId>,
    pub statut: Option<String>,
    pub canal_acquisition: Option<String>,
    pub date_acquisition: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entreprises: Option<EntrepriseSummary>,
}

impl Contact {
    pub fn display_name(&self) -> String {
        match self.prenom.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(prenom) => format!("{prenom} {}", self.nom),
            None => self.nom.clone(),
        }
    }
}

/// Name columns embedded from `contacts` into other rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub nom: String,
    pub prenom: Option<String>,
}

impl ContactSummary {
    /// Relation embedding a contact's name into rows with a `contact_id`.
    pub const RELATION: Relation = Relation {
        table: "contacts",
        foreign_key: "contact_id",
        columns: &["nom", "prenom"],
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub nom: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContactType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborateur_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canal_acquisition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_acquisition: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewContact {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("nom", &self.nom)?;
        validate::email("email", self.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContactType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entreprise_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canal_acquisition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for ContactPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("nom", self.nom.as_deref())?;
        validate::email("email", self.email.as_deref())
    }
}

impl Record for Contact {
    type Create = NewContact;
    type Patch = ContactPatch;

    const TABLE: &'static str = "contacts";
    const RELATIONS: &'static [Relation] = &[EntrepriseSummary::RELATION];
    const DELETABLE: bool = true;
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Contact créé", "Le contact a été créé avec succès."),
        updated: ("Contact mis à jour", "Le contact a été mis à jour avec succès."),
        deleted: ("Contact supprimé", "Le contact a été supprimé avec succès."),
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
    use serde_json::json;

    #[test]
    fn row_deserializes_with_embedded_company() {
        let id = RecordId::new();
        let org = OrganizationId::new();
        let contact: Contact = serde_json::from_value(json!({
            "id": id,
            "organization_id": org,
            "nom": "Martin",
            "prenom": "Ana",
            "type": "particulier",
            "tags": ["vip"],
            "date_acquisition": "2024-03-01",
            "created_at": "2024-03-01T10:00:00+00:00",
            "entreprises": { "raison_sociale": "Acme" }
        }))
        .unwrap();

        assert_eq!(contact.id(), id);
        assert_eq!(contact.organization_id(), Some(org));
        assert_eq!(contact.kind, Some(ContactType::Particulier));
        assert_eq!(contact.display_name(), "Ana Martin");
        assert_eq!(contact.entreprises.map(|e| e.raison_sociale), Some("Acme".to_string()));
    }

    #[test]
    fn new_contact_requires_a_name_and_a_plausible_email() {
        let mut input = NewContact {
            nom: "  ".to_string(),
            ..NewContact::default()
        };
        assert!(input.validate().is_err());

        input.nom = "Martin".to_string();
        input.email = Some("ana@".to_string());
        assert!(input.validate().is_err());

        input.email = Some("ana@exemple.fr".to_string());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ContactPatch {
            telephone: Some("0601020304".to_string()),
            ..ContactPatch::default()
        };
        assert!(patch.validate().is_ok());
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "telephone": "0601020304" }));

        let blank = ContactPatch {
            nom: Some(String::new()),
            ..ContactPatch::default()
        };
        assert!(blank.validate().is_err());
    }
}
