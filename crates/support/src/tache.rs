use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{DomainResult, OrganizationId, Record, RecordId, RecordMessages, UserId, Validate, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacheStatus {
    AFaire,
    EnCours,
    Terminee,
    Annulee,
}

impl TacheStatus {
    /// Label shown in lists.
    pub fn label(self) -> &'static str {
        match self {
            TacheStatus::AFaire => "À faire",
            TacheStatus::EnCours => "En cours",
            TacheStatus::Terminee => "Terminée",
            TacheStatus::Annulee => "Annulée",
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, TacheStatus::Terminee | TacheStatus::Annulee)
    }
}

/// `taches` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tache {
    pub id: RecordId,
    pub organization_id: Option<OrganizationId>,
    pub reference: String,
    pub nom: String,
    pub description: Option<String>,
    pub statut: Option<TacheStatus>,
    pub date_debut: Option<NaiveDate>,
    pub date_echeance: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub collaborateur_id: Option<UserId>,
    pub commentaires: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tache {
    pub fn status(&self) -> TacheStatus {
        self.statut.unwrap_or(TacheStatus::AFaire)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status().is_done() && self.date_echeance.is_some_and(|d| d < today)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTache {
    pub reference: String,
    pub nom: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<TacheStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborateur_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for NewTache {
    fn validate(&self) -> DomainResult<()> {
        validate::require_non_empty("reference", &self.reference)?;
        validate::require_non_empty("nom", &self.nom)?;
        validate::ordered("date_debut", self.date_debut.as_ref(), "date_echeance", self.date_echeance.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TachePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statut: Option<TacheStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaborateur_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commentaires: Option<String>,
}

impl Validate for TachePatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("nom", self.nom.as_deref())
    }
}

impl Record for Tache {
    type Create = NewTache;
    type Patch = TachePatch;

    const TABLE: &'static str = "taches";
    const MESSAGES: RecordMessages = RecordMessages {
        created: ("Tâche créée", "La tâche a été créée avec succès."),
        updated: ("Tâche modifiée", "La tâche a été modifiée avec succès."),
        deleted: ("Tâche supprimée", "La tâche a été supprimée avec succès."),
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

    fn tache(statut: Option<TacheStatus>, echeance: Option<NaiveDate>) -> Tache {
        Tache {
            id: RecordId::new(),
            organization_id: None,
            reference: "T-1".to_string(),
            nom: "Relancer".to_string(),
            description: None,
            statut,
            date_debut: None,
            date_echeance: echeance,
            date_fin: None,
            collaborateur_id: None,
            commentaires: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn overdue_tasks_are_open_and_past_due() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let yesterday = today.pred_opt();

        assert!(tache(None, yesterday).is_overdue(today));
        assert!(tache(Some(TacheStatus::EnCours), yesterday).is_overdue(today));
        assert!(!tache(Some(TacheStatus::Terminee), yesterday).is_overdue(today));
        assert!(!tache(None, Some(today)).is_overdue(today));
        assert!(!tache(None, None).is_overdue(today));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(TacheStatus::AFaire).unwrap(), "a_faire");
    }
}
