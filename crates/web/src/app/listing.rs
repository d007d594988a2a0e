//! How each tenant table appears as a list page and under the JSON API.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crm_core::{Cents, Record};
use crm_invoicing::{Facture, Paiement};
use crm_parties::{Contact, ContactSummary, Entreprise, EntrepriseSummary};
use crm_products::CatalogueItem;
use crm_sales::{Devis, Prestation};
use crm_support::{Reclamation, Tache};

use super::views::optional;

/// A record type served as `PATH` (HTML) and `/api/{TABLE}` (JSON).
pub trait Listing: Record<Create: DeserializeOwned, Patch: DeserializeOwned> {
    const PATH: &'static str;
    const TITLE: &'static str;
    const HEADERS: &'static [&'static str];

    /// Display cells, in `HEADERS` order.
    fn cells(&self) -> Vec<String>;

    /// Detail page of a row, when the table has one.
    fn detail_path(&self) -> Option<String> {
        None
    }

    fn matches(&self, needle: &str) -> bool {
        self.cells().iter().any(|c| c.to_lowercase().contains(needle))
    }
}

fn date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_else(|| "—".to_string())
}

fn amount(value: Option<Cents>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "—".to_string())
}

/// Customer column: the contact's name, else the company's.
fn client(contact: Option<&ContactSummary>, entreprise: Option<&EntrepriseSummary>) -> String {
    if let Some(contact) = contact {
        return match contact.prenom.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(prenom) => format!("{prenom} {}", contact.nom),
            None => contact.nom.clone(),
        };
    }
    entreprise
        .map(|e| e.raison_sociale.clone())
        .unwrap_or_else(|| "—".to_string())
}

impl Listing for Contact {
    const PATH: &'static str = "/contacts";
    const TITLE: &'static str = "Contacts";
    const HEADERS: &'static [&'static str] = &["Nom", "Email", "Téléphone", "Entreprise", "Statut"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.display_name(),
            optional(self.email.as_deref()),
            optional(self.telephone.as_deref()),
            optional(self.entreprises.as_ref().map(|e| e.raison_sociale.as_str())),
            optional(self.statut.as_deref()),
        ]
    }
}

impl Listing for Entreprise {
    const PATH: &'static str = "/entreprises";
    const TITLE: &'static str = "Entreprises";
    const HEADERS: &'static [&'static str] = &["Raison sociale", "SIREN", "Secteur", "Ville", "Relation"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.raison_sociale.clone(),
            optional(self.siren.as_deref()),
            optional(self.secteur.as_deref()),
            optional(self.ville.as_deref()),
            optional(self.type_relation.as_deref()),
        ]
    }
}

impl Listing for CatalogueItem {
    const PATH: &'static str = "/catalogue";
    const TITLE: &'static str = "Catalogue";
    const HEADERS: &'static [&'static str] = &["Référence", "Nom", "Classification", "Prix HT", "Statut"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.reference.clone(),
            self.nom.clone(),
            optional(self.classification.as_deref()),
            amount(self.prix_unitaire_ht),
            optional(self.statut.as_deref()),
        ]
    }
}

impl Listing for Devis {
    const PATH: &'static str = "/devis";
    const TITLE: &'static str = "Devis";
    const HEADERS: &'static [&'static str] = &["Numéro", "Client", "Émission", "Statut", "Montant TTC"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.numero_devis.clone(),
            client(self.contacts.as_ref(), self.entreprises.as_ref()),
            date(self.date_emission),
            self.status().label().to_string(),
            amount(self.montant_ttc),
        ]
    }

    fn detail_path(&self) -> Option<String> {
        Some(format!("/devis/{}", self.id))
    }
}

impl Listing for Prestation {
    const PATH: &'static str = "/prestations";
    const TITLE: &'static str = "Prestations";
    const HEADERS: &'static [&'static str] = &["Référence", "Désignation", "Client", "Début", "Statut", "Montant"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.reference.clone(),
            self.designation.clone(),
            client(self.contacts.as_ref(), self.entreprises.as_ref()),
            date(self.date_debut),
            optional(self.statut.map(|s| s.label())),
            amount(self.montant),
        ]
    }
}

impl Listing for Facture {
    const PATH: &'static str = "/factures";
    const TITLE: &'static str = "Factures";
    const HEADERS: &'static [&'static str] = &["Numéro", "Client", "Émission", "Échéance", "Statut", "Montant TTC"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.numero_facture.clone(),
            client(self.contacts.as_ref(), self.entreprises.as_ref()),
            date(self.date_emission),
            date(self.date_echeance),
            self.status().label().to_string(),
            amount(self.montant_ttc),
        ]
    }
}

impl Listing for Paiement {
    const PATH: &'static str = "/paiements";
    const TITLE: &'static str = "Paiements";
    const HEADERS: &'static [&'static str] = &["Référence", "Client", "Date", "Type", "Statut", "Montant", "Reste à payer"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.reference_paiement.clone(),
            client(self.contacts.as_ref(), self.entreprises.as_ref()),
            date(self.date_paiement),
            optional(self.type_paiement.as_deref()),
            self.status().label().to_string(),
            amount(self.montant),
            amount(self.reste_a_payer),
        ]
    }
}

impl Listing for Tache {
    const PATH: &'static str = "/taches";
    const TITLE: &'static str = "Tâches";
    const HEADERS: &'static [&'static str] = &["Référence", "Nom", "Statut", "Début", "Échéance"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.reference.clone(),
            self.nom.clone(),
            self.status().label().to_string(),
            date(self.date_debut),
            date(self.date_echeance),
        ]
    }
}

impl Listing for Reclamation {
    const PATH: &'static str = "/reclamations";
    const TITLE: &'static str = "Réclamations";
    const HEADERS: &'static [&'static str] = &["Numéro", "Client", "Thème", "Statut"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.numero_reclamation.clone(),
            client(self.contacts.as_ref(), self.entreprises.as_ref()),
            optional(self.theme.as_deref()),
            self.status().label().to_string(),
        ]
    }
}
