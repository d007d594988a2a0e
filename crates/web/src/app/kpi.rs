//! Dashboard and KPI figures, computed from the organization's rows.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crm_core::Cents;
use crm_invoicing::{Facture, FactureStatus, Paiement};
use crm_parties::{Contact, Entreprise};
use crm_sales::{Devis, DevisStatus};
use crm_support::{Reclamation, Tache};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub contacts: usize,
    pub entreprises: usize,
    pub open_devis: usize,
    /// Paid invoices issued in the current month (TTC).
    pub monthly_revenue: Cents,
}

pub fn dashboard(
    contacts: &[Contact],
    entreprises: &[Entreprise],
    devis: &[Devis],
    factures: &[Facture],
    today: NaiveDate,
) -> DashboardStats {
    let monthly_revenue = factures
        .iter()
        .filter(|f| f.status() == FactureStatus::Payee)
        .filter(|f| {
            f.date_emission
                .is_some_and(|d| d.year() == today.year() && d.month() == today.month())
        })
        .filter_map(|f| f.montant_ttc)
        .sum();

    DashboardStats {
        contacts: contacts.len(),
        entreprises: entreprises.len(),
        open_devis: devis.iter().filter(|d| d.status().is_open()).count(),
        monthly_revenue,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Accepted quotes over all quotes, in percent; `None` without quotes.
    pub conversion_rate: Option<f64>,
    /// Every non-cancelled invoice (TTC).
    pub invoiced_total: Cents,
    pub received_payments: Cents,
    /// Invoices sent or late and not yet paid (TTC).
    pub outstanding: Cents,
    pub open_claims: usize,
    pub overdue_tasks: usize,
}

pub fn kpi(
    devis: &[Devis],
    factures: &[Facture],
    paiements: &[Paiement],
    reclamations: &[Reclamation],
    taches: &[Tache],
    today: NaiveDate,
) -> KpiReport {
    let accepted = devis.iter().filter(|d| d.status() == DevisStatus::Accepte).count();
    let conversion_rate = (!devis.is_empty()).then(|| accepted as f64 * 100.0 / devis.len() as f64);

    KpiReport {
        conversion_rate,
        invoiced_total: factures
            .iter()
            .filter(|f| f.status() != FactureStatus::Annulee)
            .filter_map(|f| f.montant_ttc)
            .sum(),
        received_payments: paiements
            .iter()
            .filter(|p| p.status().is_received())
            .filter_map(|p| p.montant)
            .sum(),
        outstanding: factures
            .iter()
            .filter(|f| f.status().is_outstanding())
            .filter_map(|f| f.montant_ttc)
            .sum(),
        open_claims: reclamations.iter().filter(|r| r.status().is_open()).count(),
        overdue_tasks: taches.iter().filter(|t| t.is_overdue(today)).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_core::{OrganizationId, RecordId};
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};

    fn row<T: DeserializeOwned>(mut fields: Value) -> T {
        let obj = fields.as_object_mut().unwrap();
        obj.insert("id".to_string(), json!(RecordId::new()));
        obj.insert("organization_id".to_string(), json!(OrganizationId::new()));
        serde_json::from_value(fields).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_revenue_counts_paid_invoices_of_the_month_only() {
        let factures: Vec<Facture> = vec![
            row(json!({ "numero_facture": "F1", "statut": "payee", "date_emission": "2026-10-02", "montant_ttc": 120.0 })),
            row(json!({ "numero_facture": "F2", "statut": "payee", "date_emission": "2026-09-30", "montant_ttc": 500.0 })),
            row(json!({ "numero_facture": "F3", "statut": "envoyee", "date_emission": "2026-10-05", "montant_ttc": 80.0 })),
        ];
        let devis: Vec<Devis> = vec![
            row(json!({ "numero_devis": "D1", "statut": "envoye" })),
            row(json!({ "numero_devis": "D2", "statut": "accepte" })),
            row(json!({ "numero_devis": "D3" })),
        ];

        let stats = dashboard(&[], &[], &devis, &factures, day(2026, 10, 19));
        assert_eq!(stats.open_devis, 2);
        assert_eq!(stats.monthly_revenue, Cents::new(12_000));
    }

    #[test]
    fn kpi_figures() {
        let today = day(2026, 10, 19);
        let devis: Vec<Devis> = vec![
            row(json!({ "numero_devis": "D1", "statut": "accepte" })),
            row(json!({ "numero_devis": "D2", "statut": "refuse" })),
            row(json!({ "numero_devis": "D3", "statut": "accepte" })),
            row(json!({ "numero_devis": "D4", "statut": "envoye" })),
        ];
        let factures: Vec<Facture> = vec![
            row(json!({ "numero_facture": "F1", "statut": "payee", "montant_ttc": 100.0 })),
            row(json!({ "numero_facture": "F2", "statut": "envoyee", "montant_ttc": 50.0 })),
            row(json!({ "numero_facture": "F3", "statut": "annulee", "montant_ttc": 999.0 })),
        ];
        let paiements: Vec<Paiement> = vec![
            row(json!({ "reference_paiement": "P1", "statut": "recu", "montant": 100.0 })),
            row(json!({ "reference_paiement": "P2", "statut": "en_attente", "montant": 50.0 })),
        ];
        let reclamations: Vec<Reclamation> = vec![
            row(json!({ "numero_reclamation": "R1", "statut": "en_cours" })),
            row(json!({ "numero_reclamation": "R2", "statut": "traitee" })),
        ];
        let taches: Vec<Tache> = vec![
            row(json!({ "reference": "T1", "nom": "Relancer", "statut": "a_faire", "date_echeance": "2026-10-01" })),
            row(json!({ "reference": "T2", "nom": "Livrer", "statut": "terminee", "date_echeance": "2026-10-01" })),
        ];

        let report = kpi(&devis, &factures, &paiements, &reclamations, &taches, today);
        assert_eq!(report.conversion_rate, Some(50.0));
        assert_eq!(report.invoiced_total, Cents::new(15_000));
        assert_eq!(report.received_payments, Cents::new(10_000));
        assert_eq!(report.outstanding, Cents::new(5_000));
        assert_eq!(report.open_claims, 1);
        assert_eq!(report.overdue_tasks, 1);
    }

    #[test]
    fn revenue_of_many_small_invoices_is_exact() {
        let factures: Vec<Facture> = (0..10)
            .map(|i| row(json!({ "numero_facture": format!("F{i}"), "statut": "payee", "date_emission": "2026-10-01", "montant_ttc": 0.1 })))
            .collect();
        let stats = dashboard(&[], &[], &[], &factures, day(2026, 10, 19));
        assert_eq!(stats.monthly_revenue, Cents::new(100));
        assert_eq!(stats.monthly_revenue.to_string(), "1,00 €");
    }

    #[test]
    fn no_quotes_means_no_conversion_rate() {
        let report = kpi(&[], &[], &[], &[], &[], day(2026, 1, 1));
        assert_eq!(report.conversion_rate, None);
        assert_eq!(report.invoiced_total, Cents::ZERO);
    }
}
