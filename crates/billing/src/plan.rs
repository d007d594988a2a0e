use serde::Serialize;

pub const CURRENCY: &str = "eur";

/// A subscription plan; prices are in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    pub price_cents: u32,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

pub const PLANS: [Plan; 3] = [
    Plan {
        id: "free",
        name: "Gratuit",
        price_cents: 0,
        description: "Pour démarrer votre activité",
        features: &[
            "5 contacts maximum",
            "Gestion de base des entreprises",
            "Support par email",
            "Stockage 1 GB",
        ],
    },
    Plan {
        id: "pro",
        name: "Pro",
        price_cents: 2900,
        description: "Pour les professionnels en croissance",
        features: &[
            "100 contacts",
            "Devis et factures illimités",
            "Gestion des prestations",
            "Tableaux de bord avancés",
            "Intégrations tierces",
            "Support prioritaire",
            "Stockage 10 GB",
            "Export PDF/Excel",
        ],
    },
    Plan {
        id: "enterprise",
        name: "Enterprise",
        price_cents: 9900,
        description: "Pour les grandes équipes",
        features: &[
            "Contacts illimités",
            "Multi-utilisateurs",
            "API complète",
            "Personnalisation avancée",
            "Support dédié 24/7",
            "Stockage illimité",
            "Formation incluse",
            "SLA garanti",
            "Sauvegarde quotidienne",
        ],
    },
];

impl Plan {
    pub fn find(id: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|plan| plan.id == id)
    }

    /// Paid plans bill monthly; the free plan is a one-off zero payment.
    pub fn is_recurring(&self) -> bool {
        self.price_cents > 0
    }

    /// Price shown on the pricing page, e.g. `29 €`.
    pub fn display_price(&self) -> String {
        let euros = self.price_cents / 100;
        match self.price_cents % 100 {
            0 => format!("{euros} €"),
            cents => format!("{euros},{cents:02} €"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_plans_resolve() {
        assert_eq!(Plan::find("pro").map(|p| p.price_cents), Some(2900));
        assert_eq!(Plan::find("enterprise").map(|p| p.name), Some("Enterprise"));
        assert_eq!(Plan::find("gold"), None);
    }

    #[test]
    fn only_paid_plans_recur() {
        let recurring: Vec<_> = PLANS.iter().filter(|p| p.is_recurring()).map(|p| p.id).collect();
        assert_eq!(recurring, ["pro", "enterprise"]);
    }

    #[test]
    fn prices_render_in_euros() {
        assert_eq!(PLANS[0].display_price(), "0 €");
        assert_eq!(PLANS[1].display_price(), "29 €");
        let odd = Plan {
            id: "x",
            name: "x",
            price_cents: 1950,
            description: "",
            features: &[],
        };
        assert_eq!(odd.display_price(), "19,50 €");
    }
}
