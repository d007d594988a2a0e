use serde::{Deserialize, Serialize};

use crm_core::OrganizationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    PastDue,
    Canceled,
    /// Any status this build doesn't know about.
    #[serde(other)]
    Unknown,
}

/// Row of the `subscriptions` table, one per organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub status: SubscriptionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_statuses_do_not_break_reads() {
        let row = json!({ "organization_id": OrganizationId::new(), "status": "incomplete_expired" });
        let sub: Subscription = serde_json::from_value(row).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Unknown);
        assert_eq!(sub.plan_id, None);
    }
}
