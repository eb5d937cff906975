// 💳 Payment Entities - checkout sessions and the entitlement they unlock
//
// Sessions are owned by the payment provider and are read-only here.
// Observed progression: created -> pending -> succeeded | failed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BffError;
use crate::repository::RecordId;

// ============================================================================
// PLANS (server-side source of truth for pricing)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Annually,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTerms {
    pub name: &'static str,
    /// Minor currency units
    pub amount: u64,
    pub currency: &'static str,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Annually => "annually",
        }
    }

    pub fn terms(&self) -> PlanTerms {
        match self {
            Plan::Monthly => PlanTerms {
                name: "Shelfie Premium (Monthly)",
                amount: 20_000,
                currency: "PHP",
            },
            // twelve months at an 8% discount
            Plan::Annually => PlanTerms {
                name: "Shelfie Premium (Annually)",
                amount: 220_800,
                currency: "PHP",
            },
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Plan {
    type Err = BffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Plan::Monthly),
            "annually" => Ok(Plan::Annually),
            other => Err(BffError::invalid_argument(format!(
                "unknown subscription plan {other:?}"
            ))),
        }
    }
}

// ============================================================================
// CHECKOUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Billing {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub checkout_url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    /// Map a provider status string onto the four-state progression
    pub fn from_provider(raw: &str) -> PaymentStatus {
        match raw {
            "succeeded" => PaymentStatus::Succeeded,
            "awaiting_payment_method" | "awaiting_next_action" | "processing" | "pending" => {
                PaymentStatus::Pending
            }
            "failed" | "cancelled" | "expired" => PaymentStatus::Failed,
            _ => PaymentStatus::Created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub user_id: Option<RecordId>,
    pub plan: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: String,
    pub status: PaymentStatus,
    /// Status string exactly as the provider reported it
    pub observed_status: String,
    pub metadata: SessionMetadata,
    pub subscription_id: Option<String>,
}

// ============================================================================
// ENTITLEMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementChange {
    pub user_id: RecordId,
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_subscription_id: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================
