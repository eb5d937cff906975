// 💳 Payment Reconciler - checkout session -> entitlement change
//
// `verify` only reads the session; it never writes anywhere, so repeating it
// for an already-succeeded session yields the same EntitlementChange.
// Applying the change belongs to an `AccountUpdater`, keyed by an
// idempotency hash of (session, user, plan) so repeated confirmation of one
// session is a no-op.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::{
    Billing, CheckoutLink, CheckoutSession, EntitlementChange, PaymentStatus, Plan, SessionMetadata,
};
use crate::error::{BffError, BffResult};
use crate::repository::http::upstream_error;
use crate::repository::{Collection, RecordId, RecordRepository};

pub const PAYMENT_METHODS: [&str; 4] = ["card", "gcash", "paymaya", "grab_pay"];

// ============================================================================
// PROVIDER CONTRACT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub name: String,
    pub amount: u64,
    pub currency: String,
    pub quantity: u32,
}

impl LineItem {
    pub fn for_plan(plan: Plan) -> Self {
        let terms = plan.terms();
        LineItem {
            name: terms.name.to_string(),
            amount: terms.amount,
            currency: terms.currency.to_string(),
            quantity: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub billing: Billing,
    pub line_items: Vec<LineItem>,
    pub user_id: RecordId,
    pub plan: Plan,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> BffResult<CheckoutLink>;

    async fn get_session(&self, session_id: &str) -> BffResult<CheckoutSession>;
}

// ============================================================================
// HTTP PROVIDER (checkout-session REST API, Basic auth)
// ============================================================================

#[derive(Clone)]
pub struct HttpPaymentProvider {
    client: Client,
    base_url: String,
    authorization: String,
}

impl HttpPaymentProvider {
    pub fn new(client: Client, base_url: impl Into<String>, secret_key: &str) -> Self {
        HttpPaymentProvider {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", STANDARD.encode(secret_key)),
        }
    }
}

/// JSON body for a checkout-session create call
pub fn session_payload(request: &CheckoutRequest) -> Value {
    json!({
        "data": {
            "attributes": {
                "billing": {
                    "email": request.billing.email,
                    "name": request.billing.name,
                },
                "send_email_receipt": true,
                "show_description": false,
                "show_line_items": true,
                "line_items": request.line_items,
                "payment_method_types": PAYMENT_METHODS,
                "success_url": request.success_url,
                "cancel_url": request.cancel_url,
                "metadata": {
                    "userId": request.user_id.0,
                    "plan": request.plan.as_str(),
                },
            }
        }
    })
}

/// Decode a provider session body (enveloped in `data` or bare)
pub fn parse_session(body: &Value) -> BffResult<CheckoutSession> {
    let data = body.get("data").unwrap_or(body);
    let id = data
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BffError::invalid_state("checkout session has no id"))?;
    let attributes = data.get("attributes").cloned().unwrap_or(Value::Null);

    // only the payment intent can report a completed payment; the session's
    // own status is kept for diagnostics
    let (observed_status, status) = match attributes
        .pointer("/payment_intent/attributes/status")
        .and_then(Value::as_str)
    {
        Some(intent) => (intent.to_string(), PaymentStatus::from_provider(intent)),
        None => {
            let own = attributes
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("created");
            let status = match PaymentStatus::from_provider(own) {
                PaymentStatus::Succeeded => PaymentStatus::Pending,
                other => other,
            };
            (own.to_string(), status)
        }
    };

    let metadata = attributes.get("metadata").cloned().unwrap_or(Value::Null);
    let user_id = ["userId", "strapiUserId"]
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(RecordId::from_value);
    let plan = metadata
        .get("plan")
        .and_then(Value::as_str)
        .map(str::to_string);

    let subscription_id = attributes
        .pointer("/payment_intent/id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CheckoutSession {
        id: id.to_string(),
        status,
        observed_status,
        metadata: SessionMetadata { user_id, plan },
        subscription_id,
    })
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_session(&self, request: &CheckoutRequest) -> BffResult<CheckoutLink> {
        let operation = "create checkout session";
        let response = self
            .client
            .post(format!("{}/checkout_sessions", self.base_url))
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .json(&session_payload(request))
            .send()
            .await
            .map_err(|e| BffError::upstream(operation, None, e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(operation, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BffError::upstream(operation, None, format!("unreadable body: {e}")))?;

        let session_id = body.pointer("/data/id").and_then(Value::as_str);
        let checkout_url = body
            .pointer("/data/attributes/checkout_url")
            .and_then(Value::as_str);

        match (checkout_url, session_id) {
            (Some(url), Some(id)) => Ok(CheckoutLink {
                checkout_url: url.to_string(),
                session_id: id.to_string(),
            }),
            _ => Err(BffError::upstream(
                operation,
                None,
                "response carried no checkout url or session id",
            )),
        }
    }

    async fn get_session(&self, session_id: &str) -> BffResult<CheckoutSession> {
        let operation = "retrieve checkout session";
        let response = self
            .client
            .get(format!(
                "{}/checkout_sessions/{}",
                self.base_url,
                urlencoding::encode(session_id)
            ))
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BffError::upstream(operation, None, e.to_string()))?;

        if !response.status().is_success() {
            return Err(upstream_error(operation, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BffError::upstream(operation, None, format!("unreadable body: {e}")))?;
        parse_session(&body)
    }
}

// ============================================================================
// ENTITLEMENT APPLICATION
// ============================================================================

#[async_trait]
pub trait AccountUpdater: Send + Sync {
    /// Apply the change; returns false when this key was already applied
    async fn apply(&self, change: &EntitlementChange, idempotency_key: &str) -> BffResult<bool>;
}

/// Stable key for one session's entitlement
pub fn idempotency_key(session_id: &str, change: &EntitlementChange) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}",
        session_id,
        change.user_id,
        change.plan.as_str()
    ));
    format!("{:x}", hasher.finalize())
}

/// Writes the plan onto the user record, remembering the last applied key
pub struct RepositoryAccountUpdater {
    repo: Arc<dyn RecordRepository>,
}

impl RepositoryAccountUpdater {
    pub const KEY_FIELD: &'static str = "premiumEntitlementKey";

    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        RepositoryAccountUpdater { repo }
    }
}

#[async_trait]
impl AccountUpdater for RepositoryAccountUpdater {
    async fn apply(&self, change: &EntitlementChange, idempotency_key: &str) -> BffResult<bool> {
        let user = self
            .repo
            .get(Collection::Users, change.user_id)
            .await
            .map_err(|e| e.during("apply entitlement"))?
            .ok_or_else(|| BffError::not_found(format!("user {}", change.user_id)))?;

        if user.str_field(Self::KEY_FIELD) == Some(idempotency_key) {
            debug!(user_id = %change.user_id, "entitlement already applied");
            return Ok(false);
        }

        let mut fields = Map::new();
        fields.insert("isPremium".to_string(), Value::Bool(true));
        fields.insert("premiumPlan".to_string(), json!(change.plan.as_str()));
        if let Some(subscription) = &change.provider_subscription_id {
            fields.insert("premiumSubscriptionId".to_string(), json!(subscription));
        }
        fields.insert(Self::KEY_FIELD.to_string(), json!(idempotency_key));

        self.repo
            .update(Collection::Users, change.user_id, fields)
            .await
            .map_err(|e| e.during("apply entitlement"))?;
        Ok(true)
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub change: EntitlementChange,
    /// False when a previous confirmation of this session already applied it
    pub newly_applied: bool,
}

pub struct PaymentReconciler {
    provider: Arc<dyn PaymentProvider>,
    accounts: Arc<dyn AccountUpdater>,
    success_url: String,
    cancel_url: String,
}

impl PaymentReconciler {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        accounts: Arc<dyn AccountUpdater>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        PaymentReconciler {
            provider,
            accounts,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    pub async fn create_checkout(
        &self,
        caller: RecordId,
        billing: &Billing,
        plan: &str,
    ) -> BffResult<CheckoutLink> {
        let plan: Plan = plan.parse()?;
        if billing.email.trim().is_empty() || billing.name.trim().is_empty() {
            return Err(BffError::invalid_argument("billing email and name are required"));
        }

        let request = CheckoutRequest {
            billing: billing.clone(),
            line_items: vec![LineItem::for_plan(plan)],
            user_id: caller,
            plan,
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
        };

        let link = self.provider.create_session(&request).await?;
        info!(user_id = %caller, plan = plan.as_str(), session_id = %link.session_id, "checkout session created");
        Ok(link)
    }

    /// Read-only verification of a session
    pub async fn verify(&self, session_id: &str) -> BffResult<EntitlementChange> {
        let session = self.fetch(session_id).await?;
        entitlement_from(&session, None)
    }

    /// Verification bound to the caller: a session paid by someone else is Forbidden
    pub async fn verify_for(&self, session_id: &str, caller: RecordId) -> BffResult<EntitlementChange> {
        let session = self.fetch(session_id).await?;
        entitlement_from(&session, Some(caller))
    }

    /// verify_for + apply through the account updater
    pub async fn confirm_payment(
        &self,
        caller: RecordId,
        session_id: &str,
    ) -> BffResult<PaymentConfirmation> {
        let change = self.verify_for(session_id, caller).await?;
        let key = idempotency_key(session_id, &change);
        let newly_applied = self.accounts.apply(&change, &key).await?;

        info!(
            user_id = %change.user_id,
            plan = change.plan.as_str(),
            newly_applied,
            "payment confirmed"
        );
        Ok(PaymentConfirmation {
            change,
            newly_applied,
        })
    }

    async fn fetch(&self, session_id: &str) -> BffResult<CheckoutSession> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(BffError::invalid_argument("checkout session id is required"));
        }
        self.provider
            .get_session(session_id)
            .await
            .map_err(|e| e.during("verify payment"))
    }
}

/// Metadata first, then caller identity, then payment status
pub fn entitlement_from(
    session: &CheckoutSession,
    caller: Option<RecordId>,
) -> BffResult<EntitlementChange> {
    let (user_id, plan) = match (&session.metadata.user_id, &session.metadata.plan) {
        (Some(user_id), Some(plan)) => (*user_id, plan),
        _ => return Err(BffError::invalid_state("session missing required metadata")),
    };
    let plan: Plan = plan
        .parse()
        .map_err(|_| BffError::invalid_state(format!("session carries unknown plan {plan:?}")))?;

    if let Some(caller) = caller {
        if caller != user_id {
            warn!(session_id = %session.id, caller = %caller, paid_by = %user_id, "cross-user payment verification");
            return Err(BffError::forbidden("payment does not belong to current user"));
        }
    }

    if session.status != PaymentStatus::Succeeded {
        return Err(BffError::PaymentNotCompleted {
            status: session.observed_status.clone(),
        });
    }

    Ok(EntitlementChange {
        user_id,
        plan,
        provider_subscription_id: session.subscription_id.clone(),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedProvider {
        sessions: HashMap<String, CheckoutSession>,
        created: Mutex<Vec<CheckoutRequest>>,
        reads: AtomicUsize,
    }

    impl ScriptedProvider {
        fn with_session(mut self, session: CheckoutSession) -> Self {
            self.sessions.insert(session.id.clone(), session);
            self
        }
    }

    #[async_trait]
    impl PaymentProvider for ScriptedProvider {
        async fn create_session(&self, request: &CheckoutRequest) -> BffResult<CheckoutLink> {
            self.created.lock().unwrap().push(request.clone());
            Ok(CheckoutLink {
                checkout_url: "https://pay.test/cs_new".into(),
                session_id: "cs_new".into(),
            })
        }

        async fn get_session(&self, session_id: &str) -> BffResult<CheckoutSession> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| BffError::upstream("get session", Some(404), "No such checkout_session"))
        }
    }

    #[derive(Default)]
    struct RecordingAccounts {
        applied: Mutex<Vec<(EntitlementChange, String)>>,
    }

    #[async_trait]
    impl AccountUpdater for RecordingAccounts {
        async fn apply(&self, change: &EntitlementChange, key: &str) -> BffResult<bool> {
            self.applied.lock().unwrap().push((change.clone(), key.to_string()));
            Ok(true)
        }
    }

    fn session(id: &str, status: &str, user: Option<u64>, plan: Option<&str>) -> CheckoutSession {
        CheckoutSession {
            id: id.into(),
            status: PaymentStatus::from_provider(status),
            observed_status: status.into(),
            metadata: SessionMetadata {
                user_id: user.map(RecordId),
                plan: plan.map(str::to_string),
            },
            subscription_id: Some("pi_123".into()),
        }
    }

    fn build(provider: ScriptedProvider) -> (PaymentReconciler, Arc<ScriptedProvider>, Arc<RecordingAccounts>) {
        let provider = Arc::new(provider);
        let accounts = Arc::new(RecordingAccounts::default());
        let reconciler = PaymentReconciler::new(
            provider.clone(),
            accounts.clone(),
            "https://shelf.test/premium/success",
            "https://shelf.test/premium/cancelled",
        );
        (reconciler, provider, accounts)
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_1", "succeeded", Some(7), Some("monthly")));
        let (reconciler, provider, accounts) = build(provider);

        let first = reconciler.verify("cs_1").await.unwrap();
        let second = reconciler.verify("cs_1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.user_id, RecordId(7));
        assert_eq!(first.plan, Plan::Monthly);
        assert_eq!(first.provider_subscription_id.as_deref(), Some("pi_123"));
        assert_eq!(provider.reads.load(Ordering::SeqCst), 2);
        assert!(accounts.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cross_user_rejected_even_when_paid() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_1", "succeeded", Some(7), Some("annually")));
        let (reconciler, _, accounts) = build(provider);

        let err = reconciler.confirm_payment(RecordId(8), "cs_1").await.unwrap_err();

        assert!(matches!(err, BffError::Forbidden(_)));
        assert!(accounts.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cross_user_takes_precedence_over_pending() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_1", "awaiting_payment_method", Some(7), Some("monthly")));
        let (reconciler, _, _) = build(provider);

        let err = reconciler.verify_for("cs_1", RecordId(8)).await.unwrap_err();
        assert!(matches!(err, BffError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unfinished_payment_carries_observed_status() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_1", "awaiting_payment_method", Some(7), Some("monthly")));
        let (reconciler, _, _) = build(provider);

        let err = reconciler.verify("cs_1").await.unwrap_err();
        match err {
            BffError::PaymentNotCompleted { status } => assert_eq!(status, "awaiting_payment_method"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_metadata_is_invalid_state() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_a", "succeeded", None, Some("monthly")))
            .with_session(session("cs_b", "succeeded", Some(7), None));
        let (reconciler, _, _) = build(provider);

        for id in ["cs_a", "cs_b"] {
            let err = reconciler.verify(id).await.unwrap_err();
            assert!(matches!(err, BffError::InvalidState(_)));
        }
    }

    #[tokio::test]
    async fn test_blank_session_id_rejected_before_any_call() {
        let (reconciler, provider, _) = build(ScriptedProvider::default());

        let err = reconciler.verify("  ").await.unwrap_err();

        assert!(matches!(err, BffError::InvalidArgument(_)));
        assert_eq!(provider.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_keeps_status() {
        let (reconciler, _, _) = build(ScriptedProvider::default());

        let err = reconciler.verify("cs_missing").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(err.to_string().starts_with("verify payment"));
    }

    #[tokio::test]
    async fn test_confirm_passes_stable_key() {
        let provider = ScriptedProvider::default()
            .with_session(session("cs_1", "succeeded", Some(7), Some("monthly")));
        let (reconciler, _, accounts) = build(provider);

        reconciler.confirm_payment(RecordId(7), "cs_1").await.unwrap();
        reconciler.confirm_payment(RecordId(7), "cs_1").await.unwrap();

        let applied = accounts.applied.lock().unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0], applied[1]);
        assert_eq!(applied[0].1.len(), 64);
    }

    #[tokio::test]
    async fn test_create_checkout_uses_server_side_pricing() {
        let (reconciler, provider, _) = build(ScriptedProvider::default());
        let billing = Billing {
            email: "amuro@shelf.test".into(),
            name: "amuro".into(),
        };

        let link = reconciler.create_checkout(RecordId(7), &billing, "annually").await.unwrap();

        assert_eq!(link.session_id, "cs_new");
        let created = provider.created.lock().unwrap();
        assert_eq!(created[0].line_items, vec![LineItem::for_plan(Plan::Annually)]);
        assert_eq!(created[0].line_items[0].amount, 220_800);
        assert_eq!(created[0].user_id, RecordId(7));
        assert_eq!(created[0].cancel_url, "https://shelf.test/premium/cancelled");
    }

    #[tokio::test]
    async fn test_create_checkout_validation() {
        let (reconciler, provider, _) = build(ScriptedProvider::default());
        let billing = Billing {
            email: "amuro@shelf.test".into(),
            name: "amuro".into(),
        };
        let blank = Billing {
            email: " ".into(),
            name: "amuro".into(),
        };

        assert!(matches!(
            reconciler.create_checkout(RecordId(7), &billing, "lifetime").await,
            Err(BffError::InvalidArgument(_))
        ));
        assert!(matches!(
            reconciler.create_checkout(RecordId(7), &blank, "monthly").await,
            Err(BffError::InvalidArgument(_))
        ));
        assert!(provider.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_provider_session() {
        let body = json!({
            "data": {
                "id": "cs_9",
                "attributes": {
                    "status": "active",
                    "metadata": {"strapiUserId": "12", "plan": "monthly"},
                    "payment_intent": {
                        "id": "pi_9",
                        "attributes": {"status": "succeeded"}
                    }
                }
            }
        });

        let session = parse_session(&body).unwrap();

        assert_eq!(session.id, "cs_9");
        assert_eq!(session.status, PaymentStatus::Succeeded);
        assert_eq!(session.metadata.user_id, Some(RecordId(12)));
        assert_eq!(session.subscription_id.as_deref(), Some("pi_9"));
    }

    #[test]
    fn test_parse_unpaid_session_falls_back_to_session_status() {
        let body = json!({"data": {"id": "cs_9", "attributes": {"status": "active", "payment_intent": null}}});
        let session = parse_session(&body).unwrap();
        assert_eq!(session.observed_status, "active");
        assert_eq!(session.status, PaymentStatus::Created);
        assert_eq!(session.metadata, SessionMetadata::default());
    }

    #[test]
    fn test_session_status_alone_never_counts_as_paid() {
        let body = json!({
            "data": {
                "id": "cs_10",
                "attributes": {
                    "status": "succeeded",
                    "metadata": {"userId": 7, "plan": "monthly"}
                }
            }
        });

        let session = parse_session(&body).unwrap();
        assert_eq!(session.observed_status, "succeeded");
        assert_eq!(session.status, PaymentStatus::Pending);
        assert!(matches!(
            entitlement_from(&session, Some(RecordId(7))),
            Err(BffError::PaymentNotCompleted { .. })
        ));

        let paid = json!({
            "data": {
                "id": "cs_11",
                "attributes": {
                    "status": "active",
                    "payment_intent": {"id": "pi_11", "attributes": {"status": "paid"}}
                }
            }
        });
        assert_eq!(parse_session(&paid).unwrap().status, PaymentStatus::Created);
    }

    #[test]
    fn test_session_payload_shape() {
        let request = CheckoutRequest {
            billing: Billing {
                email: "a@b.test".into(),
                name: "a".into(),
            },
            line_items: vec![LineItem::for_plan(Plan::Monthly)],
            user_id: RecordId(3),
            plan: Plan::Monthly,
            success_url: "s".into(),
            cancel_url: "c".into(),
        };
        let payload = session_payload(&request);
        let attributes = &payload["data"]["attributes"];
        assert_eq!(attributes["line_items"][0]["amount"], 20_000);
        assert_eq!(attributes["metadata"]["userId"], 3);
        assert_eq!(attributes["payment_method_types"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_idempotency_key_depends_on_session() {
        let change = EntitlementChange {
            user_id: RecordId(1),
            plan: Plan::Monthly,
            provider_subscription_id: None,
        };
        assert_eq!(idempotency_key("cs_1", &change), idempotency_key("cs_1", &change));
        assert_ne!(idempotency_key("cs_1", &change), idempotency_key("cs_2", &change));
    }

    #[tokio::test]
    async fn test_repository_updater_applies_once_per_key() {
        let repo = MemoryRepository::new();
        let user = repo.seed(Collection::Users, json!({"username": "amuro"}));
        let updater = RepositoryAccountUpdater::new(Arc::new(repo.clone()));
        let change = EntitlementChange {
            user_id: user,
            plan: Plan::Annually,
            provider_subscription_id: Some("pi_1".into()),
        };
        let key = idempotency_key("cs_1", &change);

        assert!(updater.apply(&change, &key).await.unwrap());
        assert!(!updater.apply(&change, &key).await.unwrap());

        let stored = &repo.records(Collection::Users)[0];
        assert_eq!(stored.bool_field("isPremium"), Some(true));
        assert_eq!(stored.str_field("premiumPlan"), Some("annually"));
    }
}
