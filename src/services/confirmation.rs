//! Payment confirmation orchestration.
//!
//! One call per HTTP request: load the instruction, guard against duplicate
//! processing, charge the stored alias through the gateway, interpret the
//! outcome and persist it. Concurrent confirmations for the same order are
//! serialized by a per-order lock so a rapid double-submit cannot produce
//! two gateway POSTs.

use crate::database::error::DatabaseError;
use crate::database::instruction_repository::PaymentStatus;
use crate::database::repository::InstructionStore;
use crate::error::{AppError, AppErrorKind};
use crate::payments::epdq::{ChargeRequest, GatewayClient, GatewayCredentials};
use crate::payments::error::PaymentError;
use crate::payments::status::{classify, PaymentOutcome};
use crate::secrets::{SecretCache, SecretError, SECRET_EPDQ_PSPID, SECRET_EPDQ_SHAPHRASE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Payment captured on this call.
    Captured,
    /// The order was already finalised, locally or by the gateway.
    AlreadyProcessed,
    /// 3-D Secure step-up required; base64 HTML fragment for the payer's
    /// browser. No state was persisted.
    ChallengeRequired(String),
}

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("unknown order: {order_id}")]
    UnknownOrder { order_id: String },

    #[error(transparent)]
    Secrets(#[from] SecretError),

    #[error(transparent)]
    Gateway(#[from] PaymentError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ConfirmationError> for AppError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::MissingField { field } => {
                AppError::new(AppErrorKind::Validation {
                    message: format!("{} is required", field),
                    field: Some(field.to_string()),
                })
            }
            ConfirmationError::UnknownOrder { order_id } => {
                AppError::new(AppErrorKind::OrderNotFound { order_id })
            }
            ConfirmationError::Secrets(e) => e.into(),
            ConfirmationError::Gateway(e) => e.into(),
            ConfirmationError::Database(e) => e.into(),
        }
    }
}

/// Per-order mutual exclusion. Lock handles are held via `Weak` so entries
/// for quiet orders fall away instead of accumulating for the process
/// lifetime.
struct OrderLocks {
    inner: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl OrderLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, order_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if map.len() > 1024 {
            map.retain(|_, weak| weak.strong_count() > 0);
        }
        if let Some(existing) = map.get(order_id).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(tokio::sync::Mutex::new(()));
        map.insert(order_id.to_string(), Arc::downgrade(&fresh));
        fresh
    }
}

pub struct PaymentConfirmationService {
    store: Arc<dyn InstructionStore>,
    gateway: Arc<dyn GatewayClient>,
    secrets: Arc<SecretCache>,
    locks: OrderLocks,
}

impl PaymentConfirmationService {
    pub fn new(
        store: Arc<dyn InstructionStore>,
        gateway: Arc<dyn GatewayClient>,
        secrets: Arc<SecretCache>,
    ) -> Self {
        Self {
            store,
            gateway,
            secrets,
            locks: OrderLocks::new(),
        }
    }

    /// Run one confirmation attempt for an order.
    ///
    /// `successful` is absorbing: once an order is recorded as paid, every
    /// further call short-circuits without contacting the gateway. A
    /// challenge outcome persists nothing; the client resubmits after the
    /// payer completes the step-up.
    pub async fn confirm(
        &self,
        alias_id: &str,
        order_id: &str,
    ) -> Result<ConfirmOutcome, ConfirmationError> {
        let alias_id = alias_id.trim();
        let order_id = order_id.trim();
        if alias_id.is_empty() {
            return Err(ConfirmationError::MissingField { field: "aliasId" });
        }
        if order_id.is_empty() {
            return Err(ConfirmationError::MissingField { field: "orderId" });
        }

        let slot = self.locks.slot(order_id);
        let _guard = slot.lock().await;

        let instruction = self
            .store
            .get_instruction(order_id)
            .await?
            .ok_or_else(|| ConfirmationError::UnknownOrder {
                order_id: order_id.to_string(),
            })?;

        if instruction.payment_status() == Some(PaymentStatus::Successful) {
            info!(order_id = %order_id, "order already successful, skipping gateway");
            return Ok(ConfirmOutcome::AlreadyProcessed);
        }

        let sha_passphrase = self.secrets.get(SECRET_EPDQ_SHAPHRASE).await?;
        let pspid = self.secrets.get(SECRET_EPDQ_PSPID).await?;
        let credentials = GatewayCredentials {
            pspid,
            sha_passphrase,
        };

        let request = ChargeRequest {
            alias_id: alias_id.to_string(),
            order_id: order_id.to_string(),
            amount_minor: instruction.amount_minor,
            currency: instruction.currency.clone(),
        };

        // Transport and parse failures propagate without touching the stored
        // status: the true gateway state is unknown and the whole call is
        // safe to retry.
        let response = self.gateway.charge_alias(&request, &credentials).await?;

        match classify(&response) {
            PaymentOutcome::Captured => {
                self.store
                    .update_payment_status(order_id, PaymentStatus::Successful)
                    .await?;
                if let Some(deal_id) = instruction.deal_id {
                    self.store
                        .attach_instruction_ref_to_deal(&instruction.instruction_ref, deal_id)
                        .await?;
                }
                info!(order_id = %order_id, "payment captured");
                Ok(ConfirmOutcome::Captured)
            }
            PaymentOutcome::ChallengeRequired(html_answer) => {
                // The fragment is relayed base64-encoded as received; decode
                // only to report its size for support diagnostics.
                let fragment_bytes = response
                    .decoded_html_answer()
                    .map(|html| html.len())
                    .unwrap_or(0);
                info!(
                    order_id = %order_id,
                    fragment_bytes,
                    "3-D Secure challenge required"
                );
                Ok(ConfirmOutcome::ChallengeRequired(html_answer))
            }
            PaymentOutcome::AlreadyProcessed => {
                self.store
                    .update_payment_status(order_id, PaymentStatus::Successful)
                    .await?;
                info!(order_id = %order_id, "gateway reports order already processed");
                Ok(ConfirmOutcome::AlreadyProcessed)
            }
            PaymentOutcome::Declined { status, nc_error } => {
                self.store
                    .update_payment_status(order_id, PaymentStatus::Failed)
                    .await?;
                warn!(
                    order_id = %order_id,
                    gateway_status = status,
                    nc_error = nc_error.as_deref().unwrap_or(""),
                    "payment declined"
                );
                Err(PaymentError::Declined { status, nc_error }.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::instruction_repository::Instruction;
    use crate::payments::error::PaymentResult;
    use crate::payments::response::GatewayResponse;
    use crate::secrets::SecretStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn instruction(order_id: &str, payment_result: Option<&str>, deal_id: Option<Uuid>) -> Instruction {
        Instruction {
            order_id: order_id.to_string(),
            alias_id: Some("alias-1".to_string()),
            email: Some("client@example.com".to_string()),
            amount_minor: 15000,
            currency: "GBP".to_string(),
            payment_result: payment_result.map(|v| v.to_string()),
            instruction_ref: "HLX-1".to_string(),
            deal_id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[derive(Default)]
    struct MockStoreState {
        instruction: Option<Instruction>,
        updates: Vec<(String, PaymentStatus)>,
        linked: bool,
        closed: bool,
    }

    #[derive(Default)]
    struct MockStore {
        state: Mutex<MockStoreState>,
    }

    impl MockStore {
        fn with_instruction(instruction: Instruction) -> Self {
            Self {
                state: Mutex::new(MockStoreState {
                    instruction: Some(instruction),
                    ..Default::default()
                }),
            }
        }
    }

    #[async_trait]
    impl InstructionStore for MockStore {
        async fn get_instruction(
            &self,
            order_id: &str,
        ) -> Result<Option<Instruction>, DatabaseError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .instruction
                .clone()
                .filter(|i| i.order_id == order_id))
        }

        async fn update_payment_status(
            &self,
            order_id: &str,
            status: PaymentStatus,
        ) -> Result<(), DatabaseError> {
            let mut state = self.state.lock().unwrap();
            state.updates.push((order_id.to_string(), status));
            if let Some(instruction) = state.instruction.as_mut() {
                instruction.payment_result = Some(status.as_str().to_string());
            }
            Ok(())
        }

        async fn attach_instruction_ref_to_deal(
            &self,
            _instruction_ref: &str,
            _deal_id: Uuid,
        ) -> Result<(), DatabaseError> {
            self.state.lock().unwrap().linked = true;
            Ok(())
        }

        async fn close_deal(&self, _deal_id: Uuid) -> Result<(), DatabaseError> {
            self.state.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct MockGateway {
        response: PaymentResult<GatewayResponse>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl MockGateway {
        fn replying(response: GatewayResponse) -> Self {
            Self {
                response: Ok(response),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn failing(error: PaymentError) -> Self {
            Self {
                response: Err(error),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl GatewayClient for MockGateway {
        async fn charge_alias(
            &self,
            _request: &ChargeRequest,
            _credentials: &GatewayCredentials,
        ) -> PaymentResult<GatewayResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    struct StaticSecrets;

    #[async_trait]
    impl SecretStore for StaticSecrets {
        async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
            Ok(format!("{}-value", name))
        }
    }

    fn service(store: Arc<MockStore>, gateway: Arc<MockGateway>) -> PaymentConfirmationService {
        PaymentConfirmationService::new(
            store,
            gateway,
            Arc::new(SecretCache::new(Arc::new(StaticSecrets))),
        )
    }

    #[tokio::test]
    async fn captured_payment_is_persisted_and_linked() {
        let deal_id = Uuid::new_v4();
        let store = Arc::new(MockStore::with_instruction(instruction(
            "ord-1",
            None,
            Some(deal_id),
        )));
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::PlainStatus(9)));
        let outcome = service(store.clone(), gateway)
            .confirm("alias-1", "ord-1")
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::Captured);
        let state = store.state.lock().unwrap();
        assert_eq!(
            state.updates,
            vec![("ord-1".to_string(), PaymentStatus::Successful)]
        );
        assert!(state.linked);
        assert!(!state.closed, "confirmation must never close the deal");
    }

    #[tokio::test]
    async fn already_successful_order_short_circuits_without_gateway_call() {
        let store = Arc::new(MockStore::with_instruction(instruction(
            "ord-1",
            Some("successful"),
            None,
        )));
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::PlainStatus(9)));
        let svc = service(store.clone(), gateway.clone());

        for _ in 0..2 {
            let outcome = svc.confirm("alias-1", "ord-1").await.unwrap();
            assert_eq!(outcome, ConfirmOutcome::AlreadyProcessed);
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert!(store.state.lock().unwrap().updates.is_empty());
    }

    #[tokio::test]
    async fn challenge_persists_nothing() {
        let store = Arc::new(MockStore::with_instruction(instruction("ord-1", None, None)));
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::Ncresponse {
            status: 46,
            nc_error: None,
            html_answer: Some("SGVsbG8=".to_string()),
        }));
        let outcome = service(store.clone(), gateway)
            .confirm("alias-1", "ord-1")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ConfirmOutcome::ChallengeRequired("SGVsbG8=".to_string())
        );
        let state = store.state.lock().unwrap();
        assert!(state.updates.is_empty());
        assert!(!state.linked);
        assert!(!state.closed);
    }

    #[tokio::test]
    async fn gateway_already_processed_sub_code_marks_success() {
        let store = Arc::new(MockStore::with_instruction(instruction("ord-1", None, None)));
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::Ncresponse {
            status: 0,
            nc_error: Some("50001113".to_string()),
            html_answer: None,
        }));
        let outcome = service(store.clone(), gateway)
            .confirm("alias-1", "ord-1")
            .await
            .unwrap();

        assert_eq!(outcome, ConfirmOutcome::AlreadyProcessed);
        assert_eq!(
            store.state.lock().unwrap().updates,
            vec![("ord-1".to_string(), PaymentStatus::Successful)]
        );
    }

    #[tokio::test]
    async fn declined_payment_is_marked_failed() {
        let store = Arc::new(MockStore::with_instruction(instruction("ord-1", None, None)));
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::PlainStatus(2)));
        let err = service(store.clone(), gateway)
            .confirm("alias-1", "ord-1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfirmationError::Gateway(PaymentError::Declined { status: 2, .. })
        ));
        let state = store.state.lock().unwrap();
        assert_eq!(
            state.updates,
            vec![("ord-1".to_string(), PaymentStatus::Failed)]
        );
        assert!(!state.linked);
    }

    #[tokio::test]
    async fn transport_error_leaves_status_untouched() {
        let store = Arc::new(MockStore::with_instruction(instruction("ord-1", None, None)));
        let gateway = Arc::new(MockGateway::failing(PaymentError::NetworkError {
            message: "connection reset".to_string(),
        }));
        let err = service(store.clone(), gateway)
            .confirm("alias-1", "ord-1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfirmationError::Gateway(PaymentError::NetworkError { .. })
        ));
        assert!(store.state.lock().unwrap().updates.is_empty());
    }

    #[tokio::test]
    async fn unknown_order_is_reported() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::PlainStatus(9)));
        let err = service(store, gateway)
            .confirm("alias-1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfirmationError::UnknownOrder { .. }));
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::replying(GatewayResponse::PlainStatus(9)));
        let svc = service(store, gateway);
        assert!(matches!(
            svc.confirm("  ", "ord-1").await.unwrap_err(),
            ConfirmationError::MissingField { field: "aliasId" }
        ));
        assert!(matches!(
            svc.confirm("alias-1", "").await.unwrap_err(),
            ConfirmationError::MissingField { field: "orderId" }
        ));
    }

    #[tokio::test]
    async fn concurrent_confirmations_for_one_order_charge_once() {
        let store = Arc::new(MockStore::with_instruction(instruction("ord-1", None, None)));
        let gateway = Arc::new(MockGateway {
            response: Ok(GatewayResponse::PlainStatus(9)),
            calls: AtomicU32::new(0),
            delay: Duration::from_millis(20),
        });
        let svc = Arc::new(service(store, gateway.clone()));

        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.confirm("alias-1", "ord-1").await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.confirm("alias-1", "ord-1").await }
        });

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        // One call captures; the other finds the order already successful.
        assert!(outcomes.contains(&ConfirmOutcome::Captured));
        assert!(outcomes.contains(&ConfirmOutcome::AlreadyProcessed));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }
}
