//! Barclaycard ePDQ DirectLink client.
//!
//! Charges a previously stored card alias (`ALIASOPERATION=BYPSP`) via a
//! signed form-POST to `orderdirect.asp` and returns the parsed response.
//! Merchant credentials are resolved per call by the confirmation service;
//! the client itself holds no secrets.

use crate::logging::{redact, REDACTION_MARKER};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::response::{parse_gateway_response, GatewayResponse};
use crate::payments::signature::{sha_sign, SIGNATURE_FIELD};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Gateway instruction meaning "charge this stored alias, merchant-initiated".
pub const ALIAS_OPERATION: &str = "BYPSP";

/// DirectLink operation code for an immediate sale (authorise + capture).
pub const OPERATION_SALE: &str = "SALE";

#[derive(Debug, Clone)]
pub struct EpdqConfig {
    pub base_url: String,
    pub order_direct_path: String,
    pub timeout_secs: u64,
}

impl Default for EpdqConfig {
    fn default() -> Self {
        Self {
            base_url: "https://payments.epdq.co.uk".to_string(),
            order_direct_path: "/ncol/prod/orderdirect.asp".to_string(),
            timeout_secs: 20,
        }
    }
}

impl EpdqConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("EPDQ_BASE_URL").unwrap_or(defaults.base_url),
            order_direct_path: std::env::var("EPDQ_ORDER_DIRECT_PATH")
                .unwrap_or(defaults.order_direct_path),
            timeout_secs: std::env::var("EPDQ_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// One alias charge, correlated to a stored instruction.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub alias_id: String,
    pub order_id: String,
    /// Amount in the currency's minor unit (pence).
    pub amount_minor: i64,
    pub currency: String,
}

/// Merchant credentials resolved from the secret store for this call.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub pspid: String,
    pub sha_passphrase: String,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn charge_alias(
        &self,
        request: &ChargeRequest,
        credentials: &GatewayCredentials,
    ) -> PaymentResult<GatewayResponse>;
}

/// Build the unsigned field map for an alias charge.
pub fn charge_fields(request: &ChargeRequest, pspid: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("ALIAS".to_string(), request.alias_id.clone());
    fields.insert("ALIASOPERATION".to_string(), ALIAS_OPERATION.to_string());
    fields.insert("AMOUNT".to_string(), request.amount_minor.to_string());
    fields.insert("CURRENCY".to_string(), request.currency.clone());
    fields.insert("OPERATION".to_string(), OPERATION_SALE.to_string());
    fields.insert("ORDERID".to_string(), request.order_id.clone());
    fields.insert("PSPID".to_string(), pspid.to_string());
    fields
}

/// Build the complete signed payload: field map plus SHASIGN.
pub fn signed_charge_fields(
    request: &ChargeRequest,
    credentials: &GatewayCredentials,
) -> BTreeMap<String, String> {
    let mut fields = charge_fields(request, &credentials.pspid);
    let signature = sha_sign(&fields, &credentials.sha_passphrase);
    fields.insert(SIGNATURE_FIELD.to_string(), signature);
    fields
}

/// Render the outbound payload for logging with the signature and any
/// credential material replaced by the redaction marker.
pub fn redacted_payload(fields: &BTreeMap<String, String>, credentials: &GatewayCredentials) -> String {
    let rendered = fields
        .iter()
        .map(|(key, value)| {
            if key == SIGNATURE_FIELD {
                // SHASIGN is derived from the passphrase; never log it.
                format!("{}={}", key, REDACTION_MARKER)
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    redact(
        &rendered,
        &[&credentials.sha_passphrase, &credentials.pspid],
    )
}

pub struct EpdqClient {
    config: EpdqConfig,
    http: reqwest::Client,
}

impl EpdqClient {
    pub fn new(config: EpdqConfig) -> PaymentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.order_direct_path)
    }
}

#[async_trait]
impl GatewayClient for EpdqClient {
    async fn charge_alias(
        &self,
        request: &ChargeRequest,
        credentials: &GatewayCredentials,
    ) -> PaymentResult<GatewayResponse> {
        let fields = signed_charge_fields(request, credentials);
        debug!(
            order_id = %request.order_id,
            payload = %redacted_payload(&fields, credentials),
            "posting alias charge to gateway"
        );

        let response = self
            .http
            .post(self.endpoint())
            .form(&fields)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to read gateway response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(PaymentError::NetworkError {
                message: format!("gateway returned HTTP {}", status),
            });
        }

        let parsed = parse_gateway_response(&body)?;
        info!(
            order_id = %request.order_id,
            gateway_status = parsed.status(),
            "gateway response received"
        );
        Ok(parsed)
    }
}
