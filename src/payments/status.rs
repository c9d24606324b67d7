//! Gateway status-code classification.
//!
//! The STATUS / NCERROR code spaces are the gateway's vocabulary, not ours,
//! so the known mapping is kept as data rather than scattered comparisons.
//! Extending it for a new gateway code means touching these tables only.

use crate::payments::response::GatewayResponse;

/// STATUS codes meaning the charge was captured (9) or authorised (5).
pub const SUCCESS_STATUS_CODES: &[u32] = &[5, 9];

/// STATUS codes meaning the payer must complete a 3-D Secure step-up; the
/// response carries the HTML fragment to render as base64 `HTML_ANSWER`.
pub const CHALLENGE_STATUS_CODES: &[u32] = &[46];

/// NCERROR sub-codes that mean "this order was already finalised" rather
/// than a genuine failure. The gateway's own idempotent-replay signal.
pub const ALREADY_PROCESSED_NCERRORS: &[&str] = &["50001113"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Charge captured; persist success and link the instruction.
    Captured,
    /// 3-D Secure step-up required; base64 HTML fragment for the payer.
    ChallengeRequired(String),
    /// The gateway reports the order as already finalised.
    AlreadyProcessed,
    /// Genuine failure.
    Declined {
        status: u32,
        nc_error: Option<String>,
    },
}

/// Interpret a parsed gateway response against the classification tables.
pub fn classify(response: &GatewayResponse) -> PaymentOutcome {
    let status = response.status();
    if SUCCESS_STATUS_CODES.contains(&status) {
        return PaymentOutcome::Captured;
    }
    if CHALLENGE_STATUS_CODES.contains(&status) {
        // A challenge status without a fragment leaves the payer nothing to
        // complete; treat it as a decline.
        if let Some(html) = response.html_answer() {
            return PaymentOutcome::ChallengeRequired(html.to_string());
        }
    }
    if let Some(nc_error) = response.nc_error() {
        if ALREADY_PROCESSED_NCERRORS.contains(&nc_error) {
            return PaymentOutcome::AlreadyProcessed;
        }
    }
    PaymentOutcome::Declined {
        status,
        nc_error: response.nc_error().map(|v| v.to_string()),
    }
}
