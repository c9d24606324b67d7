//! Gateway response parsing.
//!
//! ePDQ answers an alias charge in one of two wire shapes: a legacy
//! plain-text ack (`STATUS=<n>`) or an XML document whose single
//! `<ncresponse .../>` element carries the fields of interest as attributes.
//! Both are folded into one tagged union here so the rest of the code never
//! has to sniff body shapes again.

use crate::payments::error::{PaymentError, PaymentResult};
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// Legacy `STATUS=<n>` plain-text ack.
    PlainStatus(u32),
    /// `<ncresponse STATUS=".." [NCERROR=".."] [HTML_ANSWER=".."] />`.
    Ncresponse {
        status: u32,
        nc_error: Option<String>,
        html_answer: Option<String>,
    },
}

impl GatewayResponse {
    pub fn status(&self) -> u32 {
        match self {
            GatewayResponse::PlainStatus(status) => *status,
            GatewayResponse::Ncresponse { status, .. } => *status,
        }
    }

    pub fn nc_error(&self) -> Option<&str> {
        match self {
            GatewayResponse::PlainStatus(_) => None,
            GatewayResponse::Ncresponse { nc_error, .. } => nc_error.as_deref(),
        }
    }

    /// Base64 HTML fragment for the 3-D Secure step-up, when present.
    pub fn html_answer(&self) -> Option<&str> {
        match self {
            GatewayResponse::PlainStatus(_) => None,
            GatewayResponse::Ncresponse { html_answer, .. } => html_answer.as_deref(),
        }
    }

    /// Decode the 3-D Secure HTML fragment. The payload is relayed to the
    /// caller base64-encoded as received; this is only used to sanity-check
    /// and inspect it.
    pub fn decoded_html_answer(&self) -> Option<Vec<u8>> {
        self.html_answer()
            .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
    }
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Z_]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex"))
}

/// Parse a gateway response body, sniffing the wire shape once.
pub fn parse_gateway_response(body: &str) -> PaymentResult<GatewayResponse> {
    let trimmed = body.trim();
    if trimmed.contains("<ncresponse") {
        return parse_ncresponse(trimmed);
    }
    if trimmed.contains("STATUS=") {
        return parse_plain_status(trimmed);
    }
    Err(PaymentError::MalformedResponse {
        message: "body is neither STATUS=<n> nor an ncresponse element".to_string(),
    })
}

fn parse_plain_status(body: &str) -> PaymentResult<GatewayResponse> {
    // The legacy ack may arrive as a bare `STATUS=9` or inside a small
    // key=value list; only STATUS matters on this shape.
    let status = body
        .split(['&', '\n'])
        .filter_map(|pair| pair.trim().strip_prefix("STATUS="))
        .next()
        .ok_or_else(|| PaymentError::MalformedResponse {
            message: "missing STATUS field in plain-text response".to_string(),
        })?;
    let status = status
        .trim()
        .parse::<u32>()
        .map_err(|_| PaymentError::MalformedResponse {
            message: format!("non-numeric STATUS value: {}", status.trim()),
        })?;
    Ok(GatewayResponse::PlainStatus(status))
}

fn parse_ncresponse(body: &str) -> PaymentResult<GatewayResponse> {
    let element_start =
        body.find("<ncresponse")
            .ok_or_else(|| PaymentError::MalformedResponse {
                message: "ncresponse element not found".to_string(),
            })?;
    let element = &body[element_start..];
    let element_end = element
        .find('>')
        .ok_or_else(|| PaymentError::MalformedResponse {
            message: "unterminated ncresponse element".to_string(),
        })?;
    let element = &element[..element_end];

    let mut status = None;
    let mut nc_error = None;
    let mut html_answer = None;
    for capture in attribute_regex().captures_iter(element) {
        let value = capture[2].to_string();
        match &capture[1] {
            "STATUS" => status = Some(value),
            "NCERROR" => nc_error = Some(value),
            "HTML_ANSWER" => html_answer = Some(value),
            _ => {}
        }
    }

    let status = status
        .ok_or_else(|| PaymentError::MalformedResponse {
            message: "ncresponse element has no STATUS attribute".to_string(),
        })?
        .parse::<u32>()
        .map_err(|_| PaymentError::MalformedResponse {
            message: "ncresponse STATUS attribute is not numeric".to_string(),
        })?;

    Ok(GatewayResponse::Ncresponse {
        status,
        nc_error: nc_error.filter(|v| !v.is_empty()),
        html_answer: html_answer.filter(|v| !v.is_empty()),
    })
}
