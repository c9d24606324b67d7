//! Verifies that secret material never reaches log output.

use pitch_backend::logging::{redact, REDACTION_MARKER};
use pitch_backend::payments::epdq::{
    redacted_payload, signed_charge_fields, ChargeRequest, GatewayCredentials,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn credentials() -> GatewayCredentials {
    GatewayCredentials {
        pspid: "epdq1234567".to_string(),
        sha_passphrase: "MySecretSig1875!?".to_string(),
    }
}

fn request() -> ChargeRequest {
    ChargeRequest {
        alias_id: "alias-abc".to_string(),
        order_id: "ord-77".to_string(),
        amount_minor: 25000,
        currency: "GBP".to_string(),
    }
}

#[test]
fn redacted_payload_hides_signature_and_credentials() {
    let credentials = credentials();
    let fields = signed_charge_fields(&request(), &credentials);
    let shasign = fields.get("SHASIGN").cloned().unwrap();

    let payload = redacted_payload(&fields, &credentials);

    assert!(payload.contains(REDACTION_MARKER));
    assert!(!payload.contains(&shasign));
    assert!(!payload.contains(&credentials.sha_passphrase));
    assert!(!payload.contains(&credentials.pspid));
    // Non-secret fields survive for debugging.
    assert!(payload.contains("ALIAS=alias-abc"));
    assert!(payload.contains("ORDERID=ord-77"));
}

#[test]
fn logged_gateway_payload_never_contains_secret_material() {
    let capture = CaptureWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .finish();

    let credentials = credentials();
    let fields = signed_charge_fields(&request(), &credentials);
    let payload = redacted_payload(&fields, &credentials);

    tracing::subscriber::with_default(subscriber, || {
        info!(payload = %payload, "Sending gateway charge request");
    });

    let logs = capture.contents();
    assert!(logs.contains(REDACTION_MARKER));
    assert!(!logs.contains("MySecretSig1875!?"));
    assert!(!logs.contains("epdq1234567"));
    assert!(logs.contains("ord-77"));
}

#[test]
fn redact_replaces_every_occurrence_of_each_secret() {
    let message = "PSPID=shop1 sig=topsecret again topsecret";
    let cleaned = redact(message, &["topsecret", "shop1"]);
    assert_eq!(
        cleaned,
        format!(
            "PSPID={m} sig={m} again {m}",
            m = REDACTION_MARKER
        )
    );
}
