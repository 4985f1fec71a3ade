//! Payment gateway boundary.
//!
//! The gateway itself (order/subscription creation, signature cryptography)
//! is an external collaborator. This module defines the verification seam
//! and the typed lifecycle events the ingestor consumes. Raw webhook bodies
//! are verified first, decoded second; unverified payloads never reach
//! business logic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Verifies a raw webhook payload against its signature.
///
/// Implementations wrap whatever cryptography the gateway mandates (HMAC
/// over the body, key lookup). A failed check must return
/// `LedgerError::UnverifiedEvent`.
pub trait EventVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &str) -> Result<()>;
}

/// Subscription activated: the first charge succeeded and the plan window
/// opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionActivated {
    pub gateway_subscription_id: String,
    pub gateway_payment_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Subscription cancelled at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCancelled {
    pub gateway_subscription_id: String,
}

/// A recurring charge was captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub gateway_payment_id: String,
    pub amount: Decimal,
}

/// A charge failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

/// The verified lifecycle events the ingestor handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum GatewayEvent {
    #[serde(rename = "subscription.activated")]
    SubscriptionActivated(SubscriptionActivated),
    #[serde(rename = "subscription.cancelled")]
    SubscriptionCancelled(SubscriptionCancelled),
    #[serde(rename = "payment.captured")]
    PaymentCaptured(PaymentCaptured),
    #[serde(rename = "payment.failed")]
    PaymentFailed(PaymentFailed),
}

impl GatewayEvent {
    /// Verify then decode a raw webhook body.
    ///
    /// Verification failures surface before any parsing so a forged body
    /// can't even produce a parse error response.
    pub fn decode_verified(
        verifier: &dyn EventVerifier,
        payload: &[u8],
        signature: &str,
    ) -> Result<Self> {
        verifier.verify(payload, signature)?;
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    struct RejectAll;

    impl EventVerifier for RejectAll {
        fn verify(&self, _payload: &[u8], _signature: &str) -> Result<()> {
            Err(LedgerError::UnverifiedEvent("signature mismatch".into()))
        }
    }

    struct AcceptAll;

    impl EventVerifier for AcceptAll {
        fn verify(&self, _payload: &[u8], _signature: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejected_signature_never_parses() {
        let garbage = b"not even json";
        let err = GatewayEvent::decode_verified(&RejectAll, garbage, "sig").unwrap_err();
        assert!(matches!(err, LedgerError::UnverifiedEvent(_)));
    }

    #[test]
    fn test_decode_activated_event() {
        let body = serde_json::json!({
            "event": "subscription.activated",
            "payload": {
                "gateway_subscription_id": "sub_00000000000001",
                "gateway_payment_id": "pay_00000000000001",
                "start_date": "2025-01-01T00:00:00Z",
                "end_date": "2026-01-01T00:00:00Z"
            }
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let event = GatewayEvent::decode_verified(&AcceptAll, &raw, "sig").unwrap();
        match event {
            GatewayEvent::SubscriptionActivated(e) => {
                assert_eq!(e.gateway_subscription_id, "sub_00000000000001");
                assert_eq!(e.gateway_payment_id.as_deref(), Some("pay_00000000000001"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
