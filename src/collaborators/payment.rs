//! Payment-provider collaborator (spec §6): order creation plus
//! HMAC-signed authenticity verification of asynchronous notifications.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub provider_order_id: String,
    pub client_payload: serde_json::Value,
}

/// Notification payload a provider posts to the webhook endpoint. The
/// `signature` is HMAC-SHA256 over `order_id|provider_txn_id|status` using
/// a per-provider shared secret.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PaymentNotification {
    pub order_id: i64,
    pub provider_txn_id: String,
    pub status: String,
    pub signature: String,
}

pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_order(&self, amount_cents: i64, currency: &str, order_id: i64) -> CreatedOrder;
    fn verify_notification(&self, notification: &PaymentNotification) -> Result<()>;
}

pub struct HmacPaymentProvider {
    provider_name: &'static str,
    secret: String,
}

impl HmacPaymentProvider {
    pub fn new(provider_name: &'static str, secret: String) -> Self {
        Self { provider_name, secret }
    }

    fn sign(&self, order_id: i64, provider_txn_id: &str, status: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Internal(format!("invalid hmac key: {e}")))?;
        mac.update(format!("{order_id}|{provider_txn_id}|{status}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl PaymentProvider for HmacPaymentProvider {
    fn name(&self) -> &'static str {
        self.provider_name
    }

    fn create_order(&self, amount_cents: i64, currency: &str, order_id: i64) -> CreatedOrder {
        CreatedOrder {
            provider_order_id: format!("{}-{}", self.provider_name, order_id),
            client_payload: serde_json::json!({
                "amount_cents": amount_cents,
                "currency": currency,
                "order_id": order_id,
            }),
        }
    }

    fn verify_notification(&self, notification: &PaymentNotification) -> Result<()> {
        let expected = self.sign(notification.order_id, &notification.provider_txn_id, &notification.status)?;
        if expected.as_bytes().ct_eq(notification.signature.as_bytes()) {
            Ok(())
        } else {
            Err(Error::PaymentVerifyFailed("signature mismatch".to_string()))
        }
    }
}

/// Minimal constant-time byte comparison, avoids pulling in `subtle` — hex
/// digests are fixed-length so a manual fold is sufficient.
trait ConstantTimeEq {
    fn ct_eq(&self, other: &[u8]) -> bool;
}

impl ConstantTimeEq for [u8] {
    fn ct_eq(&self, other: &[u8]) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in self.iter().zip(other.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let provider = HmacPaymentProvider::new("wechat", "top-secret".to_string());
        let signature = provider.sign(1, "txn123", "paid").unwrap();
        let notification = PaymentNotification {
            order_id: 1,
            provider_txn_id: "txn123".to_string(),
            status: "paid".to_string(),
            signature,
        };
        assert!(provider.verify_notification(&notification).is_ok());
    }

    #[test]
    fn tampered_signature_fails() {
        let provider = HmacPaymentProvider::new("wechat", "top-secret".to_string());
        let notification = PaymentNotification {
            order_id: 1,
            provider_txn_id: "txn123".to_string(),
            status: "paid".to_string(),
            signature: "0".repeat(64),
        };
        assert!(provider.verify_notification(&notification).is_err());
    }
}
