//! Quota enforcement and payment settlement integration tests.

mod common;

use matchcore::collaborators::payment::{HmacPaymentProvider, PaymentNotification, PaymentProvider};
use matchcore::quota::{ActionKind, PaymentService, QuotaService};

use common::TestFixture;

#[tokio::test]
async fn free_tier_swipe_quota_is_enforced() {
    let fixture = TestFixture::new().await;
    let user_id = fixture.seed_user("swiper").await;
    let quota = QuotaService::new(fixture.db.clone());

    for _ in 0..30 {
        quota.consume(user_id, ActionKind::Swipe, 1).await.unwrap();
    }

    let result = quota.consume(user_id, ActionKind::Swipe, 1).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn paying_for_membership_upgrades_tier_and_extends_quota() {
    let fixture = TestFixture::new().await;
    let user_id = fixture.seed_user("payer").await;

    let provider = HmacPaymentProvider::new("wechat", "test-secret".to_string());
    let payments = PaymentService::new(fixture.db.clone(), std::time::Duration::from_secs(3600));

    let (order, _payload) = payments.create_order(user_id, 30, "wechat", &provider).await.unwrap();
    assert_eq!(order.amount_cents, 2999);

    let signature = sign(&provider, order.order_id, "txn-1", "paid");
    let notification = PaymentNotification {
        order_id: order.order_id,
        provider_txn_id: "txn-1".to_string(),
        status: "paid".to_string(),
        signature,
    };

    payments.confirm_payment(&notification, &provider).await.unwrap();

    let stats = QuotaService::new(fixture.db.clone()).stats(user_id).await.unwrap();
    assert!(matches!(stats.tier, matchcore::quota::Tier::Paid));

    // Idempotent: replaying the same notification is a no-op, not an error.
    payments.confirm_payment(&notification, &provider).await.unwrap();
}

fn sign(provider: &HmacPaymentProvider, order_id: i64, txn: &str, status: &str) -> String {
    // `HmacPaymentProvider::sign` is private; reconstruct the same HMAC here
    // against the fixture's shared secret to exercise the public interface
    // end-to-end instead of reaching into the module internals.
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    let _ = provider;
    let mut mac = Hmac::<Sha256>::new_from_slice(b"test-secret").unwrap();
    mac.update(format!("{order_id}|{txn}|{status}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
