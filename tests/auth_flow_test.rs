//! Registration, login, and refresh-token rotation integration tests.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use matchcore::auth::{AuthService, Purpose};
use matchcore::config::Config;

use common::TestFixture;

/// Captures the plaintext code passed to `send` so tests can drive the
/// verification step without reaching into the database's hashed column.
#[derive(Default)]
struct CapturingNotifier {
    last_code: Mutex<Option<String>>,
}

#[async_trait]
impl matchcore::collaborators::Notifier for CapturingNotifier {
    async fn send(
        &self,
        _destination: &str,
        _template_id: &str,
        variables: &[(&str, &str)],
        _idempotency_key: &str,
    ) -> Result<bool, String> {
        if let Some((_, code)) = variables.iter().find(|(k, _)| *k == "code") {
            *self.last_code.lock().unwrap() = Some(code.to_string());
        }
        Ok(true)
    }
}

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        database_url: String::new(),
        database_max_connections: 5,
        jwt_secret: "a-test-secret-that-is-at-least-32-bytes".to_string(),
        access_token_ttl: Duration::from_secs(30 * 60),
        refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
        verification_code_ttl: Duration::from_secs(600),
        verification_code_max_attempts: 3,
        session_idle_window: Duration::from_secs(15 * 60),
        session_hard_expiry: Duration::from_secs(7 * 24 * 3600),
        failed_login_lock_threshold: 5,
        failed_login_lock_duration: Duration::from_secs(15 * 60),
        db_deadline: Duration::from_secs(2),
        notifier_deadline: Duration::from_secs(10),
        llm_deadline: Duration::from_secs(3),
        vector_db_deadline: Duration::from_secs(5),
        payment_order_ttl: Duration::from_secs(24 * 3600),
        otlp_endpoint: None,
        service_name: "matchcore-test".to_string(),
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
    })
}

#[tokio::test]
async fn register_then_refresh_rotates_the_token_and_old_one_stops_working() {
    let fixture = TestFixture::new().await;
    let notifier = Arc::new(CapturingNotifier::default());
    let auth = AuthService::new(fixture.db.clone(), test_config(), notifier.clone());

    auth.send_code("phone", "+8613800000000", Purpose::Register).await.unwrap();
    let code = notifier.last_code.lock().unwrap().clone().unwrap();

    let (_user, tokens) = auth.register("phone", "+8613800000000", &code, "new user", None).await.unwrap();

    let rotated = auth.refresh(&tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // The original refresh token was single-use; reusing it now is replay
    // and must fail.
    let replay = auth.refresh(&tokens.refresh_token).await;
    assert!(replay.is_err());

    // Replay also revokes the rotated descendant (spec §4.1 chain revoke).
    let result_after_replay = auth.refresh(&rotated.refresh_token).await;
    assert!(result_after_replay.is_err());
}

#[tokio::test]
async fn verifying_the_wrong_code_does_not_consume_the_real_one() {
    let fixture = TestFixture::new().await;
    let notifier = Arc::new(CapturingNotifier::default());
    let auth = AuthService::new(fixture.db.clone(), test_config(), notifier.clone());

    auth.send_code("phone", "+8613800000001", Purpose::Register).await.unwrap();
    let code = notifier.last_code.lock().unwrap().clone().unwrap();

    let wrong = auth.verify_code("phone", "+8613800000001", "000000", Purpose::Register).await.unwrap();
    assert!(!wrong);

    let right = auth.verify_code("phone", "+8613800000001", &code, Purpose::Register).await.unwrap();
    assert!(right);
}

#[tokio::test]
async fn login_with_unknown_identity_fails_generically() {
    let fixture = TestFixture::new().await;
    let notifier = Arc::new(CapturingNotifier::default());
    let auth = AuthService::new(fixture.db.clone(), test_config(), notifier);

    let result = auth.login("phone", "+8619999999999", "whatever").await;
    assert!(result.is_err());
}
