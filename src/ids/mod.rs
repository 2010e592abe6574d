//! Deterministic key generation.
//!
//! Entity primary keys (`User.user_id`, `Chat.chat_id`, ...) are opaque
//! integers assigned by the database per spec §3 — see the `BIGINT
//! GENERATED ALWAYS AS IDENTITY` columns in `migrations/`. This module is
//! for the one place a *content-addressed* string key is actually useful:
//! idempotency keys handed to the external notifier (spec §6) so that
//! re-sending the same verification code for the same purpose never pages
//! a user twice, even if the handler retries after a timeout.
//!
//! Format: `{prefix}_{hash16}`, a deterministic hash over "uniqueness
//! components" — the same components always yield the same key.

use sha2::{Digest, Sha256};

pub const NOTIFY_PREFIX: &str = "notify";

/// Generate a collision-resistant key from components.
pub fn generate_id(prefix: &str, components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update(b"|"); // separator: avoids ["ab","c"] colliding with ["a","bc"]
    }
    let hash = hasher.finalize();
    let hash_str = hex::encode(&hash[..8]); // 16 hex chars from 8 bytes
    format!("{}_{}", prefix, hash_str)
}

/// Idempotency key for a notifier `send()` call: stable for the same
/// verification code issuance, so handler retries don't double-send.
pub fn notify_idempotency_key(provider: &str, provider_id: &str, purpose: &str, issued_at_unix: i64) -> String {
    generate_id(
        NOTIFY_PREFIX,
        &[provider, provider_id, purpose, &issued_at_unix.to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_components() {
        let a = generate_id(NOTIFY_PREFIX, &["phone", "+15551112222"]);
        let b = generate_id(NOTIFY_PREFIX, &["phone", "+15551112222"]);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_components() {
        let a = generate_id(NOTIFY_PREFIX, &["phone", "+15551112222"]);
        let b = generate_id(NOTIFY_PREFIX, &["phone", "+15551113333"]);
        assert_ne!(a, b);
    }

    #[test]
    fn separator_prevents_ambiguity() {
        let a = generate_id("t", &["ab", "c"]);
        let b = generate_id("t", &["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn notify_key_is_stable_for_same_issuance() {
        let a = notify_idempotency_key("phone", "+15551112222", "register", 1000);
        let b = notify_idempotency_key("phone", "+15551112222", "register", 1000);
        assert_eq!(a, b);
        let c = notify_idempotency_key("phone", "+15551112222", "register", 1001);
        assert_ne!(a, c);
    }
}
