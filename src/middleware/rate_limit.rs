//! Rate limiter & abuse detection (spec §4.2, component F): in-memory
//! sliding-window counters per `(ip, endpoint class)` and a process-wide
//! IP blocklist.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lazy_static::lazy_static;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitClass {
    pub name: &'static str,
    pub limit: u32,
    pub window_seconds: i64,
}

pub const GLOBAL_PER_IP: RateLimitClass = RateLimitClass { name: "global", limit: 100, window_seconds: 3600 };
pub const LOGIN: RateLimitClass = RateLimitClass { name: "login", limit: 5, window_seconds: 300 };
pub const REGISTER: RateLimitClass = RateLimitClass { name: "register", limit: 3, window_seconds: 3600 };
pub const SEND_CODE: RateLimitClass = RateLimitClass { name: "send_code", limit: 3, window_seconds: 300 };
pub const SEND_CODE_PER_IDENTITY: RateLimitClass =
    RateLimitClass { name: "send_code_identity", limit: 1, window_seconds: 60 };
pub const PASSWORD_RESET: RateLimitClass = RateLimitClass { name: "password_reset", limit: 3, window_seconds: 3600 };

const SUSPICIOUS_SUBSTRINGS: &[&str] = &[
    "<script", "union select", "../../", "/etc/passwd", "drop table", "%00", "${jndi:",
];
const SCANNER_USER_AGENTS: &[&str] = &["sqlmap", "nikto", "nmap", "masscan"];
const MAX_URL_LEN: usize = 2048;

const IP_BLOCK_STRICT_SECS: i64 = 15 * 60;
const IP_BLOCK_GLOBAL_SECS: i64 = 60 * 60;
const IP_BLOCK_SUSPICIOUS_SECS: i64 = 30 * 60;

lazy_static! {
    static ref WINDOWS: RwLock<HashMap<String, VecDeque<DateTime<Utc>>>> = RwLock::new(HashMap::new());
    static ref BLOCKED_IPS: RwLock<HashMap<String, (DateTime<Utc>, &'static str)>> = RwLock::new(HashMap::new());
}

#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch: i64,
}

/// Admit iff fewer than `class.limit` timestamps fall within the trailing
/// window. Old entries are compacted on every check (spec §4.2 "Resource
/// discipline").
pub fn check(key: &str, class: RateLimitClass) -> Admission {
    let now = Utc::now();
    let cutoff = now - ChronoDuration::seconds(class.window_seconds);
    let map_key = format!("{}:{}", class.name, key);

    let mut windows = WINDOWS.write().unwrap();
    let entry = windows.entry(map_key).or_default();
    while let Some(front) = entry.front() {
        if *front < cutoff {
            entry.pop_front();
        } else {
            break;
        }
    }

    let current = entry.len() as u32;
    let allowed = current < class.limit;
    if allowed {
        entry.push_back(now);
    }

    let reset_epoch = entry.front().map(|t| (*t + ChronoDuration::seconds(class.window_seconds)).timestamp()).unwrap_or(now.timestamp());

    Admission {
        allowed,
        limit: class.limit,
        remaining: class.limit.saturating_sub(if allowed { current + 1 } else { current }),
        reset_epoch,
    }
}

pub fn block_ip(ip: &str, reason: &'static str, duration_secs: i64) {
    let until = Utc::now() + ChronoDuration::seconds(duration_secs);
    BLOCKED_IPS.write().unwrap().insert(ip.to_string(), (until, reason));
}

pub fn is_blocked(ip: &str) -> bool {
    let blocked = BLOCKED_IPS.read().unwrap();
    blocked.get(ip).map(|(until, _)| *until > Utc::now()).unwrap_or(false)
}

pub fn block_for_strict_limit(ip: &str) {
    block_ip(ip, "endpoint_limit_exceeded", IP_BLOCK_STRICT_SECS);
}

pub fn block_for_global_limit(ip: &str) {
    block_ip(ip, "global_limit_exceeded", IP_BLOCK_GLOBAL_SECS);
}

pub fn block_for_suspicious_activity(ip: &str) {
    block_ip(ip, "suspicious_activity", IP_BLOCK_SUSPICIOUS_SECS);
}

pub fn is_suspicious(path_and_query: &str, user_agent: Option<&str>) -> bool {
    if path_and_query.len() > MAX_URL_LEN {
        return true;
    }
    let lower = path_and_query.to_lowercase();
    if SUSPICIOUS_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return true;
    }
    if let Some(ua) = user_agent {
        let ua_lower = ua.to_lowercase();
        if SCANNER_USER_AGENTS.iter().any(|s| ua_lower.contains(s)) {
            return true;
        }
    }
    false
}

/// Sweeper: drop windows and blocks that can no longer affect a decision,
/// bounding memory (spec §4.2). Triggered probabilistically inline
/// (`rand::random::<f32>() < 0.01`) as a belt-and-braces measure alongside
/// the dedicated scheduler sweep.
pub fn maybe_inline_cleanup() {
    if rand::rng().random::<f32>() < 0.01 {
        cleanup();
    }
}

pub fn cleanup() {
    let now = Utc::now();
    let mut windows = WINDOWS.write().unwrap();
    windows.retain(|_, entries| {
        entries.retain(|t| now.signed_duration_since(*t) < ChronoDuration::hours(1));
        !entries.is_empty()
    });

    let mut blocked = BLOCKED_IPS.write().unwrap();
    blocked.retain(|_, (until, _)| *until > now);
}

#[derive(Debug, Serialize)]
struct RateLimitedBody {
    success: bool,
    error: RateLimitedError,
}

#[derive(Debug, Serialize)]
struct RateLimitedError {
    code: &'static str,
    message: String,
}

fn too_many_requests(retry_after: i64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedBody {
            success: false,
            error: RateLimitedError { code: "RATE_LIMIT", message: "rate limit exceeded".to_string() },
        }),
    )
        .into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.max(0).to_string()) {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}

/// Global per-IP gate plus abuse heuristics, applied before any other
/// handler logic (spec §4.2's data-flow: "client → F → D → E → G → ...").
pub async fn global_gate(req: Request<Body>, next: Next) -> Response {
    maybe_inline_cleanup();

    let ip = client_ip(req.headers());
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let user_agent = req
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if is_blocked(&ip) {
        return too_many_requests(IP_BLOCK_GLOBAL_SECS).into_response();
    }

    if is_suspicious(&path_and_query, user_agent.as_deref()) {
        block_for_suspicious_activity(&ip);
        return too_many_requests(IP_BLOCK_SUSPICIOUS_SECS).into_response();
    }

    let admission = check(&ip, GLOBAL_PER_IP);
    if !admission.allowed {
        block_for_global_limit(&ip);
        return too_many_requests(admission.reset_epoch - Utc::now().timestamp());
    }

    let mut response = next.run(req).await;
    apply_rate_limit_headers(&mut response, admission);
    response
}

fn apply_rate_limit_headers(response: &mut Response, admission: Admission) {
    let headers = response.headers_mut();
    if let Ok(v) = axum::http::HeaderValue::from_str(&admission.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = axum::http::HeaderValue::from_str(&admission.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = axum::http::HeaderValue::from_str(&admission.reset_epoch.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

pub fn client_ip(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Apply a named rate-limit class to the current request's client IP plus
/// path (the "IP + path" key shape used by login/register/send-code/reset).
/// Returns a 429 response on rejection, and additionally blocks the IP for
/// `IP_BLOCK_STRICT_SECS` — reserved for per-endpoint abuse budgets where
/// tripping the limit at all is itself a signal worth escalating on.
pub fn check_endpoint_class(ip: &str, path: &str, class: RateLimitClass) -> Result<Admission, Response> {
    let key = format!("{ip}:{path}");
    let admission = check(&key, class);
    if admission.allowed {
        Ok(admission)
    } else {
        block_for_strict_limit(ip);
        Err(too_many_requests(admission.reset_epoch - Utc::now().timestamp()))
    }
}

/// Same shape as `check_endpoint_class`, but for soft, legitimate-reuse
/// throttles (e.g. "one code per identity per minute") that a normal user
/// can trip without being abusive — 429s the request without touching the
/// IP blocklist.
pub fn check_soft_throttle(key: &str, class: RateLimitClass) -> Result<Admission, Response> {
    let admission = check(key, class);
    if admission.allowed {
        Ok(admission)
    } else {
        Err(too_many_requests(admission.reset_epoch - Utc::now().timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn admits_until_limit_then_rejects() {
        cleanup();
        let class = RateLimitClass { name: "test_admit", limit: 2, window_seconds: 60 };
        assert!(check("k1", class).allowed);
        assert!(check("k1", class).allowed);
        assert!(!check("k1", class).allowed);
    }

    #[test]
    #[serial]
    fn suspicious_substrings_are_detected() {
        assert!(is_suspicious("/search?q=<script>alert(1)</script>", None));
        assert!(is_suspicious("/x", Some("sqlmap/1.0")));
        assert!(!is_suspicious("/chats/greeting", Some("Mozilla/5.0")));
    }

    #[test]
    #[serial]
    fn block_and_check_roundtrip() {
        block_ip("1.2.3.4", "test", 60);
        assert!(is_blocked("1.2.3.4"));
    }
}
