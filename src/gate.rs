// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Referrer whitelist gate.
//!
//! Every request's referrer is recorded before the decision is made, so a
//! denied referrer still shows up in the console for later approval. The
//! decision is taken against the record just re-read from the store; nothing
//! is cached between requests.

use crate::handlers::{AppState, ErrorResponse};
use crate::store::{ConfigStore, StoreHealth, UNKNOWN_REFERRER};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Body message of a denied request.
pub const ACCESS_DENIED: &str = "Access denied: Referrer not whitelisted";

/// Outcome of the whitelist policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied,
}

/// A decision together with what happened to the store along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: GateDecision,
    /// Storage status of the record the decision was based on.
    pub health: StoreHealth,
    /// True when this check added the referrer to the record.
    pub recorded: bool,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.decision == GateDecision::Allowed
    }
}

/// Whitelist policy over an injected store.
#[derive(Clone)]
pub struct ReferrerGate {
    store: Arc<dyn ConfigStore>,
    max_referrer_len: usize,
}

impl ReferrerGate {
    pub fn new(store: Arc<dyn ConfigStore>, max_referrer_len: usize) -> Self {
        Self {
            store,
            max_referrer_len,
        }
    }

    /// Record `referrer` if new, then decide whether it may pass.
    pub fn check(&self, referrer: &str) -> Verdict {
        let snapshot = if referrer.len() <= self.max_referrer_len {
            self.store.add_referrer(referrer, false)
        } else {
            warn!(
                len = referrer.len(),
                max = self.max_referrer_len,
                "Referrer too long, not recording"
            );
            self.store.read()
        };

        if let StoreHealth::Degraded(reason) = &snapshot.health {
            warn!(referrer = %referrer, reason = %reason, "Deciding on transient configuration");
        }

        let decision = if snapshot.record.allows(referrer) {
            GateDecision::Allowed
        } else {
            GateDecision::Denied
        };

        Verdict {
            decision,
            health: snapshot.health,
            recorded: snapshot.changed,
        }
    }
}

/// Referrer of a request, or [`UNKNOWN_REFERRER`] when absent or empty.
///
/// `Referer` is consulted first, then the `Referrer` spelling.
pub fn extract_referrer(headers: &HeaderMap) -> String {
    ["referer", "referrer"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN_REFERRER.to_string())
}

/// Axum middleware applying the gate to every route it wraps.
pub async fn referrer_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let referrer = extract_referrer(request.headers());
    debug!(referrer = %referrer, path = %request.uri().path(), "Request from referrer");

    let gate = state.gate.clone();
    let observed = referrer.clone();
    let allowed = match tokio::task::spawn_blocking(move || gate.check(&observed)).await {
        Ok(verdict) => {
            if verdict.recorded {
                state.metrics.record_new_referrer();
            }
            verdict.is_allowed()
        }
        Err(err) => {
            warn!(referrer = %referrer, error = %err, "Gate check aborted, allowing request");
            true
        }
    };
    state.metrics.record_gate(allowed);

    if !allowed {
        info!(referrer = %referrer, "Blocked request from non-whitelisted referrer");
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new(ACCESS_DENIED))).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConfigRecord, MemoryStore};
    use axum::http::HeaderValue;

    fn gate_with(record: Option<ConfigRecord>) -> (ReferrerGate, Arc<MemoryStore>) {
        let store = Arc::new(match record {
            Some(record) => MemoryStore::with_record(record),
            None => MemoryStore::new(),
        });
        (ReferrerGate::new(store.clone(), 64), store)
    }

    fn record(enabled: bool, referrers: &[(&str, bool)]) -> ConfigRecord {
        ConfigRecord {
            whitelist_enabled: enabled,
            referrers: referrers
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn test_new_referrer_recorded_as_not_whitelisted() {
        for enabled in [false, true] {
            let (gate, store) = gate_with(Some(record(enabled, &[])));
            gate.check("https://new.example/");
            let stored = store.current().unwrap();
            assert_eq!(stored.referrers.get("https://new.example/"), Some(&false));
        }
    }

    #[test]
    fn test_known_referrer_unchanged() {
        let initial = record(true, &[("a.com", true), ("b.com", false)]);
        let (gate, store) = gate_with(Some(initial.clone()));
        assert!(!gate.check("a.com").recorded);
        assert!(!gate.check("b.com").recorded);
        assert_eq!(store.current(), Some(initial));
    }

    #[test]
    fn test_only_first_sighting_is_recorded() {
        let (gate, _) = gate_with(Some(record(true, &[])));
        assert!(gate.check("c.com").recorded);
        assert!(!gate.check("c.com").recorded);
    }

    #[test]
    fn test_disabled_allows_everything() {
        let (gate, _) = gate_with(Some(record(false, &[("b.com", false)])));
        assert!(gate.check("b.com").is_allowed());
        assert!(gate.check("c.com").is_allowed());
        assert!(gate.check(UNKNOWN_REFERRER).is_allowed());
    }

    #[test]
    fn test_enabled_allows_only_whitelisted() {
        let (gate, _) = gate_with(Some(record(true, &[("a.com", true), ("b.com", false)])));
        assert!(gate.check("a.com").is_allowed());
        assert_eq!(gate.check("b.com").decision, GateDecision::Denied);
        assert_eq!(gate.check(UNKNOWN_REFERRER).decision, GateDecision::Denied);
    }

    #[test]
    fn test_no_normalization() {
        let (gate, store) = gate_with(Some(record(true, &[("https://a.com", true)])));
        assert!(!gate.check("https://a.com/").is_allowed());
        assert!(!gate.check("HTTPS://A.COM").is_allowed());
        assert_eq!(store.current().unwrap().referrers.len(), 3);
    }

    #[test]
    fn test_oversized_referrer_not_recorded() {
        let (gate, store) = gate_with(Some(record(false, &[])));
        let long = "x".repeat(65);
        let verdict = gate.check(&long);
        assert!(verdict.is_allowed());
        assert!(!verdict.recorded);
        assert!(store.current().unwrap().referrers.is_empty());

        store.set_whitelist_enabled(true);
        assert!(!gate.check(&long).is_allowed());
    }

    #[test]
    fn test_degraded_store_allows() {
        let (gate, store) = gate_with(Some(record(true, &[])));
        store.set_fail_reads(true);
        let verdict = gate.check("b.com");
        assert!(verdict.is_allowed());
        assert!(matches!(verdict.health, StoreHealth::Degraded(_)));
    }

    #[test]
    fn test_extract_referrer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_referrer(&headers), "unknown");

        headers.insert("referer", HeaderValue::from_static(""));
        assert_eq!(extract_referrer(&headers), "unknown");

        headers.insert("referrer", HeaderValue::from_static("https://alias.example/"));
        assert_eq!(extract_referrer(&headers), "https://alias.example/");

        headers.insert("referer", HeaderValue::from_static("https://Site.Example/Page"));
        assert_eq!(extract_referrer(&headers), "https://Site.Example/Page");
    }
}
