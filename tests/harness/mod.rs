// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod fakes;

use smtp_relay_gate::{
    config::Config,
    gate::ReferrerGate,
    handlers::{router, AppState},
    metrics::RelayMetrics,
    store::{ConfigRecord, ConfigStore},
    validator::SendRequestValidator,
};
use std::sync::Arc;

use fakes::FakeMailer;

/// Build a record from `(referrer, whitelisted)` pairs.
pub fn record(enabled: bool, referrers: &[(&str, bool)]) -> ConfigRecord {
    ConfigRecord {
        whitelist_enabled: enabled,
        referrers: referrers
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
    }
}

/// Router wired to the given store and mailer, with default configuration.
pub fn app(store: Arc<dyn ConfigStore>, mailer: Arc<FakeMailer>) -> axum::Router {
    let config = Config::default();
    let state = Arc::new(AppState {
        gate: ReferrerGate::new(store, config.gate.max_referrer_len),
        mailer,
        validator: SendRequestValidator::new(config.defaults.clone()).unwrap(),
        metrics: RelayMetrics::new().unwrap(),
        config,
    });
    router(state)
}
