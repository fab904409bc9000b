// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for gate decisions and relayed mail.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters owned by the application state.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    gate_decisions: IntCounterVec,
    referrers_recorded: IntCounter,
    mail: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let gate_decisions = IntCounterVec::new(
            Opts::new("relay_gate_decisions_total", "Referrer gate decisions"),
            &["outcome"],
        )?;
        let referrers_recorded = IntCounter::new(
            "relay_referrers_recorded_total",
            "Requests seen by the referrer gate",
        )?;
        let mail = IntCounterVec::new(
            Opts::new("relay_mail_total", "Send attempts by result"),
            &["result"],
        )?;

        registry.register(Box::new(gate_decisions.clone()))?;
        registry.register(Box::new(referrers_recorded.clone()))?;
        registry.register(Box::new(mail.clone()))?;

        Ok(Self {
            registry,
            gate_decisions,
            referrers_recorded,
            mail,
        })
    }

    pub fn record_gate(&self, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.gate_decisions.with_label_values(&[outcome]).inc();
    }

    pub fn record_new_referrer(&self) {
        self.referrers_recorded.inc();
    }

    pub fn record_mail(&self, result: &str) {
        self.mail.with_label_values(&[result]).inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
