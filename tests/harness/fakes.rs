// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test doubles for the mail transport and the endpoint probe.

use async_trait::async_trait;
use serde_json::Value;
use smtp_relay_gate::{
    console::{EndpointProbe, ProbeResponse},
    error::{ConsoleError, ConsoleResult, MailError, MailResult},
    mailer::{Mailer, OutgoingEmail},
};
use std::sync::Mutex;

/// Records every message instead of sending it.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails as if no SMTP host were configured.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &OutgoingEmail) -> MailResult<String> {
        if self.fail {
            return Err(MailError::MissingHost);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("<fake-{}@example.com>", sent.len()))
    }
}

/// A probe that answers with a canned response and remembers its requests.
pub struct FakeProbe {
    pub response: Result<ProbeResponse, String>,
    pub calls: std::sync::Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl FakeProbe {
    pub fn replying(status: u16, body: &str) -> Self {
        Self {
            response: Ok(ProbeResponse {
                status,
                body: body.to_string(),
            }),
            calls: Default::default(),
        }
    }

    pub fn unreachable(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: Default::default(),
        }
    }
}

impl EndpointProbe for FakeProbe {
    fn send(&self, server_url: &str, referrer: &str, payload: &Value) -> ConsoleResult<ProbeResponse> {
        self.calls.lock().unwrap().push((
            server_url.to_string(),
            referrer.to_string(),
            payload.clone(),
        ));
        self.response.clone().map_err(ConsoleError::Probe)
    }
}
