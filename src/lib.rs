// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SMTP Relay Gate
//!
//! An HTTP to SMTP relay guarded by a referrer whitelist:
//!
//! - Every request's `Referer` is recorded in a durable JSON record
//! - When whitelist protection is on, only whitelisted referrers pass
//! - `POST /send-email` relays a templated message through SMTP
//! - An interactive console lists, approves and revokes referrers

pub mod config;
pub mod console;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod mailer;
pub mod metrics;
pub mod store;
pub mod template;
pub mod validator;

pub use config::Config;
pub use gate::{GateDecision, ReferrerGate, Verdict};
pub use store::{ConfigRecord, ConfigStore, FileStore, MemoryStore, Snapshot, StoreHealth};
