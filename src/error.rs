// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the relay gate.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the durable configuration record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration record in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize configuration record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures while building or sending a message.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP host is not configured")]
    MissingHost,

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Failures of the interactive console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input closed")]
    Closed,

    #[error("Request failed: {0}")]
    Probe(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type MailResult<T> = std::result::Result<T, MailError>;
pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
