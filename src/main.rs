// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SMTP Relay Gate Service
//!
//! Relays `POST /send-email` requests through an SMTP server, admitting only
//! whitelisted referrers once whitelist protection is switched on.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file is read
//! first when present):
//!
//! - `PORT` / `BIND_ADDR`: Server bind address (default: 0.0.0.0:3000)
//! - `CONFIG_PATH`: Whitelist record (default: data/config.json)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_SECURE`, `SMTP_USER`, `SMTP_PASS`
//! - `DEFAULT_FROM`, `DEFAULT_TO`: Fallback sender and recipient
//! - `MAX_REFERRER_LEN`: Longest referrer recorded (default: 2048)
//! - `METRICS_ENABLED`: Expose `/metrics` (default: true)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smtp_relay_gate::{
    config::Config,
    gate::ReferrerGate,
    handlers::{router, AppState},
    mailer::SmtpMailer,
    metrics::RelayMetrics,
    store::{ConfigStore, FileStore},
    validator::SendRequestValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        config_path = %config.config_path.display(),
        smtp_host = config.smtp.host.as_deref().unwrap_or("not configured"),
        smtp_port = config.smtp.port,
        smtp_secure = config.smtp.secure,
        smtp_auth = config.smtp.credentials().is_some(),
        "Starting SMTP relay gate"
    );

    let store: Arc<dyn ConfigStore> = Arc::new(FileStore::new(config.config_path.clone()));
    let state = Arc::new(AppState {
        gate: ReferrerGate::new(store, config.gate.max_referrer_len),
        mailer: Arc::new(SmtpMailer::new(config.smtp.clone())),
        validator: SendRequestValidator::new(config.defaults.clone())?,
        metrics: RelayMetrics::new()?,
        config: config.clone(),
    });

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
