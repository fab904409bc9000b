// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Interactive console for the relay's referrer whitelist.
//!
//! Works directly on the whitelist record; the relay does not need to be
//! running except for the endpoint test action.

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use smtp_relay_gate::{
    console::{Console, HttpProbe, TerminalPrompter},
    store::{ConfigStore, FileStore, DEFAULT_CONFIG_PATH},
};

#[derive(Parser)]
#[command(name = "relay-whitelist", about = "Manage the SMTP relay referrer whitelist")]
struct Args {
    /// Whitelist record shared with the relay
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    /// Relay address offered by the endpoint test (default: http://localhost:$PORT)
    #[arg(long, env = "RELAY_SERVER_URL")]
    server_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let server_url = args.server_url.unwrap_or_else(|| {
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        format!("http://localhost:{port}")
    });
    debug!(config_path = %args.config_path.display(), "Starting whitelist console");

    let store: Arc<dyn ConfigStore> = Arc::new(FileStore::new(args.config_path));
    let prompter = TerminalPrompter::new(io::stdin().lock(), io::stdout());
    let mut console = Console::new(
        store,
        prompter,
        io::stdout(),
        Box::new(HttpProbe::new()?),
        server_url,
    );
    console.run()?;

    Ok(())
}
