// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Interactive whitelist console.
//!
//! A menu loop over an injected [`ConfigStore`]. Each action is a complete
//! read-modify-write round trip; nothing is carried between actions. Closing
//! the input ends the loop like choosing Exit.

use crate::error::{ConsoleError, ConsoleResult};
use crate::store::{ConfigStore, Snapshot, StoreHealth};
use colored::Colorize;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Payload offered by the endpoint test action.
pub const DEFAULT_TEST_PAYLOAD: &str = r#"{"from":"no-reply@example.com","to":"postmaster@example.com","subject":"Test POST endpoint (smtp-relay-gate)","body":"Hi this is a test {body}"}"#;

/// Referrer offered by the endpoint test action.
pub const DEFAULT_TEST_REFERRER: &str = "https://example.com";

/// Main menu entries, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    List,
    Manage,
    Toggle,
    Test,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::List,
        MenuAction::Manage,
        MenuAction::Toggle,
        MenuAction::Test,
        MenuAction::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::List => "List all referrers",
            Self::Manage => "Manage whitelist",
            Self::Toggle => "Toggle whitelist protection",
            Self::Test => "Test API endpoint with fake referrer",
            Self::Exit => "Exit",
        }
    }
}

/// Source of operator answers.
pub trait Prompter {
    /// Index of the chosen entry.
    fn select(&mut self, message: &str, choices: &[&str]) -> ConsoleResult<usize>;

    /// New checked state for each `(label, checked)` item.
    fn multi_select(&mut self, message: &str, items: &[(String, bool)]) -> ConsoleResult<Vec<bool>>;

    fn confirm(&mut self, message: &str, default: bool) -> ConsoleResult<bool>;

    fn input(&mut self, message: &str, default: &str) -> ConsoleResult<String>;

    /// Wait for the operator before returning to the menu.
    fn pause(&mut self) -> ConsoleResult<()>;
}

/// Line-oriented [`Prompter`] over any reader/writer pair.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> ConsoleResult<String> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ConsoleError::Closed);
        }
        Ok(line.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn select(&mut self, message: &str, choices: &[&str]) -> ConsoleResult<usize> {
        writeln!(self.output, "{}", message.bold())?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, choice)?;
        }

        loop {
            write!(self.output, "> ")?;
            let line = self.read_line()?;
            match line.trim().parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(
                    self.output,
                    "Please enter a number between 1 and {}",
                    choices.len()
                )?,
            }
        }
    }

    fn multi_select(&mut self, message: &str, items: &[(String, bool)]) -> ConsoleResult<Vec<bool>> {
        let mut checked: Vec<bool> = items.iter().map(|(_, c)| *c).collect();

        loop {
            writeln!(self.output, "{}", message.bold())?;
            for (i, ((label, _), on)) in items.iter().zip(&checked).enumerate() {
                let mark = if *on { "x" } else { " " };
                writeln!(self.output, "  {}) [{}] {}", i + 1, mark, label)?;
            }
            write!(self.output, "Numbers to toggle (e.g. 1,3), empty line to confirm: ")?;

            let line = self.read_line()?;
            if line.trim().is_empty() {
                return Ok(checked);
            }

            for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                match token.parse::<usize>() {
                    Ok(n) if (1..=checked.len()).contains(&n) => checked[n - 1] = !checked[n - 1],
                    _ => writeln!(self.output, "Ignoring invalid entry: {token}")?,
                }
            }
        }
    }

    fn confirm(&mut self, message: &str, default: bool) -> ConsoleResult<bool> {
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        loop {
            write!(self.output, "{message} {hint} ")?;
            let line = self.read_line()?;
            match line.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n")?,
            }
        }
    }

    fn input(&mut self, message: &str, default: &str) -> ConsoleResult<String> {
        write!(self.output, "{message} ({default}): ")?;
        let line = self.read_line()?;
        let line = line.trim();
        Ok(if line.is_empty() {
            default.to_string()
        } else {
            line.to_string()
        })
    }

    fn pause(&mut self) -> ConsoleResult<()> {
        write!(self.output, "Press Enter to continue...")?;
        self.read_line().map(|_| ())
    }
}

/// Reply from the relay to a test request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a test request to a running relay.
pub trait EndpointProbe {
    fn send(&self, server_url: &str, referrer: &str, payload: &Value) -> ConsoleResult<ProbeResponse>;
}

/// [`EndpointProbe`] over blocking HTTP.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new() -> ConsoleResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConsoleError::Probe(e.to_string()))?;
        Ok(Self { client })
    }
}

impl EndpointProbe for HttpProbe {
    fn send(&self, server_url: &str, referrer: &str, payload: &Value) -> ConsoleResult<ProbeResponse> {
        let url = send_email_url(server_url)?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::REFERER, referrer)
            .json(payload)
            .send()
            .map_err(|e| ConsoleError::Probe(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ConsoleError::Probe(e.to_string()))?;
        Ok(ProbeResponse { status, body })
    }
}

/// `<server>/send-email`, validated as an absolute URL.
pub fn send_email_url(server_url: &str) -> ConsoleResult<Url> {
    let joined = format!("{}/send-email", server_url.trim().trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| ConsoleError::Probe(format!("invalid server URL {server_url}: {e}")))
}

/// The whitelist console.
pub struct Console<P, W> {
    store: Arc<dyn ConfigStore>,
    prompter: P,
    out: W,
    probe: Box<dyn EndpointProbe>,
    default_server: String,
}

impl<P: Prompter, W: Write> Console<P, W> {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        prompter: P,
        out: W,
        probe: Box<dyn EndpointProbe>,
        default_server: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prompter,
            out,
            probe,
            default_server: default_server.into(),
        }
    }

    pub fn into_parts(self) -> (P, W) {
        (self.prompter, self.out)
    }

    /// Run the menu loop until Exit or end of input.
    pub fn run(&mut self) -> ConsoleResult<()> {
        let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();

        loop {
            self.print_status()?;
            let action = match self.prompter.select("What would you like to do?", &labels) {
                Ok(index) => MenuAction::ALL[index],
                Err(ConsoleError::Closed) => MenuAction::Exit,
                Err(err) => return Err(err),
            };

            match self.perform(action) {
                Ok(true) => continue,
                Ok(false) | Err(ConsoleError::Closed) => break,
                Err(err) => return Err(err),
            }
        }

        writeln!(self.out, "{}", "Goodbye!".blue())?;
        Ok(())
    }

    /// Carry out one menu action. Returns false for Exit.
    pub fn perform(&mut self, action: MenuAction) -> ConsoleResult<bool> {
        debug!(?action, "Console action");
        match action {
            MenuAction::List => self.list()?,
            MenuAction::Manage => self.manage()?,
            MenuAction::Toggle => self.toggle()?,
            MenuAction::Test => self.test_endpoint()?,
            MenuAction::Exit => return Ok(false),
        }
        Ok(true)
    }

    fn print_status(&mut self) -> ConsoleResult<()> {
        let banner = "=================================";
        writeln!(self.out, "\n{}", banner.blue().bold())?;
        writeln!(self.out, "{}", "  SMTP Relay Referrer Whitelist".blue().bold())?;
        writeln!(self.out, "{}\n", banner.blue().bold())?;

        let snapshot = self.store.read();
        self.report_health(&snapshot)?;
        let record = &snapshot.record;
        let status = if record.whitelist_enabled {
            "ENABLED".green()
        } else {
            "DISABLED".yellow()
        };
        writeln!(self.out, "Whitelist Protection: {status}")?;
        writeln!(self.out, "Total Referrers: {}", record.referrers.len())?;
        writeln!(self.out, "Whitelisted Referrers: {}\n", record.whitelisted_count())?;
        Ok(())
    }

    fn report_health(&mut self, snapshot: &Snapshot) -> ConsoleResult<()> {
        if let StoreHealth::Degraded(reason) = &snapshot.health {
            writeln!(
                self.out,
                "{} {}",
                "Storage unavailable, changes were not saved:".red(),
                reason
            )?;
        }
        Ok(())
    }

    fn no_referrers(&mut self) -> ConsoleResult<()> {
        writeln!(
            self.out,
            "{}",
            "No referrers found. The API has not received any requests yet.".yellow()
        )?;
        Ok(())
    }

    fn list(&mut self) -> ConsoleResult<()> {
        let snapshot = self.store.read();
        self.report_health(&snapshot)?;

        writeln!(self.out, "\n{}", "Referrer List:".blue().bold())?;
        if snapshot.record.referrers.is_empty() {
            self.no_referrers()?;
        } else {
            for (referrer, whitelisted) in &snapshot.record.referrers {
                let status = if *whitelisted {
                    "✓ Whitelisted".green()
                } else {
                    "✗ Not whitelisted".red()
                };
                writeln!(self.out, "{referrer} - {status}")?;
            }
        }
        writeln!(self.out)?;
        self.prompter.pause()
    }

    fn manage(&mut self) -> ConsoleResult<()> {
        let snapshot = self.store.read();
        self.report_health(&snapshot)?;

        let items: Vec<(String, bool)> = snapshot
            .record
            .referrers
            .iter()
            .map(|(referrer, whitelisted)| (referrer.clone(), *whitelisted))
            .collect();
        if items.is_empty() {
            writeln!(self.out)?;
            self.no_referrers()?;
            return self.prompter.pause();
        }

        let selection = self
            .prompter
            .multi_select("Select referrers to whitelist:", &items)?;

        let mut changed = 0;
        let mut failed = 0;
        for ((referrer, current), desired) in items.iter().zip(selection) {
            if *current == desired {
                continue;
            }
            let result = self.store.update_referrer_status(referrer, desired);
            if result.is_degraded() {
                self.report_health(&result)?;
                failed += 1;
            } else if result.changed {
                changed += 1;
            }
        }

        if failed > 0 {
            writeln!(
                self.out,
                "\n{}",
                format!("Whitelist partially updated: {changed} changed, {failed} failed").red()
            )?;
        } else {
            writeln!(
                self.out,
                "\n{} ({changed} changed)",
                "Whitelist updated successfully!".green()
            )?;
        }
        Ok(())
    }

    fn toggle(&mut self) -> ConsoleResult<()> {
        let snapshot = self.store.read();
        self.report_health(&snapshot)?;
        let current = snapshot.record.whitelist_enabled;

        let message = format!(
            "Whitelist protection is currently {}. Do you want to {} it?",
            if current { "ENABLED" } else { "DISABLED" },
            if current { "disable" } else { "enable" },
        );
        if !self.prompter.confirm(&message, false)? {
            return Ok(());
        }

        let result = self.store.set_whitelist_enabled(!current);
        if result.is_degraded() {
            return self.report_health(&result);
        }
        writeln!(
            self.out,
            "\n{}",
            format!(
                "Whitelist protection {} successfully!",
                if current { "disabled" } else { "enabled" }
            )
            .green()
        )?;
        Ok(())
    }

    fn test_endpoint(&mut self) -> ConsoleResult<()> {
        writeln!(self.out, "\n{}", "Test API Endpoint".blue().bold())?;

        let default_server = self.default_server.clone();
        let server = self.prompter.input("Enter the server URL:", &default_server)?;
        let referrer = self
            .prompter
            .input("Enter a fake referrer URL:", DEFAULT_TEST_REFERRER)?;
        let payload = loop {
            let raw = self
                .prompter
                .input("Enter test data (JSON format):", DEFAULT_TEST_PAYLOAD)?;
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => break value,
                Err(_) => writeln!(self.out, "{}", "Please enter valid JSON".red())?,
            }
        };

        writeln!(self.out, "{} {}/send-email", "Sending request to:".yellow(), server.trim_end_matches('/'))?;
        writeln!(self.out, "{} {}", "With referrer:".yellow(), referrer)?;
        writeln!(self.out, "{} {}", "With data:".yellow(), payload)?;

        match self.probe.send(&server, &referrer, &payload) {
            Ok(response) => {
                let body = serde_json::from_str::<Value>(&response.body)
                    .ok()
                    .and_then(|v| serde_json::to_string_pretty(&v).ok())
                    .unwrap_or(response.body);
                if (200..300).contains(&response.status) {
                    writeln!(self.out, "\n{}", "Request successful!".green())?;
                } else {
                    writeln!(
                        self.out,
                        "\n{}",
                        format!("Request failed! (HTTP {})", response.status).red()
                    )?;
                }
                writeln!(self.out, "Response: {body}")?;
            }
            Err(ConsoleError::Probe(reason)) => {
                writeln!(self.out, "\n{}", "Error sending request:".red())?;
                writeln!(self.out, "{}", reason.red())?;
            }
            Err(err) => return Err(err),
        }

        self.prompter.pause()
    }
}
