// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the relay service.
//!
//! Every route sits behind the referrer gate, including `/health`.

use crate::config::Config;
use crate::gate::{referrer_gate, ReferrerGate};
use crate::mailer::Mailer;
use crate::metrics::RelayMetrics;
use crate::template;
use crate::validator::SendRequestValidator;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared application state.
pub struct AppState {
    pub gate: ReferrerGate,
    pub mailer: Arc<dyn Mailer>,
    pub validator: SendRequestValidator,
    pub metrics: RelayMetrics,
    pub config: Config,
}

/// Failure body shared by every route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Successful send.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message_id: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Build the application router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/send-email", post(send_email))
        .route("/health", get(health));
    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(middleware::from_fn_with_state(state.clone(), referrer_gate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Relay a message through the configured SMTP server.
///
/// Fields missing from the JSON body fall back to the configured defaults.
/// The body is a template: `{field}` takes a request field and `{body}` the
/// whole request as JSON.
pub async fn send_email(State(state): State<Arc<AppState>>, raw: Bytes) -> Response {
    let params = match state.validator.parse_body(&raw) {
        Ok(params) => params,
        Err(err) => return bad_request(err.to_string()),
    };

    let mut email = match state.validator.resolve(&params) {
        Ok(email) => email,
        Err(err) => return bad_request(err.to_string()),
    };

    debug!(
        from = %email.from,
        recipients = email.to.len(),
        subject = %email.subject,
        "Processing email send request"
    );
    email.body = template::render(&email.body, &params);

    match state.mailer.send(&email).await {
        Ok(message_id) => {
            info!(message_id = %message_id, "Email relayed");
            state.metrics.record_mail("sent");
            (
                StatusCode::OK,
                Json(SendResponse {
                    success: true,
                    message_id,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "Email sending failed");
            state.metrics.record_mail("failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(err.to_string())),
            )
                .into_response()
        }
    }
}

fn bad_request(error: String) -> Response {
    debug!(error = %error, "Rejected send request");
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error))).into_response()
}
