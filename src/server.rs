//! HTTP surface — Twilio WhatsApp webhook and a liveness probe.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::channels::whatsapp::{InboundMessage, parse_sender, twiml_message};
use crate::registration::RegistrationEngine;
use crate::registration::messages::INTERNAL_ERROR;
use crate::users::Channel;

#[derive(Clone)]
struct AppState {
    engine: Arc<RegistrationEngine>,
}

/// Build the router for the webhook server.
pub fn registrar_routes(engine: Arc<RegistrationEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/webhook/whatsapp", post(whatsapp_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "event-registrar"
    }))
}

// ── WhatsApp ────────────────────────────────────────────────────────────

/// Twilio posts each inbound WhatsApp message here and expects TwiML back.
async fn whatsapp_webhook(
    State(state): State<AppState>,
    Form(inbound): Form<InboundMessage>,
) -> Response {
    let sender = parse_sender(&inbound.from);
    if sender.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing From").into_response();
    }

    let text = match state
        .engine
        .handle(Channel::WhatsApp, sender, &inbound.body)
        .await
    {
        Ok(reply) => reply.text,
        Err(e) => {
            tracing::error!(sender, "Failed to handle WhatsApp message: {e}");
            INTERNAL_ERROR.to_string()
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_message(&text),
    )
        .into_response()
}
