//! Webhook endpoint handlers.
//!
//! The SNS handler is stateless per request. It either completes the
//! subscription handshake or unwraps a notification and forwards it, and it
//! always answers with exactly one status/body pair.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::forwarder::Forwarder;
use crate::web::envelope::{unwrap_payload, MessageKind, RawEnvelope};
use crate::web::subscription::SubscriptionClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub subscriptions: Arc<dyn SubscriptionClient>,
}

impl AppState {
    pub fn new(forwarder: Forwarder, subscriptions: Arc<dyn SubscriptionClient>) -> Self {
        Self {
            forwarder,
            subscriptions,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check endpoint. Does not touch the queue, SNS or the sink.
pub async fn health() -> Json<&'static str> {
    Json("OK")
}

// =============================================================================
// SNS Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

type WebhookReply = (StatusCode, Json<WebhookResponse>);

fn reply(code: StatusCode, status: &'static str) -> WebhookReply {
    (code, Json(WebhookResponse { status }))
}

/// SNS webhook endpoint.
///
/// The body is taken as raw bytes because SNS posts JSON with a
/// `text/plain` content type.
///
/// Responses:
/// - 200 for confirmed subscriptions and for every notification, including
///   ones that could not be unwrapped or forwarded
/// - 400 for malformed envelopes, unknown types and confirmations without a
///   token
/// - 500 when the confirmation call fails
pub async fn sns_webhook(State(state): State<AppState>, body: Bytes) -> WebhookReply {
    let envelope: RawEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "sns_envelope_malformed");
            return reply(StatusCode::BAD_REQUEST, "bad_request");
        }
    };

    info!(
        message_type = %envelope.message_type,
        message_id = %envelope.message_id(),
        topic_arn = %envelope.topic_arn,
        "sns_webhook_received"
    );

    match envelope.kind() {
        MessageKind::SubscriptionConfirmation => confirm_subscription(&state, &envelope).await,
        MessageKind::Notification => {
            relay_notification(&state, &envelope).await;
            reply(StatusCode::OK, "received")
        }
        MessageKind::Other(message_type) => {
            warn!(
                message_type = %message_type,
                message_id = %envelope.message_id(),
                "sns_unknown_message_type"
            );
            reply(StatusCode::BAD_REQUEST, "unknown_message_type")
        }
    }
}

async fn confirm_subscription(state: &AppState, envelope: &RawEnvelope) -> WebhookReply {
    if envelope.token.is_empty() {
        warn!(
            topic_arn = %envelope.topic_arn,
            message_id = %envelope.message_id(),
            "sns_confirmation_missing_token"
        );
        return reply(StatusCode::BAD_REQUEST, "missing_token");
    }

    match state
        .subscriptions
        .confirm(&envelope.topic_arn, &envelope.token)
        .await
    {
        Ok(subscription_arn) => {
            info!(
                topic_arn = %envelope.topic_arn,
                subscription_arn = ?subscription_arn,
                "sns_subscription_confirmed"
            );
            reply(StatusCode::OK, "confirmed")
        }
        Err(e) => {
            error!(
                topic_arn = %envelope.topic_arn,
                error = %e,
                "sns_subscription_confirm_failed"
            );
            reply(StatusCode::INTERNAL_SERVER_ERROR, "error")
        }
    }
}

/// Unwrap and forward a notification payload.
///
/// SNS does not redeliver once it received a 2xx, so failures here are
/// logged at error level and the message is lost.
async fn relay_notification(state: &AppState, envelope: &RawEnvelope) {
    let message_id = envelope.message_id();
    let topic_arn = &envelope.topic_arn;

    let payload = match unwrap_payload(envelope.message.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            error!(
                message_id = %message_id,
                topic_arn = %topic_arn,
                error = %e,
                "sns_notification_dropped"
            );
            return;
        }
    };

    match state.forwarder.forward(&payload).await {
        Ok(()) => info!(
            message_id = %message_id,
            topic_arn = %topic_arn,
            field_count = payload.len(),
            "sns_notification_forwarded"
        ),
        Err(e) => error!(
            message_id = %message_id,
            topic_arn = %topic_arn,
            error = %e,
            "sns_notification_forward_failed"
        ),
    }
}
