//! Web server module for the SNS push path.
//!
//! This module provides:
//! - `POST /sns-webhook`: subscription handshake and notification relay
//! - `GET /health`: liveness probe with no dependencies

pub mod envelope;
pub mod handlers;
pub mod subscription;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use envelope::{unwrap_payload, MessageKind, RawEnvelope, UnwrapError};
pub use handlers::{health, sns_webhook, AppState, WebhookResponse};
pub use subscription::{
    bootstrap_subscription, SnsSubscriptions, SubscriptionClient, SubscriptionError,
};

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sns-webhook", post(sns_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::subscription::testing::RecordingSubscriptions;
    use super::*;
    use crate::forwarder::Forwarder;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOPIC: &str = "arn:aws:sns:us-east-1:000000000000:events";

    struct Harness {
        sink: MockServer,
        subscriptions: Arc<RecordingSubscriptions>,
        app: Router,
    }

    async fn harness(subscriptions: RecordingSubscriptions) -> Harness {
        let sink = MockServer::start().await;
        let subscriptions = Arc::new(subscriptions);
        let forwarder = Forwarder::new(
            Url::parse(&format!("{}/notify", sink.uri())).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap();
        let app = router(AppState::new(forwarder, subscriptions.clone()));

        Harness {
            sink,
            subscriptions,
            app,
        }
    }

    async fn post_webhook(app: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/sns-webhook")
            .header("content-type", "text/plain; charset=UTF-8")
            .body(body.into())
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn sink_requests(sink: &MockServer) -> usize {
        sink.received_requests().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_health_has_no_dependencies() {
        let h = harness(RecordingSubscriptions::failing()).await;

        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\"OK\"");
        assert_eq!(sink_requests(&h.sink).await, 0);
    }

    #[tokio::test]
    async fn test_confirmation_calls_confirm_once_and_never_forwards() {
        let h = harness(RecordingSubscriptions::default()).await;
        let body = json!({
            "Type": "SubscriptionConfirmation",
            "Token": "token-123",
            "TopicArn": TOPIC,
            "Message": "{\"a\":1}"
        });

        let (status, reply) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"status": "confirmed"}));
        assert_eq!(
            h.subscriptions.confirmed(),
            vec![(TOPIC.to_string(), "token-123".to_string())]
        );
        assert_eq!(sink_requests(&h.sink).await, 0);
    }

    #[tokio::test]
    async fn test_confirmation_failure_is_server_error() {
        let h = harness(RecordingSubscriptions::failing()).await;
        let body = json!({"Type": "SubscriptionConfirmation", "Token": "t", "TopicArn": TOPIC});

        let (status, reply) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply, json!({"status": "error"}));
        assert_eq!(h.subscriptions.confirmed().len(), 1);
        assert_eq!(sink_requests(&h.sink).await, 0);
    }

    #[tokio::test]
    async fn test_confirmation_without_token_is_rejected() {
        let h = harness(RecordingSubscriptions::default()).await;
        let body = json!({"Type": "SubscriptionConfirmation", "TopicArn": TOPIC});

        let (status, _) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.subscriptions.confirmed().is_empty());
    }

    #[tokio::test]
    async fn test_notification_string_payload_is_unwrapped_and_forwarded() {
        let h = harness(RecordingSubscriptions::default()).await;
        Mock::given(method("POST"))
            .and(body_json(json!({"a": 1})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&h.sink)
            .await;

        let body = json!({"Type": "Notification", "TopicArn": TOPIC, "Message": "{\"a\":1}"});
        let (status, reply) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"status": "received"}));
        assert!(h.subscriptions.confirmed().is_empty());
    }

    #[tokio::test]
    async fn test_notification_doubly_quoted_payload() {
        let h = harness(RecordingSubscriptions::default()).await;
        Mock::given(method("POST"))
            .and(body_json(json!({"a": 1})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&h.sink)
            .await;

        let body = r#"{"Type":"Notification","TopicArn":"t","Message":"\"{\\\"a\\\":1}\""}"#;
        let (status, _) = post_webhook(&h.app, body).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_notification_object_payload() {
        let h = harness(RecordingSubscriptions::default()).await;
        Mock::given(method("POST"))
            .and(body_json(json!({"username": "ana", "trx_id": "t-1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&h.sink)
            .await;

        let body = json!({
            "Type": "Notification",
            "Message": {"username": "ana", "trx_id": "t-1"}
        });
        let (status, _) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_notification_unwrap_failure_still_succeeds() {
        let h = harness(RecordingSubscriptions::default()).await;

        let body = json!({"Type": "Notification", "Message": "plain text"});
        let (status, _) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(sink_requests(&h.sink).await, 0);
    }

    #[tokio::test]
    async fn test_notification_sink_failure_still_succeeds() {
        let h = harness(RecordingSubscriptions::default()).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&h.sink)
            .await;

        let body = json!({"Type": "Notification", "Message": "{\"a\":1}"});
        let (status, _) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_type_is_client_error() {
        let h = harness(RecordingSubscriptions::default()).await;

        let body = json!({"Type": "Foo", "Token": "t", "Message": "{\"a\":1}"});
        let (status, reply) = post_webhook(&h.app, body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({"status": "unknown_message_type"}));
        assert!(h.subscriptions.confirmed().is_empty());
        assert_eq!(sink_requests(&h.sink).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_client_error() {
        let h = harness(RecordingSubscriptions::default()).await;

        let (status, reply) = post_webhook(&h.app, "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({"status": "bad_request"}));
        assert!(h.subscriptions.confirmed().is_empty());
        assert_eq!(sink_requests(&h.sink).await, 0);
    }
}
