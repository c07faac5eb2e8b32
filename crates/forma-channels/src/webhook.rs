//! Webhook channel: inbound platform events over HTTP, outbound sends via
//! the platform's send endpoint.
//!
//! The ingress contract is deliberately thin: the platform POSTs
//! `{durable_id, alias?, text?, attachments?, timestamp?}` and gets back
//! 202 when the event is queued, 422 when it cannot be attributed to any
//! identity, 401 on bad auth.

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use forma_core::{
    config::WebhookConfig,
    error::FormaError,
    event::{Attachment, AttachmentKind, InboundEvent},
    traits::{Channel, EventSink},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Webhook ingress/egress channel.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
    server: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Shared state for the axum handlers.
#[derive(Clone)]
struct WebhookState {
    sink: Arc<dyn EventSink>,
    api_key: Option<String>,
}

/// Inbound webhook request body.
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(default)]
    durable_id: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<WebhookAttachment>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WebhookAttachment {
    kind: AttachmentKind,
    #[serde(default)]
    url: Option<String>,
    /// Inline payload, base64.
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Outbound send request body.
#[derive(Serialize)]
struct SendRequest<'a> {
    durable_id: &'a str,
    text: &'a str,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.send_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            server: Mutex::new(None),
        }
    }
}

/// Constant-time string comparison to prevent timing attacks on token checks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<(StatusCode, Json<Value>)> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured — allow all.
    };

    let value = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// Convert the wire shape into the internal event.
fn into_event(body: WebhookEvent) -> InboundEvent {
    let attachments = body
        .attachments
        .into_iter()
        .map(|a| Attachment {
            kind: a.kind,
            url: a.url,
            data: a
                .data
                .as_deref()
                .and_then(|d| BASE64.decode(d).ok()),
            filename: a.filename,
            mime_type: a.mime_type,
        })
        .collect();

    InboundEvent {
        id: Uuid::new_v4(),
        durable_id: body.durable_id.unwrap_or_default(),
        alias: body.alias.filter(|a| !a.is_empty()),
        text: body.text.unwrap_or_default(),
        attachments,
        timestamp: body.timestamp.unwrap_or_else(Utc::now),
    }
}

/// `GET /health` — liveness probe.
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `POST /webhook/event` — inbound platform event.
async fn webhook_event(
    headers: HeaderMap,
    State(state): State<WebhookState>,
    Json(body): Json<WebhookEvent>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let event = into_event(body);
    if event.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "event has no text and no attachments"})),
        ));
    }

    match state.sink.accept(event).await {
        Ok(()) => Ok((StatusCode::ACCEPTED, Json(json!({"status": "queued"})))),
        Err(FormaError::Identity(reason)) => {
            warn!("rejected unattributable event: {reason}");
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": reason})),
            ))
        }
        Err(e) => {
            error!("event intake failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            ))
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn start(&self, sink: Arc<dyn EventSink>) -> Result<(), FormaError> {
        let state = WebhookState {
            sink,
            api_key: if self.config.api_key.is_empty() {
                None
            } else {
                Some(self.config.api_key.clone())
            },
        };

        let app = Router::new()
            .route("/health", get(health))
            .route("/webhook/event", post(webhook_event))
            .layer(axum::extract::DefaultBodyLimit::max(32 * 1024 * 1024))
            .with_state(state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| FormaError::Channel(format!("failed to bind {addr}: {e}")))?;

        info!("webhook channel listening on {addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("webhook server stopped: {e}");
            }
        });

        *self.server.lock().await = Some(handle);
        Ok(())
    }

    async fn send(&self, durable_id: &str, text: &str) -> Result<(), FormaError> {
        if self.config.send_url.is_empty() {
            return Err(FormaError::Channel(
                "no send_url configured for webhook channel".to_string(),
            ));
        }

        let body = SendRequest { durable_id, text };
        let mut request = self.client.post(&self.config.send_url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FormaError::Channel(format!("send request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FormaError::Channel(format!(
                "send returned {status}: {body}"
            )));
        }

        Ok(())
    }

    async fn stop(&self) -> Result<(), FormaError> {
        if let Some(handle) = self.server.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secrets"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_check_auth_no_key_allows_all() {
        let headers = HeaderMap::new();
        assert!(check_auth(&headers, &None).is_none());
    }

    #[test]
    fn test_check_auth_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(check_auth(&headers, &Some("k".into())).is_some());
    }

    #[test]
    fn test_check_auth_accepts_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer k".parse().unwrap());
        assert!(check_auth(&headers, &Some("k".into())).is_none());
    }

    #[test]
    fn test_into_event_decodes_attachments() {
        let body: WebhookEvent = serde_json::from_str(
            r#"{
                "durable_id": "42",
                "alias": "lifter_joe",
                "text": "check this",
                "attachments": [
                    {"kind": "video", "data": "aGVsbG8=", "mime_type": "video/mp4"}
                ]
            }"#,
        )
        .unwrap();
        let event = into_event(body);
        assert_eq!(event.durable_id, "42");
        assert_eq!(event.alias.as_deref(), Some("lifter_joe"));
        assert_eq!(event.attachments.len(), 1);
        assert_eq!(event.attachments[0].kind, AttachmentKind::Video);
        assert_eq!(event.attachments[0].data.as_deref(), Some(b"hello".as_ref()));
    }

    #[test]
    fn test_into_event_empty_alias_dropped() {
        let body: WebhookEvent =
            serde_json::from_str(r#"{"durable_id": "42", "alias": "", "text": "hi"}"#).unwrap();
        let event = into_event(body);
        assert!(event.alias.is_none());
    }

    #[test]
    fn test_empty_event_detected() {
        let body: WebhookEvent = serde_json::from_str(r#"{"durable_id": "42"}"#).unwrap();
        assert!(into_event(body).is_empty());
    }
}
