//! events service for relayed SOS reports

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: u64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

const RESERVED_KEYS: [&str; 2] = ["id", "createdAt"];

/// In-memory event log shared by the handlers.
#[derive(Clone, Default)]
pub struct EventStore {
    events: Arc<RwLock<Vec<StoredEvent>>>,
    next_id: Arc<AtomicU64>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Stored events, oldest first.
    pub async fn events(&self) -> Vec<StoredEvent> {
        self.events.read().await.clone()
    }

    /// Stores `fields` under a fresh id. Keys the store assigns itself are
    /// dropped from the body.
    async fn insert(&self, mut fields: Map<String, Value>) -> StoredEvent {
        for key in RESERVED_KEYS {
            if let Some(value) = fields.remove(key) {
                warn!("Dropped client-supplied {:?} = {}", key, value);
            }
        }
        let event = StoredEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            fields,
        };
        self.events.write().await.push(event.clone());
        event
    }
}

pub fn router(store: EventStore) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/events", get(list_events).post(create_event))
        .with_state(store)
}

pub async fn serve(listener: TcpListener, store: EventStore) -> std::io::Result<()> {
    info!("Gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router(store)).await
}

pub async fn create_event(
    State(store): State<EventStore>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Value::Object(fields) = body else {
        warn!("Rejected non-object event body");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "event must be a JSON object" })),
        );
    };
    let event = store.insert(fields).await;
    info!(
        "Stored event {}: msg_id {} status {}",
        event.id,
        event.fields.get("msg_id").unwrap_or(&Value::Null),
        event.fields.get("status_str").unwrap_or(&Value::Null)
    );
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "event": event })),
    )
}

pub async fn list_events(State(store): State<EventStore>) -> Json<Vec<StoredEvent>> {
    let mut events = store.events().await;
    events.reverse();
    Json(events)
}

async fn root_handler(State(store): State<EventStore>) -> Html<String> {
    let count = store.len().await;
    let html = format!(r#"
        <html>
        <head>
            <title>SOS Relay Gateway</title>
            <style>
                body {{
                    font-family: monospace; background: #0a0a0a; color: #00ff00; padding: 20px;
                }}
                pre {{ font-size: 14px; line-height: 1.6; }}
                .header {{ color: #ff3300; font-weight: bold; }}
                .metric {{ color: #00ff00; }}
                .dim {{ color: #666; }}
            </style>
        </head>
        <body>
        <pre class="header">SOS Relay Gateway</pre>
        <pre>
<span class="dim">Stored Events:</span> <span class="metric">{count}</span>

<span class="dim">Events Endpoint:</span> <span class="metric">/api/events</span>
        </pre>
        </body>
        </html>
        "#);
    Html(html)
}
