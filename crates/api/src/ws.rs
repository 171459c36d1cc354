use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Query;
use axum::response::Response;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use payrail_core::cache::events::EVENTS_CHANNEL;
use payrail_primitives::models::dtos::envelope::EventEnvelope;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Live WebSocket sessions on THIS gateway instance, keyed by user id. The
/// event bridge consults it to decide whether a broadcast envelope is ours
/// to deliver; other instances own their own registries.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<String>>>>,
}

impl SessionRegistry {
    pub async fn register(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();

        self.sessions
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id, tx);

        (session_id, rx)
    }

    pub async fn unregister(&self, user_id: &str, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(user_sessions) = sessions.get_mut(user_id) {
            user_sessions.remove(&session_id);
            if user_sessions.is_empty() {
                sessions.remove(user_id);
            }
        }
    }

    /// Delivers a payload to every live session of `user_id`; returns how
    /// many sessions it reached. Zero means the user is connected elsewhere
    /// (or not at all) and the payload is dropped here.
    pub async fn emit(&self, user_id: &str, payload: &str) -> usize {
        let sessions = self.sessions.read().await;
        let Some(user_sessions) = sessions.get(user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for sender in user_sessions.values() {
            if sender.send(payload.to_string()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .map(|user_sessions| user_sessions.len())
            .sum()
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    Extension(sessions): Extension<Arc<SessionRegistry>>,
) -> Response {
    ws.on_upgrade(move |socket| websocket_connection(socket, sessions, params.user_id))
}

async fn websocket_connection(socket: WebSocket, sessions: Arc<SessionRegistry>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (session_id, mut rx) = sessions.register(&user_id).await;

    debug!(user_id = %user_id, session_id = %session_id, "WebSocket session opened");

    let forward_task = async {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    };

    // the subscription is receive-only; inbound frames only matter for close
    let drain_task = async {
        while let Some(Ok(frame)) = receiver.next().await {
            if let Message::Close(_) = frame {
                break;
            }
        }
    };

    tokio::select! {
        _ = forward_task => {},
        _ = drain_task => {},
    }

    sessions.unregister(&user_id, session_id).await;
    debug!(user_id = %user_id, session_id = %session_id, "WebSocket session closed");
}

/// Subscribes to the event channel and relays envelopes to local sessions,
/// reconnecting with a fixed pause when the subscription drops. Runs for the
/// life of the gateway.
pub async fn run_event_bridge(client: redis::Client, sessions: Arc<SessionRegistry>) {
    loop {
        match subscribe_and_relay(&client, &sessions).await {
            Ok(()) => info!("Event bridge subscription ended, resubscribing"),
            Err(e) => warn!(error = %e, "Event bridge subscription failed, resubscribing"),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn subscribe_and_relay(
    client: &redis::Client,
    sessions: &Arc<SessionRegistry>,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(EVENTS_CHANNEL).await?;
    info!(channel = EVENTS_CHANNEL, "Event bridge subscribed");

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: String = message.get_payload()?;

        let envelope: EventEnvelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Dropping malformed event envelope");
                continue;
            }
        };

        let frame = json!({
            "event": envelope.event,
            "data": envelope.data,
        })
        .to_string();

        let delivered = sessions.emit(&envelope.user_id, &frame).await;
        // zero deliveries: the user's session lives on another instance
        debug!(
            user_id = %envelope.user_id,
            event = %envelope.event,
            delivered,
            "Relayed status event"
        );
    }

    Ok(())
}
