use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::notifier::Notifier;

pub async fn subscribe(
    ws: WebSocketUpgrade,
    Extension(notifier): Extension<Notifier>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay(socket, notifier, id))
}

async fn relay(socket: WebSocket, notifier: Notifier, room: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = notifier.subscribe(room);

    tracing::info!(room = %room, "room subscriber connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize event");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // inbound frames are ignored, reading only detects the close
    let mut recv_task = tokio::spawn(async move { while let Some(Ok(_)) = receiver.next().await {} });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    // the event stream is gone with send_task
    notifier.release(room);

    tracing::info!(room = %room, "room subscriber disconnected");
}
