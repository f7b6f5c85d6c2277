use std::fmt::Display;
use std::time::Duration;

use archytex_core::error::CoreError;
use archytex_core::types::UserId;
use archytex_core::updates::Updates;
use archytex_events::{deliver, DeliveryOutcome, Subscription};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitStream;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::{PollSendError, PollSender};

use crate::middleware::auth::{resolve_session, AuthUser};
use crate::state::AppState;
use crate::ws::manager::{Registration, WsSender};

/// How long an unauthenticated socket may take to send its session token.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long queued frames may take to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long one frame may take to reach the socket before the client is
/// treated as gone.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure writing an update to a connection's outbound queue.
#[derive(Debug, thiserror::Error)]
pub enum WsSendError {
    #[error("failed to encode updates: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection writer has stopped")]
    Closed,
}

impl From<PollSendError<Message>> for WsSendError {
    fn from(_: PollSendError<Message>) -> Self {
        Self::Closed
    }
}

/// GET /api/ws -- upgrade, then expect the session token as the first
/// frame, JSON-encoded as a string.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, None))
}

/// GET /api/auth/ws -- session token in the `Authorization` header; rejected
/// with 401 before the upgrade.
pub async fn auth_ws_handler(
    user: AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Some(user.user_id)))
}

/// Encode one snapshot as a text frame.
pub fn encode_updates(updates: &Updates) -> Result<Message, WsSendError> {
    let json = serde_json::to_string(updates)?;
    Ok(Message::Text(json.into()))
}

/// Sink of [`Updates`] feeding a connection's outbound frame queue. Waits
/// while the queue is full; fails once the writer task is gone.
pub fn updates_sink(sender: WsSender) -> impl Sink<Updates, Error = WsSendError> {
    PollSender::new(sender).with(|updates: Updates| future::ready(encode_updates(&updates)))
}

/// Decode the handshake frame: a JSON string holding the session token.
pub fn parse_session_frame(text: &str) -> Result<String, CoreError> {
    let token: String = serde_json::from_str(text)
        .map_err(|e| CoreError::Validation(format!("Session frame must be a JSON string: {e}")))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(CoreError::Validation("Session token is empty".into()));
    }
    Ok(token.to_string())
}

/// Manage a single WebSocket connection after upgrade.
///
/// Identifies the user, registers the connection with `WsManager`, then
/// runs the delivery loop while reading inbound frames. Outbound frames go
/// through one writer task owning the socket sink.
async fn handle_socket(socket: WebSocket, state: AppState, user: Option<UserId>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();

    let user_id = match user {
        Some(user_id) => user_id,
        None => match handshake(&mut stream, &state).await {
            Ok(user_id) => user_id,
            Err(rejection) => {
                tracing::debug!(conn_id = %conn_id, reason = rejection.reason, "WebSocket handshake rejected");
                let _ = sink.send(close_frame(rejection.code, rejection.reason)).await;
                return;
            }
        },
    };
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    let Registration {
        receiver,
        sender,
        cancel,
    } = state.ws_manager.add(conn_id.clone(), user_id).await;
    let mut writer = tokio::spawn(write_frames(receiver, sink, conn_id.clone()));

    match state.feed.subscribe(user_id, cancel).await {
        Ok(subscription) => {
            let outcome = run_session(subscription, &sender, &mut stream, &conn_id).await;
            tracing::debug!(conn_id = %conn_id, outcome = ?outcome, "Delivery finished");
            if outcome == DeliveryOutcome::FeedEnded {
                let _ = sender
                    .send(close_frame(close_code::NORMAL, "Update feed ended"))
                    .await;
            }
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, user_id = %user_id, error = %e, "Could not open update feed");
            let _ = sender
                .send(close_frame(close_code::AGAIN, "Updates unavailable"))
                .await;
        }
    }

    // The writer stops once every sender is gone.
    state.ws_manager.remove(&conn_id).await;
    drop(sender);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Run the delivery loop until it finishes. A client Close or read error
/// cancels the subscription, which ends delivery.
async fn run_session<R, E>(
    subscription: Subscription,
    sender: &WsSender,
    stream: &mut R,
    conn_id: &str,
) -> DeliveryOutcome
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let cancel = subscription.cancellation_token();
    let delivery = deliver(subscription, updates_sink(sender.clone()));
    tokio::pin!(delivery);
    let mut reading = true;

    loop {
        tokio::select! {
            outcome = &mut delivery => return outcome,
            frame = stream.next(), if reading => match frame {
                Some(Ok(Message::Close(_))) | None => {
                    reading = false;
                    cancel.cancel();
                }
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id, "Pong received");
                }
                Some(Ok(_)) => {
                    tracing::trace!(conn_id, "Ignoring inbound frame");
                }
                Some(Err(e)) => {
                    tracing::debug!(conn_id, error = %e, "WebSocket receive error");
                    reading = false;
                    cancel.cancel();
                }
            },
        }
    }
}

/// Forward queued frames to the socket until the queue closes, a Close
/// frame is written, or the client stops accepting writes. A frame that
/// cannot be written within [`WRITE_TIMEOUT`] ends the writer; dropping the
/// queue then fails the delivery loop's next send.
async fn write_frames<S>(mut receiver: mpsc::Receiver<Message>, sink: S, conn_id: String)
where
    S: Sink<Message>,
    S::Error: Display,
{
    let mut sink = std::pin::pin!(sink);
    while let Some(msg) = receiver.recv().await {
        let closing = matches!(msg, Message::Close(_));
        match tokio::time::timeout(WRITE_TIMEOUT, sink.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket sink closed");
                return;
            }
            Err(_) => {
                tracing::debug!(conn_id = %conn_id, "WebSocket write timed out, dropping client");
                return;
            }
        }
        if closing {
            break;
        }
    }
    let _ = tokio::time::timeout(WRITER_DRAIN_TIMEOUT, sink.close()).await;
}

struct Rejection {
    code: u16,
    reason: &'static str,
}

async fn handshake(
    stream: &mut SplitStream<WebSocket>,
    state: &AppState,
) -> Result<UserId, Rejection> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, first_text_frame(stream))
        .await
        .map_err(|_| Rejection {
            code: close_code::POLICY,
            reason: "Handshake timed out",
        })?
        .ok_or(Rejection {
            code: close_code::POLICY,
            reason: "Expected session token",
        })?;

    let token = parse_session_frame(&frame).map_err(|_| Rejection {
        code: close_code::POLICY,
        reason: "Invalid token",
    })?;

    match resolve_session(state, &token).await {
        Ok(user_id) => Ok(user_id),
        Err(CoreError::Unauthorized(_)) | Err(CoreError::Validation(_)) => Err(Rejection {
            code: close_code::POLICY,
            reason: "Invalid token",
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed during handshake");
            Err(Rejection {
                code: close_code::AGAIN,
                reason: "Service unavailable",
            })
        }
    }
}

async fn first_text_frame(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            _ => return None,
        }
    }
    None
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
