//! Duplex session driver shared by the WebSocket entry points
//!
//! A session owns three pieces:
//! - a reader task that forwards text frames into an inbound queue and cancels
//!   the session token when the client goes away
//! - a sender task that serializes outbound frames onto the socket
//! - the driving loop, which takes one inbound frame at a time and hands it to
//!   a [`FrameHandler`]
//!
//! Frames are never interleaved. A frame that arrives mid-turn waits in the
//! inbound queue until the current turn finishes.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::pipeline_error::{PipelineError, PipelineResult};

/// Channel capacity for inbound frames waiting behind the current turn
const INBOUND_BUFFER_SIZE: usize = 32;

/// Channel capacity for outbound frames
pub const OUTBOUND_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (10 MB)
pub const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
pub const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

const SENDER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing,
    Closed,
}

impl SessionState {
    /// State after a frame failed with `err`
    pub fn after_error(err: &PipelineError) -> Self {
        if err.closes_session() {
            SessionState::Closed
        } else {
            SessionState::Idle
        }
    }
}

/// Routing for outbound frames
#[derive(Debug)]
pub enum MessageRoute<T> {
    Outgoing(T),
    Close,
}

/// Cloneable handle handlers use to write frames to the client
pub struct Outbound<T> {
    tx: mpsc::Sender<MessageRoute<T>>,
}

impl<T> Clone for Outbound<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> Outbound<T> {
    pub fn new(tx: mpsc::Sender<MessageRoute<T>>) -> Self {
        Self { tx }
    }

    /// Queue a frame; fails with a transport error once the socket writer is gone
    pub async fn send(&self, frame: T) -> PipelineResult<()> {
        self.tx
            .send(MessageRoute::Outgoing(frame))
            .await
            .map_err(|_| PipelineError::Transport("connection writer closed".to_string()))
    }

    async fn close(&self) {
        let _ = self.tx.send(MessageRoute::Close).await;
    }
}

/// Per-connection protocol logic plugged into [`drive_session`]
#[async_trait]
pub trait FrameHandler: Send {
    type Outgoing: Serialize + Send + 'static;

    /// Process one inbound text frame to completion
    async fn handle_frame(
        &mut self,
        frame: &str,
        outbound: &Outbound<Self::Outgoing>,
        cancel: &CancellationToken,
    ) -> PipelineResult<()>;

    /// The error frame sent when [`FrameHandler::handle_frame`] fails
    fn error_frame(&self, err: &PipelineError) -> Self::Outgoing;

    /// Called once after the read loop ends
    async fn on_close(&mut self) {}
}

/// Run a session on `socket` until the client disconnects or a transport fault
pub async fn drive_session<H: FrameHandler>(socket: WebSocket, mut handler: H, label: &'static str) {
    let session_id = Uuid::new_v4();
    info!(%session_id, endpoint = label, "WebSocket session established");

    let cancel = CancellationToken::new();
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<MessageRoute<H::Outgoing>>(OUTBOUND_BUFFER_SIZE);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(INBOUND_BUFFER_SIZE);
    let outbound = Outbound::new(outbound_tx);

    let writer_cancel = cancel.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = outbound_rx.recv().await {
            let result = match route {
                MessageRoute::Outgoing(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => sink.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                warn!("Failed to send WebSocket message: {}", e);
                writer_cancel.cancel();
                break;
            }
        }
    });

    let reader_cancel = cancel.clone();
    let reader_task = tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = reader_cancel.cancelled() => break,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => {
                    if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket connection closed by client");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
        reader_cancel.cancel();
    });

    let mut state = SessionState::Idle;
    let mut frames = 0usize;

    while state != SessionState::Closed {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            frame = inbound_rx.recv() => frame,
        };
        let Some(frame) = frame else {
            state = SessionState::Closed;
            break;
        };

        frames += 1;
        state = SessionState::Processing;
        debug!(%session_id, frame = frames, ?state, "Processing frame");

        match handler.handle_frame(&frame, &outbound, &cancel).await {
            Ok(()) => state = SessionState::Idle,
            Err(err) => {
                state = SessionState::after_error(&err);
                if state == SessionState::Closed {
                    info!(%session_id, error = %err, "Session closing");
                } else {
                    warn!(%session_id, error = %err, kind = ?err.kind(), "Frame failed");
                    if let Err(send_err) = outbound.send(handler.error_frame(&err)).await {
                        warn!(%session_id, error = %send_err, "Could not report error to client");
                        state = SessionState::Closed;
                    }
                }
            }
        }
    }

    debug!(%session_id, ?state, "Read loop finished");
    handler.on_close().await;

    if !cancel.is_cancelled() {
        outbound.close().await;
    }
    cancel.cancel();
    drop(outbound);

    if tokio::time::timeout(SENDER_SHUTDOWN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }
    reader_task.abort();

    info!(%session_id, frames, "WebSocket session ended");
}
