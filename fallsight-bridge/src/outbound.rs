//! Outbound dashboard channel over WebSocket.
//!
//! A single task owns the socket. It connects, announces itself with an
//! `identify` frame, publishes its state on a `watch` channel and serves
//! write requests from any number of [`OutboundHandle`]s. Nothing is queued
//! across connections: a send while the channel is not open fails at once.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use fallsight_bridge_framework::Shutdown;
use fallsight_common::{DashboardConfig, Frame, LinkState, Origin, Payload, encode};

use crate::normalizer::normalize;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const REQUEST_BUFFER: usize = 64;

/// Why a frame did not reach the dashboard. The frame is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("Outbound channel is not open")]
    NotOpen,

    #[error("Outbound write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Outbound channel closed")]
    Closed,

    #[error("Outbound send failed: {0}")]
    Send(String),
}

struct WriteRequest {
    text: String,
    ack: oneshot::Sender<Result<(), DeliveryFailure>>,
}

impl WriteRequest {
    fn reply(self, result: Result<(), DeliveryFailure>) {
        // The sender may have given up waiting.
        let _ = self.ack.send(result);
    }
}

/// Create the channel task and its first handle.
pub fn channel(config: DashboardConfig) -> (OutboundChannel, OutboundHandle) {
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);

    let handle = OutboundHandle {
        state: state_rx,
        requests: request_tx,
        write_timeout: config.write_timeout(),
    };
    let channel = OutboundChannel {
        config,
        state: state_tx,
        requests: request_rx,
    };

    (channel, handle)
}

/// Cheap, cloneable sending side of the outbound channel.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    state: watch::Receiver<LinkState>,
    requests: mpsc::Sender<WriteRequest>,
    write_timeout: Duration,
}

impl OutboundHandle {
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Observe channel state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Transmit one frame, waiting at most the write timeout for the writer.
    pub async fn send(&self, frame: &Frame) -> Result<(), DeliveryFailure> {
        if !self.state().is_connected() {
            return Err(DeliveryFailure::NotOpen);
        }

        let text = encode(frame).map_err(|e| DeliveryFailure::Send(e.to_string()))?;
        let (ack, done) = oneshot::channel();

        self.requests
            .try_send(WriteRequest { text, ack })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    DeliveryFailure::Send("writer backlog full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
            })?;

        match tokio::time::timeout(self.write_timeout, done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeliveryFailure::Closed),
            Err(_) => Err(DeliveryFailure::Timeout(self.write_timeout)),
        }
    }
}

/// How a served connection ended.
enum Served {
    /// Socket failed or the dashboard closed it.
    Lost,
    /// Every handle was dropped; nothing left to send.
    Finished,
}

/// The task that owns the WebSocket.
pub struct OutboundChannel {
    config: DashboardConfig,
    state: watch::Sender<LinkState>,
    requests: mpsc::Receiver<WriteRequest>,
}

impl OutboundChannel {
    /// Connect, serve and reconnect after a fixed delay until shutdown.
    ///
    /// After shutdown an open connection keeps serving until every handle is
    /// dropped, so late frames (the final heartbeat) still go out.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        'reconnect: loop {
            if shutdown.is_triggered() {
                break;
            }

            self.set_state(LinkState::Connecting);
            tracing::info!(url = %self.config.url, "Connecting to dashboard");

            let attempt = {
                let connect = connect(&self.config);
                tokio::pin!(connect);

                loop {
                    tokio::select! {
                        result = &mut connect => break Some(result),
                        _ = shutdown.triggered() => break None,
                        Some(request) = self.requests.recv() => {
                            request.reply(Err(DeliveryFailure::NotOpen));
                        }
                    }
                }
            };

            match attempt {
                None => break,
                Some(Ok(ws)) => {
                    self.set_state(LinkState::Connected);
                    tracing::info!(url = %self.config.url, "Dashboard channel open");

                    let served = self.serve(ws).await;
                    self.set_state(LinkState::Disconnected);

                    if let Served::Finished = served {
                        break;
                    }
                    tracing::warn!(url = %self.config.url, "Dashboard channel lost");
                }
                Some(Err(e)) => {
                    self.set_state(LinkState::Disconnected);
                    tracing::warn!(
                        url = %self.config.url,
                        error = %e,
                        "Dashboard connection failed"
                    );
                }
            }

            let delay = tokio::time::sleep(self.config.retry_delay());
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    _ = &mut delay => break,
                    _ = shutdown.triggered() => break 'reconnect,
                    Some(request) = self.requests.recv() => {
                        request.reply(Err(DeliveryFailure::NotOpen));
                    }
                }
            }
        }

        self.set_state(LinkState::Disconnected);
        tracing::debug!("Outbound channel stopped");
    }

    fn set_state(&self, state: LinkState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    async fn serve(&mut self, ws: WsStream) -> Served {
        let (mut sink, mut stream) = ws.split();
        let write_timeout = self.config.write_timeout();

        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(WriteRequest { text, ack }) = request else {
                        let close = sink.send(Message::Close(None));
                        let _ = tokio::time::timeout(write_timeout, close).await;
                        return Served::Finished;
                    };
                    let result = write(&mut sink, text, write_timeout).await;
                    let failed = result.is_err();
                    let _ = ack.send(result);
                    if failed {
                        return Served::Lost;
                    }
                }
                message = stream.next() => {
                    if !on_message(message) {
                        return Served::Lost;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Error)]
enum ConnectError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("identify failed: {0}")]
    Identify(DeliveryFailure),
}

async fn connect(config: &DashboardConfig) -> Result<WsStream, ConnectError> {
    let handshake = connect_async(config.url.as_str());
    let (mut ws, _response) = tokio::time::timeout(config.connect_timeout(), handshake)
        .await
        .map_err(|_| ConnectError::Timeout(config.connect_timeout()))??;

    let identify = encode(&Frame::identify(&config.client, &config.device))
        .map_err(|e| ConnectError::Identify(DeliveryFailure::Send(e.to_string())))?;
    write(&mut ws, identify, config.write_timeout())
        .await
        .map_err(ConnectError::Identify)?;

    tracing::debug!(client = %config.client, "Identify frame sent");
    Ok(ws)
}

async fn write<S>(sink: &mut S, text: String, timeout: Duration) -> Result<(), DeliveryFailure>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    match tokio::time::timeout(timeout, sink.send(Message::Text(text))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DeliveryFailure::Send(e.to_string())),
        Err(_) => Err(DeliveryFailure::Timeout(timeout)),
    }
}

/// Log one inbound dashboard message. Returns `false` when the connection ended.
fn on_message(message: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>) -> bool {
    match message {
        Some(Ok(Message::Text(text))) => {
            match normalize(Origin::Dashboard, text.as_bytes()) {
                Ok(Some(event)) => match event.payload() {
                    Payload::IdentifyAck(ack) => tracing::info!(
                        status = ack.status.as_deref().unwrap_or(""),
                        message = ack.message.as_deref().unwrap_or(""),
                        "Dashboard acknowledged identify"
                    ),
                    _ => tracing::debug!(kind = %event.kind(), "Dashboard frame received"),
                },
                Ok(None) => tracing::trace!(frame = %text, "Dashboard frame ignored"),
                Err(e) => tracing::debug!(error = %e, "Undecodable dashboard frame"),
            }
            true
        }
        Some(Ok(Message::Close(frame))) => {
            tracing::info!(frame = ?frame, "Dashboard closed the connection");
            false
        }
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Dashboard read failed");
            false
        }
        None => false,
    }
}
