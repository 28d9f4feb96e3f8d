//! WebSocket client carrying OCPP-J frames for one station.

use crate::error::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use evsim_messages::OutgoingRequest;
use evsim_station::{RequestSender, SendOptions, Station, StationError};
use evsim_types::{CallError, Frame};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

/// Connection settings for one station's Central System link.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Central System base URL; the station id is appended as path segment
    pub central_system_url: String,
    /// How long a CALL may wait for its CALLRESULT
    pub request_timeout: Duration,
    /// Pause between reconnect attempts
    pub reconnect_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            central_system_url: "ws://localhost:8080/ocpp".to_string(),
            request_timeout: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

type PendingResult = Result<Value, CallError>;

/// One station's WebSocket link to the Central System.
pub struct CentralSystemClient {
    station_id: String,
    config: TransportConfig,
    /// CALLs in flight, keyed by message id
    pending: DashMap<String, oneshot::Sender<PendingResult>>,
    /// Writer handle while a socket is up
    writer: RwLock<Option<mpsc::UnboundedSender<WsMessage>>>,
    connected: AtomicBool,
    /// Frames parked while the socket is down
    buffer: StdMutex<VecDeque<Frame>>,
    station: RwLock<Option<Arc<Station>>>,
    ping_task: StdMutex<Option<JoinHandle<()>>>,
    connection_task: StdMutex<Option<JoinHandle<()>>>,
}

impl CentralSystemClient {
    pub fn new(station_id: impl Into<String>, config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            station_id: station_id.into(),
            config,
            pending: DashMap::new(),
            writer: RwLock::new(None),
            connected: AtomicBool::new(false),
            buffer: StdMutex::new(VecDeque::new()),
            station: RwLock::new(None),
            ping_task: StdMutex::new(None),
            connection_task: StdMutex::new(None),
        })
    }

    /// Attach the station whose router handles incoming CALLs. Must happen
    /// before the first frame arrives.
    pub async fn attach_station(&self, station: Arc<Station>) {
        *self.station.write().await = Some(station);
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.central_system_url.trim_end_matches('/'),
            self.station_id
        )
    }

    /// Keep the link up: dial, run, back off, redial.
    pub async fn run(self: &Arc<Self>) {
        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match client.connect_once().await {
                    Ok(()) => {
                        warn!(station = %client.station_id, "connection lost");
                    }
                    Err(err) => {
                        warn!(station = %client.station_id, error = %err, "connect failed");
                    }
                }
                client.connected.store(false, Ordering::SeqCst);
                *client.writer.write().await = None;
                sleep(client.config.reconnect_interval).await;
            }
        });
        if let Some(old) = self.connection_task.lock().unwrap().replace(task) {
            old.abort();
        }
    }

    /// Dial the Central System once and pump frames until the socket dies.
    async fn connect_once(self: &Arc<Self>) -> Result<(), TransportError> {
        let endpoint = self.endpoint();
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|err| TransportError::Endpoint(err.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("ocpp1.6"),
        );

        info!(station = %self.station_id, %endpoint, "connecting");
        let (stream, _response) = connect_async(request).await?;
        let (mut sink, mut source) = stream.split();

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WsMessage>();
        *self.writer.write().await = Some(writer_tx);
        self.connected.store(true, Ordering::SeqCst);
        info!(station = %self.station_id, "connected");

        self.flush_buffer().await;

        let writer_task = tokio::spawn(async move {
            while let Some(message) = writer_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        while let Some(message) = source.next().await {
            match message {
                Ok(WsMessage::Text(text)) => self.handle_text(&text).await,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(station = %self.station_id, error = %err, "read error");
                    break;
                }
            }
        }

        writer_task.abort();
        Ok(())
    }

    async fn handle_text(self: &Arc<Self>, text: &str) {
        let frame = match Frame::from_wire(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(station = %self.station_id, error = %err, "unparseable frame");
                return;
            }
        };
        match frame {
            Frame::Call {
                message_id,
                action,
                payload,
            } => {
                let Some(station) = self.station.read().await.clone() else {
                    warn!(station = %self.station_id, %action, "no station attached, dropping call");
                    return;
                };
                let client = Arc::clone(self);
                // own task: the handler may itself await CALLRESULTs
                tokio::spawn(async move {
                    if let Err(failure) = station
                        .handle_incoming_request(&message_id, &action, payload)
                        .await
                    {
                        error!(
                            station = %client.station_id,
                            %action,
                            error = %failure,
                            "command failed, answering CALLERROR"
                        );
                        client
                            .dispatch_frame(Frame::call_error(message_id, failure.to_call_error()))
                            .await;
                    }
                });
            }
            Frame::CallResult {
                message_id,
                payload,
            } => {
                if let Some((_, reply)) = self.pending.remove(&message_id) {
                    let _ = reply.send(Ok(payload));
                } else {
                    debug!(station = %self.station_id, %message_id, "orphan CALLRESULT");
                }
            }
            Frame::CallError { message_id, error } => {
                if let Some((_, reply)) = self.pending.remove(&message_id) {
                    let _ = reply.send(Err(error));
                } else {
                    debug!(station = %self.station_id, %message_id, "orphan CALLERROR");
                }
            }
        }
    }

    /// Push a frame to the socket, or park it for the next connection.
    async fn dispatch_frame(&self, frame: Frame) {
        let serialized = match frame.to_wire() {
            Ok(text) => text,
            Err(err) => {
                error!(station = %self.station_id, error = %err, "frame serialization failed");
                return;
            }
        };
        let writer = self.writer.read().await.clone();
        match writer {
            Some(writer) if self.connected.load(Ordering::SeqCst) => {
                if writer.send(WsMessage::Text(serialized)).is_err() {
                    self.buffer.lock().unwrap().push_back(frame);
                }
            }
            _ => self.buffer.lock().unwrap().push_back(frame),
        }
    }

    async fn flush_buffer(&self) {
        let parked: Vec<Frame> = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.drain(..).collect()
        };
        if parked.is_empty() {
            return;
        }
        info!(station = %self.station_id, frames = parked.len(), "flushing buffered frames");
        for frame in parked {
            self.dispatch_frame(frame).await;
        }
    }

    pub async fn close(&self) {
        if let Some(task) = self.connection_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.ping_task.lock().unwrap().take() {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        *self.writer.write().await = None;
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

#[async_trait]
impl RequestSender for CentralSystemClient {
    async fn send_request(
        &self,
        request: OutgoingRequest,
        options: SendOptions,
    ) -> Result<Value, StationError> {
        let action = request.action();
        let payload = request.to_payload()?;
        let frame = Frame::call(action, payload);
        let message_id = frame.message_id().to_string();

        if !self.connected.load(Ordering::SeqCst)
            && (options.skip_buffering_on_error || options.trigger_message)
        {
            return Err(StationError::NotConnected(action.to_string()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(message_id.clone(), reply_tx);
        self.dispatch_frame(frame).await;

        let outcome = timeout(self.config.request_timeout, reply_rx).await;
        match outcome {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(call_error))) => Err(StationError::CallError(call_error)),
            Ok(Err(_)) => {
                self.pending.remove(&message_id);
                Err(StationError::Transport(format!("{action}: reply channel dropped")))
            }
            Err(_) => {
                self.pending.remove(&message_id);
                Err(StationError::Timeout(action.to_string()))
            }
        }
    }

    async fn send_response(
        &self,
        message_id: &str,
        payload: Value,
        action: &str,
    ) -> Result<(), StationError> {
        debug!(station = %self.station_id, %action, %message_id, "sending CALLRESULT");
        self.dispatch_frame(Frame::call_result(message_id, payload))
            .await;
        Ok(())
    }

    fn ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn restart_ping(&self, interval: Duration) {
        let mut slot = self.ping_task.lock().unwrap();
        if let Some(old) = slot.take() {
            old.abort();
        }
        if interval.is_zero() {
            return;
        }

        let writer = self.writer.try_read().ok().and_then(|guard| guard.clone());
        let station_id = self.station_id.clone();
        *slot = Some(tokio::spawn(async move {
            let Some(writer) = writer else {
                debug!(station = %station_id, "ping requested while disconnected");
                return;
            };
            loop {
                sleep(interval).await;
                if writer.send(WsMessage::Ping(Vec::new())).is_err() {
                    debug!(station = %station_id, "ping writer gone");
                    break;
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsim_messages::v16::HeartbeatRequest;

    fn offline_client() -> Arc<CentralSystemClient> {
        CentralSystemClient::new(
            "CS-T1",
            TransportConfig {
                central_system_url: "ws://localhost:9/ocpp".to_string(),
                request_timeout: Duration::from_millis(50),
                reconnect_interval: Duration::from_millis(50),
            },
        )
    }

    #[test]
    fn endpoint_appends_station_id() {
        let client = CentralSystemClient::new(
            "CS-42",
            TransportConfig {
                central_system_url: "ws://cs.example.com/ocpp/".to_string(),
                ..TransportConfig::default()
            },
        );
        assert_eq!(client.endpoint(), "ws://cs.example.com/ocpp/CS-42");
    }

    #[tokio::test]
    async fn offline_send_with_skip_buffering_is_dropped() {
        let client = offline_client();
        let err = client
            .send_request(
                OutgoingRequest::Heartbeat(HeartbeatRequest::default()),
                SendOptions {
                    skip_buffering_on_error: true,
                    trigger_message: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::NotConnected(_)));
        assert_eq!(client.buffered(), 0);
    }

    #[tokio::test]
    async fn offline_triggered_send_is_one_shot() {
        let client = offline_client();
        let err = client
            .send_request(
                OutgoingRequest::Heartbeat(HeartbeatRequest::default()),
                SendOptions::triggered(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::NotConnected(_)));
    }

    #[tokio::test]
    async fn offline_send_is_buffered_until_timeout() {
        let client = offline_client();
        let err = client
            .send_request(
                OutgoingRequest::Heartbeat(HeartbeatRequest::default()),
                SendOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::Timeout(_)));
        // the frame stays parked for the next connection
        assert_eq!(client.buffered(), 1);
        assert!(!client.ready());
    }

    #[tokio::test]
    async fn offline_response_is_buffered() {
        let client = offline_client();
        client
            .send_response("m-1", serde_json::json!({"status": "Accepted"}), "Reset")
            .await
            .unwrap();
        assert_eq!(client.buffered(), 1);
    }

    #[tokio::test]
    async fn call_result_resolves_pending_request() {
        let client = offline_client();

        let (reply_tx, reply_rx) = oneshot::channel();
        client.pending.insert("m-7".to_string(), reply_tx);
        client
            .handle_text(r#"[3, "m-7", {"currentTime": "2024-05-01T10:00:00Z"}]"#)
            .await;

        let payload = reply_rx.await.unwrap().unwrap();
        assert_eq!(payload["currentTime"], "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn call_error_is_classified() {
        let client = offline_client();

        let (reply_tx, reply_rx) = oneshot::channel();
        client.pending.insert("m-8".to_string(), reply_tx);
        client
            .handle_text(r#"[4, "m-8", "InternalError", "boom", {}]"#)
            .await;

        let call_error = reply_rx.await.unwrap().unwrap_err();
        assert_eq!(call_error.code, evsim_types::CallErrorCode::InternalError);
        assert_eq!(call_error.description, "boom");
    }
}
