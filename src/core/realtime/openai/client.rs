//! OpenAI Realtime API client implementation.
//!
//! This module provides the OpenAI Realtime client that implements the `BaseRealtime` trait
//! using OpenAI's WebSocket-based Realtime API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 u-law, 8kHz, base64 encoded, passed through untouched
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge_gateway::core::realtime::{BaseRealtime, RealtimeConfig, OpenAIRealtime};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RealtimeConfig {
//!         api_key: "sk-...".to_string(),
//!         voice: Some("alloy".to_string()),
//!         session_init_delay_ms: 100,
//!         ..Default::default()
//!     };
//!
//!     let mut realtime = OpenAIRealtime::new(config).unwrap();
//!     let mut events = realtime.connect().await.unwrap();
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio::net::TcpStream;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::config::{
    OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
use super::messages::{ClientEvent, ServerEvent, SessionConfig, ToolDef, TurnDetection};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEventStream,
    RealtimeResult, TurnDetectionConfig,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for inbound server events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How long `disconnect` waits for the close handshake before aborting.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Server event types logged at info level with their full payload.
pub const LOGGED_EVENT_TYPES: &[&str] = &[
    "error",
    "response.content.done",
    "rate_limits.updated",
    "response.done",
    "input_audio_buffer.committed",
    "input_audio_buffer.speech_stopped",
    "input_audio_buffer.speech_started",
    "session.created",
];

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client implementation.
///
/// One instance serves exactly one phone call. The socket is driven by a
/// spawned task that serialises queued client events and forwards parsed
/// server events, in arrival order, to the stream returned by `connect`.
///
/// The `connected` flag uses `Arc<AtomicBool>` so the relay loop can check
/// liveness without awaiting.
pub struct OpenAIRealtime {
    /// Configuration
    config: RealtimeConfig,
    /// Model name sent in the `model` query parameter
    model: String,
    /// Voice name sent in `session.update`
    voice: String,
    /// Caller audio format
    input_format: OpenAIRealtimeAudioFormat,
    /// Assistant audio format
    output_format: OpenAIRealtimeAudioFormat,
    /// Connected flag shared with the connection task
    connected: Arc<AtomicBool>,
    /// Session ID reported by `session.created`
    session_id: Arc<RwLock<Option<String>>>,
    /// Outbound event queue
    ws_sender: Option<mpsc::Sender<ClientEvent>>,
    /// Connection task handle
    connection_handle: Option<JoinHandle<()>>,
    /// Delayed session initialisation task
    init_handle: Option<JoinHandle<()>>,
    /// Signals the connection task to close the socket
    shutdown: CancellationToken,
}

impl OpenAIRealtime {
    /// Get the configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the configured voice.
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Get the session ID if the server has reported one.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Build the WebSocket URL with model parameter.
    ///
    /// A `model` query parameter already present on a custom endpoint is kept.
    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let base = self.config.endpoint.as_deref().unwrap_or(OPENAI_REALTIME_URL);
        let mut url = Url::parse(base).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid realtime endpoint '{base}': {e}"))
        })?;

        if !url.query_pairs().any(|(key, _)| key == "model") {
            url.query_pairs_mut()
                .append_pair("model", &self.model);
        }

        Ok(url)
    }

    /// Build the session configuration sent after the socket opens.
    fn build_session_config(&self) -> SessionConfig {
        let tools: Option<Vec<ToolDef>> = self.config.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| ToolDef {
                    tool_type: t.tool_type.clone(),
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    parameters: t.function.parameters.clone(),
                })
                .collect()
        });

        let tool_choice = match (&self.config.tool_choice, &tools) {
            (Some(choice), _) => Some(choice.clone()),
            (None, Some(tools)) if !tools.is_empty() => Some("auto".to_string()),
            _ => None,
        };

        let turn_detection = match self.config.turn_detection.clone().unwrap_or_default() {
            TurnDetectionConfig::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            } => Some(TurnDetection::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            }),
            TurnDetectionConfig::None => None,
        };

        SessionConfig {
            modalities: Some(
                self.config
                    .modalities
                    .clone()
                    .unwrap_or_else(|| vec!["text".to_string(), "audio".to_string()]),
            ),
            instructions: self.config.instructions.clone(),
            voice: Some(self.voice.clone()),
            input_audio_format: Some(self.input_format.as_str().to_string()),
            output_audio_format: Some(self.output_format.as_str().to_string()),
            turn_detection,
            tools,
            tool_choice,
            temperature: self.config.temperature,
        }
    }

    /// Send the session configuration, then the opening utterance if any.
    async fn initialize_session(
        sender: &mpsc::Sender<ClientEvent>,
        session: SessionConfig,
        opening_message: Option<String>,
    ) -> RealtimeResult<()> {
        debug!("Sending realtime session update");
        Self::queue(sender, ClientEvent::SessionUpdate { session }).await?;

        if let Some(text) = opening_message {
            info!("Assistant speaks first, sending opening message");
            Self::queue(sender, ClientEvent::assistant_message(text)).await?;
            Self::queue(sender, ClientEvent::ResponseCreate).await?;
        }

        Ok(())
    }

    async fn queue(sender: &mpsc::Sender<ClientEvent>, event: ClientEvent) -> RealtimeResult<()> {
        sender
            .send(event)
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    /// Drive the socket until either side closes or shutdown is requested.
    async fn run_connection(
        mut ws_sink: WsSink,
        mut ws_stream: WsStream,
        mut outgoing: mpsc::Receiver<ClientEvent>,
        events: mpsc::Sender<ServerEvent>,
        connected: Arc<AtomicBool>,
        session_id: Arc<RwLock<Option<String>>>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Closing OpenAI Realtime socket");
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }

                // Handle outgoing messages
                event = outgoing.recv() => {
                    let Some(event) = event else {
                        let _ = ws_sink.close().await;
                        break;
                    };

                    let json = match encode_event(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("{}", e);
                            continue;
                        }
                    };

                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        error!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }

                // Handle incoming messages
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Some(event) = decode_server_event(&text) else {
                                continue;
                            };

                            if let ServerEvent::SessionCreated { session } = &event {
                                *session_id.write().await = Some(session.id.clone());
                            }

                            if events.send(event).await.is_err() {
                                debug!("Realtime event receiver dropped");
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                error!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "OpenAI Realtime socket closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("OpenAI Realtime WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        info!("OpenAI Realtime connection task ended");
    }
}

/// Serialize a client event to its JSON text frame.
fn encode_event(event: &ClientEvent) -> RealtimeResult<String> {
    serde_json::to_string(event).map_err(|e| {
        RealtimeError::SerializationError(format!(
            "Failed to serialize {}: {e}",
            event.event_type()
        ))
    })
}

/// Parse a server text frame, logging it according to its type.
///
/// Malformed frames are logged with their raw text and dropped.
pub(crate) fn decode_server_event(text: &str) -> Option<ServerEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse server event: {} - {}", e, text);
            return None;
        }
    };

    let event_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if LOGGED_EVENT_TYPES.contains(&event_type) {
        info!(event_type, payload = %text, "Received realtime event");
    } else {
        trace!(event_type, "Received realtime event");
    }

    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to parse server event: {} - {}", e, text);
            None
        }
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        // Validate API key
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let model = resolve_model(&config.model);
        let voice = resolve_voice(config.voice.as_deref());

        let input_format = config
            .input_audio_format
            .as_deref()
            .map(OpenAIRealtimeAudioFormat::from_str_or_default)
            .unwrap_or_default();

        let output_format = config
            .output_audio_format
            .as_deref()
            .map(OpenAIRealtimeAudioFormat::from_str_or_default)
            .unwrap_or_default();

        Ok(Self {
            config,
            model,
            voice,
            input_format,
            output_format,
            connected: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(RwLock::new(None)),
            ws_sender: None,
            connection_handle: None,
            init_handle: None,
            shutdown: CancellationToken::new(),
        })
    }

    async fn connect(&mut self) -> RealtimeResult<RealtimeEventStream> {
        if self.is_ready() {
            return Err(RealtimeError::ConnectionFailed(
                "Already connected".to_string(),
            ));
        }

        let url = self.build_ws_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| {
                RealtimeError::AuthenticationFailed(
                    "API key contains invalid header characters".to_string(),
                )
            })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(response) if response.status().as_u16() == 401 => {
                    RealtimeError::AuthenticationFailed("Realtime API rejected the API key".into())
                }
                other => RealtimeError::ConnectionFailed(other.to_string()),
            })?;

        info!(model = %self.model, "Connected to OpenAI Realtime API");

        let (ws_sink, ws_stream) = ws.split();
        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(EVENT_CHANNEL_CAPACITY);

        self.shutdown = CancellationToken::new();
        self.connected.store(true, Ordering::SeqCst);

        self.connection_handle = Some(tokio::spawn(Self::run_connection(
            ws_sink,
            ws_stream,
            rx,
            event_tx,
            self.connected.clone(),
            self.session_id.clone(),
            self.shutdown.clone(),
        )));

        // The server needs a moment after the upgrade before it accepts session.update.
        let session = self.build_session_config();
        let opening_message = self.config.opening_message.clone();
        let delay = Duration::from_millis(self.config.session_init_delay_ms);
        let init_sender = tx.clone();
        self.init_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = Self::initialize_session(&init_sender, session, opening_message).await
            {
                warn!("Failed to initialize realtime session: {}", e);
            }
        }));

        self.ws_sender = Some(tx);
        Ok(event_rx)
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.shutdown.cancel();
        self.ws_sender = None;

        if let Some(handle) = self.init_handle.take() {
            handle.abort();
        }

        if let Some(handle) = self.connection_handle.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                warn!("OpenAI Realtime socket did not close in time, aborting");
                abort.abort();
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.session_id.write().await = None;

        info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }

        match self.ws_sender.as_ref() {
            Some(sender) => Self::queue(sender, event).await,
            None => Err(RealtimeError::NotConnected),
        }
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "openai",
            "api_type": "WebSocket Realtime",
            "endpoint": self.config.endpoint.as_deref().unwrap_or(OPENAI_REALTIME_URL),
            "model": self.model,
            "voice": self.voice,
            "input_audio_format": self.input_format.as_str(),
            "output_audio_format": self.output_format.as_str(),
            "sample_rate": self.output_format.sample_rate(),
        })
    }
}

/// Canonical name for a known model, the trimmed input for anything newer.
fn resolve_model(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return OpenAIRealtimeModel::default().as_str().to_string();
    }
    match OpenAIRealtimeModel::parse(raw) {
        Some(model) => model.as_str().to_string(),
        None => {
            warn!(model = %raw, "Unrecognised realtime model, sending it as configured");
            raw.to_string()
        }
    }
}

/// Canonical name for a known voice, the trimmed input for anything newer.
fn resolve_voice(raw: Option<&str>) -> String {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return OpenAIRealtimeVoice::default().as_str().to_string();
    }
    match OpenAIRealtimeVoice::parse(raw) {
        Some(voice) => voice.as_str().to_string(),
        None => {
            warn!(voice = %raw, "Unrecognised realtime voice, sending it as configured");
            raw.to_string()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
