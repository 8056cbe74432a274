//! Media-stream WebSocket handler
//!
//! Accepts the telephony side's bidirectional media stream, opens the realtime
//! model connection for the call, and drives a [`RelayEngine`] from a single
//! select loop so the call's session state has exactly one writer. Tool
//! handlers run in their own tasks and report back on a channel the loop
//! polls, so a slow handler never stalls audio.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::core::realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtimeAudioFormat, RealtimeConfig, RealtimeEventStream,
    ServerEvent, TurnDetectionConfig, create_realtime_provider,
};
use crate::core::relay::{RelayAction, RelayEngine, ToolOutcome};
use crate::core::telephony::TelephonyOutgoing;
use crate::core::tools::ToolRegistry;
use crate::state::AppState;

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Tool results waiting to be returned to the loop
const TOOL_CHANNEL_SIZE: usize = 16;

/// Upper bound on opening the realtime model connection
const REALTIME_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const REALTIME_PROVIDER: &str = "openai";

/// Media-stream WebSocket handler
///
/// Upgrades the telephony platform's request to the bidirectional media stream.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!("Media stream WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, state))
}

/// Build the per-call realtime session configuration.
pub fn build_realtime_config(config: &ServerConfig, tools: &ToolRegistry) -> RealtimeConfig {
    let declared = tools.definitions_for(&config.declared_tools);
    let telephony_format = OpenAIRealtimeAudioFormat::G711Ulaw.as_str().to_string();

    RealtimeConfig {
        api_key: config.openai_api_key.clone(),
        provider: REALTIME_PROVIDER.to_string(),
        endpoint: Some(config.openai_realtime_url.clone()),
        model: config.openai_realtime_model.clone(),
        voice: Some(config.voice.clone()),
        instructions: Some(config.system_message.clone()),
        temperature: Some(config.temperature),
        input_audio_format: Some(telephony_format.clone()),
        output_audio_format: Some(telephony_format),
        turn_detection: Some(TurnDetectionConfig::default()),
        tool_choice: (!declared.is_empty()).then(|| "auto".to_string()),
        tools: (!declared.is_empty()).then_some(declared),
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        opening_message: config.opening_utterance().map(str::to_string),
        session_init_delay_ms: config.session_init_delay_ms,
    }
}

/// Handle one telephony media stream for the lifetime of the call
async fn handle_media_stream(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "Client connected");

    let (mut sender, mut receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<TelephonyOutgoing>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing telephony frames
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let json_str = match serde_json::to_string(&frame) {
                Ok(json_str) => json_str,
                Err(e) => {
                    error!("Failed to serialize outgoing frame: {}", e);
                    continue;
                }
            };

            if let Err(e) = sender.send(Message::Text(json_str.into())).await {
                error!("Failed to send media stream frame: {}", e);
                break;
            }
        }
    });

    let realtime_config = build_realtime_config(&app_state.config, &app_state.tools);
    let (realtime_provider, mut realtime_events) = open_realtime(realtime_config).await;

    let (tool_tx, mut tool_rx) = mpsc::channel::<ToolOutcome>(TOOL_CHANNEL_SIZE);

    let mut engine = RelayEngine::new(app_state.tools.clone(), app_state.tool_environment())
        .with_timing_math(app_state.config.show_timing_math);

    loop {
        select! {
            msg_result = receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        let realtime_open = realtime_provider
                            .as_ref()
                            .is_some_and(|provider| provider.is_ready());
                        let actions = engine.handle_telephony_text(&text, realtime_open);
                        deliver(actions, &frame_tx, &tool_tx, realtime_provider.as_deref()).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(%connection_id, "Media stream close received");
                        break;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring binary frame: {} bytes", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%connection_id, "Media stream WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(%connection_id, "Media stream closed by client");
                        break;
                    }
                }
            }
            event = next_realtime_event(&mut realtime_events) => {
                match event {
                    Some(event) => {
                        let actions = engine.handle_realtime_event(event);
                        deliver(actions, &frame_tx, &tool_tx, realtime_provider.as_deref()).await;
                    }
                    None => {
                        // The call continues without the model, e.g. while it is transferred
                        info!(%connection_id, "Disconnected from the OpenAI Realtime API");
                        realtime_events = None;
                    }
                }
            }
            Some(outcome) = tool_rx.recv() => {
                let actions = engine.complete_tool(outcome);
                deliver(actions, &frame_tx, &tool_tx, realtime_provider.as_deref()).await;
            }
        }
    }

    // Cleanup
    sender_task.abort();

    if let Some(mut provider) = realtime_provider
        && let Err(e) = provider.disconnect().await
    {
        error!("Failed to disconnect realtime provider: {:?}", e);
    }

    info!(
        %connection_id,
        stream_sid = engine.session().stream_sid().unwrap_or_default(),
        call_sid = engine.session().call_sid().unwrap_or_default(),
        "Client disconnected"
    );
}

/// Create and connect the realtime provider for a call.
///
/// Failures are logged and the call proceeds without the model.
async fn open_realtime(
    config: RealtimeConfig,
) -> (Option<BoxedRealtime>, Option<RealtimeEventStream>) {
    let mut provider = match create_realtime_provider(REALTIME_PROVIDER, config) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create realtime provider: {}", e);
            return (None, None);
        }
    };

    match tokio::time::timeout(REALTIME_CONNECT_TIMEOUT, provider.connect()).await {
        Ok(Ok(events)) => {
            info!("Connected to the OpenAI Realtime API");
            (Some(provider), Some(events))
        }
        Ok(Err(e)) => {
            error!("Error connecting to the OpenAI Realtime API: {}", e);
            (None, None)
        }
        Err(_) => {
            error!("Timed out connecting to the OpenAI Realtime API");
            let _ = provider.disconnect().await;
            (None, None)
        }
    }
}

/// Next model event, or pending forever once the stream is gone.
async fn next_realtime_event(events: &mut Option<RealtimeEventStream>) -> Option<ServerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Deliver relay actions in order.
///
/// Model-bound events are only sent while the connection is open. Tool calls
/// are spawned and their outcome is sent to `tool_tx` once the handler returns.
async fn deliver(
    actions: Vec<RelayAction>,
    frame_tx: &mpsc::Sender<TelephonyOutgoing>,
    tool_tx: &mpsc::Sender<ToolOutcome>,
    realtime: Option<&dyn BaseRealtime>,
) {
    for action in actions {
        match action {
            RelayAction::Telephony(frame) => {
                if frame_tx.send(frame).await.is_err() {
                    debug!("Media stream sender closed, dropping frame");
                }
            }
            RelayAction::Realtime(event) => match realtime {
                Some(provider) if provider.is_ready() => {
                    let event_type = event.event_type();
                    if let Err(e) = provider.send_event(event).await {
                        warn!(event_type, "Failed to send realtime event: {}", e);
                    }
                }
                _ => {
                    debug!(
                        event_type = event.event_type(),
                        "Realtime connection not open, dropping event"
                    );
                }
            },
            RelayAction::Tool(pending) => {
                let tool_tx = tool_tx.clone();
                tokio::spawn(async move {
                    let outcome = pending.run().await;
                    if tool_tx.send(outcome).await.is_err() {
                        debug!("Call ended before tool completed, dropping result");
                    }
                });
            }
        }
    }
}
