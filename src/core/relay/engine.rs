//! Per-call relay state machine.
//!
//! The engine is the single consumer of both event streams for a call and the
//! only writer of its [`CallSession`]. It performs no I/O itself: every input
//! yields the list of frames to send, in order, and the media-stream handler
//! delivers them. Function calls come back as [`PendingToolCall`]s that the
//! handler runs off the loop; their [`ToolOutcome`]s are fed back through
//! [`RelayEngine::complete_tool`].

use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use tracing::{debug, error, info, trace, warn};

use crate::core::realtime::{ClientEvent, ConversationItem, ServerEvent};
use crate::core::session::{CallSession, MARK_NAME};
use crate::core::telephony::{StreamStart, TelephonyIncoming, TelephonyOutgoing};
use crate::core::tools::{ToolCall, ToolContext, ToolEnvironment, ToolRegistry};

/// A frame the engine wants delivered.
#[derive(Debug, Clone)]
pub enum RelayAction {
    /// Send to the telephony media stream
    Telephony(TelephonyOutgoing),
    /// Send to the realtime model
    Realtime(ClientEvent),
    /// Run a tool handler without blocking the relay
    Tool(PendingToolCall),
}

/// A function call waiting to be handed to its handler.
#[derive(Debug, Clone)]
pub struct PendingToolCall {
    call: ToolCall,
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

impl PendingToolCall {
    pub fn call_id(&self) -> &str {
        &self.call.call_id
    }

    pub fn name(&self) -> &str {
        &self.call.name
    }

    /// Run the handler. Never fails; see [`ToolRegistry::dispatch`].
    pub async fn run(self) -> ToolOutcome {
        let call_id = self.call.call_id.clone();
        let output = self.tools.dispatch(self.call, self.ctx).await;
        ToolOutcome { call_id, output }
    }
}

/// Acknowledgement produced by a finished tool handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub output: String,
}

/// Relay state machine for one call.
pub struct RelayEngine {
    session: CallSession,
    tools: Arc<ToolRegistry>,
    env: ToolEnvironment,
    show_timing_math: bool,
}

impl RelayEngine {
    pub fn new(tools: Arc<ToolRegistry>, env: ToolEnvironment) -> Self {
        Self {
            session: CallSession::new(),
            tools,
            env,
            show_timing_math: false,
        }
    }

    /// Log the playback timing calculations at debug level.
    pub fn with_timing_math(mut self, enabled: bool) -> Self {
        self.show_timing_math = enabled;
        self
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Handle a raw text frame from the telephony side.
    ///
    /// Malformed frames are logged with their payload and dropped.
    pub fn handle_telephony_text(&mut self, text: &str, realtime_open: bool) -> Vec<RelayAction> {
        match TelephonyIncoming::parse(text) {
            Ok(TelephonyIncoming::Unknown) => {
                debug!(raw = text, "Ignoring unhandled media stream event");
                Vec::new()
            }
            Ok(frame) => self.handle_telephony_frame(frame, realtime_open),
            Err(e) => {
                error!(raw = text, "Error parsing media stream message: {}", e);
                Vec::new()
            }
        }
    }

    /// Handle a decoded telephony frame.
    ///
    /// `realtime_open` gates forwarding of caller audio to the model.
    pub fn handle_telephony_frame(
        &mut self,
        frame: TelephonyIncoming,
        realtime_open: bool,
    ) -> Vec<RelayAction> {
        match frame {
            TelephonyIncoming::Start { stream_sid, start } => {
                self.handle_start(stream_sid, start);
                Vec::new()
            }
            TelephonyIncoming::Media { media } => {
                self.session.record_media(media.timestamp);
                if self.show_timing_math {
                    debug!(
                        "Received media message with timestamp: {}ms",
                        media.timestamp
                    );
                }
                if realtime_open {
                    vec![RelayAction::Realtime(ClientEvent::audio_append(
                        media.payload,
                    ))]
                } else {
                    trace!("Realtime connection not open, dropping caller audio");
                    Vec::new()
                }
            }
            TelephonyIncoming::Mark { .. } => {
                if self.session.acknowledge_mark().is_none() {
                    trace!("Mark received with empty queue");
                }
                Vec::new()
            }
            TelephonyIncoming::Connected { protocol, .. } => {
                debug!(protocol = protocol.as_deref().unwrap_or_default(), "Media stream connected");
                Vec::new()
            }
            TelephonyIncoming::Dtmf { dtmf } => {
                let digit = dtmf.and_then(|d| d.digit).unwrap_or_default();
                debug!(digit = %digit, "DTMF received");
                Vec::new()
            }
            TelephonyIncoming::Stop { .. } => {
                info!(
                    stream_sid = self.session.stream_sid().unwrap_or_default(),
                    "Media stream stopped"
                );
                Vec::new()
            }
            TelephonyIncoming::Unknown => Vec::new(),
        }
    }

    fn handle_start(&mut self, top_level_sid: Option<String>, start: StreamStart) {
        let call_sid = start.resolved_call_sid().map(str::to_string);
        let Some(stream_sid) = start.stream_sid.or(top_level_sid) else {
            warn!("Start frame without a stream SID");
            return;
        };

        self.session.start(stream_sid, call_sid.as_deref());
        info!(
            stream_sid = self.session.stream_sid().unwrap_or_default(),
            call_sid = self.session.call_sid().unwrap_or_default(),
            "Incoming stream has started"
        );
    }

    /// Handle an event from the realtime model.
    pub fn handle_realtime_event(&mut self, event: ServerEvent) -> Vec<RelayAction> {
        match event {
            ServerEvent::AudioDelta { item_id, delta, .. } => {
                self.handle_audio_delta(item_id.as_deref(), &delta)
            }
            ServerEvent::SpeechStarted { .. } => self.handle_speech_started(),
            ServerEvent::OutputItemDone { item, .. } => self.handle_output_item(item),
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = error.code.as_deref().unwrap_or_default(),
                    "Realtime API error: {}",
                    error.message
                );
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_audio_delta(&mut self, item_id: Option<&str>, delta: &str) -> Vec<RelayAction> {
        let Some(stream_sid) = self.session.stream_sid().map(str::to_string) else {
            debug!("Audio delta before stream start, dropping");
            return Vec::new();
        };

        let payload = match BASE64_STANDARD.decode(delta) {
            Ok(audio) => BASE64_STANDARD.encode(audio),
            Err(e) => {
                warn!(item_id = item_id.unwrap_or_default(), "Invalid audio delta: {}", e);
                return Vec::new();
            }
        };

        if let Some(anchor) = self.session.begin_playback(item_id)
            && self.show_timing_math
        {
            debug!("Setting start timestamp for new response: {}ms", anchor);
        }
        self.session.push_mark();

        vec![
            RelayAction::Telephony(TelephonyOutgoing::media(stream_sid.clone(), payload)),
            RelayAction::Telephony(TelephonyOutgoing::mark(stream_sid, MARK_NAME)),
        ]
    }

    fn handle_speech_started(&mut self) -> Vec<RelayAction> {
        debug!("Handling speech started event");
        let latest = self.session.latest_media_timestamp();
        let interruption = self.session.interrupt();
        let mut actions = Vec::with_capacity(2);

        if let Some((item_id, elapsed)) = interruption.truncation() {
            if self.show_timing_math {
                debug!(
                    "Calculating elapsed time for truncation: {} - {} = {}ms",
                    latest,
                    latest - elapsed,
                    elapsed
                );
                debug!(
                    "Sending truncation event for item {} at {}ms",
                    item_id, elapsed
                );
            }
            actions.push(RelayAction::Realtime(ClientEvent::truncate(item_id, elapsed)));
        }

        if let Some(stream_sid) = self.session.stream_sid() {
            actions.push(RelayAction::Telephony(TelephonyOutgoing::clear(stream_sid)));
        }

        actions
    }

    fn handle_output_item(&mut self, item: ConversationItem) -> Vec<RelayAction> {
        if !item.is_function_call() {
            return Vec::new();
        }
        let Some(call) = ToolCall::from_item(&item) else {
            warn!(item_id = item.id.as_deref().unwrap_or_default(), "Function call without call ID");
            return Vec::new();
        };

        info!(tool = %call.name, call_id = %call.call_id, "Function call requested");
        let ctx = ToolContext {
            call_sid: self.session.call_sid().map(str::to_string),
            env: self.env.clone(),
        };

        vec![RelayAction::Tool(PendingToolCall {
            call,
            ctx,
            tools: self.tools.clone(),
        })]
    }

    /// Return a finished tool's acknowledgement to the model and ask it to
    /// continue. The output always precedes `response.create`.
    pub fn complete_tool(&mut self, outcome: ToolOutcome) -> Vec<RelayAction> {
        debug!(call_id = %outcome.call_id, "Function call completed");
        vec![
            RelayAction::Realtime(ClientEvent::function_call_output(
                outcome.call_id,
                outcome.output,
            )),
            RelayAction::Realtime(ClientEvent::ResponseCreate),
        ]
    }
}
