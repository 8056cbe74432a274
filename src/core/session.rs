//! Per-call session state.
//!
//! A [`CallSession`] is owned by exactly one relay engine and mutated only from
//! that call's event loop, so it needs no synchronization.

use std::collections::VecDeque;

/// Name of every playback marker sent to the telephony side.
pub const MARK_NAME: &str = "responsePart";

/// Outcome of an interruption, captured before the state is reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    /// Milliseconds of the interrupted response already heard by the caller
    pub elapsed_ms: Option<u64>,
    /// Assistant item that was playing
    pub item_id: Option<String>,
}

impl Interruption {
    /// Item and offset to truncate, when a response was anchored mid-playback.
    pub fn truncation(&self) -> Option<(&str, u64)> {
        match (&self.item_id, self.elapsed_ms) {
            (Some(item_id), Some(elapsed)) => Some((item_id.as_str(), elapsed)),
            _ => None,
        }
    }
}

/// Mutable state of one phone call.
#[derive(Debug, Default)]
pub struct CallSession {
    stream_sid: Option<String>,
    call_sid: Option<String>,
    latest_media_timestamp: u64,
    response_start_timestamp: Option<u64>,
    last_assistant_item: Option<String>,
    mark_queue: VecDeque<String>,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session whose call identifier is already known.
    pub fn with_call_sid(call_sid: impl Into<String>) -> Self {
        Self {
            call_sid: Some(call_sid.into()),
            ..Self::default()
        }
    }

    /// Begin (or restart) a media stream.
    ///
    /// Resets the playback anchors and media clock. The call identifier is
    /// only taken if none was set before.
    pub fn start(&mut self, stream_sid: impl Into<String>, call_sid: Option<&str>) {
        self.stream_sid = Some(stream_sid.into());
        if self.call_sid.is_none() {
            self.call_sid = call_sid.filter(|sid| !sid.is_empty()).map(str::to_string);
        }
        self.latest_media_timestamp = 0;
        self.response_start_timestamp = None;
        self.last_assistant_item = None;
    }

    /// Advance the media clock to the timestamp of an inbound media frame.
    pub fn record_media(&mut self, timestamp: u64) {
        self.latest_media_timestamp = timestamp;
    }

    /// Pop the oldest pending marker. Returns `None` on an empty queue.
    pub fn acknowledge_mark(&mut self) -> Option<String> {
        self.mark_queue.pop_front()
    }

    /// Record a forwarded assistant audio fragment.
    ///
    /// Anchors the response to the current media clock if nothing is playing.
    /// Returns the anchor when this call set it.
    pub fn begin_playback(&mut self, item_id: Option<&str>) -> Option<u64> {
        let anchored = if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
            self.response_start_timestamp
        } else {
            None
        };

        if let Some(item_id) = item_id {
            self.last_assistant_item = Some(item_id.to_string());
        }

        anchored
    }

    /// Queue a playback marker.
    pub fn push_mark(&mut self) {
        self.mark_queue.push_back(MARK_NAME.to_string());
    }

    /// Handle the caller barging in.
    ///
    /// Captures what was playing, then clears the marker queue and both
    /// playback anchors together.
    pub fn interrupt(&mut self) -> Interruption {
        let elapsed_ms = self
            .response_start_timestamp
            .map(|start| self.latest_media_timestamp.saturating_sub(start));
        let item_id = self.last_assistant_item.take();

        self.mark_queue.clear();
        self.response_start_timestamp = None;

        Interruption {
            elapsed_ms,
            item_id,
        }
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.as_deref()
    }

    pub fn latest_media_timestamp(&self) -> u64 {
        self.latest_media_timestamp
    }

    pub fn response_start_timestamp(&self) -> Option<u64> {
        self.response_start_timestamp
    }

    pub fn last_assistant_item(&self) -> Option<&str> {
        self.last_assistant_item.as_deref()
    }

    /// Number of markers awaiting acknowledgement.
    pub fn pending_marks(&self) -> usize {
        self.mark_queue.len()
    }

    /// True while an assistant response is playing on the telephony side.
    pub fn is_responding(&self) -> bool {
        self.response_start_timestamp.is_some()
    }
}
