//! Call-control markup documents.
//!
//! The telephony platform asks the gateway what to do with a call and accepts
//! live updates to a call as small XML documents.

/// Path of the media-stream WebSocket route.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Spoken to the caller before a transfer dial.
pub const TRANSFER_ANNOUNCEMENT: &str = "Transferring you to an agent now.";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Escape XML special characters in text and attribute values.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Build the `wss://` URL of the media-stream route for a public host.
pub fn media_stream_url(host: &str) -> String {
    format!("wss://{}{}", host.trim_end_matches('/'), MEDIA_STREAM_PATH)
}

/// Connect the call's audio to a bidirectional media stream.
///
/// Each parameter is delivered back in the stream's `start.customParameters`.
pub fn stream_connect(stream_url: &str, parameters: &[(&str, &str)]) -> String {
    let params: String = parameters
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<Parameter name="{}" value="{}" />"#,
                escape_xml(name),
                escape_xml(value)
            )
        })
        .collect();

    format!(
        r#"{XML_DECLARATION}<Response><Connect><Stream url="{}">{}</Stream></Connect></Response>"#,
        escape_xml(stream_url),
        params
    )
}

/// Announce and dial another party, replacing the current call flow.
pub fn transfer_dial(announcement: &str, destination: &str) -> String {
    format!(
        "{XML_DECLARATION}<Response><Say>{}</Say><Dial>{}</Dial></Response>",
        escape_xml(announcement),
        escape_xml(destination)
    )
}
