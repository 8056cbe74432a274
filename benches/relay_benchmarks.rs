//! Performance benchmarks for the call relay hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use callbridge_gateway::core::realtime::{ClientEvent, ServerEvent};
use callbridge_gateway::core::telephony::{TelephonyIncoming, TelephonyOutgoing};
use callbridge_gateway::core::tools::{ToolEnvironment, builtin_registry};
use callbridge_gateway::{MARK_NAME, RelayEngine};

/// 20ms of 8kHz mu-law audio
const FRAME_BYTES: usize = 160;

fn audio_payload(bytes: usize) -> String {
    let audio: Vec<u8> = (0..bytes).map(|i| (i % 256) as u8).collect();
    BASE64_STANDARD.encode(audio)
}

fn media_frame(timestamp: u64, payload: &str) -> String {
    json!({
        "event": "media",
        "sequenceNumber": "42",
        "media": {
            "track": "inbound",
            "chunk": "41",
            "timestamp": timestamp.to_string(),
            "payload": payload
        },
        "streamSid": "MZ00000000000000000000000000000000"
    })
    .to_string()
}

fn started_engine() -> RelayEngine {
    let mut engine = RelayEngine::new(Arc::new(builtin_registry()), ToolEnvironment::default());
    let start = json!({
        "event": "start",
        "start": { "streamSid": "MZ0", "callSid": "CA0" }
    })
    .to_string();
    engine.handle_telephony_text(&start, true);
    engine
}

/// Benchmark telephony frame parsing
fn bench_telephony_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("telephony_parsing");
    group.measurement_time(Duration::from_secs(5));

    for frames in [1, 5, 50] {
        let frame = media_frame(1000, &audio_payload(FRAME_BYTES * frames));
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("media", frame.len()),
            &frame,
            |b, frame| {
                b.iter(|| TelephonyIncoming::parse(black_box(frame)));
            },
        );
    }

    let mark = json!({ "event": "mark", "mark": { "name": MARK_NAME } }).to_string();
    group.bench_function("mark", |b| {
        b.iter(|| TelephonyIncoming::parse(black_box(&mark)));
    });

    group.finish();
}

/// Benchmark caller audio through the engine
fn bench_caller_audio(c: &mut Criterion) {
    let mut group = c.benchmark_group("caller_audio");

    let frame = media_frame(1000, &audio_payload(FRAME_BYTES));
    let mut engine = started_engine();
    group.throughput(Throughput::Elements(1));
    group.bench_function("forward_to_model", |b| {
        b.iter(|| engine.handle_telephony_text(black_box(&frame), true));
    });

    group.bench_function("drop_while_closed", |b| {
        b.iter(|| engine.handle_telephony_text(black_box(&frame), false));
    });

    group.finish();
}

/// Benchmark assistant audio through the engine
fn bench_assistant_audio(c: &mut Criterion) {
    let mut group = c.benchmark_group("assistant_audio");
    for frames in [1, 10, 100] {
        let delta = audio_payload(FRAME_BYTES * frames);
        let event = json!({
            "type": "response.audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "delta": delta
        });
        let mut engine = started_engine();

        group.throughput(Throughput::Bytes((FRAME_BYTES * frames) as u64));
        group.bench_with_input(
            BenchmarkId::new("delta_to_media", FRAME_BYTES * frames),
            &event,
            |b, event| {
                b.iter(|| {
                    let event: ServerEvent = serde_json::from_value(event.clone()).unwrap();
                    let actions = engine.handle_realtime_event(event);
                    // Acknowledge the mark so the queue stays bounded
                    let ack = json!({ "event": "mark", "mark": { "name": MARK_NAME } });
                    engine.handle_telephony_text(&ack.to_string(), true);
                    actions
                });
            },
        );
    }

    group.finish();
}

/// Benchmark outbound frame serialization
fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    let payload = audio_payload(FRAME_BYTES * 10);

    let media = TelephonyOutgoing::media("MZ0", payload.clone());
    group.bench_function("telephony_media", |b| {
        b.iter(|| serde_json::to_string(black_box(&media)));
    });

    let clear = TelephonyOutgoing::clear("MZ0");
    group.bench_function("telephony_clear", |b| {
        b.iter(|| serde_json::to_string(black_box(&clear)));
    });

    let append = ClientEvent::audio_append(payload);
    group.bench_function("model_append", |b| {
        b.iter(|| serde_json::to_string(black_box(&append)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_telephony_parsing,
    bench_caller_audio,
    bench_assistant_audio,
    bench_serialization,
);
criterion_main!(benches);
