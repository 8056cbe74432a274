//! WebSocket mock of the realtime model API
//!
//! Accepts connections on a random local port, records every client event,
//! the upgrade request and how each connection ended, and lets the test push
//! server events to (or hang up on) the most recent connection.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Upgrade request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedHandshake {
    pub uri: String,
    pub authorization: Option<String>,
    pub beta_header: Option<String>,
}

/// How a mock connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The gateway sent a close frame
    ClosedByClient,
    /// The gateway dropped the socket without closing
    Reset,
    /// The mock hung up via [`RealtimeMockServer::hang_up`]
    ClosedByServer,
}

enum ServerCommand {
    Event(Value),
    HangUp,
}

/// Running mock server.
pub struct RealtimeMockServer {
    pub addr: SocketAddr,
    client_events: mpsc::UnboundedReceiver<Value>,
    handshakes: mpsc::UnboundedReceiver<RecordedHandshake>,
    closes: mpsc::UnboundedReceiver<ConnectionEnd>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    accept_task: JoinHandle<()>,
}

impl RealtimeMockServer {
    /// Bind to a random port and start accepting connections.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock realtime server");
        let addr = listener.local_addr().expect("mock server address");

        let (client_tx, client_events) = mpsc::unbounded_channel();
        let (handshake_tx, handshakes) = mpsc::unbounded_channel();
        let (close_tx, closes) = mpsc::unbounded_channel();
        let (commands, command_rx) = mpsc::unbounded_channel::<ServerCommand>();

        let accept_task = tokio::spawn(async move {
            let mut command_rx = command_rx;
            // One call at a time; a new connection takes over the command channel
            while let Ok((stream, _)) = listener.accept().await {
                let (rx, end) =
                    handle_connection(stream, client_tx.clone(), handshake_tx.clone(), command_rx)
                        .await;
                command_rx = rx;
                if let Some(end) = end {
                    let _ = close_tx.send(end);
                }
            }
        });

        Self {
            addr,
            client_events,
            handshakes,
            closes,
            commands,
            accept_task,
        }
    }

    /// Endpoint to configure on the gateway.
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Push a server event to the connected client.
    pub fn push(&self, event: Value) {
        let _ = self.commands.send(ServerCommand::Event(event));
    }

    /// Send a close frame to the connected client and drop the socket.
    pub fn hang_up(&self) {
        let _ = self.commands.send(ServerCommand::HangUp);
    }

    /// Wait for the current connection to end.
    pub async fn next_close(&mut self) -> ConnectionEnd {
        tokio::time::timeout(Duration::from_secs(5), self.closes.recv())
            .await
            .expect("Timed out waiting for connection to end")
            .expect("Mock server stopped")
    }

    /// Wait for the next client event.
    pub async fn next_event(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.client_events.recv())
            .await
            .expect("Timed out waiting for client event")
            .expect("Mock server stopped")
    }

    /// Wait for the next client event of the given type, skipping others.
    pub async fn next_event_of(&mut self, event_type: &str) -> Value {
        loop {
            let event = self.next_event().await;
            if event["type"] == event_type {
                return event;
            }
        }
    }

    /// Wait for the next upgrade request.
    pub async fn next_handshake(&mut self) -> RecordedHandshake {
        tokio::time::timeout(Duration::from_secs(5), self.handshakes.recv())
            .await
            .expect("Timed out waiting for handshake")
            .expect("Mock server stopped")
    }

    /// Upgrade requests received so far, without waiting.
    pub fn drain_handshakes(&mut self) -> Vec<RecordedHandshake> {
        let mut handshakes = Vec::new();
        while let Ok(handshake) = self.handshakes.try_recv() {
            handshakes.push(handshake);
        }
        handshakes
    }

    /// Client events received so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(event) = self.client_events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for RealtimeMockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    client_tx: mpsc::UnboundedSender<Value>,
    handshake_tx: mpsc::UnboundedSender<RecordedHandshake>,
    mut commands: mpsc::UnboundedReceiver<ServerCommand>,
) -> (mpsc::UnboundedReceiver<ServerCommand>, Option<ConnectionEnd>) {
    let callback = |request: &Request, response: Response| {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let _ = handshake_tx.send(RecordedHandshake {
            uri: request.uri().to_string(),
            authorization: header("authorization"),
            beta_header: header("openai-beta"),
        });
        Ok::<_, ErrorResponse>(response)
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(_) => return (commands, None),
    };
    let (mut sink, mut source) = ws.split();

    let end = loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(value) = serde_json::from_str::<Value>(&text) {
                            let _ = client_tx.send(value);
                        }
                    }
                    Some(Ok(Message::Close(_))) => break ConnectionEnd::ClosedByClient,
                    None | Some(Err(_)) => break ConnectionEnd::Reset,
                    Some(Ok(_)) => {}
                }
            }
            command = commands.recv() => {
                match command {
                    Some(ServerCommand::Event(event)) => {
                        if sink.send(Message::Text(event.to_string().into())).await.is_err() {
                            break ConnectionEnd::Reset;
                        }
                    }
                    Some(ServerCommand::HangUp) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break ConnectionEnd::ClosedByServer;
                    }
                }
            }
        }
    };

    (commands, Some(end))
}
