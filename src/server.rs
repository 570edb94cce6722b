//! Viewer transport: newline-delimited JSON events over TCP.
//!
//! Every connection is one hub subscriber. Each delivered snapshot is written
//! as a single line:
//!
//! ```text
//! {"event":"agvData","data":[{"Communication.ID":1,...}]}
//! ```
//!
//! Anything the viewer sends is read and ignored. EOF ends the subscription,
//! and so does a viewer that stops reading for [`WRITE_TIMEOUT`].

use crate::error::EventError;
use crate::monitor::Monitor;
use crate::record::Snapshot;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub const EVENT_NAME: &str = "agvData";

/// Longest a single event line may take to write before the viewer is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct OutgoingEvent<'a> {
    event: &'a str,
    data: &'a Snapshot,
}

#[derive(Deserialize)]
struct IncomingEvent {
    event: String,
    data: Snapshot,
}

/// One event line, without the trailing newline.
pub fn encode_event(snapshot: &Snapshot) -> Result<String, EventError> {
    Ok(serde_json::to_string(&OutgoingEvent {
        event: EVENT_NAME,
        data: snapshot,
    })?)
}

pub fn decode_event(line: &str) -> Result<Snapshot, EventError> {
    let incoming: IncomingEvent = serde_json::from_str(line.trim())?;
    if incoming.event != EVENT_NAME {
        return Err(EventError::UnexpectedEvent(incoming.event));
    }
    Ok(incoming.data)
}

/// Accept viewers until the task is dropped.
pub async fn serve(listener: TcpListener, monitor: Arc<Monitor>) {
    if let Ok(addr) = listener.local_addr() {
        info!("🌐 Viewer server listening on {}", addr);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 Viewer connected: {}", addr);
                let client_monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_monitor).await {
                        warn!("Viewer {} error: {}", addr, e);
                    }
                    info!("🔌 Viewer {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: TcpStream, monitor: Arc<Monitor>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut subscription = monitor.subscribe().await;

    loop {
        tokio::select! {
            delivered = subscription.recv() => {
                let Some(snapshot) = delivered else {
                    break;
                };
                let mut line = encode_event(&snapshot)?;
                line.push('\n');
                tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes()))
                    .await
                    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "viewer stopped reading"))??;
            }
            incoming = lines.next_line() => {
                match incoming? {
                    Some(line) => debug!(subscriber = subscription.id(), "Ignoring viewer input: {}", line),
                    None => break,
                }
            }
        }
    }

    Ok(())
}
