//! TCP implementation of the `TransportBackend` trait.
//!
//! The game connects as a client. Only one peer is served at a time: a new
//! connection replaces the previous one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_core::error::ParleyError;
use parley_core::event::Event;
use parley_core::transport::{InboundCallback, TransportBackend};

use crate::codec::{self, CodecError, Frame};

/// TCP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpTransportConfig {
    /// Address to listen on.
    pub host: String,
    /// Port to listen on; `0` picks a free port.
    pub port: u16,
    /// Largest accepted inbound frame payload, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 18080,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

/// An active peer connection.
struct PeerSession {
    peer_name: String,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: Option<AbortHandle>,
}

type Sessions = Arc<Mutex<HashMap<Uuid, PeerSession>>>;

/// TCP-backed transport to the game process.
pub struct TcpTransport {
    config: TcpTransportConfig,
    sessions: Sessions,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl TcpTransport {
    /// Creates a new, not yet started `TcpTransport`.
    #[must_use]
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            local_addr: Mutex::new(None),
        }
    }

    /// Returns the bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the names of the connected peers.
    pub fn peer_names(&self) -> Vec<String> {
        lock_sessions(&self.sessions)
            .values()
            .map(|s| s.peer_name.clone())
            .collect()
    }
}

#[async_trait]
impl TransportBackend for TcpTransport {
    async fn start(&self, on_event: InboundCallback) -> Result<(), ParleyError> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ParleyError::Transport(format!("failed to bind {bind_addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ParleyError::Transport(format!("failed to read local address: {e}")))?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        info!(addr = %local_addr, "game transport listening");

        let sessions = Arc::clone(&self.sessions);
        let max_frame_bytes = self.config.max_frame_bytes;
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        attach_peer(&sessions, stream, peer, max_frame_bytes, on_event.clone());
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept game connection");
                    }
                }
            }
        });

        Ok(())
    }

    fn publish(&self, event: &Event) {
        let frame = match codec::encode_frame(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!(event_id = event.event_id, error = %e, "failed to encode event");
                return;
            }
        };

        let sessions = lock_sessions(&self.sessions);
        if sessions.is_empty() {
            debug!(event_id = event.event_id, "no game connected, event dropped");
            return;
        }
        for session in sessions.values() {
            if session.outbound.send(frame.clone()).is_err() {
                error!(
                    peer = %session.peer_name,
                    event_id = event.event_id,
                    "failed to publish event to peer"
                );
            }
        }
    }

    fn is_connected(&self) -> bool {
        !lock_sessions(&self.sessions).is_empty()
    }
}

fn lock_sessions(sessions: &Sessions) -> MutexGuard<'_, HashMap<Uuid, PeerSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

fn attach_peer(
    sessions: &Sessions,
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_bytes: usize,
    on_event: InboundCallback,
) {
    let session_id = Uuid::new_v4();
    let peer_name = peer.to_string();
    let (read_half, write_half) = stream.into_split();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();

    let replaced: Vec<PeerSession> = {
        let mut guard = lock_sessions(sessions);
        let replaced = guard.drain().map(|(_, s)| s).collect();
        guard.insert(
            session_id,
            PeerSession {
                peer_name: peer_name.clone(),
                outbound,
                reader: None,
            },
        );
        replaced
    };
    for old in replaced {
        warn!(old_peer = %old.peer_name, new_peer = %peer_name, "game reconnected, dropping previous connection");
        if let Some(reader) = old.reader {
            reader.abort();
        }
    }

    info!(peer = %peer_name, session = %session_id, "game connected");

    tokio::spawn(write_loop(write_half, outbound_rx, peer_name.clone()));
    let reader = tokio::spawn(read_loop(
        Arc::clone(sessions),
        session_id,
        read_half,
        peer_name,
        max_frame_bytes,
        on_event,
    ));

    if let Some(session) = lock_sessions(sessions).get_mut(&session_id) {
        session.reader = Some(reader.abort_handle());
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    peer_name: String,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            error!(peer = %peer_name, error = %e, "failed to write frame to game");
            break;
        }
    }
    debug!(peer = %peer_name, "writer finished");
}

async fn read_loop(
    sessions: Sessions,
    session_id: Uuid,
    mut reader: OwnedReadHalf,
    peer_name: String,
    max_frame_bytes: usize,
    on_event: InboundCallback,
) {
    loop {
        match codec::read_frame(&mut reader, max_frame_bytes).await {
            Ok(Some(Frame::Payload(payload))) => match codec::decode_event(&payload) {
                Ok(event) => {
                    debug!(peer = %peer_name, event_id = event.event_id, event_type = event.event_type(), "< from game");
                    on_event(event);
                }
                Err(CodecError::UnknownType(event_type)) => {
                    warn!(peer = %peer_name, event_type = %event_type, "ignoring event of unknown type");
                }
                Err(e) => {
                    error!(
                        peer = %peer_name,
                        error = %e,
                        payload = %String::from_utf8_lossy(&payload),
                        "failed to decode event"
                    );
                }
            },
            Ok(Some(Frame::Oversized(len))) => {
                error!(peer = %peer_name, len, max = max_frame_bytes, "skipped oversized frame");
            }
            Ok(None) => {
                info!(peer = %peer_name, "game closed the connection");
                break;
            }
            Err(e) => {
                error!(peer = %peer_name, error = %e, "error while serving the game connection");
                break;
            }
        }
    }

    lock_sessions(&sessions).remove(&session_id);
    info!(peer = %peer_name, session = %session_id, "game disconnected");
}
