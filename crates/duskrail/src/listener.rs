//! Listener / demultiplexer (spec §4.6): owns the UDP socket, drains it
//! with one reader task, and routes each datagram to either the
//! handshake logic or an established session by ConnectionID.
//!
//! Unlike the teacher's Noise-based `HandshakeTracker` (a multi-step,
//! stateful handshake needing in-progress peer state), this transport's
//! handshake token is a stateless cookie (see `duskrail_core::crypto::
//! TokenSecret`): a Session frame carries everything needed to complete
//! key agreement and establish a session in one step, so no pending-
//! handshake table is required.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

use duskrail_core::config::Config;
use duskrail_core::crypto::{Keypair, TokenSecret};
use duskrail_core::wire::{self, Frame, PacketHeader, Type};

use crate::error::ListenError;
use crate::session::{Role, Session};

const BUF_LEN: usize = 4096;

/// A pool of fixed-size read buffers, zeroed on return (spec §5, §9).
struct BufferPool {
    free: StdMutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| vec![0u8; BUF_LEN]).collect();
        Self {
            free: StdMutex::new(free),
            capacity,
        }
    }

    fn take(&self) -> Vec<u8> {
        self.free
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| vec![0u8; BUF_LEN])
    }

    fn give(&self, mut buf: Vec<u8>) {
        buf.iter_mut().for_each(|b| *b = 0);
        buf.resize(BUF_LEN, 0);
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

type SessionTable = Arc<DashMap<[u8; 16], Arc<Session>>>;

/// Accepts inbound sessions on a bound UDP socket.
pub struct Listener {
    socket: Arc<UdpSocket>,
    sessions: SessionTable,
    accept_rx: AsyncMutex<mpsc::Receiver<Arc<Session>>>,
    shutdown: Arc<Notify>,
    local_addr: SocketAddr,
}

pub async fn listen(bind_addr: SocketAddr, config: Config) -> Result<Listener, ListenError> {
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| ListenError::Bind(bind_addr, e))?;
    let local_addr = socket
        .local_addr()
        .map_err(|e| ListenError::Bind(bind_addr, e))?;
    let socket = Arc::new(socket);
    let sessions: SessionTable = Arc::new(DashMap::new());
    let (accept_tx, accept_rx) = mpsc::channel(32);
    let shutdown = Arc::new(Notify::new());
    let token_secret = Arc::new(TokenSecret::generate());
    let pool = Arc::new(BufferPool::new(config.buffers.pool_size));

    spawn_reader(
        Arc::clone(&socket),
        Arc::clone(&sessions),
        accept_tx,
        Arc::clone(&shutdown),
        token_secret,
        pool,
        config.buffers.max_reassembly_bytes,
    );

    Ok(Listener {
        socket,
        sessions,
        accept_rx: AsyncMutex::new(accept_rx),
        shutdown,
        local_addr,
    })
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next inbound session to complete its handshake.
    pub async fn accept(&self) -> Option<Arc<Session>> {
        self.accept_rx.lock().await.recv().await
    }

    pub async fn close(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, connection_id: &[u8; 16]) -> bool {
        self.sessions.contains_key(connection_id)
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_reader(
    socket: Arc<UdpSocket>,
    sessions: SessionTable,
    accept_tx: mpsc::Sender<Arc<Session>>,
    shutdown: Arc<Notify>,
    token_secret: Arc<TokenSecret>,
    pool: Arc<BufferPool>,
    max_reassembly_bytes: usize,
) {
    tokio::spawn(async move {
        loop {
            let mut buf = pool.take();
            let (len, peer_addr) = tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("listener shutting down");
                    return;
                }
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "socket read failed");
                            pool.give(buf);
                            continue;
                        }
                    }
                }
            };

            let bytes = buf[..len].to_vec();
            pool.give(buf);

            let header = match wire::decode_header(&bytes) {
                Ok(h) => h,
                Err(_) => continue, // short / bad type / checksum mismatch: silent drop
            };
            if header.typ == Type::None {
                continue;
            }
            let body = &bytes[wire::HEADER_LEN..];

            match header.typ {
                Type::Init => {
                    handle_init(&socket, &token_secret, &sessions, &header, peer_addr).await;
                }
                Type::Session => {
                    handle_session(
                        &socket,
                        &token_secret,
                        &sessions,
                        &accept_tx,
                        &header,
                        peer_addr,
                        body,
                        max_reassembly_bytes,
                    )
                    .await;
                }
                _ => {
                    let session = sessions.get(&header.connection_id).map(|e| Arc::clone(e.value()));
                    if let Some(session) = session {
                        session.update_remote_addr(peer_addr);
                        session.handle_frame(header.typ, body).await;
                    }
                    // unknown ConnectionID outside the handshake: silent drop
                }
            }
        }
    });
}

async fn handle_init(
    socket: &UdpSocket,
    token_secret: &TokenSecret,
    sessions: &SessionTable,
    header: &PacketHeader,
    peer_addr: SocketAddr,
) {
    if sessions.contains_key(&header.connection_id) {
        tracing::debug!(%peer_addr, "duplicate Init for established connection, ignoring");
        return;
    }

    let token = token_secret.token_for(&peer_addr.to_string());
    let ack = Frame::InitAck {
        stream_id: rand::random(),
        token,
    };
    let reply = PacketHeader {
        typ: Type::InitAck,
        connection_id: header.connection_id,
        sequence: header.sequence.wrapping_add(1),
        channel: header.channel,
    };
    let packet = reply.encode_packet(&ack.encode());
    if let Err(e) = socket.send_to(&packet, peer_addr).await {
        tracing::warn!(error = %e, "failed to send InitAck");
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_session(
    socket: &Arc<UdpSocket>,
    token_secret: &TokenSecret,
    sessions: &SessionTable,
    accept_tx: &mpsc::Sender<Arc<Session>>,
    header: &PacketHeader,
    peer_addr: SocketAddr,
    body: &[u8],
    max_reassembly_bytes: usize,
) {
    if sessions.contains_key(&header.connection_id) {
        tracing::debug!(%peer_addr, "duplicate Session for established connection, ignoring");
        return;
    }

    let frame = match wire::decode_frame(Type::Session, body) {
        Ok(Some(f)) => f,
        _ => return,
    };
    let (token, peer_public_key) = match frame {
        Frame::Session {
            token,
            peer_public_key,
            ..
        } => (token, peer_public_key),
        _ => unreachable!(),
    };

    if !token_secret.verify(&peer_addr.to_string(), &token) {
        tracing::warn!(%peer_addr, "handshake token rejected");
        return;
    }

    let keypair = Keypair::generate();
    let shared_secret = match keypair.shared_secret(&peer_public_key) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "ECDH failed during handshake");
            return;
        }
    };

    let sess_ack = Frame::SessAck {
        stream_id: rand::random(),
        local_public_key: keypair.public_bytes(),
    };
    let reply = PacketHeader {
        typ: Type::SessAck,
        connection_id: header.connection_id,
        sequence: header.sequence.wrapping_add(1),
        channel: header.channel,
    };
    let packet = reply.encode_packet(&sess_ack.encode());
    if let Err(e) = socket.send_to(&packet, peer_addr).await {
        tracing::warn!(error = %e, "failed to send SessAck");
        return;
    }

    let session = Session::new(
        header.connection_id,
        Role::Listener,
        Arc::clone(socket),
        peer_addr,
        shared_secret,
        header.sequence,
        max_reassembly_bytes,
    );
    sessions.insert(header.connection_id, Arc::clone(&session));

    if accept_tx.try_send(session).is_err() {
        tracing::warn!(%peer_addr, "accept queue full or closed, dropping established session");
        sessions.remove(&header.connection_id);
    }
}
