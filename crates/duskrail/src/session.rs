//! Per-session state and the send/receive pipeline (spec §3, §4.4, §4.5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

use duskrail_core::crypto;
use duskrail_core::reassembly::ReassemblyBuffer;
use duskrail_core::wire::{self, Frame, PacketHeader, Type};

use crate::error::SessionError;

/// Which side of the handshake established this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dialer,
    Listener,
}

/// Channel tag used for application data. Reserved/opaque per spec; the
/// reference implementation uses 1 for every Data packet.
const CHANNEL_DATA: u8 = 1;
const CHANNEL_CONTROL: u8 = 0;

/// Depth of the inbound message queue `Session::receive` drains.
const INBOUND_QUEUE_DEPTH: usize = 64;

/// An established, authenticated, encrypted session over an unreliable
/// datagram socket.
pub struct Session {
    connection_id: [u8; 16],
    role: Role,
    socket: Arc<UdpSocket>,
    remote_addr: StdMutex<SocketAddr>,
    sequence: AtomicU32,
    shared_secret: [u8; 32],
    max_reassembly_bytes: usize,

    inbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    reassembly: StdMutex<HashMap<u32, ReassemblyBuffer>>,

    closed: AtomicBool,
    closed_notify: Notify,
    shutdown_ack: Notify,
}

impl Session {
    pub(crate) fn new(
        connection_id: [u8; 16],
        role: Role,
        socket: Arc<UdpSocket>,
        remote_addr: SocketAddr,
        shared_secret: [u8; 32],
        initial_sequence: u32,
        max_reassembly_bytes: usize,
    ) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        Arc::new(Self {
            connection_id,
            role,
            socket,
            remote_addr: StdMutex::new(remote_addr),
            sequence: AtomicU32::new(initial_sequence),
            shared_secret,
            max_reassembly_bytes,
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            reassembly: StdMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
            shutdown_ack: Notify::new(),
        })
    }

    pub fn connection_id(&self) -> [u8; 16] {
        self.connection_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote_addr(&self) -> SocketAddr {
        *self.remote_addr.lock().unwrap()
    }

    /// Called by the demultiplexer when a datagram arrives from a new
    /// address for this ConnectionID (peer address migration, spec §4.6).
    pub(crate) fn update_remote_addr(&self, addr: SocketAddr) {
        *self.remote_addr.lock().unwrap() = addr;
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    async fn write_packet(&self, typ: Type, body: &[u8], channel: u8) -> Result<(), SessionError> {
        let header = PacketHeader {
            typ,
            connection_id: self.connection_id,
            sequence: self.next_sequence(),
            channel,
        };
        let packet = header.encode_packet(body);
        match self.role {
            Role::Dialer => self.socket.send(&packet).await?,
            Role::Listener => {
                let addr = self.remote_addr();
                self.socket.send_to(&packet, addr).await?
            }
        };
        Ok(())
    }

    // ── Send pipeline (spec §4.4) ─────────────────────────────────────────

    /// Fire-and-forget message emission: the message is hashed, chunked
    /// into 1024-byte fragments, and each fragment is independently
    /// compressed, encrypted, and sent as its own datagram. Chunks of one
    /// message may be sent concurrently; there is no cross-chunk ordering
    /// guarantee.
    pub async fn send(self: &Arc<Self>, message: &[u8]) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }

        let stream_id: u32 = rand::random();
        let hash = crypto::hash(message);
        let total_length = message.len() as u32;

        let mut set = tokio::task::JoinSet::new();
        let mut offset = 0u32;
        if message.is_empty() {
            let this = Arc::clone(self);
            set.spawn(async move { this.send_chunk(stream_id, 0, 0, hash, &[]).await });
        }
        for chunk in message.chunks(wire::CHUNK_LEN) {
            let this = Arc::clone(self);
            let chunk = chunk.to_vec();
            let o = offset;
            offset += chunk.len() as u32;
            set.spawn(async move { this.send_chunk(stream_id, o, total_length, hash, &chunk).await });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => result?,
                Err(join_err) => {
                    return Err(SessionError::Transport(std::io::Error::other(join_err)))
                }
            }
        }
        Ok(())
    }

    async fn send_chunk(
        &self,
        stream_id: u32,
        offset: u32,
        total_length: u32,
        hash: [u8; 32],
        chunk: &[u8],
    ) -> Result<(), SessionError> {
        let frame = Frame::data(stream_id, offset, total_length, hash, chunk);
        let serialized = frame.encode();
        let compressed = duskrail_core::compress::compress(&serialized)?;
        let body = crypto::encrypt(&self.shared_secret, &compressed)?;
        self.write_packet(Type::Data, &body, CHANNEL_DATA).await
    }

    // ── Receive pipeline (spec §4.5), driven by the reader task ──────────

    /// Process one Data packet body routed to this session. Errors here
    /// are per-packet (auth failure, corruption, decode mismatch); the
    /// caller logs and continues rather than tearing down the session.
    pub(crate) async fn process_data_packet(&self, encrypted_body: &[u8]) -> Result<(), SessionError> {
        let compressed = crypto::decrypt(&self.shared_secret, encrypted_body)?;
        let plain = duskrail_core::compress::decompress(&compressed)?;

        let frame = wire::decode_frame(Type::Data, &plain)?
            .expect("Type::Data always yields Some(Frame::Data)");

        let (stream_id, offset, total_length, expected_hash, chunk_size, chunk) = match frame {
            Frame::Data {
                stream_id,
                offset,
                total_length,
                hash,
                chunk_size,
                chunk,
            } => (stream_id, offset, total_length, hash, chunk_size, chunk),
            _ => unreachable!("decode_frame(Type::Data, ..) only produces Frame::Data"),
        };

        if total_length as usize > self.max_reassembly_bytes {
            return Err(SessionError::Corrupt);
        }

        let payload = &chunk[..chunk_size as usize];

        if total_length == chunk_size as u32 {
            if crypto::hash(payload) != expected_hash {
                return Err(SessionError::Corrupt);
            }
            self.enqueue(payload.to_vec()).await;
            return Ok(());
        }

        let complete = {
            let mut reassembly = self.reassembly.lock().unwrap();
            let buffer = reassembly
                .entry(stream_id)
                .or_insert_with(|| ReassemblyBuffer::new(total_length as usize));
            buffer.write(payload, offset as usize);
            if buffer.is_complete(total_length as usize) {
                let bytes = buffer.bytes().to_vec();
                reassembly.remove(&stream_id);
                Some(bytes)
            } else {
                None
            }
        };

        if let Some(bytes) = complete {
            if crypto::hash(&bytes) != expected_hash {
                return Err(SessionError::Corrupt);
            }
            self.enqueue(bytes).await;
        }
        Ok(())
    }

    async fn enqueue(&self, message: Vec<u8>) {
        // The channel only closes when Session itself is dropped, which
        // can't happen while this method runs (the reader task holds an
        // Arc<Session>); a send error here would indicate a bug.
        let _ = self.inbound_tx.send(message).await;
    }

    /// Blocking (async) read of one fully reassembled message. Resolves
    /// `Err(SessionError::Closed)` once the session has been closed,
    /// unblocking any caller that was waiting.
    pub async fn receive(&self) -> Result<Vec<u8>, SessionError> {
        loop {
            let mut rx = self.inbound_rx.lock().await;
            if self.closed.load(Ordering::Acquire) {
                return rx.try_recv().map_err(|_| SessionError::Closed);
            }
            tokio::select! {
                msg = rx.recv() => return msg.ok_or(SessionError::Closed),
                _ = self.closed_notify.notified() => {
                    if let Ok(msg) = rx.try_recv() {
                        return Ok(msg);
                    }
                    return Err(SessionError::Closed);
                }
            }
        }
    }

    pub(crate) fn note_shutdown_ack(&self) {
        self.shutdown_ack.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Dispatch one decrypted-or-control frame to an already-established
    /// session. Shared by the listener's demultiplexer and the dialer's
    /// private reader task. Unrecognized or not-yet-wired frame types
    /// (DataAck, Ping, Pong) are dropped silently per spec §4.6.
    pub(crate) async fn handle_frame(self: &Arc<Self>, typ: Type, body: &[u8]) {
        match typ {
            Type::Data => {
                if let Err(e) = self.process_data_packet(body).await {
                    tracing::warn!(
                        connection_id = %hex::encode(self.connection_id),
                        error = %e,
                        "dropping data packet"
                    );
                }
            }
            Type::Shutdown => {
                if !self.closed.swap(true, Ordering::AcqRel) {
                    let _ = self
                        .write_packet(Type::ShutAck, &0u32.to_be_bytes(), CHANNEL_CONTROL)
                        .await;
                    self.closed_notify.notify_waiters();
                }
            }
            Type::ShutAck => self.note_shutdown_ack(),
            _ => {}
        }
    }

    /// Half-close: send Shutdown, wait briefly for ShutAck, then mark the
    /// session closed regardless of whether the peer responded.
    pub async fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.write_packet(Type::Shutdown, &0u32.to_be_bytes(), CHANNEL_CONTROL).await;
        let _ = tokio::time::timeout(Duration::from_millis(300), self.shutdown_ack.notified()).await;
        self.closed_notify.notify_waiters();
    }
}
