//! Dialer handshake state machine (spec §4.7): `Idle → InitSent →
//! SessionSent → Established`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout as tokio_timeout;

use duskrail_core::config::Config;
use duskrail_core::crypto::Keypair;
use duskrail_core::wire::{self, Frame, PacketHeader, Type};

use crate::error::DialError;
use crate::session::{Role, Session};

const RECV_BUF_LEN: usize = 4096;

/// Complete the full two-round-trip handshake and return an established
/// session. Each round has a deadline and is retried with capped
/// exponential backoff (spec §4.7's SHOULD).
pub async fn dial(remote_addr: SocketAddr, config: &Config) -> Result<Arc<Session>, DialError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(remote_addr).await?;
    let socket = Arc::new(socket);

    let mut connection_id = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut connection_id);

    let mut attempt = 0u32;
    let mut backoff = Duration::from_millis(100);
    loop {
        attempt += 1;
        match try_handshake(
            &socket,
            connection_id,
            config.handshake.timeout(),
            config.buffers.max_reassembly_bytes,
        )
        .await
        {
            Ok(session) => return Ok(session),
            Err(err) if attempt <= config.handshake.retries => {
                tracing::warn!(attempt, error = %err, "handshake attempt failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.handshake.backoff_cap());
            }
            Err(err) => return Err(err),
        }
    }
}

async fn try_handshake(
    socket: &Arc<UdpSocket>,
    connection_id: [u8; 16],
    step_timeout: Duration,
    max_reassembly_bytes: usize,
) -> Result<Arc<Session>, DialError> {
    // 1. Init -> InitAck
    let init = Frame::Init {
        stream_id: rand::random(),
        version: 1,
    };
    send_control(socket, connection_id, init).await?;
    let (typ, body) = recv_control(socket, step_timeout).await?;
    let token = match wire::decode_frame(typ, &body)? {
        Some(Frame::InitAck { token, .. }) => token,
        other => {
            return Err(DialError::UnexpectedFrame {
                wanted: "InitAck",
                got: other.map(|f| f.frame_type()),
            })
        }
    };

    // 2. Session -> SessAck
    let keypair = Keypair::generate();
    let session_frame = Frame::Session {
        stream_id: rand::random(),
        token,
        peer_public_key: keypair.public_bytes(),
    };
    send_control(socket, connection_id, session_frame).await?;
    let (typ, body) = recv_control(socket, step_timeout).await?;
    let peer_public = match wire::decode_frame(typ, &body)? {
        Some(Frame::SessAck { local_public_key, .. }) => local_public_key,
        other => {
            return Err(DialError::UnexpectedFrame {
                wanted: "SessAck",
                got: other.map(|f| f.frame_type()),
            })
        }
    };

    let shared_secret = keypair.shared_secret(&peer_public)?;
    let remote_addr = socket.peer_addr()?;
    let initial_sequence: u32 = rand::random();

    let session = Session::new(
        connection_id,
        Role::Dialer,
        Arc::clone(socket),
        remote_addr,
        shared_secret,
        initial_sequence,
        max_reassembly_bytes,
    );

    spawn_reader(Arc::clone(socket), Arc::clone(&session));

    Ok(session)
}

async fn send_control(
    socket: &UdpSocket,
    connection_id: [u8; 16],
    frame: Frame,
) -> Result<(), DialError> {
    let header = PacketHeader {
        typ: frame.frame_type(),
        connection_id,
        sequence: rand::random(),
        channel: 0,
    };
    let packet = header.encode_packet(&frame.encode());
    socket.send(&packet).await?;
    Ok(())
}

async fn recv_control(socket: &UdpSocket, step_timeout: Duration) -> Result<(Type, Vec<u8>), DialError> {
    let mut buf = vec![0u8; RECV_BUF_LEN];
    let len = tokio_timeout(step_timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| DialError::Timeout)??;
    let bytes = &buf[..len];
    let header = wire::decode_header(bytes)?;
    Ok((header.typ, bytes[wire::HEADER_LEN..].to_vec()))
}

/// Spawn the dialer's private reader task: after the handshake completes,
/// every subsequent datagram on this connected socket belongs to this one
/// session.
fn spawn_reader(socket: Arc<UdpSocket>, session: Arc<Session>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            if session.is_closed() {
                return;
            }
            let len = match socket.recv(&mut buf).await {
                Ok(len) => len,
                Err(e) => {
                    tracing::warn!(error = %e, "dialer socket read failed");
                    return;
                }
            };
            let bytes = &buf[..len];
            let header = match wire::decode_header(bytes) {
                Ok(h) => h,
                Err(_) => continue, // short/bad-type/checksum mismatch: silently drop
            };
            if header.connection_id != session.connection_id() {
                continue;
            }
            session.update_remote_addr(socket.peer_addr().unwrap_or_else(|_| session.remote_addr()));
            session
                .handle_frame(header.typ, &bytes[wire::HEADER_LEN..])
                .await;
        }
    });
}
