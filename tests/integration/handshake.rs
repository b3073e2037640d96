//! S4 (handshake token reject) and the surrounding dialer/listener state
//! machine (spec §4.7, §4.8). These tests speak the wire protocol by hand
//! via raw sockets rather than `duskrail::dial`, since `dial` always
//! echoes back whatever token the listener itself issued — to exercise
//! rejection we have to be the attacker and send a wrong one.

use std::time::Duration;

use tokio::net::UdpSocket;

use duskrail_core::crypto::Keypair;
use duskrail_core::wire::{self, Frame, PacketHeader, Type};

use crate::harness::{fast_config, recv_with_timeout, start_listener};

const REPLY_DEADLINE: Duration = Duration::from_millis(500);

fn random_connection_id() -> [u8; 16] {
    let mut id = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut id);
    id
}

async fn send_frame(socket: &UdpSocket, addr: std::net::SocketAddr, connection_id: [u8; 16], frame: Frame) {
    let header = PacketHeader {
        typ: frame.frame_type(),
        connection_id,
        sequence: rand::random(),
        channel: 0,
    };
    let packet = header.encode_packet(&frame.encode());
    socket.send_to(&packet, addr).await.expect("send raw packet");
}

/// S4: a Session frame carrying a wrong token is rejected — no SessAck is
/// sent back, and the listener's session table never gains an entry for
/// that ConnectionID.
#[tokio::test]
async fn wrong_token_is_rejected_and_no_session_is_registered() {
    let (listener, addr) = start_listener().await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let connection_id = random_connection_id();

    send_frame(
        &socket,
        addr,
        connection_id,
        Frame::Init {
            stream_id: rand::random(),
            version: 1,
        },
    )
    .await;
    let (init_ack_bytes, _) = recv_with_timeout(&socket, REPLY_DEADLINE)
        .await
        .expect("InitAck expected");
    let init_ack_header = wire::decode_header(&init_ack_bytes).unwrap();
    assert_eq!(init_ack_header.typ, Type::InitAck);

    let keypair = Keypair::generate();
    send_frame(
        &socket,
        addr,
        connection_id,
        Frame::Session {
            stream_id: rand::random(),
            token: [0u8; 16], // deliberately wrong
            peer_public_key: keypair.public_bytes(),
        },
    )
    .await;

    let reply = recv_with_timeout(&socket, REPLY_DEADLINE).await;
    assert!(reply.is_none(), "listener must not reply to a bad token");
    assert!(!listener.has_session(&connection_id));
    assert_eq!(listener.session_count(), 0);
}

/// A well-formed two-round-trip handshake (the happy path `dial` drives)
/// registers exactly one session on the listener.
#[tokio::test]
async fn well_formed_handshake_establishes_one_session() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config())
        .await
        .expect("dial should succeed");

    let accepted = tokio::time::timeout(Duration::from_secs(1), listener.accept())
        .await
        .expect("accept timed out")
        .expect("accept returned None");

    assert_eq!(accepted.connection_id(), client.connection_id());
    assert_eq!(listener.session_count(), 1);
}

/// A duplicate Init for an already-established ConnectionID is ignored:
/// the listener sends no second InitAck and the session table is
/// unaffected (spec §4.7's SHOULD).
#[tokio::test]
async fn duplicate_init_for_established_connection_is_silently_ignored() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config())
        .await
        .expect("dial should succeed");
    let _accepted = listener.accept().await.expect("accept");
    assert_eq!(listener.session_count(), 1);

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    send_frame(
        &socket,
        addr,
        client.connection_id(),
        Frame::Init {
            stream_id: rand::random(),
            version: 1,
        },
    )
    .await;

    let reply = recv_with_timeout(&socket, REPLY_DEADLINE).await;
    assert!(reply.is_none(), "duplicate Init must not get a reply");
    assert_eq!(listener.session_count(), 1);
}
