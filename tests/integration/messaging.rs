//! S1 (small message), S2 (exact chunk boundary), S3 (multi-chunk + a
//! follow-up small send on the same session).

use std::time::Duration;

use crate::harness::{fast_config, receive_with_timeout, start_listener};
use duskrail_core::wire::CHUNK_LEN;

const RECEIVE_DEADLINE: Duration = Duration::from_secs(2);

/// S1: a 64-byte message of a single repeated byte round-trips exactly.
#[tokio::test]
async fn small_message_round_trips() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config()).await.expect("dial");
    let server = listener.accept().await.expect("accept");

    let message = vec![0xABu8; 64];
    client.send(&message).await.expect("send");

    let received = receive_with_timeout(&server, RECEIVE_DEADLINE)
        .await
        .expect("receive timed out")
        .expect("receive errored");
    assert_eq!(received, message);
}

/// S2: a message exactly `CHUNK_LEN` bytes takes the `Length == ChunkSize`
/// fast path (no ReassemblyBuffer involved) and still arrives intact.
#[tokio::test]
async fn exact_chunk_boundary_round_trips() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config()).await.expect("dial");
    let server = listener.accept().await.expect("accept");

    let message: Vec<u8> = (0..CHUNK_LEN as u32).map(|i| (i % 251) as u8).collect();
    client.send(&message).await.expect("send");

    let received = receive_with_timeout(&server, RECEIVE_DEADLINE)
        .await
        .expect("receive timed out")
        .expect("receive errored");
    assert_eq!(received.len(), CHUNK_LEN);
    assert_eq!(received, message);
}

/// S3: a 4096-byte message spans four chunks and must reassemble whole
/// even though chunks may race each other on the wire; a second, smaller
/// message sent afterward on the same session also arrives correctly.
#[tokio::test]
async fn multi_chunk_message_then_a_small_followup() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config()).await.expect("dial");
    let server = listener.accept().await.expect("accept");

    let big: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
    client.send(&big).await.expect("send big message");

    let received_big = receive_with_timeout(&server, RECEIVE_DEADLINE)
        .await
        .expect("receive timed out")
        .expect("receive errored");
    assert_eq!(received_big, big);

    let small = b"after the big one".to_vec();
    client.send(&small).await.expect("send follow-up");

    let received_small = receive_with_timeout(&server, RECEIVE_DEADLINE)
        .await
        .expect("receive timed out")
        .expect("receive errored");
    assert_eq!(received_small, small);
}

/// An empty message is a degenerate single "chunk" of length zero and
/// still round-trips through the fast path.
#[tokio::test]
async fn empty_message_round_trips() {
    let (listener, addr) = start_listener().await;

    let client = duskrail::dial(addr, &fast_config()).await.expect("dial");
    let server = listener.accept().await.expect("accept");

    client.send(&[]).await.expect("send empty message");

    let received = receive_with_timeout(&server, RECEIVE_DEADLINE)
        .await
        .expect("receive timed out")
        .expect("receive errored");
    assert!(received.is_empty());
}
