//! S6: two dialers completing the handshake against one listener at the
//! same time get distinct ConnectionIDs, both land in `accept()`, and
//! their messages never cross-contaminate.

use std::time::Duration;

use crate::harness::{fast_config, receive_with_timeout, start_listener};

const RECEIVE_DEADLINE: Duration = Duration::from_secs(2);

#[tokio::test]
async fn two_concurrent_dialers_get_independent_non_crossing_sessions() {
    let (listener, addr) = start_listener().await;

    let (client_a, client_b) = tokio::join!(
        duskrail::dial(addr, &fast_config()),
        duskrail::dial(addr, &fast_config()),
    );
    let client_a = client_a.expect("dial a");
    let client_b = client_b.expect("dial b");
    assert_ne!(client_a.connection_id(), client_b.connection_id());

    let first = listener.accept().await.expect("accept 1");
    let second = listener.accept().await.expect("accept 2");
    assert_ne!(first.connection_id(), second.connection_id());
    assert_eq!(listener.session_count(), 2);

    // Match each accepted server-side session to its dialer by ConnectionID
    // rather than assuming accept order follows dial order.
    let (server_a, server_b) = if first.connection_id() == client_a.connection_id() {
        (first, second)
    } else {
        (second, first)
    };
    assert_eq!(server_b.connection_id(), client_b.connection_id());

    client_a.send(b"message for a").await.expect("send a");
    client_b.send(b"message for b").await.expect("send b");

    let received_a = receive_with_timeout(&server_a, RECEIVE_DEADLINE)
        .await
        .expect("a receive timed out")
        .expect("a receive errored");
    let received_b = receive_with_timeout(&server_b, RECEIVE_DEADLINE)
        .await
        .expect("b receive timed out")
        .expect("b receive errored");

    assert_eq!(received_a, b"message for a");
    assert_eq!(received_b, b"message for b");

    // Cross-check: b's session never saw a's message and vice versa.
    assert!(receive_with_timeout(&server_a, Duration::from_millis(200))
        .await
        .is_none());
    assert!(receive_with_timeout(&server_b, Duration::from_millis(200))
        .await
        .is_none());
}
