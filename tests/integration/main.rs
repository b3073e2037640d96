//! End-to-end integration tests for the duskrail UDP session transport.
//!
//! Each test drives real `tokio::net::UdpSocket`s over loopback — no mocks,
//! no netns. `harness` holds the shared setup helpers; one file per
//! scenario group below, matching the spec's S1-S6 enumeration.


mod corruption;
mod handshake;
mod messaging;
mod parallel_sessions;
