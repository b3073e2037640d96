//! `duskrail`: a connection-oriented, authenticated, encrypted session
//! transport over UDP.
//!
//! Establishing a session (spec §4.7, §4.8):
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = duskrail_core::config::Config::load()?;
//! let listener = duskrail::listen("0.0.0.0:9100".parse()?, config.clone()).await?;
//! let _ = tokio::spawn(async move { listener.accept().await });
//!
//! let session = duskrail::dial("127.0.0.1:9100".parse()?, &config).await?;
//! session.send(b"hello").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Everything below the handshake — framing, crypto, compression, and
//! reassembly — lives in `duskrail_core`; this crate adds the networking:
//! the dialer and listener state machines and the per-session send/receive
//! pipeline built on top of them.

pub mod dialer;
pub mod error;
pub mod listener;
pub mod session;

pub use dialer::dial;
pub use error::{DialError, ListenError, SessionError};
pub use listener::{listen, Listener};
pub use session::{Role, Session};
