//! Wire format, cryptographic primitives, compression, the reassembly
//! buffer, and configuration for the duskrail UDP session transport.
//!
//! This crate has no networking of its own — see the `duskrail` crate for
//! the session, listener, and handshake state machine built on top of it.

pub mod compress;
pub mod config;
pub mod crypto;
pub mod reassembly;
pub mod wire;

pub use reassembly::ReassemblyBuffer;
pub use wire::{Frame, PacketHeader, Type, WireError};
