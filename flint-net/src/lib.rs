//! # Flint Networking
//!
//! Endpoint types shared by the transport, configuration and topology layers.

pub mod address;

pub use address::{parse_addresses, Address};
