//! # Flint RPC
//!
//! Request/response transport between the Flint client and cluster nodes.
//!
//! This crate provides:
//! - Length-prefixed framing with JSON, MessagePack or Bincode payloads
//! - A tagged [`Value`] union for job arguments and results
//! - Multiplexed per-node connections with correlation ids and timeouts
//! - The [`Transport`] seam used by the topology and compute layers

pub mod channel;
pub mod client;
pub mod codec;
pub mod protocol;
pub mod transport;
pub mod value;

pub use channel::{ChannelConfig, ClusterChannel};
pub use client::{RpcConnection, RpcConnectionConfig};
pub use codec::{RpcCodec, SerializationFormat, WireProtocol};
pub use protocol::{
    NodeDescriptor, RequestId, RpcError, RpcErrorCode, RpcMessageType, RpcRequest, RpcResponse,
};
pub use transport::Transport;
pub use value::{FromValue, Value, ValueType};
