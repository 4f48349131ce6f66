//! Node identification and metadata

use flint_core::{Error, Result};
use flint_net::Address;
use flint_rpc::NodeDescriptor;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Unique identifier for a node in the cluster
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id, rejecting empty ids
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidArgument("Node id cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// A node of the cluster as seen by the client.
///
/// Identity is the node id; two nodes with the same id are equal regardless
/// of name or address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    id: NodeId,
    name: String,
    address: Address,
}

impl ClusterNode {
    pub fn new(id: NodeId, name: impl Into<String>, address: Address) -> Self {
        Self {
            id,
            name: name.into(),
            address,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Consistent (human readable) node name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn host(&self) -> &str {
        self.address.host()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl PartialEq for ClusterNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClusterNode {}

impl std::hash::Hash for ClusterNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for ClusterNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ClusterNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

impl TryFrom<NodeDescriptor> for ClusterNode {
    type Error = Error;

    fn try_from(descriptor: NodeDescriptor) -> Result<Self> {
        let id = NodeId::new(descriptor.id)
            .map_err(|_| Error::Protocol("Node descriptor without id".to_string()))?;
        let address = Address::new(descriptor.host, descriptor.port).map_err(|e| {
            Error::Protocol(format!("Node {} has an invalid address: {}", id, e))
        })?;
        Ok(Self::new(id, descriptor.name, address))
    }
}
