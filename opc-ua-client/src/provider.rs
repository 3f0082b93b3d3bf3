use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::OpcResult;
use crate::node_address::NodeAddress;
use crate::probe::ServerInfo;

#[cfg(feature = "test-support")]
use mockall::automock;

/// Decoded scalar value of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    /// The server returned no value.
    Empty,
    Boolean(bool),
    /// Any signed integer type (`SByte` through `Int64`).
    Int(i64),
    /// Any unsigned integer type (`Byte` through `UInt64`).
    UInt(u64),
    /// `Float` or `Double`.
    Float(f64),
    /// `String` or the text of a `LocalizedText`.
    String(String),
    DateTime(DateTime<Utc>),
    /// Types without a dedicated rendering, pre-formatted by the backend.
    Other(String),
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) | Self::Other(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        }
    }
}

/// A successful single-node read.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReading {
    pub value: NodeValue,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl NodeReading {
    pub const fn new(value: NodeValue) -> Self {
        Self {
            value,
            source_timestamp: None,
            server_timestamp: None,
        }
    }
}

/// Async facade over the single OPC UA session.
///
/// This is the capability interface the command layer depends on; tests
/// substitute `MockOpcUaProvider` (feature `test-support`).
#[cfg_attr(feature = "test-support", automock)]
#[async_trait]
pub trait OpcUaProvider: Send + Sync {
    /// Connect to `endpoint`, replacing any live session, then probe the
    /// server diagnostics.
    ///
    /// # Errors
    /// Returns `Err` if the transport cannot be created or the handshake
    /// fails; the session is left disconnected in both cases. Probe failures
    /// never fail the connect.
    async fn connect(&self, endpoint: &str) -> OpcResult<ServerInfo>;

    /// Close the live session, if any.
    ///
    /// Returns `true` when a session was actually closed.
    ///
    /// # Errors
    /// Only fails if the session worker is gone.
    async fn disconnect(&self) -> OpcResult<bool>;

    /// Read the value attribute of one node.
    ///
    /// # Errors
    /// Returns `Err` when not connected, on transport failure, on an empty
    /// response, or when the per-node status is not Good.
    async fn read_node(&self, address: NodeAddress) -> OpcResult<NodeReading>;

    /// Re-run the diagnostics probe on the live session.
    ///
    /// # Errors
    /// Returns `Err` when not connected.
    async fn server_info(&self) -> OpcResult<ServerInfo>;
}
