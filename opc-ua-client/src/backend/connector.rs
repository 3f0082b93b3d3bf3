//! Protocol boundary between the session state machine and a concrete
//! OPC UA stack.

use chrono::{DateTime, Utc};

use crate::error::StatusCode;
use crate::node_address::NodeAddress;
use crate::provider::NodeValue;

/// Maximum age in milliseconds of a cached value the server may return.
pub const DEFAULT_MAX_AGE_MS: f64 = 2000.0;

/// Which timestamps the server should attach to each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamps {
    Source,
    Server,
    Both,
    Neither,
}

/// A read service request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub max_age: f64,
    pub nodes: Vec<NodeAddress>,
    pub timestamps: Timestamps,
}

impl ReadRequest {
    /// Value read of a single node, both timestamps, default freshness bound.
    pub fn single(address: NodeAddress) -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE_MS,
            nodes: vec![address],
            timestamps: Timestamps::Both,
        }
    }
}

/// One entry of a read response.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub status: StatusCode,
    pub value: Option<NodeValue>,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// Factory for transport handles (one per connect attempt).
pub trait TransportConnector: Send + Sync {
    type Handle: TransportHandle;

    /// Build a client for `endpoint` without touching the network.
    fn create(&self, endpoint: &str) -> anyhow::Result<Self::Handle>;
}

/// A single client connection to one server endpoint.
///
/// Errors may carry a [`StatusCode`] in their chain; see
/// [`crate::error::status_of`].
pub trait TransportHandle {
    /// Open the secure channel and activate a session.
    fn connect(&mut self) -> anyhow::Result<()>;

    /// Close the session and channel. Best effort; never fails.
    fn close(&mut self);

    fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<ReadResult>>;
}
