//! # opc-ua-client
//!
//! Minimal OPC UA client library: one session at a time, single-node reads
//! and a server identity probe.
//!
//! ## Features
//! - `opcua-backend` (default): Uses the `opcua` crate for the wire protocol
//! - `test-support`: Enables `MockOpcUaProvider` via `mockall`

pub mod backend;
mod client;
mod error;
mod node_address;
mod probe;
mod provider;
mod session;
mod session_worker;

// Stable public API
pub use client::OpcUaClient;
pub use error::{
    ConnectError, OpcError, OpcResult, ParseError, ReadError, StatusCode, friendly_error_hint,
    friendly_status_hint, status_of,
};
pub use node_address::{Identifier, NodeAddress};
pub use probe::{ServerInfo, probe, render, server_state_name};
pub use provider::{NodeReading, NodeValue, OpcUaProvider};
pub use session::{NodeReader, ProtocolSession, SessionState};

// Backend re-exports (conditional)
#[cfg(feature = "opcua-backend")]
pub use backend::opcua::{ClientOptions, UaConnector};

// Test support re-export
#[cfg(feature = "test-support")]
pub use provider::MockOpcUaProvider;
