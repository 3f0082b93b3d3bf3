use crate::backend::connector::TransportConnector;
use crate::error::OpcResult;
use crate::node_address::NodeAddress;
use crate::probe::ServerInfo;
use crate::provider::{NodeReading, OpcUaProvider};
use crate::session::SessionState;
use crate::session_worker::{SessionRequest, SessionWorker};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "opcua-backend")]
use crate::backend::opcua::{ClientOptions, UaConnector};

/// Concrete [`OpcUaProvider`] backed by a [`SessionWorker`].
///
/// All calls are forwarded to the worker thread, so one client serializes
/// every session operation. Dropping the client closes any live session.
pub struct OpcUaClient {
    worker: SessionWorker,
}

impl OpcUaClient {
    /// Creates a new `OpcUaClient` over the given connector.
    pub fn new<C: TransportConnector + 'static>(connector: C) -> OpcResult<Self> {
        tracing::info!("Initializing OpcUaClient...");
        let worker = SessionWorker::start(Arc::new(connector))?;
        tracing::info!("OpcUaClient initialized successfully");
        Ok(Self { worker })
    }

    /// Creates a client using the `opcua` stack with the given options.
    #[cfg(feature = "opcua-backend")]
    pub fn with_options(options: ClientOptions) -> OpcResult<Self> {
        Self::new(UaConnector::new(options))
    }

    /// Current connection state of the underlying session.
    pub async fn state(&self) -> OpcResult<SessionState> {
        self.worker
            .send_request(|reply| SessionRequest::State { reply })
            .await
    }
}

#[async_trait]
impl OpcUaProvider for OpcUaClient {
    async fn connect(&self, endpoint: &str) -> OpcResult<ServerInfo> {
        let endpoint_owned = endpoint.to_string();
        self.worker
            .send_request(|reply| SessionRequest::Connect {
                endpoint: endpoint_owned,
                reply,
            })
            .await
    }

    async fn disconnect(&self) -> OpcResult<bool> {
        self.worker
            .send_request(|reply| SessionRequest::Disconnect { reply })
            .await
    }

    async fn read_node(&self, address: NodeAddress) -> OpcResult<NodeReading> {
        self.worker
            .send_request(|reply| SessionRequest::ReadNode { address, reply })
            .await
    }

    async fn server_info(&self) -> OpcResult<ServerInfo> {
        self.worker
            .send_request(|reply| SessionRequest::ServerInfo { reply })
            .await
    }
}
