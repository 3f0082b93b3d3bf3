//! The single OPC UA session and its connection lifecycle.

use std::fmt;
use std::sync::Arc;

use crate::backend::connector::{ReadRequest, TransportConnector, TransportHandle};
use crate::error::{ConnectError, ReadError, status_of};
use crate::node_address::NodeAddress;
use crate::provider::{NodeReading, NodeValue};

/// Connection state of a [`ProtocolSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Anything that can read a single node; lets the probe run against fakes.
pub trait NodeReader {
    fn state(&self) -> SessionState;

    fn read_node(&self, address: &NodeAddress) -> Result<NodeReading, ReadError>;
}

/// Owns at most one live transport handle.
///
/// Not internally synchronized: callers serialize access (the
/// [`SessionWorker`](crate::session_worker::SessionWorker) owns it on a
/// single thread). Dropping the session closes the handle.
pub struct ProtocolSession<C: TransportConnector> {
    connector: Arc<C>,
    handle: Option<C::Handle>,
    endpoint: Option<String>,
}

impl<C: TransportConnector> ProtocolSession<C> {
    pub const fn new(connector: Arc<C>) -> Self {
        Self {
            connector,
            handle: None,
            endpoint: None,
        }
    }

    /// Endpoint of the live session.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub const fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Establish a session to `endpoint`.
    ///
    /// A live session is fully closed before the new transport is built, so
    /// two handles never coexist. On failure the session stays disconnected.
    pub fn connect(&mut self, endpoint: &str) -> Result<(), ConnectError> {
        if let Some(previous) = self.endpoint.clone() {
            tracing::info!(
                previous = %previous,
                endpoint = %endpoint,
                "Already connected, disconnecting first"
            );
            self.disconnect();
        }

        if endpoint.trim().is_empty() {
            return Err(ConnectError::CreateFailed {
                endpoint: endpoint.to_string(),
                reason: "endpoint cannot be empty".into(),
            });
        }

        tracing::info!(endpoint = %endpoint, "Connecting");

        let mut handle = self.connector.create(endpoint).map_err(|e| {
            tracing::error!(endpoint = %endpoint, error = ?e, "Client creation failed");
            ConnectError::CreateFailed {
                endpoint: endpoint.to_string(),
                reason: format!("{e:#}"),
            }
        })?;

        if let Err(e) = handle.connect() {
            tracing::error!(endpoint = %endpoint, error = ?e, "Handshake failed");
            drop(handle);
            return Err(ConnectError::HandshakeFailed {
                endpoint: endpoint.to_string(),
                reason: format!("{e:#}"),
                status: status_of(&e),
            });
        }

        self.handle = Some(handle);
        self.endpoint = Some(endpoint.to_string());
        tracing::info!(endpoint = %endpoint, "Connected");
        Ok(())
    }

    /// Close the live session. Idempotent; returns `true` if a handle was
    /// actually closed.
    pub fn disconnect(&mut self) -> bool {
        let endpoint = self.endpoint.take();
        match self.handle.take() {
            Some(mut handle) => {
                tracing::info!(endpoint = ?endpoint, "Disconnecting");
                handle.close();
                true
            }
            None => false,
        }
    }
}

impl<C: TransportConnector> NodeReader for ProtocolSession<C> {
    fn state(&self) -> SessionState {
        if self.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    fn read_node(&self, address: &NodeAddress) -> Result<NodeReading, ReadError> {
        let handle = self.handle.as_ref().ok_or(ReadError::NotConnected)?;
        let request = ReadRequest::single(address.clone());

        let results = handle.read(&request).map_err(|e| {
            tracing::debug!(node = %address, error = ?e, "Read transport failure");
            ReadError::TransportFailure(format!("{e:#}"))
        })?;

        let Some(result) = results.into_iter().next() else {
            return Err(ReadError::EmptyResult);
        };

        if !result.status.is_good() {
            tracing::debug!(node = %address, status = %result.status, "Read returned bad status");
            return Err(ReadError::BadStatus(result.status));
        }

        tracing::trace!(
            node = %address,
            source_timestamp = ?result.source_timestamp,
            server_timestamp = ?result.server_timestamp,
            "Read completed"
        );

        Ok(NodeReading {
            value: result.value.unwrap_or(NodeValue::Empty),
            source_timestamp: result.source_timestamp,
            server_timestamp: result.server_timestamp,
        })
    }
}

impl<C: TransportConnector> Drop for ProtocolSession<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::connector::{ReadResult, Timestamps};
    use crate::error::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fake transport that counts live handles and serves canned reads.
    #[derive(Default)]
    pub(crate) struct FakeConnector {
        pub live: Arc<AtomicUsize>,
        pub created: AtomicUsize,
        pub closed: Arc<AtomicUsize>,
        pub fail_create: Mutex<Vec<String>>,
        pub fail_handshake: Mutex<Vec<String>>,
        pub values: HashMap<NodeAddress, Result<ReadResult, String>>,
        pub last_request: Arc<Mutex<Option<ReadRequest>>>,
        /// Blocks each handshake this long, like a slow server.
        pub connect_delay: Option<Duration>,
    }

    impl FakeConnector {
        pub(crate) fn with_values(values: HashMap<NodeAddress, Result<ReadResult, String>>) -> Self {
            Self {
                values,
                ..Self::default()
            }
        }

        pub(crate) fn live_handles(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct FakeHandle {
        connected: bool,
        handshake_fails: bool,
        live: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        values: HashMap<NodeAddress, Result<ReadResult, String>>,
        last_request: Arc<Mutex<Option<ReadRequest>>>,
        connect_delay: Option<Duration>,
    }

    impl TransportConnector for FakeConnector {
        type Handle = FakeHandle;

        fn create(&self, endpoint: &str) -> anyhow::Result<FakeHandle> {
            if self.fail_create.lock().unwrap().iter().any(|e| e == endpoint) {
                anyhow::bail!("cannot build client for {endpoint}");
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeHandle {
                connected: false,
                handshake_fails: self
                    .fail_handshake
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|e| e == endpoint),
                live: Arc::clone(&self.live),
                closed: Arc::clone(&self.closed),
                values: self.values.clone(),
                last_request: Arc::clone(&self.last_request),
                connect_delay: self.connect_delay,
            })
        }
    }

    impl TransportHandle for FakeHandle {
        fn connect(&mut self) -> anyhow::Result<()> {
            if let Some(delay) = self.connect_delay {
                std::thread::sleep(delay);
            }
            if self.handshake_fails {
                return Err(anyhow::Error::new(StatusCode::BAD_TIMEOUT).context("activate session"));
            }
            self.connected = true;
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) {
            if self.connected {
                self.connected = false;
                self.live.fetch_sub(1, Ordering::SeqCst);
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<ReadResult>> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            let node = &request.nodes[0];
            match self.values.get(node) {
                Some(Ok(result)) => Ok(vec![result.clone()]),
                Some(Err(msg)) => anyhow::bail!("{msg}"),
                None => Ok(Vec::new()),
            }
        }
    }

    pub(crate) fn good(value: NodeValue) -> ReadResult {
        ReadResult {
            status: StatusCode::GOOD,
            value: Some(value),
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    pub(crate) fn bad(status: StatusCode) -> ReadResult {
        ReadResult {
            status,
            value: None,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let session = ProtocolSession::new(Arc::new(FakeConnector::default()));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.endpoint(), None);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let connector = Arc::new(FakeConnector::default());
        let mut session = ProtocolSession::new(Arc::clone(&connector));

        session.connect("opc.tcp://plc:4840").unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.endpoint(), Some("opc.tcp://plc:4840"));
        assert_eq!(connector.live_handles(), 1);

        assert!(session.disconnect());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.live_handles(), 0);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let connector = Arc::new(FakeConnector::default());
        let mut session = ProtocolSession::new(Arc::clone(&connector));
        session.connect("opc.tcp://plc:4840").unwrap();

        assert!(session.disconnect());
        assert!(!session.disconnect());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);

        let mut never_connected = ProtocolSession::new(Arc::new(FakeConnector::default()));
        assert!(!never_connected.disconnect());
    }

    #[test]
    fn test_reconnect_keeps_single_live_handle() {
        let connector = Arc::new(FakeConnector::default());
        let mut session = ProtocolSession::new(Arc::clone(&connector));

        session.connect("opc.tcp://a:4840").unwrap();
        session.connect("opc.tcp://b:4840").unwrap();

        assert_eq!(connector.live_handles(), 1);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
        assert_eq!(session.endpoint(), Some("opc.tcp://b:4840"));
    }

    #[test]
    fn test_failed_reconnect_leaves_disconnected() {
        let connector = Arc::new(FakeConnector::default());
        connector
            .fail_handshake
            .lock()
            .unwrap()
            .push("opc.tcp://down:4840".into());
        let mut session = ProtocolSession::new(Arc::clone(&connector));

        session.connect("opc.tcp://a:4840").unwrap();
        let err = session.connect("opc.tcp://down:4840").unwrap_err();

        assert!(matches!(err, ConnectError::HandshakeFailed { .. }));
        assert_eq!(err.status(), Some(StatusCode::BAD_TIMEOUT));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.live_handles(), 0);
    }

    #[test]
    fn test_create_failure_leaves_disconnected() {
        let connector = Arc::new(FakeConnector::default());
        connector
            .fail_create
            .lock()
            .unwrap()
            .push("opc.tcp://bad:4840".into());
        let mut session = ProtocolSession::new(Arc::clone(&connector));

        let err = session.connect("opc.tcp://bad:4840").unwrap_err();
        assert!(matches!(err, ConnectError::CreateFailed { .. }));
        assert!(err.to_string().contains("cannot build client"));
        assert_eq!(session.state(), SessionState::Disconnected);

        let err = session.connect("  ").unwrap_err();
        assert!(matches!(err, ConnectError::CreateFailed { .. }));
        assert_eq!(connector.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_closes_live_handle() {
        let connector = Arc::new(FakeConnector::default());
        {
            let mut session = ProtocolSession::new(Arc::clone(&connector));
            session.connect("opc.tcp://plc:4840").unwrap();
            assert_eq!(connector.live_handles(), 1);
        }
        assert_eq!(connector.live_handles(), 0);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_requires_connection() {
        let session = ProtocolSession::new(Arc::new(FakeConnector::default()));
        assert_eq!(
            session.read_node(&NodeAddress::PRODUCT_NAME),
            Err(ReadError::NotConnected)
        );
    }

    #[test]
    fn test_read_outcomes() {
        let mut values = HashMap::new();
        values.insert(
            NodeAddress::PRODUCT_NAME,
            Ok(good(NodeValue::String("Demo Server".into()))),
        );
        values.insert(
            NodeAddress::SOFTWARE_VERSION,
            Ok(bad(StatusCode::BAD_NOT_READABLE)),
        );
        values.insert(NodeAddress::SERVER_STATE, Err("socket reset".into()));
        let connector = Arc::new(FakeConnector::with_values(values));
        let mut session = ProtocolSession::new(Arc::clone(&connector));
        session.connect("opc.tcp://plc:4840").unwrap();

        let reading = session.read_node(&NodeAddress::PRODUCT_NAME).unwrap();
        assert_eq!(reading.value, NodeValue::String("Demo Server".into()));

        assert_eq!(
            session.read_node(&NodeAddress::SOFTWARE_VERSION),
            Err(ReadError::BadStatus(StatusCode::BAD_NOT_READABLE))
        );
        assert!(matches!(
            session.read_node(&NodeAddress::SERVER_STATE),
            Err(ReadError::TransportFailure(msg)) if msg.contains("socket reset")
        ));
        assert_eq!(
            session.read_node(&NodeAddress::MANUFACTURER_NAME),
            Err(ReadError::EmptyResult)
        );
    }

    #[test]
    fn test_read_accepts_good_subcodes_only() {
        let good_subcode = StatusCode(0x00A0_0000);
        let uncertain = StatusCode(0x4000_0000);
        let mut values = HashMap::new();
        values.insert(
            NodeAddress::PRODUCT_NAME,
            Ok(ReadResult {
                status: good_subcode,
                ..good(NodeValue::String("Demo Server".into()))
            }),
        );
        values.insert(
            NodeAddress::SOFTWARE_VERSION,
            Ok(ReadResult {
                status: uncertain,
                ..good(NodeValue::String("1.0".into()))
            }),
        );
        let connector = Arc::new(FakeConnector::with_values(values));
        let mut session = ProtocolSession::new(Arc::clone(&connector));
        session.connect("opc.tcp://plc:4840").unwrap();

        let reading = session.read_node(&NodeAddress::PRODUCT_NAME).unwrap();
        assert_eq!(reading.value, NodeValue::String("Demo Server".into()));
        assert_eq!(
            session.read_node(&NodeAddress::SOFTWARE_VERSION),
            Err(ReadError::BadStatus(uncertain))
        );
    }

    #[test]
    fn test_read_request_shape() {
        let mut values = HashMap::new();
        values.insert(NodeAddress::SERVER_STATE, Ok(good(NodeValue::Int(0))));
        let connector = Arc::new(FakeConnector::with_values(values));
        let mut session = ProtocolSession::new(Arc::clone(&connector));
        session.connect("opc.tcp://plc:4840").unwrap();

        session.read_node(&NodeAddress::SERVER_STATE).unwrap();

        let request = connector.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.nodes, vec![NodeAddress::SERVER_STATE]);
        assert_eq!(request.timestamps, Timestamps::Both);
        assert!((request.max_age - 2000.0).abs() < f64::EPSILON);
    }
}
