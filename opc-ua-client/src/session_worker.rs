use crate::backend::connector::TransportConnector;
use crate::error::{OpcError, OpcResult, ReadError};
use crate::node_address::NodeAddress;
use crate::probe::{ServerInfo, probe};
use crate::provider::NodeReading;
use crate::session::{NodeReader, ProtocolSession, SessionState};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub enum SessionRequest {
    Connect {
        endpoint: String,
        reply: oneshot::Sender<OpcResult<ServerInfo>>,
    },
    Disconnect {
        reply: oneshot::Sender<OpcResult<bool>>,
    },
    ReadNode {
        address: NodeAddress,
        reply: oneshot::Sender<OpcResult<NodeReading>>,
    },
    ServerInfo {
        reply: oneshot::Sender<OpcResult<ServerInfo>>,
    },
    State {
        reply: oneshot::Sender<OpcResult<SessionState>>,
    },
}

/// Dedicated OS thread that exclusively owns the [`ProtocolSession`].
///
/// The `opcua` client blocks and drives its own runtime, so it never runs on
/// the caller's async executor. Requests are processed one at a time in
/// arrival order.
pub struct SessionWorker {
    sender: Option<mpsc::Sender<SessionRequest>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SessionWorker {
    pub fn start<C: TransportConnector + 'static>(connector: Arc<C>) -> OpcResult<Self> {
        let (tx, mut rx) = mpsc::channel::<SessionRequest>(32);

        let handle = std::thread::Builder::new()
            .name("opcua-session".into())
            .spawn(move || {
                let mut session = ProtocolSession::new(connector);

                while let Some(req) = rx.blocking_recv() {
                    match req {
                        SessionRequest::Connect { endpoint, reply } => {
                            let span = tracing::info_span!("opcua.connect", endpoint = %endpoint);
                            let _enter = span.enter();
                            let result = match session.connect(&endpoint) {
                                Ok(()) if reply.is_closed() => None,
                                Ok(()) => Some(Ok(probe(&session))),
                                Err(e) => Some(Err(OpcError::from(e))),
                            };
                            // A caller that gave up was told the connect
                            // failed, so the session must not stay up.
                            let delivered = match result {
                                Some(result) => reply.send(result).is_ok(),
                                None => false,
                            };
                            if !delivered && session.disconnect() {
                                tracing::warn!("Connect abandoned by caller, session rolled back");
                            }
                        }
                        SessionRequest::Disconnect { reply } => {
                            let span = tracing::info_span!("opcua.disconnect");
                            let _enter = span.enter();
                            let _ = reply.send(Ok(session.disconnect()));
                        }
                        SessionRequest::ReadNode { address, reply } => {
                            let span = tracing::info_span!("opcua.read_node", node = %address);
                            let _enter = span.enter();
                            let result = session.read_node(&address).map_err(OpcError::from);
                            let _ = reply.send(result);
                        }
                        SessionRequest::ServerInfo { reply } => {
                            let span = tracing::info_span!("opcua.server_info");
                            let _enter = span.enter();
                            let result = if session.is_connected() {
                                Ok(probe(&session))
                            } else {
                                Err(OpcError::Read(ReadError::NotConnected))
                            };
                            let _ = reply.send(result);
                        }
                        SessionRequest::State { reply } => {
                            let _ = reply.send(Ok(session.state()));
                        }
                    }
                }

                if session.disconnect() {
                    tracing::info!("Session closed on worker shutdown");
                }
                tracing::debug!("Session worker thread exiting cleanly");
            })
            .map_err(|e| OpcError::Internal(format!("failed to spawn session worker: {e}")))?;

        tracing::debug!("Session worker thread started");

        Ok(Self {
            sender: Some(tx),
            handle: Some(handle),
        })
    }

    pub async fn send_request<F, R>(&self, req_builder: F) -> OpcResult<R>
    where
        F: FnOnce(oneshot::Sender<OpcResult<R>>) -> SessionRequest,
    {
        if self
            .handle
            .as_ref()
            .is_some_and(std::thread::JoinHandle::is_finished)
        {
            tracing::error!("Session worker thread panicked or exited unexpectedly");
            return Err(OpcError::Internal("session worker thread panicked".into()));
        }

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| OpcError::Internal("session worker already shut down".into()))?;

        let (tx, rx) = oneshot::channel();
        let req = req_builder(tx);

        sender.send(req).await.map_err(|_| {
            OpcError::Internal("session worker channel closed (worker stopped)".into())
        })?;

        rx.await
            .map_err(|_| OpcError::Internal("session worker shut down during request".into()))?
    }

    /// Close the request channel and wait for the worker to disconnect and
    /// exit. Idempotent.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Session worker thread panicked during shutdown");
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
