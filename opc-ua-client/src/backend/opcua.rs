//! Transport backed by the `opcua` crate (security policy None, anonymous
//! identity).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use opcua::client::prelude::*;
use opcua::sync::RwLock;

use crate::backend::connector::{ReadRequest, ReadResult, Timestamps, TransportConnector, TransportHandle};
use crate::error::StatusCode as Status;
use crate::node_address::{Identifier, NodeAddress};
use crate::provider::NodeValue;

/// Client-side settings applied to every transport the connector builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub application_name: String,
    pub application_uri: String,
    /// Directory for the client's own certificate store.
    pub pki_dir: PathBuf,
    /// Reconnect attempts the stack makes on its own; `0` disables them.
    pub session_retry_limit: i32,
    pub trust_server_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            application_name: "opcli".into(),
            application_uri: "urn:opcli".into(),
            pki_dir: PathBuf::from("pki"),
            session_retry_limit: 0,
            trust_server_certs: true,
        }
    }
}

/// Builds [`UaHandle`]s from [`ClientOptions`].
#[derive(Debug, Clone, Default)]
pub struct UaConnector {
    options: ClientOptions,
}

impl UaConnector {
    pub const fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl TransportConnector for UaConnector {
    type Handle = UaHandle;

    fn create(&self, endpoint: &str) -> anyhow::Result<UaHandle> {
        if !endpoint.starts_with("opc.tcp://") {
            bail!(Status::BAD_TCP_ENDPOINT_URL_INVALID);
        }

        let client = ClientBuilder::new()
            .application_name(self.options.application_name.clone())
            .application_uri(self.options.application_uri.clone())
            .pki_dir(self.options.pki_dir.clone())
            .create_sample_keypair(true)
            .trust_server_certs(self.options.trust_server_certs)
            .session_retry_limit(self.options.session_retry_limit)
            .client()
            .ok_or_else(|| anyhow!("client configuration rejected"))?;

        tracing::debug!(endpoint = %endpoint, "OPC UA client built");

        Ok(UaHandle {
            endpoint: endpoint.to_string(),
            client,
            session: None,
        })
    }
}

/// One `opcua` client plus the session it activated, if any.
pub struct UaHandle {
    endpoint: String,
    client: Client,
    session: Option<Arc<RwLock<Session>>>,
}

impl TransportHandle for UaHandle {
    fn connect(&mut self) -> anyhow::Result<()> {
        let session = self
            .client
            .connect_to_endpoint(
                (
                    self.endpoint.as_str(),
                    SecurityPolicy::None.to_str(),
                    MessageSecurityMode::None,
                    UserTokenPolicy::anonymous(),
                ),
                IdentityToken::Anonymous,
            )
            .map_err(|status| anyhow::Error::new(Status(status.bits())))
            .with_context(|| format!("session with {} not established", self.endpoint))?;

        self.session = Some(session);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.read().disconnect();
            tracing::debug!(endpoint = %self.endpoint, "OPC UA session closed");
        }
    }

    fn read(&self, request: &ReadRequest) -> anyhow::Result<Vec<ReadResult>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow::Error::new(Status::BAD_NOT_CONNECTED))?;

        let nodes_to_read = request
            .nodes
            .iter()
            .map(|address| {
                Ok(ReadValueId {
                    node_id: to_ua_node_id(address)?,
                    attribute_id: AttributeId::Value as u32,
                    index_range: UAString::null(),
                    data_encoding: QualifiedName::null(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let data_values = session
            .read()
            .read(
                &nodes_to_read,
                to_ua_timestamps(request.timestamps),
                request.max_age,
            )
            .map_err(|status| anyhow::Error::new(Status(status.bits())))
            .context("read service call failed")?;

        Ok(data_values.iter().map(to_read_result).collect())
    }
}

impl Drop for UaHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_ua_node_id(address: &NodeAddress) -> anyhow::Result<NodeId> {
    let ns = address.namespace;
    Ok(match &address.identifier {
        Identifier::Numeric(v) => NodeId::new(ns, *v),
        Identifier::String(v) => NodeId::new(ns, UAString::from(v.as_str())),
        Identifier::Guid(v) => {
            let guid = v
                .parse::<Guid>()
                .map_err(|_| anyhow!("invalid GUID '{v}'"))?;
            NodeId::new(ns, guid)
        }
    })
}

const fn to_ua_timestamps(timestamps: Timestamps) -> TimestampsToReturn {
    match timestamps {
        Timestamps::Source => TimestampsToReturn::Source,
        Timestamps::Server => TimestampsToReturn::Server,
        Timestamps::Both => TimestampsToReturn::Both,
        Timestamps::Neither => TimestampsToReturn::Neither,
    }
}

fn to_read_result(data_value: &DataValue) -> ReadResult {
    ReadResult {
        status: data_value
            .status
            .map_or(Status::GOOD, |status| Status(status.bits())),
        value: data_value.value.as_ref().map(from_variant),
        source_timestamp: data_value.source_timestamp.map(|t| t.as_chrono()),
        server_timestamp: data_value.server_timestamp.map(|t| t.as_chrono()),
    }
}

fn from_variant(variant: &Variant) -> NodeValue {
    match variant {
        Variant::Empty => NodeValue::Empty,
        Variant::Boolean(v) => NodeValue::Boolean(*v),
        Variant::SByte(v) => NodeValue::Int(i64::from(*v)),
        Variant::Int16(v) => NodeValue::Int(i64::from(*v)),
        Variant::Int32(v) => NodeValue::Int(i64::from(*v)),
        Variant::Int64(v) => NodeValue::Int(*v),
        Variant::Byte(v) => NodeValue::UInt(u64::from(*v)),
        Variant::UInt16(v) => NodeValue::UInt(u64::from(*v)),
        Variant::UInt32(v) => NodeValue::UInt(u64::from(*v)),
        Variant::UInt64(v) => NodeValue::UInt(*v),
        Variant::Float(v) => NodeValue::Float(f64::from(*v)),
        Variant::Double(v) => NodeValue::Float(*v),
        Variant::String(v) => NodeValue::String(v.as_ref().to_string()),
        Variant::LocalizedText(v) => NodeValue::String(v.text.as_ref().to_string()),
        Variant::DateTime(v) => NodeValue::DateTime(v.as_chrono()),
        other => NodeValue::Other(format!("{other:?}")),
    }
}
