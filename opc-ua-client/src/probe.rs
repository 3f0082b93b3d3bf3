//! Server identity probe over the well-known diagnostic nodes.

use std::fmt::Write as _;

use crate::node_address::NodeAddress;
use crate::provider::NodeValue;
use crate::session::{NodeReader, SessionState};

const HEADER: &str = "=== Server Information ===";
const FOOTER: &str = "==========================";

/// Snapshot of the server's build info and state.
///
/// Each field is `None` when its read failed. A successfully read empty
/// string stays `Some("")` and is rendered as `(empty)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub product_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub software_version: Option<String>,
    pub server_state: Option<String>,
}

impl ServerInfo {
    /// Number of fields that were read successfully.
    pub fn present_count(&self) -> usize {
        [
            &self.product_name,
            &self.manufacturer_name,
            &self.software_version,
            &self.server_state,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// Name of a `ServerState` enumeration value.
pub const fn server_state_name(value: i64) -> Option<&'static str> {
    match value {
        0 => Some("Running"),
        1 => Some("Failed"),
        2 => Some("NoConfiguration"),
        3 => Some("Suspended"),
        4 => Some("Shutdown"),
        5 => Some("Test"),
        6 => Some("CommunicationFault"),
        7 => Some("Unknown"),
        _ => None,
    }
}

/// Read the four diagnostic nodes. Never fails as a whole: each failed read
/// leaves its field absent.
pub fn probe<R: NodeReader + ?Sized>(reader: &R) -> ServerInfo {
    if reader.state() != SessionState::Connected {
        tracing::debug!("probe skipped: session not connected");
        return ServerInfo::default();
    }

    let read_text = |address: &NodeAddress, field: &'static str| -> Option<String> {
        match reader.read_node(address) {
            Ok(reading) => Some(reading.value.to_string()),
            Err(e) => {
                tracing::warn!(node = %address, field, error = %e, "Server info field unavailable");
                None
            }
        }
    };

    let server_state = match reader.read_node(&NodeAddress::SERVER_STATE) {
        Ok(reading) => Some(match reading.value {
            NodeValue::Int(v) => server_state_name(v).map_or_else(|| v.to_string(), str::to_string),
            NodeValue::UInt(v) => i64::try_from(v)
                .ok()
                .and_then(server_state_name)
                .map_or_else(|| v.to_string(), str::to_string),
            other => other.to_string(),
        }),
        Err(e) => {
            tracing::warn!(node = %NodeAddress::SERVER_STATE, field = "server_state", error = %e, "Server info field unavailable");
            None
        }
    };

    let info = ServerInfo {
        product_name: read_text(&NodeAddress::PRODUCT_NAME, "product_name"),
        manufacturer_name: read_text(&NodeAddress::MANUFACTURER_NAME, "manufacturer_name"),
        software_version: read_text(&NodeAddress::SOFTWARE_VERSION, "software_version"),
        server_state,
    };

    tracing::info!(present = info.present_count(), "Server info probe completed");
    info
}

/// Human-readable block listing only the present fields.
pub fn render(info: &ServerInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{HEADER}");
    let rows = [
        ("Product:", &info.product_name),
        ("Manufacturer:", &info.manufacturer_name),
        ("Version:", &info.software_version),
        ("State:", &info.server_state),
    ];
    for (label, value) in rows {
        if let Some(v) = value {
            let shown = if v.is_empty() { "(empty)" } else { v.as_str() };
            let _ = writeln!(out, "{label:<14}{shown}");
        }
    }
    let _ = writeln!(out, "{FOOTER}");
    out
}
