//! Textual node identifiers and their structured form.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Identifier part of a [`NodeAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// `i=<u32>`
    Numeric(u32),
    /// `s=<text>`
    String(String),
    /// `g=<8-4-4-4-12 hex>`, kept in its textual form.
    Guid(String),
}

/// Structured address of a node: namespace index plus identifier.
///
/// # Examples
///
/// ```
/// use opc_ua_client::{Identifier, NodeAddress};
///
/// let addr: NodeAddress = "ns=2;i=1001".parse().unwrap();
/// assert_eq!(addr.namespace, 2);
/// assert_eq!(addr.identifier, Identifier::Numeric(1001));
///
/// let state = NodeAddress::parse("i=2259").unwrap();
/// assert_eq!(state, NodeAddress::SERVER_STATE);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeAddress {
    /// `Server_ServerStatus_State`
    pub const SERVER_STATE: Self = Self::numeric(0, 2259);
    /// `Server_ServerStatus_BuildInfo_ProductName`
    pub const PRODUCT_NAME: Self = Self::numeric(0, 2261);
    /// `Server_ServerStatus_BuildInfo_ManufacturerName`
    pub const MANUFACTURER_NAME: Self = Self::numeric(0, 2262);
    /// `Server_ServerStatus_BuildInfo_SoftwareVersion`
    pub const SOFTWARE_VERSION: Self = Self::numeric(0, 2263);

    pub const fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    /// Parses `ns=<N>;<kind>=<id>` or `<kind>=<id>` (namespace 0).
    ///
    /// Never substitutes a default for a malformed part: every failure is
    /// reported as a [`ParseError`].
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let s = text.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let (namespace, identifier_part) = if let Some(rest) = s.strip_prefix("ns=") {
            let Some((ns_str, id_part)) = rest.split_once(';') else {
                return Err(ParseError::MissingIdentifier(s.to_string()));
            };
            let ns = parse_digits::<u16>(ns_str)
                .ok_or_else(|| ParseError::InvalidNamespace(ns_str.to_string()))?;
            if id_part.is_empty() {
                return Err(ParseError::MissingIdentifier(s.to_string()));
            }
            (ns, id_part)
        } else {
            (0, s)
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value = parse_digits::<u32>(id)
                .ok_or_else(|| ParseError::InvalidNumeric(id.to_string()))?;
            Identifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(ParseError::MissingIdentifier(s.to_string()));
            }
            Identifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            if !is_guid(id) {
                return Err(ParseError::InvalidGuid(id.to_string()));
            }
            Identifier::Guid(id.to_ascii_lowercase())
        } else {
            return Err(ParseError::UnsupportedKind(s.to_string()));
        };

        Ok(Self {
            namespace,
            identifier,
        })
    }
}

/// Unsigned decimal made of ASCII digits only. `from_str` alone would also
/// take a leading '+'.
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_guid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let expected = [8, 4, 4, 4, 12];
    groups.len() == expected.len()
        && groups
            .iter()
            .zip(expected)
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

impl FromStr for NodeAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "i={v}"),
            Identifier::String(v) => write!(f, "s={v}"),
            Identifier::Guid(v) => write!(f, "g={v}"),
        }
    }
}
