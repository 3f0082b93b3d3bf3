//! Transport boundary and the backends that implement it.
//!
//! The real backend is gated behind the `opcua-backend` feature.

pub mod connector;

#[cfg(feature = "opcua-backend")]
pub mod opcua;
