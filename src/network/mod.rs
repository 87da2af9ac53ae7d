//! Transport layer
//!
//! The request engine only talks to the `Transport` trait; `HttpTransport`
//! is the reqwest-backed implementation used outside of tests.

mod client;
#[cfg(test)]
pub(crate) mod scripted;
mod transport;

pub use client::HttpTransport;
pub use transport::{CancelSignal, Transport, TransportError, TransportRequest};
