//! # SSDP - Simple Service Discovery Protocol, control point side
//!
//! - [`SsdpClient`] : M-SEARCH sender and NOTIFY / search-response listener
//! - [`SsdpMessage`] : a parsed announcement
//!
//! The client binds an ephemeral port, never 1900: a device stack on the
//! same host listening on 1900 would otherwise get a share of our unicast
//! replies from the kernel.

mod client;
mod message;

pub use client::SsdpClient;
pub use message::{SsdpMessage, parse_message};

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Validity assumed when an announcement carries no usable `max-age`
pub const DEFAULT_MAX_AGE: u32 = 1800;
