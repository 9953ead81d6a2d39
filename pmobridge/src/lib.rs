//! # pmobridge - AirPlay to UPnP bridge core
//!
//! Each UPnP MediaRenderer found on the network gets its own
//! [`DeviceSession`] and AirPlay endpoint:
//!
//! - [`session`] : per-device state machine translating AirPlay requests
//!   into AVTransport actions
//! - [`orchestrator`] : [`Bridge`], which follows discovery events and
//!   starts/stops endpoints
//! - [`airplay_endpoint`] : the `pmoairplay` glue
//! - [`assets`] : [`PhotoServer`], where pushed photos are published
//! - [`ports`] : the endpoint port pool
//! - [`web`] : optional status page

pub mod airplay_endpoint;
pub mod assets;
pub mod errors;
pub mod image;
pub mod orchestrator;
pub mod ports;
pub mod session;
pub mod web;

#[cfg(test)]
mod testing;

pub use airplay_endpoint::AirPlayEndpointFactory;
pub use assets::{AssetPublisher, PhotoServer};
pub use errors::BridgeError;
pub use orchestrator::{Bridge, BridgeSettings, CallerEndpoint, DeviceListener, EndpointFactory};
pub use ports::PortPool;
pub use session::{DeviceSession, SessionPhase, SessionState};
pub use web::InteractiveWeb;
