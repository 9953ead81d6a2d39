//! # pmoairplay - AirPlay (v1) receiver endpoint
//!
//! Exposes the HTTP surface an iOS/macOS AirPlay sender talks to and maps
//! every request onto an [`AirPlayOperations`] implementation:
//!
//! - [`server`] : axum router, client gating, start/stop of one endpoint
//! - [`protocol`] : `text/parameters` bodies, plists, scrub bodies
//! - [`bonjour`] : `_airplay._tcp` advertisement through mDNS
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use pmoairplay::{AirPlayOperations, AirPlayServer, ServerInfo};
//! # async fn run(ops: Arc<dyn AirPlayOperations>) -> std::io::Result<()> {
//! let info = ServerInfo::new("uuid:5f9ec1b3-ed59-1900-4530-00a0dea47fb0");
//! let server = AirPlayServer::start("Living Room TV", 22555, ops, info).await?;
//! // ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod bonjour;
pub mod errors;
pub mod operations;
pub mod protocol;
pub mod server;

pub use bonjour::BonjourAdvertiser;
pub use errors::AirPlayError;
pub use operations::AirPlayOperations;
pub use protocol::{PlaybackInfo, ServerInfo};
pub use server::AirPlayServer;
