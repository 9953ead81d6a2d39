use pmoupnp::{ActionError, UpnpError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Another AirPlay client holds the device.
    #[error("Device is busy")]
    DeviceBusy,
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("Invalid value from renderer: {0}")]
    Upnp(#[from] UpnpError),
    #[error("Device {udn} has no service {service_id}")]
    MissingService { udn: String, service_id: String },
    #[error("Unknown device {0}")]
    UnknownDevice(String),
    #[error("No free port at or above {0}")]
    NoFreePort(u16),
    #[error("Endpoint error: {0}")]
    Endpoint(String),
}
