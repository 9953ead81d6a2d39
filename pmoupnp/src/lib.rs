//! # pmoupnp - UPnP AV control point building blocks
//!
//! Everything the bridge needs to talk to UPnP MediaRenderers:
//!
//! - [`ssdp`] : M-SEARCH / NOTIFY handling on the SSDP multicast group
//! - [`description`] : `description.xml` and SCPD parsing
//! - [`soap`] : SOAP request building and response/fault decoding
//! - [`service`] : [`ServiceHandle`], the callable view of a device service
//! - [`device`] : [`Device`], a discovered device with its service handles
//! - [`discovery`] : turns SSDP traffic into [`DeviceEvent`]s
//! - [`time`] : `H:MM:SS` conversions used by AVTransport

pub mod description;
pub mod device;
pub mod discovery;
pub mod errors;
pub mod service;
pub mod soap;
pub mod ssdp;
pub mod time;

mod xml_utils;

pub use device::Device;
pub use discovery::{DeviceDiscovery, DeviceEvent, DeviceFilter, DiscoveryConfig};
pub use errors::{ActionError, UpnpError};
pub use service::{ActionResult, ServiceHandle, SoapService};

/// Device type of a UPnP AV MediaRenderer
pub const MEDIA_RENDERER_DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

/// Service id of the ConnectionManager service
pub const CONNECTION_MANAGER_SERVICE_ID: &str = "urn:upnp-org:serviceId:ConnectionManager";

/// Service id of the AVTransport service
pub const AVTRANSPORT_SERVICE_ID: &str = "urn:upnp-org:serviceId:AVTransport";
