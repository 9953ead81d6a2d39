//! # SOAP for UPnP control points
//!
//! Builds action requests and decodes what renderers send back: either an
//! `<ActionName>Response` element with output arguments or a SOAP fault
//! carrying a UPnP error code.
//!
//! ```
//! use pmoupnp::soap::{build_soap_request, parse_action_response, SoapOutcome};
//!
//! let body = build_soap_request(
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "GetTransportInfo",
//!     &[("InstanceID", "0")],
//! ).unwrap();
//! assert!(body.contains("<InstanceID>0</InstanceID>"));
//!
//! let reply = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
//!   <u:GetTransportInfoResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
//!     <CurrentTransportState>PLAYING</CurrentTransportState>
//!   </u:GetTransportInfoResponse></s:Body></s:Envelope>"#;
//! match parse_action_response(reply.as_bytes(), "GetTransportInfo").unwrap() {
//!     SoapOutcome::Response(out) => assert_eq!(out["CurrentTransportState"], "PLAYING"),
//!     SoapOutcome::Fault(_) => unreachable!(),
//! }
//! ```

mod builder;
mod fault;
mod parser;

pub use builder::{SOAP_ENCODING_NS, SOAP_ENVELOPE_NS, build_soap_request, soap_action_header};
pub use fault::{SoapFault, UpnpFaultDetail};
pub use parser::{SoapOutcome, parse_action_response};

/// UPnP error codes the bridge cares about
pub mod error_codes {
    /// Invalid action
    pub const INVALID_ACTION: &str = "401";

    /// Invalid arguments
    pub const INVALID_ARGS: &str = "402";

    /// Action failed
    pub const ACTION_FAILED: &str = "501";

    /// AVTransport: transition not available
    pub const TRANSITION_NOT_AVAILABLE: &str = "701";

    /// AVTransport: seek mode not supported
    pub const SEEK_MODE_NOT_SUPPORTED: &str = "710";

    /// AVTransport: invalid InstanceID, the renderer has no transport to act on
    pub const INVALID_INSTANCE_ID: &str = "718";
}
