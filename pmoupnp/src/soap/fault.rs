//! SOAP faults returned by renderers

use xmltree::Element;

use crate::xml_utils::{child_named, child_text};

/// A SOAP `<Fault>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// SOAP fault code, e.g. `s:Client`
    pub fault_code: String,
    pub fault_string: String,
    /// Content of `<detail><UPnPError>`, when present
    pub upnp_error: Option<UpnpFaultDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpFaultDetail {
    pub error_code: String,
    pub error_description: String,
}

impl SoapFault {
    pub(crate) fn from_element(fault: &Element) -> Self {
        let upnp_error = child_named(fault, "detail")
            .and_then(|detail| child_named(detail, "UPnPError"))
            .map(|err| UpnpFaultDetail {
                error_code: child_text(err, "errorCode").unwrap_or_default(),
                error_description: child_text(err, "errorDescription").unwrap_or_default(),
            });

        SoapFault {
            fault_code: child_text(fault, "faultcode").unwrap_or_default(),
            fault_string: child_text(fault, "faultstring").unwrap_or_default(),
            upnp_error,
        }
    }

    /// The UPnP error code, falling back to the SOAP fault code.
    pub fn code(&self) -> &str {
        match &self.upnp_error {
            Some(err) if !err.error_code.is_empty() => &err.error_code,
            _ => &self.fault_code,
        }
    }

    pub fn description(&self) -> &str {
        match &self.upnp_error {
            Some(err) if !err.error_description.is_empty() => &err.error_description,
            _ => &self.fault_string,
        }
    }
}
