//! Device descriptions (`description.xml`) and service SCPDs.

use std::time::Duration;

use tracing::warn;
use url::Url;
use xmltree::Element;

use crate::errors::UpnpError;
use crate::xml_utils::{child_named, child_text, children_named};

/// A `<service>` entry of a device description, with absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub scpd_url: String,
    pub event_sub_url: Option<String>,
}

/// A `<device>` entry, root or embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    pub udn: String,
    pub friendly_name: String,
    pub device_type: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub services: Vec<ServiceDescription>,
    pub embedded: Vec<DeviceDescription>,
}

impl DeviceDescription {
    /// This device or the first embedded one of type `device_type`.
    pub fn find_device(&self, device_type: &str) -> Option<&DeviceDescription> {
        if self.device_type == device_type {
            return Some(self);
        }
        self.embedded
            .iter()
            .find_map(|child| child.find_device(device_type))
    }

    pub fn service(&self, service_id: &str) -> Option<&ServiceDescription> {
        self.services.iter().find(|s| s.service_id == service_id)
    }
}

/// Resolves `reference` against `base` the way a browser would.
///
/// ```
/// # use pmoupnp::description::resolve_url;
/// assert_eq!(
///     resolve_url("http://10.0.0.5:1400/xml/device.xml", "/MediaRenderer/AVTransport/Control").unwrap(),
///     "http://10.0.0.5:1400/MediaRenderer/AVTransport/Control"
/// );
/// assert_eq!(
///     resolve_url("http://10.0.0.5:1400/xml/device.xml", "avt.xml").unwrap(),
///     "http://10.0.0.5:1400/xml/avt.xml"
/// );
/// ```
pub fn resolve_url(base: &str, reference: &str) -> Result<String, UpnpError> {
    let base = Url::parse(base).map_err(|e| UpnpError::Url(base.to_string(), e))?;
    base.join(reference.trim())
        .map(String::from)
        .map_err(|e| UpnpError::Url(reference.to_string(), e))
}

/// Parses `description.xml` fetched from `location`.
///
/// Relative service URLs are resolved against `<URLBase>` when present,
/// otherwise against `location`.
pub fn parse_device_description(xml: &[u8], location: &str) -> Result<DeviceDescription, UpnpError> {
    let root = Element::parse(xml)?;
    let base = child_text(&root, "URLBase")
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| location.to_string());

    let device = child_named(&root, "device").ok_or_else(|| UpnpError::missing_element("device"))?;
    parse_device(device, &base)
}

fn parse_device(device: &Element, base: &str) -> Result<DeviceDescription, UpnpError> {
    let udn = child_text(device, "UDN").ok_or_else(|| UpnpError::missing_element("UDN"))?;
    let device_type =
        child_text(device, "deviceType").ok_or_else(|| UpnpError::missing_element("deviceType"))?;

    let mut services = Vec::new();
    if let Some(list) = child_named(device, "serviceList") {
        for service in children_named(list, "service") {
            match parse_service(service, base) {
                Ok(s) => services.push(s),
                Err(e) => warn!(udn = %udn, "Skipping malformed service entry: {}", e),
            }
        }
    }

    let mut embedded = Vec::new();
    if let Some(list) = child_named(device, "deviceList") {
        for child in children_named(list, "device") {
            embedded.push(parse_device(child, base)?);
        }
    }

    Ok(DeviceDescription {
        friendly_name: child_text(device, "friendlyName").unwrap_or_else(|| udn.clone()),
        manufacturer: child_text(device, "manufacturer"),
        model_name: child_text(device, "modelName"),
        udn,
        device_type,
        services,
        embedded,
    })
}

fn parse_service(service: &Element, base: &str) -> Result<ServiceDescription, UpnpError> {
    let required = |name: &str| {
        child_text(service, name).ok_or_else(|| UpnpError::missing_element(name))
    };

    Ok(ServiceDescription {
        service_type: required("serviceType")?,
        service_id: required("serviceId")?,
        control_url: resolve_url(base, &required("controlURL")?)?,
        scpd_url: resolve_url(base, &required("SCPDURL")?)?,
        event_sub_url: match child_text(service, "eventSubURL") {
            Some(url) if !url.is_empty() => Some(resolve_url(base, &url)?),
            _ => None,
        },
    })
}

/// Action names listed in a service SCPD.
pub fn parse_scpd_actions(xml: &[u8]) -> Result<Vec<String>, UpnpError> {
    let root = Element::parse(xml)?;
    let Some(list) = child_named(&root, "actionList") else {
        return Ok(Vec::new());
    };

    Ok(children_named(list, "action")
        .filter_map(|action| child_text(action, "name"))
        .filter(|name| !name.is_empty())
        .collect())
}

/// Fetches and parses the description at `location`.
pub async fn fetch_device_description(
    http: &reqwest::Client,
    location: &str,
    timeout: Duration,
) -> Result<DeviceDescription, UpnpError> {
    let body = http
        .get(location)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    parse_device_description(&body, location)
}

/// Fetches the action list of a service.
///
/// A missing or broken SCPD yields an empty list: the service stays
/// callable, it just advertises nothing.
pub async fn fetch_scpd_actions(
    http: &reqwest::Client,
    scpd_url: &str,
    timeout: Duration,
) -> Vec<String> {
    match fetch_scpd(http, scpd_url, timeout).await {
        Ok(actions) => actions,
        Err(e) => {
            warn!("Cannot read SCPD {}: {}", scpd_url, e);
            Vec::new()
        }
    }
}

async fn fetch_scpd(
    http: &reqwest::Client,
    scpd_url: &str,
    timeout: Duration,
) -> Result<Vec<String>, UpnpError> {
    let body = http
        .get(scpd_url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    parse_scpd_actions(&body)
}
