//! A discovered UPnP device and its callable services.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::description::{DeviceDescription, fetch_scpd_actions};
use crate::service::{ServiceHandle, SoapService};

#[derive(Clone)]
pub struct Device {
    udn: String,
    friendly_name: String,
    device_type: String,
    location: String,
    services: HashMap<String, Arc<dyn ServiceHandle>>,
}

impl Device {
    pub fn new(udn: &str, friendly_name: &str, device_type: &str, location: &str) -> Self {
        Self {
            udn: udn.to_string(),
            friendly_name: friendly_name.to_string(),
            device_type: device_type.to_string(),
            location: location.to_string(),
            services: HashMap::new(),
        }
    }

    /// Adds `service` under its service id, replacing any previous one.
    pub fn with_service(mut self, service: Arc<dyn ServiceHandle>) -> Self {
        self.services
            .insert(service.service_id().to_string(), service);
        self
    }

    /// Builds a device from its description, fetching every service SCPD.
    pub async fn from_description(
        http: &reqwest::Client,
        description: &DeviceDescription,
        location: &str,
        timeout: Duration,
    ) -> Self {
        let mut device = Device::new(
            &description.udn,
            &description.friendly_name,
            &description.device_type,
            location,
        );

        for service in &description.services {
            let actions = fetch_scpd_actions(http, &service.scpd_url, timeout).await;
            device = device.with_service(Arc::new(SoapService::from_description(
                http.clone(),
                service,
                actions,
            )));
        }

        device
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// URL of the device description
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn service_by_id(&self, service_id: &str) -> Option<Arc<dyn ServiceHandle>> {
        self.services.get(service_id).cloned()
    }

    pub fn has_service(&self, service_id: &str) -> bool {
        self.services.contains_key(service_id)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.friendly_name, self.udn)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("udn", &self.udn)
            .field("friendly_name", &self.friendly_name)
            .field("device_type", &self.device_type)
            .field("location", &self.location)
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}
