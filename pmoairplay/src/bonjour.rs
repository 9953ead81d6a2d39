//! Bonjour advertisement of AirPlay endpoints (`_airplay._tcp.local.`).

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

use crate::protocol::ServerInfo;

pub const AIRPLAY_SERVICE_TYPE: &str = "_airplay._tcp.local.";

/// Owns the mDNS responder shared by every endpoint of the process.
pub struct BonjourAdvertiser {
    daemon: ServiceDaemon,
    address: String,
}

impl BonjourAdvertiser {
    /// `address` is the IP the endpoints are reachable on.
    pub fn new(address: &str) -> Result<Self, mdns_sd::Error> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            address: address.to_string(),
        })
    }

    /// Announces an endpoint; returns the full service name to withdraw it.
    pub fn advertise(
        &self,
        name: &str,
        port: u16,
        info: &ServerInfo,
    ) -> Result<String, mdns_sd::Error> {
        let host_name = format!("airpnp-{}.local.", info.device_id.replace(':', "").to_lowercase());
        let txt = info.txt_records();
        let properties: Vec<(&str, &str)> = txt.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let service = ServiceInfo::new(
            AIRPLAY_SERVICE_TYPE,
            &instance_name(name),
            &host_name,
            self.address.as_str(),
            port,
            &properties[..],
        )?;
        let fullname = service.get_fullname().to_string();
        self.daemon.register(service)?;

        info!("📣 Advertised {} on port {}", fullname, port);
        Ok(fullname)
    }

    pub fn withdraw(&self, fullname: &str) {
        match self.daemon.unregister(fullname) {
            Ok(_) => info!("Withdrew {}", fullname),
            Err(e) => warn!("Cannot withdraw {}: {}", fullname, e),
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!("mDNS responder shutdown failed: {}", e);
        }
    }
}

/// DNS-SD instance names may not contain dots and are limited to 63 bytes.
fn instance_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '.' { ' ' } else { c })
        .collect();
    let mut end = cleaned.len().min(63);
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    let trimmed = cleaned[..end].trim();
    if trimmed.is_empty() {
        "AirPnP".to_string()
    } else {
        trimmed.to_string()
    }
}
