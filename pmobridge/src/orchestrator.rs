//! Keeps one AirPlay endpoint alive per discovered MediaRenderer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pmoupnp::{Device, DeviceEvent, DeviceFilter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assets::AssetPublisher;
use crate::errors::BridgeError;
use crate::ports::{DEFAULT_BASE_PORT, PortPool};
use crate::session::{DEFAULT_STOP_RETRIES, DeviceSession};

/// Ports tried for one device before giving up on it.
const MAX_PORT_ATTEMPTS: usize = 16;

/// A running caller-facing endpoint for one device.
#[async_trait]
pub trait CallerEndpoint: Send + Sync {
    fn port(&self) -> u16;

    async fn stop(self: Box<Self>);
}

#[async_trait]
pub trait EndpointFactory: Send + Sync {
    /// Starts an endpoint named `name` on `port`, in front of `session`.
    async fn start(
        &self,
        name: &str,
        udn: &str,
        port: u16,
        session: Arc<DeviceSession>,
    ) -> Result<Box<dyn CallerEndpoint>, BridgeError>;
}

/// Gets told about devices as their endpoints come and go.
#[async_trait]
pub trait DeviceListener: Send + Sync {
    async fn add_device(&self, device: &Device, port: u16);

    async fn remove_device(&self, udn: &str);
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub base_port: u16,
    /// Host renderers use to reach published photos
    pub hostname: String,
    pub stop_retries: u32,
}

impl BridgeSettings {
    pub fn from_config() -> Self {
        let config = pmoconfig::get_config();
        Self {
            base_port: config.get_bridge_base_port(),
            hostname: config.get_hostname(),
            stop_retries: config.get_stop_retries(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_BASE_PORT,
            hostname: "127.0.0.1".to_string(),
            stop_retries: DEFAULT_STOP_RETRIES,
        }
    }
}

struct LiveDevice {
    device: Arc<Device>,
    session: Arc<DeviceSession>,
    endpoint: Box<dyn CallerEndpoint>,
    /// Pool entry held for the endpoint
    port: u16,
}

pub struct Bridge {
    settings: BridgeSettings,
    filter: DeviceFilter,
    factory: Arc<dyn EndpointFactory>,
    assets: Arc<dyn AssetPublisher>,
    listener: Option<Arc<dyn DeviceListener>>,
    ports: PortPool,
    devices: HashMap<String, LiveDevice>,
}

impl Bridge {
    pub fn new(
        settings: BridgeSettings,
        factory: Arc<dyn EndpointFactory>,
        assets: Arc<dyn AssetPublisher>,
    ) -> Self {
        Self {
            ports: PortPool::new(settings.base_port),
            settings,
            filter: DeviceFilter::media_renderer(),
            factory,
            assets,
            listener: None,
            devices: HashMap::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn DeviceListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Devices the bridge accepts; discovery should look for the same ones.
    pub fn device_filter(&self) -> &DeviceFilter {
        &self.filter
    }

    pub fn session(&self, udn: &str) -> Option<Arc<DeviceSession>> {
        self.devices.get(udn).map(|live| live.session.clone())
    }

    pub fn port_of(&self, udn: &str) -> Option<u16> {
        self.devices.get(udn).map(|live| live.endpoint.port())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn ports(&self) -> &PortPool {
        &self.ports
    }

    pub async fn on_device_found(&mut self, device: Arc<Device>) -> Result<(), BridgeError> {
        if !self.filter.accepts(&device) {
            info!("Ignoring {}: not a usable MediaRenderer", device);
            return Ok(());
        }

        if self.devices.contains_key(device.udn()) {
            warn!("{} announced again, rebuilding its endpoint", device);
            self.teardown(device.udn()).await;
        }

        let session = Arc::new(
            DeviceSession::new(&device, self.assets.clone(), &self.settings.hostname)?
                .with_stop_retries(self.settings.stop_retries),
        );
        let (endpoint, port) = self.start_endpoint(&device, session.clone()).await?;

        if let Some(listener) = &self.listener {
            listener.add_device(&device, port).await;
        }
        info!(
            "✅ {} is available as AirPlay endpoint on port {}",
            device,
            endpoint.port()
        );

        self.devices.insert(
            device.udn().to_string(),
            LiveDevice {
                device,
                session,
                endpoint,
                port,
            },
        );
        Ok(())
    }

    /// Takes ports from the pool until an endpoint starts on one.
    async fn start_endpoint(
        &mut self,
        device: &Device,
        session: Arc<DeviceSession>,
    ) -> Result<(Box<dyn CallerEndpoint>, u16), BridgeError> {
        let mut refused = Vec::new();
        let mut outcome = Err(BridgeError::NoFreePort(self.settings.base_port));

        for _ in 0..MAX_PORT_ATTEMPTS {
            let port = match self.ports.allocate() {
                Ok(port) => port,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            match self
                .factory
                .start(device.friendly_name(), device.udn(), port, session.clone())
                .await
            {
                Ok(endpoint) => {
                    outcome = Ok((endpoint, port));
                    break;
                }
                Err(e) => {
                    debug!("Cannot start endpoint for {} on port {}: {}", device, port, e);
                    refused.push(port);
                    outcome = Err(e);
                }
            }
        }

        for port in refused {
            self.ports.release(port);
        }
        outcome
    }

    pub async fn on_device_lost(&mut self, udn: &str) -> Result<(), BridgeError> {
        if !self.devices.contains_key(udn) {
            return Err(BridgeError::UnknownDevice(udn.to_string()));
        }
        self.teardown(udn).await;
        Ok(())
    }

    async fn teardown(&mut self, udn: &str) {
        let Some(live) = self.devices.remove(udn) else {
            return;
        };
        let port = live.port;

        live.endpoint.stop().await;
        live.session.shutdown().await;
        self.ports.release(port);
        if let Some(listener) = &self.listener {
            listener.remove_device(udn).await;
        }
        info!("{} removed, port {} released", live.device, port);
    }

    pub async fn handle_event(&mut self, event: DeviceEvent) {
        let name = event.device().to_string();
        match event {
            DeviceEvent::Found(device) => {
                if let Err(e) = self.on_device_found(device).await {
                    warn!("Cannot bridge {}: {}", name, e);
                }
            }
            DeviceEvent::Lost(device) => match self.on_device_lost(device.udn()).await {
                Ok(()) => {}
                Err(e @ BridgeError::UnknownDevice(_)) => {
                    error!("Device lost without an endpoint: {}", e)
                }
                Err(e) => warn!("Cannot remove {}: {}", name, e),
            },
        }
    }

    /// Consumes device events until `cancel` fires or discovery goes away,
    /// then tears every endpoint down.
    pub async fn run(mut self, mut events: mpsc::Receiver<DeviceEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("Discovery closed its event channel");
                        break;
                    }
                },
            }
        }
        self.shutdown().await;
    }

    pub async fn shutdown(&mut self) {
        let udns: Vec<String> = self.devices.keys().cloned().collect();
        for udn in udns {
            self.teardown(&udn).await;
        }
        info!("Bridge stopped");
    }
}
