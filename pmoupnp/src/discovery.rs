//! Device discovery: SSDP announcements in, [`DeviceEvent`]s out.
//!
//! A listener thread feeds parsed datagrams to an async task which
//! resolves new devices through their description, keeps them alive
//! while announcements keep coming, and reports them lost on `byebye`
//! or when their `max-age` runs out.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::description::fetch_device_description;
use crate::device::Device;
use crate::errors::UpnpError;
use crate::ssdp::{SsdpClient, SsdpMessage};
use crate::{
    AVTRANSPORT_SERVICE_ID, CONNECTION_MANAGER_SERVICE_ID, MEDIA_RENDERER_DEVICE_TYPE,
};

/// How often expired devices are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Back-off before retrying a device whose description could not be read
const RETRY_AFTER_ERROR: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Found(Arc<Device>),
    Lost(Arc<Device>),
}

impl DeviceEvent {
    pub fn device(&self) -> &Arc<Device> {
        match self {
            DeviceEvent::Found(device) | DeviceEvent::Lost(device) => device,
        }
    }
}

/// Which devices are worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub device_type: String,
    pub required_services: Vec<String>,
}

impl DeviceFilter {
    /// MediaRenderers offering both ConnectionManager and AVTransport.
    pub fn media_renderer() -> Self {
        Self {
            device_type: MEDIA_RENDERER_DEVICE_TYPE.to_string(),
            required_services: vec![
                CONNECTION_MANAGER_SERVICE_ID.to_string(),
                AVTRANSPORT_SERVICE_ID.to_string(),
            ],
        }
    }

    pub fn accepts(&self, device: &Device) -> bool {
        device.device_type() == self.device_type
            && self
                .required_services
                .iter()
                .all(|id| device.has_service(id))
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub filter: DeviceFilter,
    /// Period of the active M-SEARCH
    pub search_interval: Duration,
    pub mx: u32,
    /// Timeout of description and SCPD fetches
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            filter: DeviceFilter::media_renderer(),
            search_interval: Duration::from_secs(60),
            mx: 3,
            http_timeout: Duration::from_secs(10),
            user_agent: "Linux/1.0 UPnP/1.0 PMOAirPnP/0.2".to_string(),
        }
    }
}

/// Turns a description location into a [`Device`].
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    /// Resolves the device of type `device_type` described at `location`,
    /// looking into embedded devices when the root is of another type.
    async fn resolve(&self, location: &str, device_type: &str) -> Result<Device, UpnpError>;
}

/// Resolver fetching descriptions and SCPDs over HTTP.
pub struct HttpResolver {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpResolver {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl DeviceResolver for HttpResolver {
    async fn resolve(&self, location: &str, device_type: &str) -> Result<Device, UpnpError> {
        let root = fetch_device_description(&self.http, location, self.timeout).await?;
        let description = root.find_device(device_type).unwrap_or(&root);
        Ok(Device::from_description(&self.http, description, location, self.timeout).await)
    }
}

struct Tracked {
    device: Arc<Device>,
    expires_at: Instant,
}

/// Discovery bookkeeping, independent of sockets and clocks.
///
/// Each UDN produces at most one `Found` until it is reported `Lost`.
pub struct DeviceTracker<R> {
    filter: DeviceFilter,
    resolver: R,
    known: HashMap<String, Tracked>,
    /// UDNs that failed the filter or could not be resolved, until when
    rejected: HashMap<String, Instant>,
}

impl<R: DeviceResolver> DeviceTracker<R> {
    pub fn new(filter: DeviceFilter, resolver: R) -> Self {
        Self {
            filter,
            resolver,
            known: HashMap::new(),
            rejected: HashMap::new(),
        }
    }

    pub async fn handle(&mut self, message: SsdpMessage, now: Instant) -> Option<DeviceEvent> {
        let udn = message.udn().to_string();

        if let SsdpMessage::ByeBye { .. } = message {
            self.rejected.remove(&udn);
            return self.known.remove(&udn).map(|tracked| {
                info!("👋 {} said byebye", tracked.device);
                DeviceEvent::Lost(tracked.device)
            });
        }

        let max_age = Duration::from_secs(u64::from(message.max_age().unwrap_or_default()));
        if let Some(tracked) = self.known.get_mut(&udn) {
            tracked.expires_at = tracked.expires_at.max(now + max_age);
            return None;
        }
        if self.rejected.get(&udn).is_some_and(|until| *until > now) {
            return None;
        }

        let location = message.location()?;
        let resolved = self.resolver.resolve(location, &self.filter.device_type).await;
        match resolved {
            Ok(device) if device.udn() == udn && self.filter.accepts(&device) => {
                self.rejected.remove(&udn);
                let device = Arc::new(device);
                info!("🔎 Found {} at {}", device, location);
                self.known.insert(
                    udn,
                    Tracked {
                        device: device.clone(),
                        expires_at: now + max_age,
                    },
                );
                Some(DeviceEvent::Found(device))
            }
            Ok(device) => {
                debug!("Ignoring {} announced as {}", device, udn);
                self.rejected.insert(udn, now + max_age);
                None
            }
            Err(e) => {
                warn!("Cannot resolve {} at {}: {}", udn, location, e);
                self.rejected.insert(udn, now + RETRY_AFTER_ERROR);
                None
            }
        }
    }

    /// Drops every device whose announcements have run out.
    pub fn expire(&mut self, now: Instant) -> Vec<DeviceEvent> {
        self.rejected.retain(|_, until| *until > now);

        let expired: Vec<String> = self
            .known
            .iter()
            .filter(|(_, tracked)| tracked.expires_at <= now)
            .map(|(udn, _)| udn.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|udn| self.known.remove(&udn))
            .map(|tracked| {
                info!("⌛ {} expired", tracked.device);
                DeviceEvent::Lost(tracked.device)
            })
            .collect()
    }

    pub fn known_devices(&self) -> Vec<Arc<Device>> {
        self.known.values().map(|t| t.device.clone()).collect()
    }
}

/// Running discovery: a listener thread plus the tracking task.
pub struct DeviceDiscovery {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl DeviceDiscovery {
    /// Starts discovery; events arrive on the returned receiver.
    pub fn start(config: DiscoveryConfig) -> io::Result<(Self, mpsc::Receiver<DeviceEvent>)> {
        let client = Arc::new(SsdpClient::new(&config.user_agent)?);
        let stop = Arc::new(AtomicBool::new(false));

        let (message_tx, message_rx) = mpsc::channel::<SsdpMessage>(256);
        let listener = client.clone();
        let listener_stop = stop.clone();
        std::thread::Builder::new()
            .name("ssdp-listener".to_string())
            .spawn(move || {
                listener.listen(&listener_stop, |message| {
                    // Receiver gone means discovery was stopped.
                    let _ = message_tx.blocking_send(message);
                });
            })?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(io::Error::other)?;
        let tracker = DeviceTracker::new(
            config.filter.clone(),
            HttpResolver::new(http, config.http_timeout),
        );

        let (event_tx, event_rx) = mpsc::channel(64);
        let task = tokio::spawn(run(client, config, tracker, message_rx, event_tx));

        Ok((Self { stop, task }, event_rx))
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.task.abort();
        info!("SSDP discovery stopped");
    }
}

async fn run<R: DeviceResolver>(
    client: Arc<SsdpClient>,
    config: DiscoveryConfig,
    mut tracker: DeviceTracker<R>,
    mut messages: mpsc::Receiver<SsdpMessage>,
    events: mpsc::Sender<DeviceEvent>,
) {
    let mut search = tokio::time::interval(config.search_interval.max(Duration::from_secs(1)));
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = search.tick() => {
                if let Err(e) = client.search(&config.filter.device_type, config.mx) {
                    warn!("❌ M-SEARCH failed: {}", e);
                }
            }
            _ = sweep.tick() => {
                for event in tracker.expire(Instant::now()) {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
            message = messages.recv() => {
                let Some(message) = message else { break };
                if let Some(event) = tracker.handle(message, Instant::now()).await {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
