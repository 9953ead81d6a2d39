//! Sessions served through `pmoairplay` endpoints.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use pmoairplay::{AirPlayError, AirPlayOperations, AirPlayServer, BonjourAdvertiser, ServerInfo};
use tracing::warn;

use crate::errors::BridgeError;
use crate::orchestrator::{CallerEndpoint, EndpointFactory};
use crate::session::DeviceSession;

impl From<BridgeError> for AirPlayError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::DeviceBusy => AirPlayError::Busy,
            other => AirPlayError::failed(other),
        }
    }
}

#[async_trait]
impl AirPlayOperations for DeviceSession {
    async fn bind_client(&self, client: IpAddr) -> Result<(), AirPlayError> {
        Ok(self.bind(Some(client)).await?)
    }

    async fn get_scrub(&self, client: IpAddr) -> Result<(f64, f64), AirPlayError> {
        Ok(DeviceSession::get_scrub(self, client).await?)
    }

    async fn is_playing(&self, client: IpAddr) -> Result<bool, AirPlayError> {
        Ok(DeviceSession::is_playing(self, client).await?)
    }

    async fn set_scrub(&self, client: IpAddr, position: f64) -> Result<(), AirPlayError> {
        Ok(DeviceSession::set_scrub(self, client, position).await?)
    }

    async fn play(
        &self,
        client: IpAddr,
        location: &str,
        start_position: f64,
    ) -> Result<(), AirPlayError> {
        Ok(DeviceSession::play(self, client, location, start_position).await?)
    }

    async fn stop(&self, client: IpAddr) -> Result<(), AirPlayError> {
        Ok(DeviceSession::stop(self, client).await?)
    }

    async fn reverse(&self, client: IpAddr) -> Result<(), AirPlayError> {
        Ok(DeviceSession::reverse(self, client).await?)
    }

    async fn rate(&self, client: IpAddr, speed: f64) -> Result<(), AirPlayError> {
        Ok(DeviceSession::rate(self, client, speed).await?)
    }

    async fn photo(
        &self,
        client: IpAddr,
        data: Bytes,
        transition: Option<String>,
    ) -> Result<(), AirPlayError> {
        Ok(self.show_image(client, data, transition).await?)
    }
}

/// Starts one [`AirPlayServer`] per device, optionally announced over Bonjour.
#[derive(Default)]
pub struct AirPlayEndpointFactory {
    bonjour: Option<Arc<BonjourAdvertiser>>,
}

impl AirPlayEndpointFactory {
    pub fn new(bonjour: Option<Arc<BonjourAdvertiser>>) -> Self {
        Self { bonjour }
    }
}

#[async_trait]
impl EndpointFactory for AirPlayEndpointFactory {
    async fn start(
        &self,
        name: &str,
        udn: &str,
        port: u16,
        session: Arc<DeviceSession>,
    ) -> Result<Box<dyn CallerEndpoint>, BridgeError> {
        let info = ServerInfo::new(udn);
        let server = AirPlayServer::start(name, port, session, info.clone())
            .await
            .map_err(|e| BridgeError::Endpoint(format!("{}: {}", name, e)))?;

        let announcement = self.bonjour.as_ref().and_then(|bonjour| {
            match bonjour.advertise(name, server.port(), &info) {
                Ok(fullname) => Some((bonjour.clone(), fullname)),
                Err(e) => {
                    warn!("Cannot advertise {} over Bonjour: {}", name, e);
                    None
                }
            }
        });

        Ok(Box::new(AirPlayEndpoint {
            server,
            announcement,
        }))
    }
}

struct AirPlayEndpoint {
    server: AirPlayServer,
    announcement: Option<(Arc<BonjourAdvertiser>, String)>,
}

#[async_trait]
impl CallerEndpoint for AirPlayEndpoint {
    fn port(&self) -> u16 {
        self.server.port()
    }

    async fn stop(self: Box<Self>) {
        let AirPlayEndpoint {
            server,
            announcement,
        } = *self;
        if let Some((bonjour, fullname)) = announcement {
            bonjour.withdraw(&fullname);
        }
        server.stop().await;
    }
}
