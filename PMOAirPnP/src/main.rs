mod logs;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pmoairplay::BonjourAdvertiser;
use pmobridge::{AirPlayEndpointFactory, Bridge, BridgeSettings, InteractiveWeb, PhotoServer};
use pmoconfig::{get_config, guess_local_ip};
use pmoupnp::{DeviceDiscovery, DiscoveryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs = logs::init_logging();
    if let Ok(level) = std::env::var("PMOAIRPNP_LOG_LEVEL") {
        if let Err(e) = logs.set_level(&level) {
            warn!("⚠️ Ignoring PMOAIRPNP_LOG_LEVEL: {}", e);
        }
    }

    let config = get_config();
    let settings = BridgeSettings::from_config();
    info!("🚀 Starting AirPnP bridge (renderers will fetch photos from {})", settings.hostname);

    // ========== Shared servers ==========

    let photos = Arc::new(
        PhotoServer::start(config.get_photo_port(), config.get_photo_capacity())
            .await
            .context("Cannot start photo server")?,
    );

    let web = if config.get_interactive_web_enabled() {
        match InteractiveWeb::start(config.get_interactive_web_port()).await {
            Ok(web) => Some(Arc::new(web)),
            Err(e) => {
                warn!("⚠️ Interactive web disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let bonjour = if config.get_bonjour_enabled() {
        match BonjourAdvertiser::new(&guess_local_ip()) {
            Ok(bonjour) => Some(Arc::new(bonjour)),
            Err(e) => {
                warn!("⚠️ Bonjour disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    // ========== Bridge ==========

    let mut bridge = Bridge::new(
        settings,
        Arc::new(AirPlayEndpointFactory::new(bonjour.clone())),
        photos.clone(),
    );
    if let Some(web) = &web {
        bridge = bridge.with_listener(web.clone());
    }

    let discovery_config = DiscoveryConfig {
        filter: bridge.device_filter().clone(),
        search_interval: Duration::from_secs(config.get_search_interval_secs()),
        mx: config.get_search_mx(),
        http_timeout: Duration::from_secs(config.get_soap_timeout_secs()),
        ..Default::default()
    };
    let (discovery, events) =
        DeviceDiscovery::start(discovery_config).context("Cannot start SSDP discovery")?;

    let cancel = CancellationToken::new();
    let bridge_task = tokio::spawn(bridge.run(events, cancel.clone()));

    info!("✅ AirPnP is ready!");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for Ctrl+C")?;

    // ========== Shutdown ==========

    info!("🛑 Shutting down...");
    cancel.cancel();
    if let Err(e) = bridge_task.await {
        warn!("Bridge task ended abnormally: {}", e);
    }
    discovery.stop();
    if let Some(web) = web {
        web.stop().await;
    }
    photos.stop().await;
    if let Some(bonjour) = bonjour {
        bonjour.shutdown();
    }

    info!("👋 Bye");
    Ok(())
}
