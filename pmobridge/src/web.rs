//! Optional status page listing the bridged devices.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::get;
use pmoupnp::Device;
use quick_xml::escape::escape;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::DeviceListener;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEntry {
    pub udn: String,
    pub name: String,
    pub location: String,
    pub airplay_port: u16,
}

type Registry = Arc<RwLock<BTreeMap<String, DeviceEntry>>>;

pub struct InteractiveWeb {
    devices: Registry,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    join_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl InteractiveWeb {
    pub async fn start(port: u16) -> io::Result<Self> {
        let devices = Registry::default();
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();

        let app = Router::new()
            .route("/", get(index))
            .route("/api/devices", get(list_devices))
            .with_state(devices.clone());
        let shutdown = cancel.clone();
        let join_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                warn!("Interactive web failed: {}", e);
            }
        });

        info!("✅ Interactive web on http://{}/", local_addr);

        Ok(Self {
            devices,
            local_addr,
            cancel,
            join_handle: StdMutex::new(Some(join_handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bridged devices, ordered by UDN.
    pub async fn devices(&self) -> Vec<DeviceEntry> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .join_handle
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        info!("Interactive web stopped");
    }
}

#[async_trait]
impl DeviceListener for InteractiveWeb {
    async fn add_device(&self, device: &Device, port: u16) {
        self.devices.write().await.insert(
            device.udn().to_string(),
            DeviceEntry {
                udn: device.udn().to_string(),
                name: device.friendly_name().to_string(),
                location: device.location().to_string(),
                airplay_port: port,
            },
        );
    }

    async fn remove_device(&self, udn: &str) {
        self.devices.write().await.remove(udn);
    }
}

async fn list_devices(State(devices): State<Registry>) -> impl IntoResponse {
    Json(devices.read().await.values().cloned().collect::<Vec<_>>())
}

async fn index(State(devices): State<Registry>) -> Html<String> {
    Html(render_index(devices.read().await.values()))
}

fn render_index<'a>(devices: impl Iterator<Item = &'a DeviceEntry>) -> String {
    let mut rows = String::new();
    for entry in devices {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td></tr>",
            escape(entry.name.as_str()),
            escape(entry.udn.as_str()),
            escape(entry.location.as_str()),
            escape(entry.location.as_str()),
            entry.airplay_port
        );
    }
    if rows.is_empty() {
        rows.push_str("<tr><td colspan=\"4\">No renderer found yet</td></tr>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>AirPnP</title></head>\n<body>\n\
         <h1>AirPnP bridged renderers</h1>\n<table>\n\
         <tr><th>Name</th><th>UDN</th><th>Description</th><th>AirPlay port</th></tr>\n\
         {}</table>\n</body>\n</html>\n",
        rows
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_escapes_device_names() {
        let entry = DeviceEntry {
            udn: "uuid:tv".into(),
            name: "Tom & Jerry's <TV>".into(),
            location: "http://10.0.0.8/desc.xml".into(),
            airplay_port: 22555,
        };
        let html = render_index([entry].iter());
        assert!(html.contains("Tom &amp; Jerry&apos;s &lt;TV&gt;"));
        assert!(html.contains("<td>22555</td>"));
        assert!(render_index(std::iter::empty()).contains("No renderer found yet"));
    }

    #[tokio::test]
    async fn lists_registered_devices() {
        let web = InteractiveWeb::start(0).await.unwrap();
        let device = Device::new(
            "uuid:tv",
            "Living Room TV",
            pmoupnp::MEDIA_RENDERER_DEVICE_TYPE,
            "http://10.0.0.8/desc.xml",
        );
        web.add_device(&device, 22556).await;

        let url = format!("http://127.0.0.1:{}/api/devices", web.local_addr().port());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        let listed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(listed[0]["udn"], "uuid:tv");
        assert_eq!(listed[0]["airplay_port"], 22556);

        web.remove_device("uuid:tv").await;
        assert!(web.devices().await.is_empty());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "[]");

        web.stop().await;
    }
}
