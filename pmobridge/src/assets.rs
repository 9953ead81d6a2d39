//! Ephemeral asset publishing: photos pushed by AirPlay clients are served
//! over HTTP so renderers can fetch them.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CAPACITY: usize = 5;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[async_trait]
pub trait AssetPublisher: Send + Sync {
    /// Makes `data` available at `/{name}`.
    async fn publish(&self, name: &str, content_type: &str, data: Bytes);

    async fn unpublish(&self, name: &str);

    /// Port the assets are served on.
    fn port(&self) -> u16;
}

/// Published assets, oldest first.
#[derive(Debug)]
struct AssetStore {
    capacity: usize,
    order: VecDeque<String>,
    items: HashMap<String, (String, Bytes)>,
}

impl AssetStore {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            items: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, content_type: &str, data: Bytes) {
        if self
            .items
            .insert(name.to_string(), (content_type.to_string(), data))
            .is_some()
        {
            self.order.retain(|n| n != name);
        }
        self.order.push_back(name.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                debug!("Evicting asset {}", oldest);
                self.items.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.items.remove(name).is_some()
    }

    fn get(&self, name: &str) -> Option<(String, Bytes)> {
        self.items.get(name).cloned()
    }
}

/// Small HTTP server holding a bounded set of in-memory assets.
pub struct PhotoServer {
    store: Arc<RwLock<AssetStore>>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    join_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl PhotoServer {
    /// Serves on `port` (`0` picks a free one), keeping at most `capacity`
    /// assets.
    pub async fn start(port: u16, capacity: usize) -> io::Result<Self> {
        let store = Arc::new(RwLock::new(AssetStore::new(capacity)));
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();

        let app = Router::new()
            .route("/{name}", get(serve_asset))
            .with_state(store.clone());
        let shutdown = cancel.clone();
        let join_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                warn!("Photo server failed: {}", e);
            }
        });

        info!("✅ Photo server listening on {}", local_addr);

        Ok(Self {
            store,
            local_addr,
            cancel,
            join_handle: StdMutex::new(Some(join_handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
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
        info!("Photo server stopped");
    }
}

#[async_trait]
impl AssetPublisher for PhotoServer {
    async fn publish(&self, name: &str, content_type: &str, data: Bytes) {
        debug!("Publishing {} ({}, {} bytes)", name, content_type, data.len());
        self.store.write().await.insert(name, content_type, data);
    }

    async fn unpublish(&self, name: &str) {
        if self.store.write().await.remove(name) {
            debug!("Unpublished {}", name);
        }
    }

    fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

async fn serve_asset(
    State(store): State<Arc<RwLock<AssetStore>>>,
    Path(name): Path<String>,
) -> Response {
    match store.read().await.get(&name) {
        Some((content_type, data)) => ([(header::CONTENT_TYPE, content_type)], data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
