//! One AirPlay endpoint: an axum server on its own port, in front of one
//! [`AirPlayOperations`] implementation.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AirPlayError;
use crate::operations::AirPlayOperations;
use crate::protocol::{PLIST_CONTENT_TYPE, PlaybackInfo, ServerInfo, parse_parameters, scrub_body};

/// How long `stop` waits for open connections before dropping them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct EndpointState {
    ops: Arc<dyn AirPlayOperations>,
    info: Arc<ServerInfo>,
}

/// Builds the AirPlay router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`:
/// the gating layer needs the peer address.
pub fn router(ops: Arc<dyn AirPlayOperations>, info: ServerInfo) -> Router {
    let state = EndpointState {
        ops,
        info: Arc::new(info),
    };

    Router::new()
        .route("/server-info", get(server_info))
        .route("/reverse", post(reverse))
        .route("/play", post(play))
        .route("/scrub", get(get_scrub).post(set_scrub))
        .route("/rate", post(rate))
        .route("/stop", post(stop))
        .route("/photo", put(photo))
        .route("/playback-info", get(playback_info))
        .layer(middleware::from_fn_with_state(state.clone(), bind_client))
        .with_state(state)
}

/// Claims the device for the sender before any route runs.
async fn bind_client(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    debug!("{} {} from {}", request.method(), request.uri(), peer);
    match state.ops.bind_client(peer.ip()).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

async fn server_info(State(state): State<EndpointState>) -> Response {
    plist_response(state.info.to_plist())
}

async fn reverse(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, AirPlayError> {
    state.ops.reverse(peer.ip()).await?;
    Ok((
        StatusCode::SWITCHING_PROTOCOLS,
        [
            (header::UPGRADE, HeaderValue::from_static("PTTH/1.0")),
            (header::CONNECTION, HeaderValue::from_static("Upgrade")),
        ],
    )
        .into_response())
}

async fn play(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<StatusCode, AirPlayError> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| AirPlayError::BadRequest("play body is not text/parameters".into()))?;
    let params = parse_parameters(text);

    let location = params
        .get("Content-Location")
        .ok_or_else(|| AirPlayError::BadRequest("missing Content-Location".into()))?;
    let start = match params.get("Start-Position") {
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| AirPlayError::BadRequest(format!("bad Start-Position '{}'", value)))?,
        None => 0.0,
    };

    state.ops.play(peer.ip(), location, start).await?;
    Ok(StatusCode::OK)
}

async fn get_scrub(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<String, AirPlayError> {
    let (duration, position) = state.ops.get_scrub(peer.ip()).await?;
    Ok(scrub_body(duration, position))
}

async fn set_scrub(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<StatusCode, AirPlayError> {
    let position = float_param(&query, "position")?;
    state.ops.set_scrub(peer.ip(), position).await?;
    Ok(StatusCode::OK)
}

async fn rate(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<StatusCode, AirPlayError> {
    let speed = float_param(&query, "value")?;
    state.ops.rate(peer.ip(), speed).await?;
    Ok(StatusCode::OK)
}

async fn stop(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<StatusCode, AirPlayError> {
    state.ops.stop(peer.ip()).await?;
    Ok(StatusCode::OK)
}

async fn photo(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AirPlayError> {
    let transition = headers
        .get("X-Apple-Transition")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.ops.photo(peer.ip(), body, transition).await?;
    Ok(StatusCode::OK)
}

async fn playback_info(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, AirPlayError> {
    let (duration, position) = state.ops.get_scrub(peer.ip()).await?;
    let playing = state.ops.is_playing(peer.ip()).await?;
    Ok(plist_response(
        PlaybackInfo {
            duration,
            position,
            playing,
        }
        .to_plist(),
    ))
}

fn float_param(query: &HashMap<String, String>, name: &str) -> Result<f64, AirPlayError> {
    let raw = query
        .get(name)
        .ok_or_else(|| AirPlayError::BadRequest(format!("missing {}", name)))?;
    raw.parse()
        .map_err(|_| AirPlayError::BadRequest(format!("bad {} '{}'", name, raw)))
}

fn plist_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, PLIST_CONTENT_TYPE)], body).into_response()
}

/// A running endpoint.
pub struct AirPlayServer {
    name: String,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl AirPlayServer {
    /// Binds `0.0.0.0:port` and serves until [`stop`](Self::stop).
    pub async fn start(
        name: &str,
        port: u16,
        ops: Arc<dyn AirPlayOperations>,
        info: ServerInfo,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();

        let app = router(ops, info).into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = cancel.clone();
        let server_name = name.to_string();
        let join_handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                warn!("AirPlay endpoint {} failed: {}", server_name, e);
            }
        });

        info!("✅ AirPlay endpoint {} listening on {}", name, local_addr);

        Ok(Self {
            name: name.to_string(),
            local_addr,
            cancel,
            join_handle: Some(join_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops accepting requests and waits for the server task.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(mut handle) = self.join_handle.take() {
            // Senders keep connections (and the reverse channel) open.
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                debug!("AirPlay endpoint {} still has open connections, aborting", self.name);
                handle.abort();
            }
        }
        info!("AirPlay endpoint {} stopped", self.name);
    }
}

impl Drop for AirPlayServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
