//! Per-renderer session: the AirPlay view of one UPnP MediaRenderer.
//!
//! A session is exclusively bound to one AirPlay client at a time and
//! translates its requests into AVTransport actions. Every operation holds
//! the session lock for its whole duration, so operations on one device
//! never interleave.

use std::net::IpAddr;
use std::sync::Arc;

use axum::body::Bytes;
use pmoupnp::soap::error_codes::INVALID_INSTANCE_ID;
use pmoupnp::time::{hms_to_seconds, seconds_to_hms};
use pmoupnp::{
    AVTRANSPORT_SERVICE_ID, ActionResult, CONNECTION_MANAGER_SERVICE_ID, Device, ServiceHandle,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::assets::AssetPublisher;
use crate::errors::BridgeError;
use crate::image::ImageType;

/// Extra `Stop` attempts after an invalid-instance fault.
pub const DEFAULT_STOP_RETRIES: u32 = 1;

/// Instance id used for every connection; see [`DeviceSession::bind`].
const DEFAULT_INSTANCE_ID: &str = "0";

/// The client currently holding the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub client: IpAddr,
    pub instance_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No client, no media
    Idle,
    /// Client bound, nothing loaded
    BoundIdle,
    /// Client bound, media loaded
    Loaded,
}

/// Mutable part of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    binding: Option<Binding>,
    media_uri: Option<String>,
    /// Start fraction waiting for a known duration
    pending_fraction: Option<f64>,
    /// Absolute position requested before anything was loaded
    pending_precise: Option<f64>,
    published_asset: Option<String>,
}

impl SessionState {
    pub fn bound_client(&self) -> Option<IpAddr> {
        self.binding.as_ref().map(|b| b.client)
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.instance_id.as_str())
    }

    pub fn media_uri(&self) -> Option<&str> {
        self.media_uri.as_deref()
    }

    pub fn pending_fraction(&self) -> Option<f64> {
        self.pending_fraction
    }

    pub fn pending_precise(&self) -> Option<f64> {
        self.pending_precise
    }

    pub fn published_asset(&self) -> Option<&str> {
        self.published_asset.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.binding, &self.media_uri) {
            (None, _) => SessionPhase::Idle,
            (Some(_), None) => SessionPhase::BoundIdle,
            (Some(_), Some(_)) => SessionPhase::Loaded,
        }
    }
}

pub struct DeviceSession {
    name: String,
    udn: String,
    avtransport: Arc<dyn ServiceHandle>,
    connection_manager: Arc<dyn ServiceHandle>,
    assets: Arc<dyn AssetPublisher>,
    /// Host part of the URLs handed to the renderer
    hostname: String,
    stop_retries: u32,
    state: Mutex<SessionState>,
}

impl DeviceSession {
    pub fn new(
        device: &Device,
        assets: Arc<dyn AssetPublisher>,
        hostname: &str,
    ) -> Result<Self, BridgeError> {
        let service = |service_id: &str| {
            device
                .service_by_id(service_id)
                .ok_or_else(|| BridgeError::MissingService {
                    udn: device.udn().to_string(),
                    service_id: service_id.to_string(),
                })
        };

        Ok(Self {
            name: device.friendly_name().to_string(),
            udn: device.udn().to_string(),
            avtransport: service(AVTRANSPORT_SERVICE_ID)?,
            connection_manager: service(CONNECTION_MANAGER_SERVICE_ID)?,
            assets,
            hostname: hostname.to_string(),
            stop_retries: DEFAULT_STOP_RETRIES,
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn with_stop_retries(mut self, retries: u32) -> Self {
        self.stop_retries = retries;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Binds the session to `client`, or releases it with `None`.
    ///
    /// Binding again from the bound client is a no-op; any other client
    /// gets [`BridgeError::DeviceBusy`] and the session is left untouched.
    /// Every operation below claims the session the same way, under the
    /// same lock as the work it does for `client`.
    pub async fn bind(&self, client: Option<IpAddr>) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        match client {
            Some(ip) => self.claim_locked(&mut state, ip).map(|_| ()),
            None => {
                self.unbind_locked(&mut state);
                Ok(())
            }
        }
    }

    /// Binds `client` if the session is free; returns its instance id.
    fn claim_locked(
        &self,
        state: &mut SessionState,
        client: IpAddr,
    ) -> Result<String, BridgeError> {
        match &state.binding {
            Some(binding) if binding.client == client => Ok(binding.instance_id.clone()),
            Some(binding) => {
                info!(
                    device = %self.name,
                    "Rejecting client {} since device is busy (current client is {})",
                    client, binding.client
                );
                Err(BridgeError::DeviceBusy)
            }
            None => {
                let instance_id = self.allocate_instance_id();
                debug!(device = %self.name, "Client {} bound with instance {}", client, instance_id);
                state.binding = Some(Binding {
                    client,
                    instance_id: instance_id.clone(),
                });
                Ok(instance_id)
            }
        }
    }

    fn unbind_locked(&self, state: &mut SessionState) {
        if let Some(binding) = state.binding.take() {
            self.release_instance_id(&binding.instance_id);
            debug!(device = %self.name, "Client {} released", binding.client);
        }
        // Nothing survives the client that loaded it.
        state.media_uri = None;
        state.pending_fraction = None;
        state.pending_precise = None;
    }

    /// `(duration, position)` in seconds; `(0, 0)` when nothing is loaded.
    pub async fn get_scrub(&self, client: IpAddr) -> Result<(f64, f64), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        if state.media_uri.is_none() {
            return Ok((0.0, 0.0));
        }

        let (duration, position) = self.position_info(&instance_id).await?;
        self.resolve_pending_fraction(&mut state, &instance_id, duration, position)
            .await?;
        Ok((duration, position))
    }

    pub async fn is_playing(&self, client: IpAddr) -> Result<bool, BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        if state.media_uri.is_none() {
            return Ok(false);
        }
        Ok(self.transport_state(&instance_id).await? == "PLAYING")
    }

    /// Seeks to `position` seconds, or remembers it until the next `play`.
    pub async fn set_scrub(&self, client: IpAddr, position: f64) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        self.set_scrub_locked(&mut state, &instance_id, position).await
    }

    async fn set_scrub_locked(
        &self,
        state: &mut SessionState,
        instance_id: &str,
        position: f64,
    ) -> Result<(), BridgeError> {
        if state.media_uri.is_none() {
            debug!(device = %self.name, "Saving scrub position {} for later", position);
            state.pending_precise = Some(position);
            return Ok(());
        }
        self.seek(instance_id, position).await
    }

    /// Loads and starts `uri`; `start_fraction` (0..1) is applied once the
    /// duration is known, unless a precise position was saved earlier.
    pub async fn play(
        &self,
        client: IpAddr,
        uri: &str,
        start_fraction: f64,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        info!(device = %self.name, "Starting playback of {} at {}", uri, start_fraction);

        self.avtransport
            .invoke(
                "SetAVTransportURI",
                &[
                    ("InstanceID", &instance_id),
                    ("CurrentURI", uri),
                    ("CurrentURIMetaData", ""),
                ],
            )
            .await?;
        state.pending_fraction = None;
        state.media_uri = Some(uri.to_string());

        self.start_playback(&instance_id).await?;

        match state.pending_precise.take() {
            Some(position) => {
                debug!(device = %self.name, "Seeking to saved scrub position {}", position);
                self.set_scrub_locked(&mut state, &instance_id, position).await?;
            }
            None => state.pending_fraction = Some(start_fraction.clamp(0.0, 1.0)),
        }
        Ok(())
    }

    /// Stops playback and releases the session for other clients.
    ///
    /// Cleanup happens whatever the renderer answers; a fault other than
    /// an invalid instance id is still reported afterwards.
    pub async fn stop(&self, client: IpAddr) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        if state.media_uri.is_none() {
            return Ok(());
        }

        info!(device = %self.name, "Stopping playback");
        let outcome = self.stop_with_retries(&instance_id).await;

        state.media_uri = None;
        self.unpublish_current(&mut state).await;
        self.unbind_locked(&mut state);

        outcome
    }

    async fn stop_with_retries(&self, instance_id: &str) -> Result<(), BridgeError> {
        let mut retries_left = self.stop_retries;
        loop {
            match self
                .avtransport
                .invoke("Stop", &[("InstanceID", instance_id)])
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if e.fault_code() == Some(INVALID_INSTANCE_ID) => {
                    if retries_left == 0 {
                        warn!(
                            device = %self.name,
                            "Failed to stop playback, device may still be in a playing state"
                        );
                        return Ok(());
                    }
                    debug!(
                        device = %self.name,
                        "Got {} (invalid instance ID) for stop request, tries left = {}",
                        INVALID_INSTANCE_ID, retries_left
                    );
                    retries_left -= 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The reverse HTTP channel is acknowledged but never used.
    pub async fn reverse(&self, client: IpAddr) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        self.claim_locked(&mut state, client).map(|_| ())
    }

    /// `speed >= 1` resumes, anything lower pauses.
    pub async fn rate(&self, client: IpAddr, speed: f64) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;
        if state.media_uri.is_none() {
            return Ok(());
        }

        if speed >= 1.0 {
            let transport = self.transport_state(&instance_id).await?;
            if transport != "PLAYING" && transport != "TRANSITIONING" {
                info!(device = %self.name, "Resuming playback");
                self.start_playback(&instance_id).await?;
            } else {
                debug!(device = %self.name, "Rate ignored since device state is {}", transport);
            }

            if state.pending_fraction.is_some() {
                let (duration, position) = self.position_info(&instance_id).await?;
                self.resolve_pending_fraction(&mut state, &instance_id, duration, position)
                    .await?;
            }
        } else {
            info!(device = %self.name, "Pausing playback");
            self.avtransport
                .invoke("Pause", &[("InstanceID", &instance_id)])
                .await?;
        }
        Ok(())
    }

    /// Publishes `data` on the asset server and has the renderer show it.
    pub async fn show_image(
        &self,
        client: IpAddr,
        data: Bytes,
        transition: Option<String>,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let instance_id = self.claim_locked(&mut state, client)?;

        let kind = ImageType::detect(&data);
        let name = kind.asset_name();

        self.unpublish_current(&mut state).await;
        self.assets.publish(&name, kind.content_type(), data).await;
        state.published_asset = Some(name.clone());

        let uri = format!("http://{}:{}/{}", self.hostname, self.assets.port(), name);
        info!(
            device = %self.name,
            "Showing photo, published at {} (transition {:?})", uri, transition
        );

        self.avtransport
            .invoke(
                "SetAVTransportURI",
                &[
                    ("InstanceID", &instance_id),
                    ("CurrentURI", &uri),
                    ("CurrentURIMetaData", ""),
                ],
            )
            .await?;
        state.media_uri = Some(uri);

        self.start_playback(&instance_id).await
    }

    /// Releases everything the session holds; used when the device goes away.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        self.unpublish_current(&mut state).await;
        self.unbind_locked(&mut state);
        debug!(device = %self.name, "Session shut down");
    }

    async fn unpublish_current(&self, state: &mut SessionState) {
        if let Some(asset) = state.published_asset.take() {
            self.assets.unpublish(&asset).await;
        }
    }

    /// Consumes the pending start fraction once the duration is known.
    async fn resolve_pending_fraction(
        &self,
        state: &mut SessionState,
        instance_id: &str,
        duration: f64,
        position: f64,
    ) -> Result<(), BridgeError> {
        let Some(fraction) = state.pending_fraction else {
            return Ok(());
        };
        if duration <= 0.0 {
            return Ok(());
        }

        let target = duration * fraction;
        state.pending_fraction = None;
        debug!(
            device = %self.name,
            "Duration {} known, seeking to {} of it", duration, fraction
        );
        if target > position {
            self.seek(instance_id, target).await?;
        }
        Ok(())
    }

    async fn start_playback(&self, instance_id: &str) -> Result<(), BridgeError> {
        self.avtransport
            .invoke("Play", &[("InstanceID", instance_id), ("Speed", "1")])
            .await?;
        Ok(())
    }

    async fn seek(&self, instance_id: &str, position: f64) -> Result<(), BridgeError> {
        let target = seconds_to_hms(position);
        debug!(device = %self.name, "Seeking to {}", target);
        self.avtransport
            .invoke(
                "Seek",
                &[
                    ("InstanceID", instance_id),
                    ("Unit", "REL_TIME"),
                    ("Target", &target),
                ],
            )
            .await?;
        Ok(())
    }

    async fn position_info(&self, instance_id: &str) -> Result<(f64, f64), BridgeError> {
        let info = self
            .avtransport
            .invoke("GetPositionInfo", &[("InstanceID", instance_id)])
            .await?;
        Ok((
            hms_to_seconds(output(&info, "TrackDuration"))?,
            hms_to_seconds(output(&info, "RelTime"))?,
        ))
    }

    async fn transport_state(&self, instance_id: &str) -> Result<String, BridgeError> {
        let info = self
            .avtransport
            .invoke("GetTransportInfo", &[("InstanceID", instance_id)])
            .await?;
        Ok(output(&info, "CurrentTransportState").to_string())
    }

    fn allocate_instance_id(&self) -> String {
        if self.connection_manager.supports("PrepareForConnection") {
            debug!(
                device = %self.name,
                "ConnectionManager::PrepareForConnection not implemented, using instance {}",
                DEFAULT_INSTANCE_ID
            );
        }
        DEFAULT_INSTANCE_ID.to_string()
    }

    fn release_instance_id(&self, instance_id: &str) {
        if self.connection_manager.supports("ConnectionComplete") {
            debug!(
                device = %self.name,
                "ConnectionManager::ConnectionComplete not implemented, leaving instance {}",
                instance_id
            );
        }
    }
}

fn output<'a>(result: &'a ActionResult, name: &str) -> &'a str {
    result.get(name).map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ASSET_PORT, FakeRenderer, MemoryAssets};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn client(last: u8) -> IpAddr {
        IpAddr::from([192, 168, 1, last])
    }

    /// The client [`bound_session`] binds.
    fn holder() -> IpAddr {
        client(10)
    }

    fn session(renderer: &FakeRenderer, assets: Arc<MemoryAssets>) -> DeviceSession {
        DeviceSession::new(&renderer.device, assets, "10.0.0.2").unwrap()
    }

    async fn bound_session(renderer: &FakeRenderer) -> (DeviceSession, Arc<MemoryAssets>) {
        let assets = Arc::new(MemoryAssets::default());
        let session = session(renderer, assets.clone());
        session.bind(Some(client(10))).await.unwrap();
        (session, assets)
    }

    #[test]
    fn requires_both_services() {
        let renderer = FakeRenderer::new("uuid:tv");
        let speaker = Device::new("uuid:spk", "Speaker", "urn:x", "http://h/")
            .with_service(renderer.connection_manager.clone());

        let err = DeviceSession::new(&speaker, Arc::new(MemoryAssets::default()), "h")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BridgeError::MissingService { ref service_id, .. } if service_id == AVTRANSPORT_SERVICE_ID
        ));
    }

    #[tokio::test]
    async fn instance_id_follows_binding_for_random_sequences() {
        let renderer = FakeRenderer::new("uuid:tv");
        let session = session(&renderer, Arc::new(MemoryAssets::default()));
        let mut rng = StdRng::seed_from_u64(0xA1);

        for _ in 0..500 {
            let candidate = if rng.random_bool(0.3) {
                None
            } else {
                Some(client(rng.random_range(1..4)))
            };
            let before = session.snapshot().await;
            let outcome = session.bind(candidate).await;
            let after = session.snapshot().await;

            assert_eq!(after.bound_client().is_some(), after.instance_id().is_some());
            if outcome.is_err() {
                assert!(matches!(outcome, Err(BridgeError::DeviceBusy)));
                assert_eq!(before, after);
            }
            if after.media_uri().is_some() {
                assert!(after.bound_client().is_some());
            }
        }
    }

    #[tokio::test]
    async fn second_client_is_rejected_without_side_effects() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.0).await.unwrap();
        let before = session.snapshot().await;
        renderer.avtransport.clear_calls();

        for _ in 0..3 {
            assert!(matches!(
                session.bind(Some(client(20))).await,
                Err(BridgeError::DeviceBusy)
            ));
        }
        assert_eq!(session.snapshot().await, before);
        assert!(renderer.avtransport.actions().is_empty());

        // The holder may keep binding.
        session.bind(Some(client(10))).await.unwrap();
        assert_eq!(session.snapshot().await.instance_id(), Some("0"));
    }

    #[tokio::test]
    async fn get_scrub_without_media_makes_no_remote_call() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;

        assert_eq!(session.get_scrub(holder()).await.unwrap(), (0.0, 0.0));
        assert!(!session.is_playing(holder()).await.unwrap());
        assert!(renderer.avtransport.actions().is_empty());
    }

    #[tokio::test]
    async fn play_loads_then_starts() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;

        session.play(holder(), "http://media/a.mp4", 0.4).await.unwrap();

        assert_eq!(renderer.avtransport.actions(), vec!["SetAVTransportURI", "Play"]);
        let load = renderer.avtransport.last_args("SetAVTransportURI").unwrap();
        assert_eq!(load["InstanceID"], "0");
        assert_eq!(load["CurrentURI"], "http://media/a.mp4");
        assert_eq!(load["CurrentURIMetaData"], "");
        assert_eq!(renderer.avtransport.last_args("Play").unwrap()["Speed"], "1");

        let state = session.snapshot().await;
        assert_eq!(state.phase(), SessionPhase::Loaded);
        assert_eq!(state.pending_fraction(), Some(0.4));
    }

    #[tokio::test]
    async fn first_operation_claims_an_unbound_session() {
        let renderer = FakeRenderer::new("uuid:tv");
        let session = session(&renderer, Arc::new(MemoryAssets::default()));

        session.play(client(30), "http://media/a.mp4", 0.0).await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.bound_client(), Some(client(30)));
        assert_eq!(state.instance_id(), Some("0"));
        assert_eq!(
            renderer.avtransport.last_args("SetAVTransportURI").unwrap()["InstanceID"],
            "0"
        );
    }

    #[tokio::test]
    async fn stale_client_cannot_act_on_a_session_taken_by_another() {
        let renderer = FakeRenderer::new("uuid:tv");
        let session = session(&renderer, Arc::new(MemoryAssets::default()));
        let (a, b) = (client(10), client(20));

        // A plays then stops; B takes the device before A's next request
        // gets past the gate.
        session.bind(Some(a)).await.unwrap();
        session.play(a, "http://a/1.mp4", 0.0).await.unwrap();
        session.bind(Some(a)).await.unwrap();
        session.stop(a).await.unwrap();
        session.bind(Some(b)).await.unwrap();
        session.play(b, "http://b/1.mp4", 0.3).await.unwrap();
        let before = session.snapshot().await;
        renderer.avtransport.clear_calls();

        assert!(matches!(
            session.play(a, "http://a/2.mp4", 0.0).await,
            Err(BridgeError::DeviceBusy)
        ));
        assert!(matches!(session.set_scrub(a, 12.0).await, Err(BridgeError::DeviceBusy)));
        assert!(matches!(session.rate(a, 0.0).await, Err(BridgeError::DeviceBusy)));
        assert!(matches!(session.get_scrub(a).await, Err(BridgeError::DeviceBusy)));
        assert!(matches!(session.is_playing(a).await, Err(BridgeError::DeviceBusy)));
        assert!(matches!(session.reverse(a).await, Err(BridgeError::DeviceBusy)));
        assert!(matches!(
            session.show_image(a, Bytes::from_static(&[0xFF, 0xD8]), None).await,
            Err(BridgeError::DeviceBusy)
        ));
        assert!(matches!(session.stop(a).await, Err(BridgeError::DeviceBusy)));

        assert!(renderer.avtransport.actions().is_empty());
        let after = session.snapshot().await;
        assert_eq!(after, before);
        assert_eq!(after.bound_client(), Some(b));
        assert_eq!(after.media_uri(), Some("http://b/1.mp4"));
    }

    #[tokio::test]
    async fn start_fraction_is_applied_once_duration_is_known() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.5).await.unwrap();

        // Duration not reported yet: keep waiting.
        renderer.avtransport.set_position("NOT_IMPLEMENTED", "0:00:00");
        assert_eq!(session.get_scrub(holder()).await.unwrap(), (0.0, 0.0));
        assert_eq!(session.snapshot().await.pending_fraction(), Some(0.5));

        renderer.avtransport.set_position("0:02:00", "0:00:01");
        assert_eq!(session.get_scrub(holder()).await.unwrap(), (120.0, 1.0));
        assert_eq!(
            renderer.avtransport.last_args("Seek").unwrap()["Target"],
            "00:01:00"
        );
        assert_eq!(renderer.avtransport.last_args("Seek").unwrap()["Unit"], "REL_TIME");
        assert_eq!(session.snapshot().await.pending_fraction(), None);

        renderer.avtransport.clear_calls();
        session.get_scrub(holder()).await.unwrap();
        assert_eq!(renderer.avtransport.actions(), vec!["GetPositionInfo"]);
    }

    #[tokio::test]
    async fn start_fraction_behind_position_does_not_seek() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.1).await.unwrap();

        renderer.avtransport.set_position("0:01:40", "0:00:30");
        session.get_scrub(holder()).await.unwrap();

        assert!(!renderer.avtransport.actions().contains(&"Seek".to_string()));
        assert_eq!(session.snapshot().await.pending_fraction(), None);
    }

    #[tokio::test]
    async fn scrub_before_play_wins_over_start_fraction() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;

        session.set_scrub(holder(), 42.0).await.unwrap();
        assert_eq!(session.snapshot().await.pending_precise(), Some(42.0));
        assert!(renderer.avtransport.actions().is_empty());

        session.play(holder(), "http://media/a.mp4", 0.9).await.unwrap();
        assert_eq!(
            renderer.avtransport.actions(),
            vec!["SetAVTransportURI", "Play", "Seek"]
        );
        assert_eq!(
            renderer.avtransport.last_args("Seek").unwrap()["Target"],
            "00:00:42"
        );

        let state = session.snapshot().await;
        assert_eq!(state.pending_precise(), None);
        assert_eq!(state.pending_fraction(), None);
    }

    #[tokio::test]
    async fn rate_pauses_and_resumes() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.0).await.unwrap();
        renderer.avtransport.set_position("0:01:00", "0:00:05");
        session.get_scrub(holder()).await.unwrap();
        renderer.avtransport.clear_calls();

        session.rate(holder(), 0.0).await.unwrap();
        assert_eq!(renderer.avtransport.actions(), vec!["Pause"]);

        renderer.avtransport.clear_calls();
        renderer.avtransport.set_transport_state("PAUSED_PLAYBACK");
        session.rate(holder(), 1.0).await.unwrap();
        assert_eq!(renderer.avtransport.actions(), vec!["GetTransportInfo", "Play"]);

        renderer.avtransport.clear_calls();
        renderer.avtransport.set_transport_state("PLAYING");
        session.rate(holder(), 1.0).await.unwrap();
        assert_eq!(renderer.avtransport.actions(), vec!["GetTransportInfo"]);
        assert!(session.is_playing(holder()).await.unwrap());
    }

    #[tokio::test]
    async fn rate_resolves_pending_fraction() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.25).await.unwrap();
        renderer.avtransport.clear_calls();
        renderer.avtransport.set_transport_state("TRANSITIONING");
        renderer.avtransport.set_position("0:04:00", "0:00:00");

        session.rate(holder(), 1.0).await.unwrap();

        assert_eq!(
            renderer.avtransport.actions(),
            vec!["GetTransportInfo", "GetPositionInfo", "Seek"]
        );
        assert_eq!(
            renderer.avtransport.last_args("Seek").unwrap()["Target"],
            "00:01:00"
        );
    }

    #[tokio::test]
    async fn stop_retries_invalid_instance_then_cleans_up() {
        let renderer = FakeRenderer::new("uuid:tv");
        let assets = Arc::new(MemoryAssets::default());
        let session = session(&renderer, assets).with_stop_retries(2);
        session.bind(Some(client(10))).await.unwrap();
        session.play(holder(), "http://media/a.mp4", 0.0).await.unwrap();
        renderer.avtransport.clear_calls();

        renderer.avtransport.fault("Stop", INVALID_INSTANCE_ID);
        renderer.avtransport.fault("Stop", INVALID_INSTANCE_ID);
        session.stop(holder()).await.unwrap();

        assert_eq!(renderer.avtransport.actions(), vec!["Stop", "Stop", "Stop"]);
        let state = session.snapshot().await;
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert_eq!(state.instance_id(), None);
    }

    #[tokio::test]
    async fn exhausted_stop_retries_still_clean_up() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.0).await.unwrap();
        renderer.avtransport.clear_calls();

        for _ in 0..5 {
            renderer.avtransport.fault("Stop", INVALID_INSTANCE_ID);
        }
        session.stop(holder()).await.unwrap();

        assert_eq!(
            renderer.avtransport.actions().len(),
            1 + DEFAULT_STOP_RETRIES as usize
        );
        assert_eq!(session.snapshot().await.phase(), SessionPhase::Idle);
        // Another client can now take the device.
        session.bind(Some(client(20))).await.unwrap();
    }

    #[tokio::test]
    async fn other_stop_faults_are_reported_after_cleanup() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;
        session.play(holder(), "http://media/a.mp4", 0.0).await.unwrap();
        renderer.avtransport.clear_calls();
        renderer.avtransport.fault("Stop", "701");

        let err = session.stop(holder()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Action(ref e) if e.fault_code() == Some("701")));
        assert_eq!(renderer.avtransport.actions(), vec!["Stop"]);
        assert_eq!(session.snapshot().await.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn stop_without_media_is_a_no_op() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, _) = bound_session(&renderer).await;

        session.stop(holder()).await.unwrap();

        assert!(renderer.avtransport.actions().is_empty());
        assert_eq!(session.snapshot().await.phase(), SessionPhase::BoundIdle);
    }

    #[tokio::test]
    async fn photos_are_published_and_replaced() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, assets) = bound_session(&renderer).await;

        session
            .show_image(holder(), Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0]), None)
            .await
            .unwrap();
        let first = session.snapshot().await.published_asset().unwrap().to_string();
        assert!(first.ends_with(".jpg"));
        let load = renderer.avtransport.last_args("SetAVTransportURI").unwrap();
        assert_eq!(
            load["CurrentURI"],
            format!("http://10.0.0.2:{}/{}", ASSET_PORT, first)
        );
        assert_eq!(renderer.avtransport.actions(), vec!["SetAVTransportURI", "Play"]);

        session
            .show_image(holder(), Bytes::from_static(b"GIF89a"), Some("Dissolve".into()))
            .await
            .unwrap();
        let second = session.snapshot().await.published_asset().unwrap().to_string();
        assert!(!second.ends_with(".jpg"));
        assert_ne!(first, second);
        assert_eq!(assets.live(), vec![second.clone()]);

        session.stop(holder()).await.unwrap();
        assert!(assets.live().is_empty());
        assert_eq!(session.snapshot().await.published_asset(), None);
    }

    #[tokio::test]
    async fn shutdown_releases_everything_without_remote_calls() {
        let renderer = FakeRenderer::new("uuid:tv");
        let (session, assets) = bound_session(&renderer).await;
        session
            .show_image(holder(), Bytes::from_static(&[0xFF, 0xD8]), None)
            .await
            .unwrap();
        renderer.avtransport.clear_calls();

        session.shutdown().await;

        assert!(renderer.avtransport.actions().is_empty());
        assert!(assets.live().is_empty());
        assert_eq!(session.snapshot().await, SessionState::default());
    }
}
