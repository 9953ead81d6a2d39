//! In-memory renderer and asset server used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use pmoupnp::{
    AVTRANSPORT_SERVICE_ID, ActionError, ActionResult, CONNECTION_MANAGER_SERVICE_ID, Device,
    MEDIA_RENDERER_DEVICE_TYPE, ServiceHandle,
};

use crate::assets::AssetPublisher;

pub const ASSET_PORT: u16 = 8088;

/// A service answering from per-action scripts, recording every call.
///
/// Unscripted actions succeed with the default outputs set for them, or
/// with no outputs at all.
#[derive(Debug)]
pub struct ScriptedService {
    service_id: &'static str,
    supported: Vec<&'static str>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    scripts: Mutex<HashMap<String, VecDeque<Result<ActionResult, ActionError>>>>,
    defaults: Mutex<HashMap<String, ActionResult>>,
}

impl ScriptedService {
    pub fn new(service_id: &'static str, supported: Vec<&'static str>) -> Self {
        Self {
            service_id,
            supported,
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
        }
    }

    /// Queues a one-shot answer for `action`.
    pub fn script(&self, action: &str, answer: Result<ActionResult, ActionError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn fault(&self, action: &str, code: &str) {
        self.script(action, Err(ActionError::fault(action, code, "scripted")));
    }

    /// Answer used once the script for `action` is exhausted.
    pub fn set_default(&self, action: &str, outputs: &[(&str, &str)]) {
        self.defaults.lock().unwrap().insert(
            action.to_string(),
            outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn set_position(&self, duration: &str, position: &str) {
        self.set_default(
            "GetPositionInfo",
            &[("TrackDuration", duration), ("RelTime", position)],
        );
    }

    pub fn set_transport_state(&self, state: &str) {
        self.set_default("GetTransportInfo", &[("CurrentTransportState", state)]);
    }

    /// Names of the invoked actions, in order.
    pub fn actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(action, _)| action.clone())
            .collect()
    }

    /// Arguments of the last call to `action`.
    pub fn last_args(&self, action: &str) -> Option<HashMap<String, String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| name == action)
            .map(|(_, args)| args.iter().cloned().collect())
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ServiceHandle for ScriptedService {
    fn service_id(&self) -> &str {
        self.service_id
    }

    fn service_type(&self) -> &str {
        "urn:schemas-upnp-org:service:Scripted:1"
    }

    fn supports(&self, action: &str) -> bool {
        self.supported.contains(&action)
    }

    async fn invoke(
        &self,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<ActionResult, ActionError> {
        self.calls.lock().unwrap().push((
            action.to_string(),
            args.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(action)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(answer) => answer,
            None => Ok(self
                .defaults
                .lock()
                .unwrap()
                .get(action)
                .cloned()
                .unwrap_or_default()),
        }
    }
}

/// Keeps published asset names in memory.
#[derive(Default)]
pub struct MemoryAssets {
    pub published: Mutex<Vec<String>>,
    pub unpublished: Mutex<Vec<String>>,
}

impl MemoryAssets {
    pub fn live(&self) -> Vec<String> {
        let gone = self.unpublished.lock().unwrap().clone();
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|name| !gone.contains(name))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AssetPublisher for MemoryAssets {
    async fn publish(&self, name: &str, _content_type: &str, _data: Bytes) {
        self.published.lock().unwrap().push(name.to_string());
    }

    async fn unpublish(&self, name: &str) {
        self.unpublished.lock().unwrap().push(name.to_string());
    }

    fn port(&self) -> u16 {
        ASSET_PORT
    }
}

/// A renderer exposing both required services.
pub struct FakeRenderer {
    pub device: Device,
    pub avtransport: Arc<ScriptedService>,
    pub connection_manager: Arc<ScriptedService>,
}

impl FakeRenderer {
    pub fn new(udn: &str) -> Self {
        let avtransport = Arc::new(ScriptedService::new(
            AVTRANSPORT_SERVICE_ID,
            vec![
                "SetAVTransportURI",
                "Play",
                "Pause",
                "Stop",
                "Seek",
                "GetPositionInfo",
                "GetTransportInfo",
            ],
        ));
        let connection_manager = Arc::new(ScriptedService::new(
            CONNECTION_MANAGER_SERVICE_ID,
            vec!["GetProtocolInfo"],
        ));
        let device = Device::new(
            udn,
            "Living Room TV",
            MEDIA_RENDERER_DEVICE_TYPE,
            "http://10.0.0.8:49152/description.xml",
        )
        .with_service(avtransport.clone())
        .with_service(connection_manager.clone());

        Self {
            device,
            avtransport,
            connection_manager,
        }
    }
}
