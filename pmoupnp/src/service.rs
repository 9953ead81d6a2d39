//! Callable services of a remote device.
//!
//! The bridge never talks SOAP directly: it holds `Arc<dyn ServiceHandle>`
//! per service id and invokes actions by name. [`SoapService`] is the
//! network implementation; tests substitute scripted handles.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use crate::description::ServiceDescription;
use crate::errors::ActionError;
use crate::soap::{SoapOutcome, build_soap_request, parse_action_response, soap_action_header};

/// Output arguments of a successful action, by name.
pub type ActionResult = HashMap<String, String>;

#[async_trait]
pub trait ServiceHandle: Send + Sync + fmt::Debug {
    /// e.g. `urn:upnp-org:serviceId:AVTransport`
    fn service_id(&self) -> &str;

    /// e.g. `urn:schemas-upnp-org:service:AVTransport:1`
    fn service_type(&self) -> &str;

    /// Whether the service advertises `action`.
    fn supports(&self, action: &str) -> bool;

    /// Invokes `action` with its input arguments.
    async fn invoke(&self, action: &str, args: &[(&str, &str)])
    -> Result<ActionResult, ActionError>;
}

/// A service reached through its SOAP control URL.
#[derive(Clone)]
pub struct SoapService {
    service_id: String,
    service_type: String,
    control_url: String,
    actions: HashSet<String>,
    http: reqwest::Client,
}

impl SoapService {
    pub fn new(
        http: reqwest::Client,
        service_id: &str,
        service_type: &str,
        control_url: &str,
        actions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            service_id: service_id.to_string(),
            service_type: service_type.to_string(),
            control_url: control_url.to_string(),
            actions: actions.into_iter().collect(),
            http,
        }
    }

    pub fn from_description(
        http: reqwest::Client,
        description: &ServiceDescription,
        actions: Vec<String>,
    ) -> Self {
        Self::new(
            http,
            &description.service_id,
            &description.service_type,
            &description.control_url,
            actions,
        )
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }
}

impl fmt::Debug for SoapService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapService")
            .field("service_id", &self.service_id)
            .field("control_url", &self.control_url)
            .field("actions", &self.actions.len())
            .finish()
    }
}

#[async_trait]
impl ServiceHandle for SoapService {
    fn service_id(&self) -> &str {
        &self.service_id
    }

    fn service_type(&self) -> &str {
        &self.service_type
    }

    fn supports(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    async fn invoke(
        &self,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<ActionResult, ActionError> {
        let body = build_soap_request(&self.service_type, action, args)
            .map_err(|e| ActionError::transport(action, format!("cannot build request: {}", e)))?;

        trace!(service = %self.service_id, action, "SOAP request: {}", body);

        let response = self
            .http
            .post(&self.control_url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap_action_header(&self.service_type, action))
            .body(body)
            .send()
            .await
            .map_err(|e| ActionError::transport(action, e))?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|e| ActionError::transport(action, e))?;

        match parse_action_response(&raw, action) {
            Ok(SoapOutcome::Response(outputs)) => {
                debug!(service = %self.service_id, action, "✅ {} succeeded", action);
                Ok(outputs)
            }
            Ok(SoapOutcome::Fault(fault)) => {
                debug!(
                    service = %self.service_id,
                    action,
                    code = fault.code(),
                    "SOAP fault: {}",
                    fault.description()
                );
                Err(ActionError::fault(action, fault.code(), fault.description()))
            }
            Err(e) if !status.is_success() => Err(ActionError::transport(
                action,
                format!("HTTP {} ({})", status, e),
            )),
            Err(e) => Err(ActionError::invalid_response(action, e)),
        }
    }
}
