//! Decoding of action responses

use std::collections::HashMap;

use xmltree::Element;

use super::fault::SoapFault;
use crate::errors::UpnpError;
use crate::xml_utils::child_named;

/// What a renderer answered to an action.
#[derive(Debug, Clone)]
pub enum SoapOutcome {
    /// Output arguments of `<ActionName>Response`
    Response(HashMap<String, String>),
    Fault(SoapFault),
}

/// Decodes a SOAP reply to `action`.
///
/// The HTTP status is not trusted: renderers send faults with 200 and
/// successes with odd statuses, so only the envelope content decides.
pub fn parse_action_response(xml: &[u8], action: &str) -> Result<SoapOutcome, UpnpError> {
    let root = Element::parse(xml)?;
    if root.name != "Envelope" {
        return Err(UpnpError::Soap(format!("root element is <{}>", root.name)));
    }
    let body = child_named(&root, "Body").ok_or_else(|| UpnpError::missing_element("Body"))?;

    if let Some(fault) = child_named(body, "Fault") {
        return Ok(SoapOutcome::Fault(SoapFault::from_element(fault)));
    }

    let expected = format!("{}Response", action);
    let response = child_named(body, &expected)
        .ok_or_else(|| UpnpError::MissingElement(expected.clone()))?;

    let outputs = response
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .map(|arg| {
            let value = arg.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (arg.name.clone(), value)
        })
        .collect();

    Ok(SoapOutcome::Response(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_output_arguments() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:GetPositionInfoResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
      <Track>1</Track>
      <TrackDuration>0:01:40</TrackDuration>
      <RelTime>0:00:12</RelTime>
      <TrackURI></TrackURI>
    </u:GetPositionInfoResponse>
  </s:Body>
</s:Envelope>"#;

        match parse_action_response(xml.as_bytes(), "GetPositionInfo").unwrap() {
            SoapOutcome::Response(out) => {
                assert_eq!(out["TrackDuration"], "0:01:40");
                assert_eq!(out["RelTime"], "0:00:12");
                assert_eq!(out["TrackURI"], "");
            }
            SoapOutcome::Fault(f) => panic!("unexpected fault {:?}", f),
        }
    }

    #[test]
    fn empty_response_element_is_success() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:StopResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"/></s:Body></s:Envelope>"#;
        match parse_action_response(xml.as_bytes(), "Stop").unwrap() {
            SoapOutcome::Response(out) => assert!(out.is_empty()),
            SoapOutcome::Fault(f) => panic!("unexpected fault {:?}", f),
        }
    }

    #[test]
    fn reads_upnp_fault_detail() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>718</errorCode>
          <errorDescription>Invalid InstanceID</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

        match parse_action_response(xml.as_bytes(), "Stop").unwrap() {
            SoapOutcome::Fault(fault) => {
                assert_eq!(fault.fault_code, "s:Client");
                assert_eq!(fault.code(), "718");
                assert_eq!(fault.description(), "Invalid InstanceID");
            }
            SoapOutcome::Response(_) => panic!("expected a fault"),
        }
    }

    #[test]
    fn fault_without_detail_falls_back_to_faultcode() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Server</faultcode><faultstring>boom</faultstring></s:Fault></s:Body></s:Envelope>"#;
        match parse_action_response(xml.as_bytes(), "Play").unwrap() {
            SoapOutcome::Fault(fault) => {
                assert_eq!(fault.code(), "s:Server");
                assert_eq!(fault.description(), "boom");
                assert!(fault.upnp_error.is_none());
            }
            SoapOutcome::Response(_) => panic!("expected a fault"),
        }
    }

    #[test]
    fn rejects_wrong_response_or_document() {
        let other = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:PlayResponse xmlns:u="x"/></s:Body></s:Envelope>"#;
        assert!(matches!(
            parse_action_response(other.as_bytes(), "Stop"),
            Err(UpnpError::MissingElement(_))
        ));
        assert!(matches!(
            parse_action_response(b"<html><body>404</body></html>", "Stop"),
            Err(UpnpError::Soap(_))
        ));
        assert!(parse_action_response(b"not xml", "Stop").is_err());
    }
}
