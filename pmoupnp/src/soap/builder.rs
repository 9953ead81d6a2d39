//! SOAP request construction

use xmltree::{Element, EmitterConfig, XMLNode};

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Value of the `SOAPACTION` header for `action` on `service_type`.
pub fn soap_action_header(service_type: &str, action: &str) -> String {
    format!("\"{}#{}\"", service_type, action)
}

/// Builds the request envelope for `action` with its input arguments, in
/// the order given.
pub fn build_soap_request(
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let mut action_elem = Element::new(&format!("u:{}", action));
    action_elem
        .attributes
        .insert("xmlns:u".to_string(), service_type.to_string());

    for (name, value) in args {
        let mut arg = Element::new(name);
        arg.children.push(XMLNode::Text((*value).to_string()));
        action_elem.children.push(XMLNode::Element(arg));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(action_elem));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING_NS.to_string());
    envelope.children.push(XMLNode::Element(body));

    // Some renderers choke on pretty-printed envelopes.
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(false);
    let mut buf = Vec::new();
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_action_namespace_and_args() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "Seek",
            &[("InstanceID", "0"), ("Unit", "REL_TIME"), ("Target", "00:00:30")],
        )
        .unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<u:Seek"));
        assert!(xml.contains("xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\""));
        let instance = xml.find("<InstanceID>0</InstanceID>").unwrap();
        let unit = xml.find("<Unit>REL_TIME</Unit>").unwrap();
        let target = xml.find("<Target>00:00:30</Target>").unwrap();
        assert!(instance < unit && unit < target);
    }

    #[test]
    fn argument_values_are_escaped() {
        let xml = build_soap_request(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "SetAVTransportURI",
            &[("CurrentURI", "http://h/v.mp4?a=1&b=2")],
        )
        .unwrap();
        assert!(xml.contains("http://h/v.mp4?a=1&amp;b=2"));
    }

    #[test]
    fn soap_action_header_is_quoted() {
        assert_eq!(
            soap_action_header("urn:schemas-upnp-org:service:AVTransport:1", "Play"),
            "\"urn:schemas-upnp-org:service:AVTransport:1#Play\""
        );
    }
}
