use thiserror::Error;

/// Failures of the UPnP plumbing itself (HTTP, XML, descriptions).
#[derive(Debug, Error)]
pub enum UpnpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("XML parsing error: {0}")]
    Xml(#[from] xmltree::ParseError),
    #[error("XML writing error: {0}")]
    XmlWrite(#[from] xmltree::Error),
    #[error("Invalid URL '{0}': {1}")]
    Url(String, url::ParseError),
    #[error("Missing {0} element")]
    MissingElement(String),
    #[error("Malformed SOAP envelope: {0}")]
    Soap(String),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpnpError {
    pub fn missing_element(name: &str) -> Self {
        UpnpError::MissingElement(name.to_string())
    }
}

/// Outcome of a failed action invocation on a [`crate::ServiceHandle`].
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// The device answered with a SOAP fault; `code` is the UPnP error code
    /// (e.g. `"718"`), or the SOAP faultcode when no UPnP detail was given.
    #[error("{action} returned UPnP error {code}: {description}")]
    Fault {
        action: String,
        code: String,
        description: String,
    },
    #[error("{action} failed: {message}")]
    Transport { action: String, message: String },
    #[error("{action} returned an invalid response: {message}")]
    InvalidResponse { action: String, message: String },
}

impl ActionError {
    pub fn fault(action: &str, code: &str, description: &str) -> Self {
        ActionError::Fault {
            action: action.to_string(),
            code: code.to_string(),
            description: description.to_string(),
        }
    }

    pub fn transport(action: &str, message: impl ToString) -> Self {
        ActionError::Transport {
            action: action.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(action: &str, message: impl ToString) -> Self {
        ActionError::InvalidResponse {
            action: action.to_string(),
            message: message.to_string(),
        }
    }

    /// UPnP error code carried by a fault, if any.
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            ActionError::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_faults_carry_a_code() {
        assert_eq!(
            ActionError::fault("Stop", "718", "Invalid InstanceID").fault_code(),
            Some("718")
        );
        assert_eq!(ActionError::transport("Stop", "timeout").fault_code(), None);
    }

    #[test]
    fn fault_message_names_the_action() {
        let err = ActionError::fault("Seek", "710", "Seek mode not supported");
        assert_eq!(
            err.to_string(),
            "Seek returned UPnP error 710: Seek mode not supported"
        );
    }
}
