//! Parsing of SSDP datagrams

use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::trace;

use super::DEFAULT_MAX_AGE;

/// An announcement relevant to a control point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpMessage {
    /// `NOTIFY` with `NTS: ssdp:alive`
    Alive {
        usn: String,
        nt: String,
        location: String,
        max_age: u32,
        from: SocketAddr,
    },
    /// `NOTIFY` with `NTS: ssdp:byebye`
    ByeBye {
        usn: String,
        nt: String,
        from: SocketAddr,
    },
    /// `HTTP/1.1 200 OK` answer to our M-SEARCH
    SearchResponse {
        usn: String,
        st: String,
        location: String,
        max_age: u32,
        from: SocketAddr,
    },
}

impl SsdpMessage {
    pub fn usn(&self) -> &str {
        match self {
            SsdpMessage::Alive { usn, .. }
            | SsdpMessage::ByeBye { usn, .. }
            | SsdpMessage::SearchResponse { usn, .. } => usn,
        }
    }

    /// `NT` of a notification or `ST` of a search response.
    pub fn target(&self) -> &str {
        match self {
            SsdpMessage::Alive { nt, .. } | SsdpMessage::ByeBye { nt, .. } => nt,
            SsdpMessage::SearchResponse { st, .. } => st,
        }
    }

    /// Device UDN: the `uuid:...` part of the USN, before any `::`.
    pub fn udn(&self) -> &str {
        let usn = self.usn();
        usn.split_once("::").map_or(usn, |(udn, _)| udn)
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            SsdpMessage::Alive { location, .. } | SsdpMessage::SearchResponse { location, .. } => {
                Some(location)
            }
            SsdpMessage::ByeBye { .. } => None,
        }
    }

    pub fn max_age(&self) -> Option<u32> {
        match self {
            SsdpMessage::Alive { max_age, .. } | SsdpMessage::SearchResponse { max_age, .. } => {
                Some(*max_age)
            }
            SsdpMessage::ByeBye { .. } => None,
        }
    }
}

/// Parses one datagram; anything that is not a complete alive, byebye
/// or search response yields `None`.
pub fn parse_message(data: &str, from: SocketAddr) -> Option<SsdpMessage> {
    let mut lines = data.lines();
    let start_line = lines.next()?.trim().to_ascii_uppercase();
    let headers = parse_headers(lines);
    let header = |name: &str| headers.get(name).cloned();

    if start_line.starts_with("NOTIFY ") {
        let nt = header("NT")?;
        let usn = header("USN")?;
        match header("NTS")?.to_ascii_lowercase().as_str() {
            "ssdp:alive" => Some(SsdpMessage::Alive {
                usn,
                nt,
                location: header("LOCATION")?,
                max_age: parse_max_age(headers.get("CACHE-CONTROL").map(String::as_str)),
                from,
            }),
            "ssdp:byebye" => Some(SsdpMessage::ByeBye { usn, nt, from }),
            other => {
                trace!("Ignoring NOTIFY {} from {}", other, from);
                None
            }
        }
    } else if start_line.starts_with("HTTP/") && start_line.contains(" 200") {
        Some(SsdpMessage::SearchResponse {
            usn: header("USN")?,
            st: header("ST")?,
            location: header("LOCATION")?,
            max_age: parse_max_age(headers.get("CACHE-CONTROL").map(String::as_str)),
            from,
        })
    } else {
        None
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .map(str::trim)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_uppercase(), value.trim().to_string()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .collect()
}

/// Reads `max-age=N` out of a `CACHE-CONTROL` value.
fn parse_max_age(cache_control: Option<&str>) -> u32 {
    cache_control
        .and_then(|value| {
            value.split(',').find_map(|directive| {
                let (key, age) = directive.split_once('=')?;
                if key.trim().eq_ignore_ascii_case("max-age") {
                    age.trim().parse().ok()
                } else {
                    None
                }
            })
        })
        .unwrap_or(DEFAULT_MAX_AGE)
}
