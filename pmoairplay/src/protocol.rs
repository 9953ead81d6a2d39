//! AirPlay wire formats: `text/parameters` request bodies, XML property
//! lists and the `/scrub` text body.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write;
use std::hash::{Hash, Hasher};

use quick_xml::escape::escape;

pub const PLIST_CONTENT_TYPE: &str = "text/x-apple-plist+xml";
pub const PARAMETERS_CONTENT_TYPE: &str = "text/parameters";

/// Video, photo, slideshow, screen, screen rotate and audio.
pub const FEATURES: u32 = 0x77;
pub const MODEL: &str = "AppleTV2,1";
pub const SOURCE_VERSION: &str = "101.28";
pub const PROTOCOL_VERSION: &str = "1.0";

/// Parses a `text/parameters` body (`Name: value` per line).
///
/// ```
/// # use pmoairplay::protocol::parse_parameters;
/// let params = parse_parameters("Content-Location: http://h/v.mp4\nStart-Position: 0.25\n");
/// assert_eq!(params["Content-Location"], "http://h/v.mp4");
/// assert_eq!(params["Start-Position"], "0.25");
/// ```
pub fn parse_parameters(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Body of `GET /scrub`.
pub fn scrub_body(duration: f64, position: f64) -> String {
    format!("duration: {:.6}\nposition: {:.6}\n", duration, position)
}

/// A MAC-like device id derived from a stable seed such as a UDN.
///
/// Uses the last 12 hex digits of the seed when it has them, a hash of
/// the seed otherwise.
pub fn device_id_from(seed: &str) -> String {
    let digits: Vec<char> = seed.chars().filter(char::is_ascii_hexdigit).collect();
    let hex = if digits.len() >= 12 {
        digits[digits.len() - 12..].iter().collect::<String>()
    } else {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        format!("{:012x}", hasher.finish() & 0xffff_ffff_ffff)
    };

    hex.to_ascii_uppercase()
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// Identity of an endpoint, served on `/server-info` and in the Bonjour TXT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub device_id: String,
    pub features: u32,
    pub model: String,
    pub protocol_version: String,
    pub source_version: String,
}

impl ServerInfo {
    pub fn new(seed: &str) -> Self {
        Self {
            device_id: device_id_from(seed),
            features: FEATURES,
            model: MODEL.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            source_version: SOURCE_VERSION.to_string(),
        }
    }

    pub fn features_hex(&self) -> String {
        format!("0x{:X}", self.features)
    }

    /// TXT records of the `_airplay._tcp` service.
    pub fn txt_records(&self) -> Vec<(&'static str, String)> {
        vec![
            ("deviceid", self.device_id.clone()),
            ("features", self.features_hex()),
            ("model", self.model.clone()),
            ("srcvers", self.source_version.clone()),
        ]
    }

    pub fn to_plist(&self) -> String {
        let mut dict = PlistDict::default();
        dict.string("deviceid", &self.device_id);
        dict.integer("features", i64::from(self.features));
        dict.string("model", &self.model);
        dict.string("protovers", &self.protocol_version);
        dict.string("srcvers", &self.source_version);
        dict.finish()
    }
}

/// Answer to `GET /playback-info`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackInfo {
    pub duration: f64,
    pub position: f64,
    pub playing: bool,
}

impl PlaybackInfo {
    pub fn to_plist(&self) -> String {
        let loaded = self.duration > 0.0;
        let mut dict = PlistDict::default();
        dict.real("duration", self.duration);
        dict.real("position", self.position);
        dict.real("rate", if self.playing { 1.0 } else { 0.0 });
        dict.boolean("readyToPlay", loaded);
        dict.boolean("playbackBufferEmpty", !loaded);
        dict.boolean("playbackBufferFull", false);
        dict.boolean("playbackLikelyToKeepUp", true);
        dict.time_ranges("loadedTimeRanges", loaded.then_some(self.duration));
        dict.time_ranges("seekableTimeRanges", loaded.then_some(self.duration));
        dict.finish()
    }
}

/// Minimal writer for flat XML plist dictionaries.
#[derive(Default)]
struct PlistDict {
    body: String,
}

impl PlistDict {
    fn key(&mut self, key: &str) {
        let _ = writeln!(self.body, "  <key>{}</key>", escape(key));
    }

    fn string(&mut self, key: &str, value: &str) {
        self.key(key);
        let _ = writeln!(self.body, "  <string>{}</string>", escape(value));
    }

    fn integer(&mut self, key: &str, value: i64) {
        self.key(key);
        let _ = writeln!(self.body, "  <integer>{}</integer>", value);
    }

    fn real(&mut self, key: &str, value: f64) {
        self.key(key);
        let _ = writeln!(self.body, "  <real>{:.6}</real>", value);
    }

    fn boolean(&mut self, key: &str, value: bool) {
        self.key(key);
        self.body
            .push_str(if value { "  <true/>\n" } else { "  <false/>\n" });
    }

    /// A single `[0, duration]` range, or an empty array.
    fn time_ranges(&mut self, key: &str, duration: Option<f64>) {
        self.key(key);
        match duration {
            Some(duration) => {
                let _ = writeln!(
                    self.body,
                    "  <array>\n    <dict>\n      <key>duration</key>\n      <real>{:.6}</real>\n      <key>start</key>\n      <real>0.000000</real>\n    </dict>\n  </array>",
                    duration
                );
            }
            None => self.body.push_str("  <array/>\n"),
        }
    }

    fn finish(self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
             <plist version=\"1.0\">\n<dict>\n{}</dict>\n</plist>\n",
            self.body
        )
    }
}
