//! # PMOAirPnP Configuration Module
//!
//! Configuration management for the AirPlay to UPnP bridge:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides (`PMOAIRPNP_CONFIG__SECTION__KEY=value`)
//! - Typed getters and setters with defaults
//! - Thread-safe singleton access
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let base_port = config.get_bridge_base_port();
//! config.set_interactive_web_enabled(true)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

mod network;

pub use network::guess_local_ip;

const DEFAULT_CONFIG: &str = include_str!("pmoairpnp.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOAirPnP configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOAIRPNP_CONFIG";
const ENV_PREFIX: &str = "PMOAIRPNP_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmoairpnp";

const DEFAULT_BASE_PORT: u16 = 22555;
const DEFAULT_STOP_RETRIES: u32 = 1;
const DEFAULT_PHOTO_PORT: u16 = 0;
const DEFAULT_PHOTO_CAPACITY: usize = 5;
const DEFAULT_INTERACTIVE_WEB_PORT: u16 = 28080;
const DEFAULT_SOAP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SEARCH_INTERVAL_SECS: u64 = 60;
const DEFAULT_SEARCH_MX: u32 = 3;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Generates a getter/setter pair for an unsigned value with a default.
///
/// Numbers given as strings (typically from environment overrides) are
/// accepted; anything else falls back to the default with a warning.
macro_rules! impl_unsigned_config {
    ($getter:ident, $setter:ident, $ty:ty, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> $ty {
            let path: &[&str] = $path;
            let parsed = match self.get_value(path) {
                Ok(Value::Number(n)) => n.as_u64().and_then(|v| <$ty>::try_from(v).ok()),
                Ok(Value::String(s)) => s.trim().parse::<$ty>().ok(),
                Ok(_) => None,
                Err(_) => return $default,
            };
            parsed.unwrap_or_else(|| {
                warn!(
                    key = %path.join("."),
                    default = %$default,
                    "Invalid configuration value, using default"
                );
                $default
            })
        }

        pub fn $setter(&self, value: $ty) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Generates a getter/setter pair for a boolean value with a default.
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for PMOAirPnP
///
/// Holds the merged YAML tree and writes it back to `config.yaml` on every
/// change, so the file on disk always lists every known key.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Creates the directory if needed and checks it is writable
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Loads the configuration from the specified directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOAIRPNP_CONFIG` environment variable
    /// 3. `.pmoairpnp` in the current directory
    /// 4. `.pmoairpnp` in the user's home directory
    ///
    /// The embedded defaults are merged with `config.yaml` (if present),
    /// environment overrides are applied, and the result is saved back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .to_string();

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &lower_keys(external));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using embedded defaults");
            }
        }

        let mut config_value = lower_keys(config_value);
        apply_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let data = self.lock_data()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// `path` is the list of keys, e.g. `&["bridge", "base_port"]`.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock_data()?;
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data()?;
        get_value_internal(&data, path)
    }

    fn lock_data(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration mutex poisoned"))
    }

    /// Host name or address the renderers use to reach this machine.
    ///
    /// Falls back to the guessed local IP when not configured.
    pub fn get_hostname(&self) -> String {
        match self.get_value(&["host", "hostname"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => guess_local_ip(),
        }
    }

    pub fn set_hostname(&self, hostname: String) -> Result<()> {
        self.set_value(&["host", "hostname"], Value::String(hostname))
    }

    /// Minimum log level name (`TRACE` … `ERROR`)
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => s,
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        true
    );

    impl_unsigned_config!(
        get_bridge_base_port,
        set_bridge_base_port,
        u16,
        &["bridge", "base_port"],
        DEFAULT_BASE_PORT
    );

    impl_unsigned_config!(
        get_stop_retries,
        set_stop_retries,
        u32,
        &["bridge", "stop_retries"],
        DEFAULT_STOP_RETRIES
    );

    impl_bool_config!(
        get_bonjour_enabled,
        set_bonjour_enabled,
        &["airplay", "bonjour"],
        true
    );

    impl_unsigned_config!(
        get_photo_port,
        set_photo_port,
        u16,
        &["photos", "port"],
        DEFAULT_PHOTO_PORT
    );

    impl_unsigned_config!(
        get_photo_capacity,
        set_photo_capacity,
        usize,
        &["photos", "capacity"],
        DEFAULT_PHOTO_CAPACITY
    );

    impl_bool_config!(
        get_interactive_web_enabled,
        set_interactive_web_enabled,
        &["interactive_web", "enabled"],
        false
    );

    impl_unsigned_config!(
        get_interactive_web_port,
        set_interactive_web_port,
        u16,
        &["interactive_web", "port"],
        DEFAULT_INTERACTIVE_WEB_PORT
    );

    impl_unsigned_config!(
        get_soap_timeout_secs,
        set_soap_timeout_secs,
        u64,
        &["upnp", "soap_timeout_secs"],
        DEFAULT_SOAP_TIMEOUT_SECS
    );

    impl_unsigned_config!(
        get_search_interval_secs,
        set_search_interval_secs,
        u64,
        &["upnp", "search_interval_secs"],
        DEFAULT_SEARCH_INTERVAL_SECS
    );

    impl_unsigned_config!(
        get_search_mx,
        set_search_mx,
        u32,
        &["upnp", "search_mx"],
        DEFAULT_SEARCH_MX
    );
}

/// Returns the global configuration instance, loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };

    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
        set_value_internal(entry, rest, value)
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        let Value::Mapping(map) = current else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        };
        current = map
            .get(&Value::String(key.to_lowercase()))
            .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
    }
    Ok(current.clone())
}

/// Applies `PMOAIRPNP_CONFIG__A__B=value` pairs on top of the tree.
///
/// Values are parsed as YAML so `true` or `8080` keep their type.
fn apply_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = stripped.split("__").collect::<Vec<_>>();
        let yaml_value = serde_yaml::from_str::<Value>(&value)
            .unwrap_or_else(|_| Value::String(value.clone()));
        if let Err(err) = set_value_internal(config, &key_path, yaml_value) {
            warn!(key = %key, error = %err, "Ignoring environment override");
        }
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        other => other,
    }
}

/// Recursively merges `external` into `default`: mappings are merged key by
/// key, scalars and sequences are replaced.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
