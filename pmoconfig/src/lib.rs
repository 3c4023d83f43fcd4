//! # PMOBml Configuration Module
//!
//! Configuration management for the data-broadcasting bridge:
//! - YAML file loaded from a configuration directory
//! - merged over an embedded default configuration
//! - environment variable overrides (`PMOBML_CONFIG__SECTION__KEY=value`)
//! - typed getters and setters, each setter saving the file back
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let timeout = config.get_indicator_timeout_ms()?;
//! config.set_network_enabled(true)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmobml.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOBml configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOBML_CONFIG";
const ENV_PREFIX: &str = "PMOBML_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmobml";

const DEFAULT_INDICATOR_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_CAPTION_LATENCY_MS: u64 = 450;
const DEFAULT_RECORD_THRESHOLD_MS: u64 = 5 * 60 * 1000;
const DEFAULT_NETWORK_ENABLED: bool = false;
const DEFAULT_API_BASE_URL: &str = "https://databroadcasting-api.invalid";
const DEFAULT_ONE_SEG_WIDTH: u64 = 240;
const DEFAULT_ONE_SEG_HEIGHT: u64 = 480;
const DEFAULT_NVRAM_DIRECTORY: &str = "nvram";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Generates a getter/setter pair for an unsigned integer entry with a default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Generates a getter/setter pair for a boolean entry with a default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Generates a getter/setter pair for a string entry with a default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for the bridge
///
/// Holds the merged YAML tree behind a mutex; every setter persists the
/// whole tree to `config.yaml` in the configuration directory.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
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

    fn prepare_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Vérifie que l'on peut écrire dans le répertoire
        let probe = path.join(".write_test");
        fs::write(&probe, b"test")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Resolves the configuration directory
    ///
    /// Lookup order: `directory` when non-empty, the `PMOBML_CONFIG`
    /// environment variable, `./.pmobml`, then `~/.pmobml`. The directory is
    /// created when missing.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::prepare_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from `directory` (empty string: lookup order
    /// of [`Config::config_dir`]), merges it over the embedded defaults,
    /// applies environment overrides and saves the result.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .to_string();

        let mut merged = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut merged, &Self::lower_keys_value(external));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using embedded defaults");
            }
        }

        Self::apply_env_overrides(&mut merged);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(merged),
        };
        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Writes the current tree to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets the value at `path` (e.g. `&["bridge", "network_enabled"]`) and saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        let Some((head, rest)) = path.split_first() else {
            *data = value;
            return Ok(());
        };
        let Value::Mapping(map) = data else {
            return Err(anyhow!("Current node is not a map"));
        };
        let key = Value::String(head.to_lowercase());
        if rest.is_empty() {
            map.insert(key, value);
            Ok(())
        } else {
            let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
            Self::set_value_internal(entry, rest, value)
        }
    }

    /// Returns a copy of the value at `path`
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            let Value::Mapping(map) = current else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            };
            current = map
                .get(Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = serde_yaml::from_str::<Value>(&value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!(env_var = %key, error = %e, "Ignoring config override");
                }
            }
        }
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| {
                        let k = match k {
                            Value::String(s) => Value::String(s.to_lowercase()),
                            other => other,
                        };
                        (k, Self::lower_keys_value(v))
                    })
                    .collect(),
            ),
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            other => other,
        }
    }

    /// Returns the absolute path of a directory entry, creating it if needed
    ///
    /// Relative paths are resolved against the configuration directory. When
    /// the entry is missing, `default` is stored and used.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) => s,
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                default.to_string()
            }
        };

        let candidate = Path::new(&dir_path);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(candidate)
        };
        if !absolute.exists() {
            fs::create_dir_all(&absolute)?;
            info!(directory = %absolute.display(), "Created managed directory");
        }
        Ok(absolute.to_string_lossy().to_string())
    }

    impl_u64_config!(
        get_indicator_timeout_ms,
        set_indicator_timeout_ms,
        &["bridge", "indicator_timeout_ms"],
        DEFAULT_INDICATOR_TIMEOUT_MS
    );

    impl_u64_config!(
        get_caption_latency_ms,
        set_caption_latency_ms,
        &["bridge", "caption_latency_ms"],
        DEFAULT_CAPTION_LATENCY_MS
    );

    impl_u64_config!(
        get_record_threshold_ms,
        set_record_threshold_ms,
        &["bridge", "record_threshold_ms"],
        DEFAULT_RECORD_THRESHOLD_MS
    );

    impl_u64_config!(
        get_one_seg_width,
        set_one_seg_width,
        &["bridge", "one_seg", "width"],
        DEFAULT_ONE_SEG_WIDTH
    );

    impl_u64_config!(
        get_one_seg_height,
        set_one_seg_height,
        &["bridge", "one_seg", "height"],
        DEFAULT_ONE_SEG_HEIGHT
    );

    impl_bool_config!(
        get_network_enabled,
        set_network_enabled,
        &["bridge", "network_enabled"],
        DEFAULT_NETWORK_ENABLED
    );

    impl_string_config!(
        get_api_base_url,
        set_api_base_url,
        &["bridge", "api_base_url"],
        DEFAULT_API_BASE_URL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    /// Directory of the file-backed NVRAM store
    pub fn get_nvram_dir(&self) -> Result<String> {
        self.get_managed_dir(&["bridge", "nvram", "directory"], DEFAULT_NVRAM_DIRECTORY)
    }
}

/// Returns the global configuration instance, loaded on first access
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Recursively merges `external` into `default`
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
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
