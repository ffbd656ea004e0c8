use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use shared::{
    error::ControllerError,
    settings::{Endpoint, Settings, WifiCredentials, DEFAULT_API_PORT, DEFAULT_COOLDOWN},
};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const MAX_CONFIG_BYTES: u64 = 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    #[serde(default)]
    wifi: WifiSection,
    #[serde(default)]
    api: ApiSection,
    #[serde(default)]
    device: DeviceSection,
    pir_detection_cooldown_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WifiSection {
    ssid: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSection {
    host: Option<String>,
    port: Option<u16>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceSection {
    name: Option<String>,
}

/// Reads the settings file, applies `APP__*` overrides and validates the
/// result. Any failure is fatal to startup.
pub fn load_settings(path: &Path) -> Result<Settings, ControllerError> {
    let raw = read_config_file(path)?;
    let file_cfg = parse_config(path, &raw)?;
    let settings = resolve(file_cfg, |key| std::env::var(key).ok())?;
    settings.validate()?;
    log_summary(path, &settings);
    Ok(settings)
}

fn read_config_file(path: &Path) -> Result<String, ControllerError> {
    let metadata = fs::metadata(path).map_err(|error| {
        ControllerError::config(format!("cannot open '{}': {error}", path.display()))
    })?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ControllerError::config(format!(
            "'{}' is {} bytes, limit is {MAX_CONFIG_BYTES}",
            path.display(),
            metadata.len()
        )));
    }
    fs::read_to_string(path).map_err(|error| {
        ControllerError::config(format!("cannot read '{}': {error}", path.display()))
    })
}

fn parse_config(path: &Path, raw: &str) -> Result<FileConfig, ControllerError> {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(raw).map_err(|error| {
            ControllerError::config(format!("failed to parse '{}': {error}", path.display()))
        })
    } else {
        serde_json::from_str(raw).map_err(|error| {
            ControllerError::config(format!("failed to parse '{}': {error}", path.display()))
        })
    }
}

fn resolve<F>(file_cfg: FileConfig, env: F) -> Result<Settings, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    let FileConfig {
        wifi,
        api,
        device,
        pir_detection_cooldown_ms,
    } = file_cfg;

    let ssid = env("APP__WIFI_SSID").or(wifi.ssid);
    let password = env("APP__WIFI_PASSWORD").or(wifi.password);
    let host = env("APP__API_HOST").or(api.host);
    let api_key = env("APP__API_KEY").or(api.api_key);
    let device_name = env("APP__DEVICE_NAME").or(device.name);

    let port = match env("APP__API_PORT") {
        Some(v) => v
            .parse::<u16>()
            .map_err(|error| ControllerError::config(format!("APP__API_PORT '{v}': {error}")))?,
        None => api.port.unwrap_or(DEFAULT_API_PORT),
    };
    let cooldown = match env("APP__COOLDOWN_MS") {
        Some(v) => Duration::from_millis(v.parse::<u64>().map_err(|error| {
            ControllerError::config(format!("APP__COOLDOWN_MS '{v}': {error}"))
        })?),
        None => pir_detection_cooldown_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_COOLDOWN),
    };

    Ok(Settings {
        wifi: WifiCredentials {
            ssid: required(ssid, "wifi.ssid")?,
            password: password.unwrap_or_default(),
        },
        endpoint: Endpoint {
            host: required(host, "api.host")?,
            port,
        },
        api_key: required(api_key, "api.apiKey")?,
        device_name: required(device_name, "device.name")?,
        cooldown,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, ControllerError> {
    value.ok_or_else(|| ControllerError::config(format!("{field} is missing")))
}

fn log_summary(path: &Path, settings: &Settings) {
    info!(
        path = %path.display(),
        ssid = %settings.wifi.ssid,
        api = %settings.endpoint,
        device = %settings.device_name,
        cooldown_ms = settings.cooldown.as_millis() as u64,
        "configuration loaded"
    );
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
