use std::{fmt, time::Duration};

use url::Url;

use crate::error::ControllerError;

pub const DEFAULT_API_PORT: u16 = 9040;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(30_000);

#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn base_url(&self) -> Result<Url, ControllerError> {
        let raw = format!("http://{}:{}/", self.host, self.port);
        let url = Url::parse(&raw)
            .map_err(|error| ControllerError::config(format!("api host '{}': {error}", self.host)))?;
        if url.host_str().is_none() {
            return Err(ControllerError::config(format!(
                "api host '{}' has no host component",
                self.host
            )));
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Read-only snapshot handed to the core once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub wifi: WifiCredentials,
    pub endpoint: Endpoint,
    pub api_key: String,
    pub device_name: String,
    pub cooldown: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("wifi", &self.wifi)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("device_name", &self.device_name)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.wifi.ssid.trim().is_empty() {
            return Err(ControllerError::config("wifi.ssid must not be empty"));
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(ControllerError::config("api.host must not be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(ControllerError::config("api.port must be in 1..=65535"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ControllerError::config("api.apiKey must not be empty"));
        }
        if self.device_name.trim().is_empty() {
            return Err(ControllerError::config("device.name must not be empty"));
        }
        if self.cooldown.is_zero() {
            return Err(ControllerError::config(
                "pirDetectionCooldownMs must be greater than zero",
            ));
        }
        self.endpoint.base_url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings {
            wifi: WifiCredentials {
                ssid: "home".into(),
                password: "hunter2".into(),
            },
            endpoint: Endpoint {
                host: "192.168.1.20".into(),
                port: DEFAULT_API_PORT,
            },
            api_key: "secret-key".into(),
            device_name: "Veranda".into(),
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    #[test]
    fn valid_settings_pass() {
        sample().validate().expect("valid");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("Veranda"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn rejects_missing_fields_and_zero_cooldown() {
        let mut settings = sample();
        settings.device_name = "  ".into();
        assert_eq!(
            settings.validate(),
            Err(ControllerError::config("device.name must not be empty"))
        );

        let mut settings = sample();
        settings.cooldown = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = sample();
        settings.endpoint.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_unparseable_host() {
        let mut settings = sample();
        settings.endpoint.host = "bad host/name".into();
        let error = settings.validate().unwrap_err();
        assert_eq!(error.code(), crate::error::ErrorCode::ConfigInvalid);
    }
}
