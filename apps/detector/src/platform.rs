//! Host adapters for the platform seams: a sysfs-style GPIO value file for
//! the sensor, a reachability-checked link for hosts whose OS owns the Wi-Fi
//! association, and a status panel rendered into the log.

use std::{
    fs,
    net::{TcpStream as StdTcpStream, ToSocketAddrs},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use detector_core::{LinkError, RadioLink, SensorInput, StatusPresenter, StatusScreen, StatusSnapshot};
use shared::{domain::LinkState, settings::WifiCredentials};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

pub struct FileSensor {
    path: PathBuf,
    failing: bool,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            failing: false,
        }
    }
}

impl SensorInput for FileSensor {
    fn read_sensor(&mut self) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                if self.failing {
                    info!(path = %self.path.display(), "sensor readable again");
                    self.failing = false;
                }
                raw.trim() == "1"
            }
            Err(error) => {
                if !self.failing {
                    warn!(path = %self.path.display(), %error, "sensor read failed, treating as inactive");
                    self.failing = true;
                }
                false
            }
        }
    }
}

pub const DEFAULT_REPROBE_INTERVAL: Duration = Duration::from_secs(30);
const REPROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct HostLink {
    probe_addr: String,
    interface: Option<String>,
    sysfs_root: PathBuf,
    associated: AtomicBool,
    reprobe_interval: Duration,
    last_probe: Mutex<Option<Instant>>,
}

impl HostLink {
    pub fn new(probe_addr: impl Into<String>, interface: Option<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            interface,
            sysfs_root: PathBuf::from("/sys"),
            associated: AtomicBool::new(false),
            reprobe_interval: DEFAULT_REPROBE_INTERVAL,
            last_probe: Mutex::new(None),
        }
    }

    pub fn with_reprobe_interval(mut self, interval: Duration) -> Self {
        self.reprobe_interval = interval;
        self
    }

    fn mark_probed(&self) {
        *self
            .last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn reprobe_due(&self) -> bool {
        let mut last = self
            .last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.reprobe_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Blocks for at most `REPROBE_TIMEOUT` per resolved address.
    fn endpoint_reachable(&self) -> bool {
        match self.probe_addr.to_socket_addrs() {
            Ok(mut addrs) => {
                addrs.any(|addr| StdTcpStream::connect_timeout(&addr, REPROBE_TIMEOUT).is_ok())
            }
            Err(_) => false,
        }
    }

    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    fn interface_up(&self) -> bool {
        let Some(interface) = &self.interface else {
            return true;
        };
        let path = self
            .sysfs_root
            .join("class/net")
            .join(interface)
            .join("operstate");
        match fs::read_to_string(path) {
            // loopback and some drivers report "unknown" while passing traffic
            Ok(state) => matches!(state.trim(), "up" | "unknown"),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl RadioLink for HostLink {
    async fn connect(
        &self,
        credentials: &WifiCredentials,
        timeout: Duration,
    ) -> Result<(), LinkError> {
        debug!(ssid = %credentials.ssid, probe = %self.probe_addr, "association is managed by the host");
        if !self.interface_up() {
            self.associated.store(false, Ordering::SeqCst);
            let interface = self.interface.clone().unwrap_or_default();
            return Err(LinkError::Radio(format!("interface {interface} is down")));
        }

        match tokio::time::timeout(timeout, TcpStream::connect(&self.probe_addr)).await {
            Ok(Ok(_stream)) => {
                self.associated.store(true, Ordering::SeqCst);
                self.mark_probed();
                Ok(())
            }
            Ok(Err(error)) => {
                self.associated.store(false, Ordering::SeqCst);
                Err(LinkError::Radio(error.to_string()))
            }
            Err(_) => {
                self.associated.store(false, Ordering::SeqCst);
                Err(LinkError::Timeout)
            }
        }
    }

    fn is_link_up(&self) -> bool {
        if !self.associated.load(Ordering::SeqCst) || !self.interface_up() {
            return false;
        }
        if self.reprobe_due() && !self.endpoint_reachable() {
            warn!(probe = %self.probe_addr, "endpoint unreachable, treating link as lost");
            self.associated.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }
}

pub struct LogPresenter {
    device_name: String,
    last_lines: Mutex<Option<[String; 4]>>,
}

impl LogPresenter {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            last_lines: Mutex::new(None),
        }
    }

    /// Rendered panel lines, or `None` when they match the previous frame.
    fn render_if_changed(&self, status: &StatusSnapshot) -> Option<[String; 4]> {
        let lines = StatusScreen::render(&self.device_name, status);
        let mut last = self
            .last_lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(&lines) {
            return None;
        }
        *last = Some(lines.clone());
        Some(lines)
    }

    pub fn show_fault(message: &str) {
        error!(panel = "CONFIG ERROR", %message, "device halted");
    }
}

impl StatusPresenter for LogPresenter {
    fn link_changed(&self, from: LinkState, to: LinkState) {
        info!(%from, %to, "wifi state changed");
    }

    fn present(&self, status: &StatusSnapshot) {
        if let Some(lines) = self.render_if_changed(status) {
            info!(panel = %lines.join(" | "), "status");
        }
    }
}

#[cfg(test)]
#[path = "tests/platform_tests.rs"]
mod tests;
