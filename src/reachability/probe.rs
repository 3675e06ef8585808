//! Interface inspection and server reachability probes.
//!
//! The monitor asks two questions on every network change:
//!
//! 1. [`NetworkInterfaces`]: is any interface up, and of what kind?
//! 2. [`ServerProbe`]: does that interface actually reach the internet?
//!
//! Both are traits so platforms can plug in their own sources and tests
//! can script them.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::status::ConnectionKind;

// ============================================================================
// Constants
// ============================================================================

/// Default sysfs directory listing network interfaces.
const SYSFS_NET_ROOT: &str = "/sys/class/net";

/// Interface name prefixes used by cellular modems.
const CELLULAR_PREFIXES: [&str; 3] = ["wwan", "rmnet", "ccmni"];

// ============================================================================
// InterfaceSnapshot
// ============================================================================

/// State of the device's network interfaces at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceSnapshot {
    /// No interface is up.
    Inactive {
        /// Radios are deliberately switched off.
        airplane_mode: bool,
    },
    /// At least one interface is up.
    Active {
        /// A wifi interface is up.
        wifi: bool,
        /// A cellular interface is up.
        cellular: bool,
    },
}

impl InterfaceSnapshot {
    /// Resolves the connection kind, preferring wifi over cellular.
    #[must_use]
    pub fn kind(&self) -> ConnectionKind {
        match *self {
            Self::Active { wifi: true, .. } => ConnectionKind::Wifi,
            Self::Active { cellular: true, .. } => ConnectionKind::Cellular,
            Self::Active { .. } | Self::Inactive { .. } => ConnectionKind::Unknown,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Source of interface state.
#[async_trait]
pub trait NetworkInterfaces: Send + Sync {
    /// Reads the current interface state.
    async fn snapshot(&self) -> InterfaceSnapshot;
}

/// Checks that a server is reachable over the active interface.
#[async_trait]
pub trait ServerProbe: Send + Sync {
    /// Returns `true` if the server answered in time.
    async fn probe(&self) -> bool;
}

// ============================================================================
// SystemInterfaces
// ============================================================================

/// Reads interface state from the operating system.
///
/// On Linux this inspects sysfs. Elsewhere it always reports an active
/// interface of unknown kind and leaves the verdict to the server probe.
#[derive(Debug, Clone)]
pub struct SystemInterfaces {
    /// Directory listing network interfaces.
    root: PathBuf,
}

impl SystemInterfaces {
    /// Creates a reader over the default sysfs location.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(SYSFS_NET_ROOT)
    }

    /// Creates a reader over a custom interface directory.
    ///
    /// `rfkill` state is read from the sibling `rfkill` directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scans the interface directory.
    async fn scan(&self) -> io::Result<InterfaceSnapshot> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut active = false;
        let mut wifi = false;
        let mut cellular = false;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" {
                continue;
            }

            let path = entry.path();
            let operstate = tokio::fs::read_to_string(path.join("operstate"))
                .await
                .unwrap_or_default();
            if operstate.trim() != "up" {
                continue;
            }

            active = true;
            if exists(&path.join("wireless")).await || exists(&path.join("phy80211")).await {
                wifi = true;
            } else if CELLULAR_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
                cellular = true;
            }

            trace!(interface = %name, wifi, cellular, "Interface up");
        }

        if active {
            return Ok(InterfaceSnapshot::Active { wifi, cellular });
        }

        let airplane_mode = match self.root.parent() {
            Some(class) => radios_blocked(&class.join("rfkill")).await,
            None => false,
        };
        Ok(InterfaceSnapshot::Inactive { airplane_mode })
    }
}

impl Default for SystemInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkInterfaces for SystemInterfaces {
    async fn snapshot(&self) -> InterfaceSnapshot {
        if !cfg!(target_os = "linux") {
            return InterfaceSnapshot::Active {
                wifi: false,
                cellular: false,
            };
        }

        match self.scan().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "Unable to read interfaces");
                InterfaceSnapshot::Active {
                    wifi: false,
                    cellular: false,
                }
            }
        }
    }
}

/// Returns `true` if the path exists.
async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Returns `true` if every radio under `rfkill` is soft-blocked.
async fn radios_blocked(rfkill: &Path) -> bool {
    let Ok(mut entries) = tokio::fs::read_dir(rfkill).await else {
        return false;
    };

    let mut radios = 0usize;
    while let Ok(Some(entry)) = entries.next_entry().await {
        radios += 1;
        let soft = tokio::fs::read_to_string(entry.path().join("soft"))
            .await
            .unwrap_or_default();
        if soft.trim() != "1" {
            return false;
        }
    }

    radios > 0
}

// ============================================================================
// HttpProbe
// ============================================================================

/// Probes a server with a `HEAD` request.
///
/// Redirects are not followed; only a `200` counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// URL to probe.
    url: Url,
    /// HTTP client with the probe timeout and redirect policy applied.
    client: reqwest::Client,
    /// Budget for the whole request, used in logs.
    timeout: Duration,
}

impl HttpProbe {
    /// Creates a probe for an `http` or `https` URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse
    /// - [`Error::Config`] if the scheme is not `http` or `https`, or the
    ///   HTTP client cannot be built
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Unsupported probe URL scheme '{}' in {url}\n\
                 Use an http:// or https:// URL.",
                url.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Unable to build probe HTTP client: {e}")))?;

        Ok(Self {
            url,
            client,
            timeout,
        })
    }

    /// Returns the probed URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ServerProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                trace!(url = %self.url, status = status.as_u16(), "Reachability probe answered");
                status == StatusCode::OK
            }
            Err(e) if e.is_timeout() => {
                debug!(
                    url = %self.url,
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Reachability probe timed out"
                );
                false
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Reachability probe failed");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection.
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        format!("http://127.0.0.1:{port}/")
    }

    fn add_interface(root: &Path, name: &str, operstate: &str, wireless: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create interface dir");
        fs::write(dir.join("operstate"), format!("{operstate}\n")).expect("write operstate");
        if wireless {
            fs::create_dir_all(dir.join("wireless")).expect("create wireless dir");
        }
    }

    #[test]
    fn test_http_probe_accepts_http_and_https() {
        let probe =
            HttpProbe::new("https://www.google.com", Duration::from_secs(1)).expect("https");
        assert_eq!(probe.url().scheme(), "https");
        assert!(HttpProbe::new("http://127.0.0.1:8080", Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_http_probe_rejects_bad_urls() {
        let err = HttpProbe::new("ftp://example.com", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = HttpProbe::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_snapshot_kind_prefers_wifi() {
        let both = InterfaceSnapshot::Active {
            wifi: true,
            cellular: true,
        };
        let cell = InterfaceSnapshot::Active {
            wifi: false,
            cellular: true,
        };
        let wired = InterfaceSnapshot::Active {
            wifi: false,
            cellular: false,
        };
        assert_eq!(both.kind(), ConnectionKind::Wifi);
        assert_eq!(cell.kind(), ConnectionKind::Cellular);
        assert_eq!(wired.kind(), ConnectionKind::Unknown);
    }

    #[tokio::test]
    async fn test_http_probe_success() {
        let url = serve("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let probe = HttpProbe::new(&url, Duration::from_secs(2)).expect("probe");
        assert!(probe.probe().await);
    }

    #[tokio::test]
    async fn test_http_probe_rejects_non_200() {
        let url = serve(
            "HTTP/1.1 302 Found\r\nLocation: http://127.0.0.1:1/\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        let probe = HttpProbe::new(&url, Duration::from_secs(2)).expect("probe");
        assert!(!probe.probe().await);
    }

    #[tokio::test]
    async fn test_http_probe_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            // Accept and hold the socket without answering.
            let held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(held);
        });

        let url = format!("http://127.0.0.1:{port}/");
        let probe = HttpProbe::new(&url, Duration::from_millis(100)).expect("probe");
        assert!(!probe.probe().await);
    }

    #[tokio::test]
    async fn test_http_probe_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let url = format!("http://127.0.0.1:{port}/");
        let probe = HttpProbe::new(&url, Duration::from_secs(1)).expect("probe");
        assert!(!probe.probe().await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_system_interfaces_detects_wifi() {
        let dir = tempfile::tempdir().expect("tempdir");
        let net = dir.path().join("net");
        add_interface(&net, "lo", "unknown", false);
        add_interface(&net, "eth0", "down", false);
        add_interface(&net, "wlan0", "up", true);

        let snapshot = SystemInterfaces::with_root(&net).snapshot().await;
        assert_eq!(
            snapshot,
            InterfaceSnapshot::Active {
                wifi: true,
                cellular: false
            }
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_system_interfaces_detects_cellular() {
        let dir = tempfile::tempdir().expect("tempdir");
        let net = dir.path().join("net");
        add_interface(&net, "wwan0", "up", false);

        let snapshot = SystemInterfaces::with_root(&net).snapshot().await;
        assert_eq!(snapshot.kind(), ConnectionKind::Cellular);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_system_interfaces_inactive_and_airplane_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let net = dir.path().join("net");
        add_interface(&net, "wlan0", "down", true);

        let interfaces = SystemInterfaces::with_root(&net);
        assert_eq!(
            interfaces.snapshot().await,
            InterfaceSnapshot::Inactive {
                airplane_mode: false
            }
        );

        let radio = dir.path().join("rfkill").join("rfkill0");
        fs::create_dir_all(&radio).expect("create rfkill dir");
        fs::write(radio.join("soft"), "1\n").expect("write soft");

        assert_eq!(
            interfaces.snapshot().await,
            InterfaceSnapshot::Inactive {
                airplane_mode: true
            }
        );
    }
}
