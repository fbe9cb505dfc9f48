//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{
        EffectiveType, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus,
        NetworkType,
    },
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

const DEFAULT_PROBE: &str = "1.1.1.1:53";

/// Desktop network monitor implementation
///
/// Desktop hosts have no network information API, so the monitor times a
/// TCP connect to a probe address and derives the connection class from the
/// round trip the same way browsers bucket `effectiveType`.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe: String,
    probe_timeout: Duration,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE)
    }

    /// Probe a custom `host:port` instead of the public resolver.
    pub fn with_probe(probe: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            probe_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn probe(&self) -> NetworkInfo {
        let started = Instant::now();
        match timeout(self.probe_timeout, TcpStream::connect(&self.probe)).await {
            Ok(Ok(_)) => {
                let rtt_ms = started.elapsed().as_millis().min(u32::MAX as u128) as u32;
                NetworkInfo::connected()
                    .with_network_type(NetworkType::Other)
                    .with_effective_type(effective_type_for_rtt(rtt_ms))
                    .with_rtt_ms(rtt_ms)
            }
            Ok(Err(_)) | Err(_) => NetworkInfo::offline(),
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Round-trip buckets of the Network Information API.
pub fn effective_type_for_rtt(rtt_ms: u32) -> EffectiveType {
    match rtt_ms {
        2000.. => EffectiveType::Slow2g,
        1400..=1999 => EffectiveType::TwoG,
        270..=1399 => EffectiveType::ThreeG,
        _ => EffectiveType::FourG,
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let info = self.probe().await;
        debug!(status = ?info.status, rtt_ms = ?info.rtt_ms, "Network info updated");
        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last: Option<(NetworkStatus, Option<EffectiveType>)>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(self.monitor.poll_interval).await;

            let info = self.monitor.probe().await;
            let key = (info.status, info.effective_type);
            if self.last != Some(key) {
                self.last = Some(key);
                return Some(info);
            }
        }
    }
}
