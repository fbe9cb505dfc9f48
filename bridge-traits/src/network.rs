//! Network Monitoring Abstraction
//!
//! Connection quality signals consumed by the buffer strategist and the
//! connectivity wait used during error recovery.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Cellular => "cellular",
            NetworkType::WiFi => "wifi",
            NetworkType::Ethernet => "ethernet",
            NetworkType::Other => "other",
        }
    }

    /// Wired and WiFi links are treated as large, unmetered bandwidth.
    pub fn is_broadband(&self) -> bool {
        matches!(self, NetworkType::WiFi | NetworkType::Ethernet)
    }
}

/// Effective connection class as estimated by the host
/// (mirrors the `slow-2g`/`2g`/`3g`/`4g` buckets browsers report).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl EffectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::TwoG => "2g",
            EffectiveType::ThreeG => "3g",
            EffectiveType::FourG => "4g",
        }
    }

    pub fn is_very_slow(&self) -> bool {
        matches!(self, EffectiveType::Slow2g | EffectiveType::TwoG)
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, EffectiveType::FourG)
    }
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Snapshot of the host-reported connection.
///
/// Every quality field is optional: hosts without a network information API
/// only report `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    pub effective_type: Option<EffectiveType>,
    /// Downlink estimate in megabits per second.
    pub downlink_mbps: Option<f64>,
    /// Round-trip time estimate in milliseconds.
    pub rtt_ms: Option<u32>,
}

impl NetworkInfo {
    /// A connected snapshot with no quality information.
    pub fn connected() -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: None,
            effective_type: None,
            downlink_mbps: None,
            rtt_ms: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            ..Self::connected()
        }
    }

    pub fn with_network_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = Some(network_type);
        self
    }

    pub fn with_effective_type(mut self, effective_type: EffectiveType) -> Self {
        self.effective_type = Some(effective_type);
        self
    }

    pub fn with_downlink_mbps(mut self, downlink: f64) -> Self {
        self.downlink_mbps = Some(downlink);
        self
    }

    pub fn with_rtt_ms(mut self, rtt: u32) -> Self {
        self.rtt_ms = Some(rtt);
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Network monitor trait
///
/// Provides connection quality information so the core can:
/// - Pick a buffering strategy matching the link
/// - Estimate download times
/// - Suspend recovery until connectivity returns
///
/// # Platform Support
///
/// - **Web**: Navigator.onLine + Network Information API
/// - **Desktop**: reachability probes
/// - **Mobile**: ConnectivityManager / NWPathMonitor
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Subscribe to network changes
    ///
    /// Implementations should emit an update whenever connectivity or the
    /// quality estimate changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
