//! Named buffering strategies and the network classification that picks them.

use bridge_traits::NetworkInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Links slower than this are treated as constrained.
pub const SLOW_DOWNLINK_MBPS: f64 = 0.5;

/// Links faster than this can afford aggressive buffering.
pub const FAST_DOWNLINK_MBPS: f64 = 5.0;

/// How hard a strategy pushes for buffered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggressiveness {
    Low,
    Medium,
    High,
}

/// The fixed registry of buffering strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Conservative,
    Balanced,
    Aggressive,
    HighBandwidth,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Conservative,
        StrategyKind::Balanced,
        StrategyKind::Aggressive,
        StrategyKind::HighBandwidth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Conservative => "conservative",
            StrategyKind::Balanced => "balanced",
            StrategyKind::Aggressive => "aggressive",
            StrategyKind::HighBandwidth => "high-bandwidth",
        }
    }

    /// The registry entry for this kind.
    pub fn strategy(&self) -> BufferStrategy {
        let (buffer_ahead_secs, preload_next, aggressiveness) = match self {
            StrategyKind::Conservative => (10, false, Aggressiveness::Low),
            StrategyKind::Balanced => (30, true, Aggressiveness::Medium),
            StrategyKind::Aggressive => (60, true, Aggressiveness::High),
            StrategyKind::HighBandwidth => (120, true, Aggressiveness::High),
        };

        BufferStrategy {
            kind: *self,
            buffer_ahead: Duration::from_secs(buffer_ahead_secs),
            preload_next,
            aggressiveness,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown buffer strategy '{}'", s))
    }
}

/// How far ahead to buffer and whether to preload the next track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStrategy {
    pub kind: StrategyKind,
    pub buffer_ahead: Duration,
    pub preload_next: bool,
    pub aggressiveness: Aggressiveness,
}

impl BufferStrategy {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Pick a strategy from a network snapshot.
///
/// Rules are evaluated in order; the first match wins:
/// 1. very slow effective type, or downlink below 0.5 Mbps: conservative
/// 2. downlink above 5 Mbps, or fast effective type: aggressive
/// 3. wired or Wi-Fi connection: high-bandwidth
/// 4. otherwise: balanced
pub fn select_strategy(info: &NetworkInfo) -> StrategyKind {
    let very_slow = info.effective_type.is_some_and(|t| t.is_very_slow());
    let slow_link = info.downlink_mbps.is_some_and(|d| d < SLOW_DOWNLINK_MBPS);
    if very_slow || slow_link {
        return StrategyKind::Conservative;
    }

    let fast_link = info.downlink_mbps.is_some_and(|d| d > FAST_DOWNLINK_MBPS);
    let fast_type = info.effective_type.is_some_and(|t| t.is_fast());
    if fast_link || fast_type {
        return StrategyKind::Aggressive;
    }

    if info.network_type.is_some_and(|t| t.is_broadband()) {
        return StrategyKind::HighBandwidth;
    }

    StrategyKind::Balanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{EffectiveType, NetworkType};

    #[test]
    fn test_registry_values() {
        let conservative = StrategyKind::Conservative.strategy();
        assert_eq!(conservative.buffer_ahead, Duration::from_secs(10));
        assert!(!conservative.preload_next);
        assert_eq!(conservative.aggressiveness, Aggressiveness::Low);

        let high = StrategyKind::HighBandwidth.strategy();
        assert_eq!(high.buffer_ahead, Duration::from_secs(120));
        assert!(high.preload_next);
        assert_eq!(high.aggressiveness, Aggressiveness::High);
    }

    #[test]
    fn test_slow_link_is_conservative() {
        let info = NetworkInfo::connected()
            .with_downlink_mbps(0.3)
            .with_effective_type(EffectiveType::Slow2g);
        assert_eq!(select_strategy(&info), StrategyKind::Conservative);

        // A slow downlink wins even on Wi-Fi.
        let info = NetworkInfo::connected()
            .with_network_type(NetworkType::WiFi)
            .with_downlink_mbps(0.2);
        assert_eq!(select_strategy(&info), StrategyKind::Conservative);
    }

    #[test]
    fn test_fast_link_is_aggressive() {
        let info = NetworkInfo::connected().with_downlink_mbps(8.0);
        assert_eq!(select_strategy(&info), StrategyKind::Aggressive);

        let info = NetworkInfo::connected().with_effective_type(EffectiveType::FourG);
        assert_eq!(select_strategy(&info), StrategyKind::Aggressive);
    }

    #[test]
    fn test_broadband_without_estimate_is_high_bandwidth() {
        let info = NetworkInfo::connected().with_network_type(NetworkType::Ethernet);
        assert_eq!(select_strategy(&info), StrategyKind::HighBandwidth);

        let info = NetworkInfo::connected()
            .with_network_type(NetworkType::WiFi)
            .with_downlink_mbps(2.0);
        assert_eq!(select_strategy(&info), StrategyKind::HighBandwidth);
    }

    #[test]
    fn test_default_is_balanced() {
        assert_eq!(
            select_strategy(&NetworkInfo::connected()),
            StrategyKind::Balanced
        );

        let info = NetworkInfo::connected()
            .with_network_type(NetworkType::Cellular)
            .with_effective_type(EffectiveType::ThreeG)
            .with_downlink_mbps(1.5);
        assert_eq!(select_strategy(&info), StrategyKind::Balanced);
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("turbo".parse::<StrategyKind>().is_err());
    }
}
