//! # Core Configuration Module
//!
//! Host bridges and feature switches for the audio delivery core.
//!
//! ## Overview
//!
//! [`CoreConfigBuilder`] collects every host capability the engines consume
//! and fails fast when a feature is switched on without the bridge it needs.
//! Engine tuning (cache ceiling, retry limits, batch sizes) lives next to each
//! engine; this module only decides *which* host the core talks to.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - asset downloads and telemetry delivery
//!   (desktop default: reqwest)
//! - `MediaCapabilities` - codec probe used for format selection
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - adaptive buffering and connectivity waits
//! - `LifecycleObserver` - flush analytics when the page is hidden or unloads
//! - `BeaconTransport` - unload-safe analytics delivery
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .media_capabilities(Arc::new(MyCodecProbe))
//!     .network_monitor(Arc::new(MyNetworkMonitor))
//!     .enable_network_awareness(true)
//!     .telemetry_endpoint("https://telemetry.example.com/v1/events")
//!     .enable_telemetry(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing required bridges produce [`Error::CapabilityMissing`] with a
//! message describing what to inject; inconsistent flags produce
//! [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::{
    BeaconTransport, Clock, HttpClient, LifecycleObserver, MediaCapabilities, NetworkMonitor,
    SystemClock,
};
use std::sync::Arc;

/// Bridges and switches shared by every engine.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for downloads and analytics delivery
    pub http_client: Arc<dyn HttpClient>,

    /// Codec support probe
    pub media_capabilities: Arc<dyn MediaCapabilities>,

    /// Connection quality signals (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Page/app lifecycle transitions (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Unload-safe delivery channel (optional)
    pub beacon_transport: Option<Arc<dyn BeaconTransport>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Analytics collection endpoint
    pub telemetry_endpoint: Option<String>,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("media_capabilities", &"MediaCapabilities { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "beacon_transport",
                &self
                    .beacon_transport
                    .as_ref()
                    .map(|_| "BeaconTransport { ... }"),
            )
            .field("telemetry_endpoint", &self.telemetry_endpoint)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Each flag that depends on a host capability is checked against the
/// injected bridges in [`CoreConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Collect and deliver analytics (requires a telemetry endpoint)
    pub enable_telemetry: bool,

    /// Adapt buffering to the connection (requires NetworkMonitor)
    pub enable_network_awareness: bool,

    /// Flush analytics on hide/unload (requires LifecycleObserver)
    pub enable_lifecycle_flush: bool,

    /// Preload the next track while the current one plays
    pub enable_speculative_preload: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_telemetry: false,
            enable_network_awareness: false,
            enable_lifecycle_flush: false,
            enable_speculative_preload: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The telemetry endpoint is an http(s) URL when present
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.telemetry_endpoint {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "Telemetry endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
        }

        if self.features.enable_telemetry && self.telemetry_endpoint.is_none() {
            return Err(Error::Config(
                "Telemetry enabled but no telemetry endpoint configured. \
                 Disable the feature or set an endpoint."
                    .to_string(),
            ));
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_lifecycle_flush && self.lifecycle_observer.is_none() {
            return Err(Error::Config(
                "Lifecycle flush enabled but no LifecycleObserver provided. \
                 Disable the feature or inject a LifecycleObserver implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for asset downloads and analytics. \
                 Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
                 Web: inject a fetch-based client."
            .to_string(),
    })
}

fn media_capabilities_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaCapabilities".to_string(),
        message: "MediaCapabilities implementation is required to pick a playable format. \
                 Inject a probe backed by the host's canPlayType (or equivalent)."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    media_capabilities: Option<Arc<dyn MediaCapabilities>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    beacon_transport: Option<Arc<dyn BeaconTransport>>,
    clock: Option<Arc<dyn Clock>>,
    telemetry_endpoint: Option<String>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn media_capabilities(mut self, capabilities: Arc<dyn MediaCapabilities>) -> Self {
        self.media_capabilities = Some(capabilities);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn beacon_transport(mut self, transport: Arc<dyn BeaconTransport>) -> Self {
        self.beacon_transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn telemetry_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.telemetry_endpoint = Some(endpoint.into());
        self
    }

    pub fn enable_telemetry(mut self, enable: bool) -> Self {
        self.features.enable_telemetry = enable;
        self
    }

    pub fn enable_network_awareness(mut self, enable: bool) -> Self {
        self.features.enable_network_awareness = enable;
        self
    }

    pub fn enable_lifecycle_flush(mut self, enable: bool) -> Self {
        self.features.enable_lifecycle_flush = enable;
        self
    }

    pub fn enable_speculative_preload(mut self, enable: bool) -> Self {
        self.features.enable_speculative_preload = enable;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the final [`CoreConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   platform default is available
    /// - [`Error::Config`] when flags and bridges disagree
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };
        let media_capabilities = self
            .media_capabilities
            .ok_or_else(media_capabilities_missing_error)?;

        let config = CoreConfig {
            http_client,
            media_capabilities,
            network_monitor: self.network_monitor,
            lifecycle_observer: self.lifecycle_observer,
            beacon_transport: self.beacon_transport,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            telemetry_endpoint: self.telemetry_endpoint,
            features: self.features,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CanPlay, Download, HttpRequest, HttpResponse, LifecycleChangeStream, LifecycleState,
        NetworkChangeStream, NetworkInfo,
    };

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(bridge_traits::BridgeError::NotAvailable("noop".into()))
        }

        async fn download(&self, _url: &str) -> BridgeResult<Download> {
            Err(bridge_traits::BridgeError::NotAvailable("noop".into()))
        }
    }

    struct AllFormats;

    impl MediaCapabilities for AllFormats {
        fn can_play_type(&self, _mime: &str) -> CanPlay {
            CanPlay::Probably
        }
    }

    struct StaticNetwork;

    #[async_trait]
    impl NetworkMonitor for StaticNetwork {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            Ok(NetworkInfo::connected())
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("static".into()))
        }
    }

    struct AlwaysVisible;

    #[async_trait]
    impl LifecycleObserver for AlwaysVisible {
        async fn get_state(&self) -> BridgeResult<LifecycleState> {
            Ok(LifecycleState::Visible)
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("static".into()))
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(NoopHttp))
            .media_capabilities(Arc::new(AllFormats))
    }

    #[test]
    fn test_minimal_config_builds() {
        let config = base_builder().build().unwrap();
        assert!(config.network_monitor.is_none());
        assert!(config.features.enable_speculative_preload);
        assert!(!config.features.enable_telemetry);
    }

    #[test]
    fn test_missing_media_capabilities() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(NoopHttp))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaCapabilities")
            }
            other => panic!("expected missing capability, got {:?}", other),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_without_shims() {
        let result = CoreConfig::builder()
            .media_capabilities(Arc::new(AllFormats))
            .build();
        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_network_awareness_requires_monitor() {
        let result = base_builder().enable_network_awareness(true).build();
        assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("NetworkMonitor")));

        let config = base_builder()
            .network_monitor(Arc::new(StaticNetwork))
            .enable_network_awareness(true)
            .build()
            .unwrap();
        assert!(config.features.enable_network_awareness);
    }

    #[test]
    fn test_lifecycle_flush_requires_observer() {
        let result = base_builder().enable_lifecycle_flush(true).build();
        assert!(matches!(result, Err(Error::Config(_))));

        let config = base_builder()
            .lifecycle_observer(Arc::new(AlwaysVisible))
            .enable_lifecycle_flush(true)
            .build()
            .unwrap();
        assert!(config.lifecycle_observer.is_some());
    }

    #[test]
    fn test_telemetry_requires_endpoint() {
        let result = base_builder().enable_telemetry(true).build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = base_builder()
            .telemetry_endpoint("ftp://example.com")
            .build();
        assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("http(s)")));

        let config = base_builder()
            .telemetry_endpoint("https://telemetry.example.com/v1")
            .enable_telemetry(true)
            .build()
            .unwrap();
        assert_eq!(
            config.telemetry_endpoint.as_deref(),
            Some("https://telemetry.example.com/v1")
        );
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = base_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("network_monitor: None"));
    }
}
