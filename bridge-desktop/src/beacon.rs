//! Fire-and-forget delivery for teardown flushes.

use bridge_traits::lifecycle::BeaconTransport;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Posts the payload on a detached task.
///
/// The beacon is accepted when a Tokio runtime is available to carry the
/// request; the outcome is only logged.
pub struct ReqwestBeaconTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestBeaconTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ReqwestBeaconTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BeaconTransport for ReqwestBeaconTransport {
    fn send_beacon(&self, url: &str, payload: Bytes) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("No runtime available for beacon delivery");
            return false;
        };

        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .body(payload);

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = response.status().as_u16(), "Beacon delivered")
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), "Beacon rejected")
                }
                Err(e) => warn!(error = %e, "Beacon delivery failed"),
            }
        });
        true
    }
}
