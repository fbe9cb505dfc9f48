//! Page/App Lifecycle and Unload-Safe Delivery
//!
//! Telemetry must survive the host tearing the core down. These traits let
//! the core observe lifecycle transitions and hand a final payload to a
//! transport the host keeps alive past unload.

use bytes::Bytes;

use crate::error::Result;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Page or application is visible and active
    Visible,
    /// Page is hidden or the application is in the background
    Hidden,
    /// The host is about to unload the core
    Unloading,
}

/// Lifecycle observer trait
///
/// # Platform Support
///
/// - **Web**: Page Visibility API + `pagehide`/`beforeunload`
/// - **Desktop**: process termination signals
/// - **Mobile**: Activity/UIApplication lifecycle callbacks
///
/// # Example
///
/// ```ignore
/// use bridge_traits::lifecycle::{LifecycleObserver, LifecycleState};
///
/// async fn watch(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///     while let Some(state) = stream.next().await {
///         if state == LifecycleState::Unloading {
///             flush_everything();
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait::async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}

/// Best-effort, fire-and-forget transport that may complete after the
/// caller is gone (`navigator.sendBeacon` on the web).
///
/// Returns `true` when the host accepted the payload for delivery. Acceptance
/// is not a delivery guarantee.
pub trait BeaconTransport: Send + Sync {
    fn send_beacon(&self, url: &str, payload: Bytes) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        pub Beacon {}

        impl BeaconTransport for Beacon {
            fn send_beacon(&self, url: &str, payload: Bytes) -> bool;
        }
    }

    #[test]
    fn test_beacon_accepts_payload() {
        let mut beacon = MockBeacon::new();
        beacon
            .expect_send_beacon()
            .with(eq("https://t.example.com"), always())
            .times(1)
            .return_const(true);

        assert!(beacon.send_beacon("https://t.example.com", Bytes::from_static(b"{}")));
    }

    #[test]
    fn test_lifecycle_states_distinct() {
        assert_ne!(LifecycleState::Hidden, LifecycleState::Unloading);
    }
}
