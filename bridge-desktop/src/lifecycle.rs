//! Process lifecycle for desktop hosts.
//!
//! A desktop window is treated as always visible; the only transition
//! reported is `Unloading` when the process receives Ctrl-C.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopLifecycleObserver;

impl DesktopLifecycleObserver {
    /// Create a new lifecycle observer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(LifecycleState::Visible)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(SignalStream { fired: false }))
    }
}

/// Yields `Unloading` once on Ctrl-C, then closes.
struct SignalStream {
    fired: bool,
}

#[async_trait]
impl LifecycleChangeStream for SignalStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        if self.fired {
            return None;
        }
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                self.fired = true;
                info!("Interrupt received, unloading");
                Some(LifecycleState::Unloading)
            }
            Err(e) => {
                warn!(error = %e, "Signal handler unavailable");
                self.fired = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_desktop_is_visible() {
        let observer = DesktopLifecycleObserver::new();
        assert_eq!(observer.get_state().await.unwrap(), LifecycleState::Visible);
    }

    #[tokio::test]
    async fn test_closed_stream_stays_closed() {
        let mut stream = SignalStream { fired: true };
        assert_eq!(stream.next().await, None);
    }
}
