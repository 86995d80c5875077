//! Shared device handle, set once by `connect_device`

use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::driver::Automation;
use crate::error::{Result, U2Error};

/// Lazily connected device shared by the keyword providers
pub struct Session<A> {
    device: OnceCell<A>,
}

impl<A: Automation> Session<A> {
    pub fn new() -> Self {
        Self {
            device: OnceCell::new(),
        }
    }

    /// Session around an already connected device
    pub fn with_device(device: A) -> Self {
        Self {
            device: OnceCell::new_with(Some(device)),
        }
    }

    /// Run `connect` unless a device is already set; never replaces the device
    pub async fn connect_with<F, Fut>(&self, connect: F) -> Result<&A>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<A>>,
    {
        if let Some(device) = self.device.get() {
            debug!("device already connected, keeping it");
            return Ok(device);
        }
        let device = self
            .device
            .get_or_try_init(|| async move {
                let device = connect().await?;
                info!("session connected");
                Ok::<A, U2Error>(device)
            })
            .await?;
        Ok(device)
    }

    pub fn device(&self) -> Result<&A> {
        self.device.get().ok_or(U2Error::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.device.initialized()
    }
}

impl<A: Automation> Default for Session<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_device_before_connect_is_error() {
        let session: Session<MockDevice> = Session::new();
        assert!(matches!(session.device(), Err(U2Error::NotConnected)));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_runs_once() {
        let session: Session<MockDevice> = Session::new();
        let attempts = AtomicUsize::new(0);

        for _ in 0..3 {
            session
                .connect_with(|| async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok(MockDevice::new())
                })
                .await
                .unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_session_empty() {
        let session: Session<MockDevice> = Session::new();
        let result = session
            .connect_with(|| async { Err(U2Error::DeviceNotFound("none".to_string())) })
            .await;

        assert!(matches!(result, Err(U2Error::DeviceNotFound(_))));
        assert!(!session.is_connected());
    }
}
