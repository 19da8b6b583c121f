use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// The cloud-connection liveness probe.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + std::fmt::Debug {
    async fn is_connected(&self) -> bool;
}

/// A probe whose state is flipped externally, e.g. by a test or by whatever process
/// owns the real link-state signal in a full deployment.
#[derive(Debug)]
pub struct SwitchableConnectivity(AtomicBool);

impl SwitchableConnectivity {
    pub fn new(connected: bool) -> Self {
        Self(AtomicBool::new(connected))
    }

    pub fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for SwitchableConnectivity {
    async fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
