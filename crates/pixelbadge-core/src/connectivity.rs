//! Connectivity gating.
//!
//! Network operations wait for the host to report a connection before each
//! attempt. Waiting is never an error; the enclosing retry budget is the
//! only bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

/// Host-provided view of the network link (e.g. a Wi-Fi manager).
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Connectivity for hosts whose link is managed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Shared flag toggled by whoever watches the link.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    connected: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Connectivity source plus the interval used to re-check it.
#[derive(Clone, Copy)]
pub struct Gate<'a> {
    pub connectivity: &'a dyn Connectivity,
    pub poll: Duration,
}

impl Gate<'_> {
    /// Suspends until the link is reported up.
    pub async fn wait(&self, label: &str) {
        let mut logged = false;
        while !self.connectivity.is_connected() {
            if !logged {
                debug!(op = label, "waiting for connectivity");
                logged = true;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }
}
