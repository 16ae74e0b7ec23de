//! Connectivity state and sync-on-reconnect.
//!
//! Something outside the engine decides what "online" means (a
//! network interface watcher, an airplane-mode toggle, a test); the
//! monitor just holds the current state and fans out changes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordinator::SyncCoordinator;
use crate::transport::Transport;

/// Whether this device can currently reach its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Peers are reachable.
    Online,
    /// No network; syncs will be attempted on the next transition up.
    Offline,
}

/// Holds the device's connectivity state and notifies subscribers.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    /// Creates a monitor in the given state.
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        ConnectivityMonitor { tx }
    }

    /// Records a state change.
    ///
    /// Returns whether the state actually changed; repeating the
    /// current state notifies nobody.
    pub fn set(&self, state: Connectivity) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    /// The current state.
    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    /// Whether the device is currently online.
    pub fn is_online(&self) -> bool {
        self.current() == Connectivity::Online
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    /// Starts offline; whoever owns the monitor reports reality.
    fn default() -> Self {
        ConnectivityMonitor::new(Connectivity::Offline)
    }
}

/// Syncs every peer whenever connectivity comes back.
///
/// The task ends when the monitor is dropped. Sync failures are
/// logged by the coordinator and do not stop the watch.
pub fn spawn_autosync<T>(
    coordinator: Arc<SyncCoordinator<T>>,
    monitor: &ConnectivityMonitor,
) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    let mut rx = monitor.subscribe();
    let mut last = *rx.borrow();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let now = *rx.borrow_and_update();
            if last == Connectivity::Offline && now == Connectivity::Online {
                tracing::info!("connectivity restored, syncing all peers");
                coordinator.sync_all().await;
            }
            last = now;
        }
    })
}
