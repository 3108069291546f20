use std::sync::Arc;

use tokio::sync::watch;
use watch_logging::{watch_info, watch_warn};

/// Process-wide online/offline signal.
///
/// Written only by the host's network-change source through [`set_online`],
/// read by sessions through [`subscribe`]. Cloning shares the same signal.
///
/// [`set_online`]: ConnectivityMonitor::set_online
/// [`subscribe`]: ConnectivityMonitor::subscribe
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records the host's current connectivity.
    ///
    /// Returns `true` when this is a transition; repeated reports of the same
    /// state neither log nor wake subscribers.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                watch_info!("Connectivity restored");
            } else {
                watch_warn!("Connectivity lost");
            }
        }
        changed
    }

    pub fn subscribe(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }

    /// Live subscriptions; each session holds one until it ends.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// A session's subscription; dropping it unsubscribes.
#[derive(Debug)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatch {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next transition and returns the new state.
    ///
    /// Rapid flips may be coalesced into the latest value. Never resolves once
    /// the monitor is gone.
    pub async fn changed(&mut self) -> bool {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        *self.rx.borrow_and_update()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn repeated_state_is_not_a_transition() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(true);
        let mut watch = monitor.subscribe();
        assert!(watch.is_online());

        monitor.set_online(false);
        assert!(!watch.changed().await);
        monitor.set_online(true);
        assert!(watch.changed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_reports_do_not_wake_subscribers() {
        let monitor = ConnectivityMonitor::new(true);
        let mut watch = monitor.subscribe();
        monitor.set_online(true);

        let woke = tokio::time::timeout(Duration::from_secs(1), watch.changed()).await;
        assert!(woke.is_err());
    }

    #[test]
    fn dropping_a_watch_unsubscribes() {
        let monitor = ConnectivityMonitor::default();
        let watch = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);
        drop(watch);
        assert_eq!(monitor.subscriber_count(), 0);
    }
}
