//! Host-side network-change source for the connectivity monitor.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use watch_engine::ConnectivityMonitor;
use watch_logging::watch_trace;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether a TCP connection to `host:port` can be opened.
pub async fn host_reachable(host: &str, port: u16) -> bool {
    matches!(
        time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Probes `host:port` every `interval` and reports the outcome to `monitor`.
///
/// The monitor only forwards transitions, so reporting every probe is fine.
/// Abort the returned task to stop probing.
pub fn spawn_probe(
    monitor: ConnectivityMonitor,
    host: String,
    port: u16,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = host_reachable(&host, port).await;
            watch_trace!("Probe {host}:{port} reachable={online}");
            monitor.set_online(online);
        }
    })
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn listening_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        assert!(host_reachable("127.0.0.1", port).await);

        drop(listener);
        assert!(!host_reachable("127.0.0.1", port).await);
    }

    #[tokio::test]
    async fn probe_reports_reachability_to_monitor() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let monitor = ConnectivityMonitor::new(false);
        let mut watch = monitor.subscribe();

        let probe = spawn_probe(
            monitor.clone(),
            "127.0.0.1".to_string(),
            port,
            Duration::from_millis(20),
        );
        let online = time::timeout(Duration::from_secs(5), watch.changed())
            .await
            .expect("probe result");
        assert!(online);
        assert!(monitor.is_online());
        probe.abort();
    }
}
