//! Consumer watchdog: expires connections whose producer has gone silent.

use crate::runtime::IoRuntime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Base tick of the watchdog loop.
pub const TICK: Duration = Duration::from_millis(100);

/// Removes consumer connections whose `last_receive` has aged past
/// `RPI x (4 << timeout_mult)`.
pub struct Watchdog {
    runtime: Arc<IoRuntime>,
    shutdown: AtomicBool,
    notify: Notify,
}

impl Watchdog {
    pub fn new(runtime: Arc<IoRuntime>) -> Self {
        Self {
            runtime,
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Signals the loop to exit at the next tick.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Runs the watchdog loop (call from a background task).
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = self.notify.notified() => break,
                _ = interval.tick() => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let now_us = self.runtime.now_us();
                    self.sweep_at(now_us);
                }
            }
        }
        tracing::debug!("watchdog stopped");
    }

    /// One sweep at the given runtime clock; returns the number of
    /// connections expired.
    pub fn sweep_at(&self, now_us: u64) -> usize {
        let expired = self
            .runtime
            .snapshot(|c| c.is_consumer && c.expired(now_us));

        for connection in &expired {
            if self.runtime.remove_connection(connection.connection_id) {
                tracing::info!(
                    "connection {:#010X} timed out (rpi={:?} budget={:?})",
                    connection.connection_id,
                    connection.rpi,
                    connection.timeout()
                );
            }
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::IoConnection;

    async fn runtime() -> Arc<IoRuntime> {
        IoRuntime::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_expiry_and_idempotence() {
        let rt = runtime().await;
        let conn = rt.add_connection(
            IoConnection::new(0x20, Duration::from_millis(100)).consuming(),
        );
        // Budget with multiplier 0 is 400 ms; pretend the last frame landed
        // 500 ms ago.
        conn.mark_received(0);

        let watchdog = Watchdog::new(Arc::clone(&rt));
        assert_eq!(watchdog.sweep_at(500_000), 1);
        assert!(!rt.contains(0x20));
        // A second tick finds nothing.
        assert_eq!(watchdog.sweep_at(600_000), 0);
    }

    #[tokio::test]
    async fn test_alive_consumer_survives() {
        let rt = runtime().await;
        let conn = rt.add_connection(
            IoConnection::new(0x21, Duration::from_millis(100)).consuming(),
        );
        conn.mark_received(200_000);

        let watchdog = Watchdog::new(Arc::clone(&rt));
        assert_eq!(watchdog.sweep_at(500_000), 0);
        assert!(rt.contains(0x21));
    }

    #[tokio::test]
    async fn test_multiplier_extends_budget() {
        let rt = runtime().await;
        let conn = rt.add_connection(
            IoConnection::new(0x22, Duration::from_millis(100))
                .consuming()
                .with_timeout_mult(1), // x8 = 800 ms
        );
        conn.mark_received(0);

        let watchdog = Watchdog::new(Arc::clone(&rt));
        assert_eq!(watchdog.sweep_at(500_000), 0);
        assert_eq!(watchdog.sweep_at(900_000), 1);
    }

    #[tokio::test]
    async fn test_producers_are_not_swept() {
        let rt = runtime().await;
        let conn = rt.add_connection(
            IoConnection::new(0x23, Duration::from_millis(10)).producing(),
        );
        conn.mark_received(0);

        let watchdog = Watchdog::new(Arc::clone(&rt));
        assert_eq!(watchdog.sweep_at(10_000_000), 0);
        assert!(rt.contains(0x23));
    }

    #[tokio::test]
    async fn test_stop_exits_run_loop() {
        let rt = runtime().await;
        let watchdog = Arc::new(Watchdog::new(rt));
        let handle = {
            let watchdog = Arc::clone(&watchdog);
            tokio::spawn(async move { watchdog.run().await })
        };
        watchdog.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watchdog loop must exit after stop")
            .unwrap();
    }
}
