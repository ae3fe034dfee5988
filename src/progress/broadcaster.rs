// src/progress/broadcaster.rs

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::Progress;

/// Latest-value cell plus change notification.
///
/// Backed by a `tokio::sync::watch` channel: publishing replaces the value
/// without waiting for anyone, and observers always read the newest one.
/// Publishing is meant for the runner that holds the execution slot.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    tx: Arc<watch::Sender<Option<Progress>>>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current snapshot and wake observers.
    pub fn publish(&self, progress: Progress) {
        self.tx.send_replace(Some(progress));
    }

    /// Drop the current snapshot (no test in flight).
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn latest(&self) -> Option<Progress> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// One observer's view of the progress stream.
#[derive(Debug)]
pub struct ProgressSubscription {
    rx: watch::Receiver<Option<Progress>>,
    primed: bool,
}

impl ProgressSubscription {
    /// Next snapshot.
    ///
    /// The first call returns the snapshot current at subscribe time right
    /// away (if there is one). After that it waits for the next publish;
    /// snapshots published in between are skipped. Returns `None` once the
    /// broadcaster is gone.
    pub async fn next(&mut self) -> Option<Progress> {
        if !self.primed {
            self.primed = true;
            if let Some(p) = self.rx.borrow_and_update().clone() {
                return Some(p);
            }
        }

        loop {
            self.rx.changed().await.ok()?;
            if let Some(p) = self.rx.borrow_and_update().clone() {
                return Some(p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackendKind, ProgressKind};

    fn progress(kind: ProgressKind, speed: f64) -> Progress {
        let mut p = Progress::new(kind, BackendKind::Speedtest, "srv");
        p.speed = speed;
        p
    }

    #[tokio::test]
    async fn late_subscriber_gets_latest_immediately() {
        let b = ProgressBroadcaster::new();
        b.publish(progress(ProgressKind::Download, 10.0));
        b.publish(progress(ProgressKind::Download, 50.0));

        let mut sub = b.subscribe();
        let first = sub.next().await.unwrap();
        assert_eq!(first.speed, 50.0);
    }

    #[tokio::test]
    async fn subscriber_sees_final_complete() {
        let b = ProgressBroadcaster::new();
        let mut sub = b.subscribe();

        let publisher = b.clone();
        tokio::spawn(async move {
            for i in 0..100 {
                publisher.publish(progress(ProgressKind::Upload, i as f64));
            }
            publisher.publish(progress(ProgressKind::Complete, 99.0));
        });

        loop {
            let p = sub.next().await.unwrap();
            if p.kind == ProgressKind::Complete {
                assert!(p.is_complete);
                break;
            }
        }
    }

    #[test]
    fn publish_without_subscribers_keeps_latest() {
        let b = ProgressBroadcaster::new();
        assert!(b.latest().is_none());
        b.publish(progress(ProgressKind::Ping, 0.0));
        assert_eq!(b.latest().unwrap().kind, ProgressKind::Ping);
        b.clear();
        assert!(b.latest().is_none());
    }

    #[tokio::test]
    async fn next_returns_none_when_broadcaster_dropped() {
        let b = ProgressBroadcaster::new();
        let mut sub = b.subscribe();
        drop(b);
        assert!(sub.next().await.is_none());
    }
}
