//! Periodic sweep over every stored record.
//!
//! A convenience driver for running without a watch-based scheduler: each
//! sweep reconciles every record once and a failed record is simply tried
//! again on the next sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use super::Reconciler;
use crate::resource::{RecordKey, ResourceKind};
use crate::store::Result;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub reconciled: Vec<RecordKey>,
    pub failed: Vec<(RecordKey, String)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles every record once per call.
pub struct Sweeper {
    reconciler: Arc<Reconciler>,
}

impl Sweeper {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Visits live records in dependency order, then records pending deletion
    /// in reverse order so dependents go first.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let store = self.reconciler.store();
        let mut live = Vec::new();
        let mut deleting = Vec::new();
        for kind in ResourceKind::all() {
            for record in store.list(*kind, None).await? {
                if record.metadata().being_deleted() {
                    deleting.push(record.key());
                } else {
                    live.push(record.key());
                }
            }
        }
        deleting.reverse();

        let mut report = SweepReport::default();
        for key in live.into_iter().chain(deleting) {
            match self.reconciler.reconcile(&key).await {
                Ok(()) => report.reconciled.push(key),
                Err(e) => report.failed.push((key, e.to_string())),
            }
        }

        if report.is_clean() {
            log::debug!("Sweep reconciled {} record(s)", report.reconciled.len());
        } else {
            log::warn!(
                "Sweep reconciled {} record(s), {} failed",
                report.reconciled.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }
}

/// Runs a [`Sweeper`] on an interval in a background thread.
pub struct SweepScheduler {
    sweeper: Arc<Sweeper>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    pub fn new(sweeper: Arc<Sweeper>, interval: Duration) -> Self {
        Self {
            sweeper,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the sweep loop. A message on `trigger_rx` runs a sweep immediately.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let sweeper = Arc::clone(&self.sweeper);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start sweep runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let mut timer = tokio::time::interval(interval);

                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    tokio::select! {
                        _ = timer.tick() => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual sweep triggered");
                        },
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    if let Err(e) = sweeper.run_once().await {
                        log::error!("Sweep failed: {}", e);
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop after the current sweep.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
