//! CanaryWatch daemon: scheduling and wiring.
//!
//! Runs two independent periodic tasks: the integrity tick (canary check,
//! signal collection, entropy scoring, escalation) and the metabolic noise
//! tick. The schedules are deliberately decoupled so an observer cannot
//! correlate noise bursts with genuine checks.

pub mod snapshot_log;
pub mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use canarywatch_core::canary::CanaryStore;
use canarywatch_core::config::WatchConfig;
use canarywatch_core::entropy::build_snapshot;
use canarywatch_core::noise::{NoiseGenerator, NoiseStats};
use canarywatch_core::signals::health::{probe, MetadataSource};
use canarywatch_core::signals::{
    status_map, RiskSignal, SIGNAL_ACTIVITY, SIGNAL_CANARY_STATUS, SIGNAL_PROBE_LATENCY,
    SIGNAL_REPOSITORY_HEALTH,
};
use canarywatch_core::{CanaryStatus, CanaryWatchError, EntropySnapshot, SecretKey};
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::snapshot_log::SnapshotLog;

/// Bounded escalation queue. A slow or absent consumer never blocks the
/// integrity tick; overflow events are logged and dropped.
const ESCALATION_CHANNEL_CAPACITY: usize = 16;

/// The CanaryWatch daemon.
///
/// Owns the canary store, the noise generator, and the escalation producer
/// side. Escalation events carry the full [`EntropySnapshot`]; what the
/// consumer does with them (alert, lock down, redeploy) is not this
/// daemon's concern.
pub struct Daemon {
    config: WatchConfig,
    store: Mutex<CanaryStore>,
    source: Arc<dyn MetadataSource>,
    noise: NoiseGenerator,
    snapshot_log: SnapshotLog,
    escalation_tx: mpsc::Sender<EntropySnapshot>,
    tick_running: AtomicBool,
}

impl Daemon {
    /// Build a daemon from validated configuration. Weight validation happens
    /// here, once: a partition that does not sum to 1.0 is a fatal startup
    /// error.
    pub fn new(
        config: WatchConfig,
        key: SecretKey,
        source: Arc<dyn MetadataSource>,
    ) -> canarywatch_core::Result<(Self, mpsc::Receiver<EntropySnapshot>)> {
        config.weights.validate()?;

        let store = CanaryStore::new(
            &config.canary_path,
            key,
            config.staleness_threshold(),
            config.rewrite_min_interval(),
        );
        let noise = NoiseGenerator::new(
            &config.canary_path,
            config.noise.dummy_reads,
            config.noise.max_padding_bytes,
        );
        let snapshot_log = SnapshotLog::new(config.snapshot_log_path.clone());
        let (escalation_tx, escalation_rx) = mpsc::channel(ESCALATION_CHANNEL_CAPACITY);

        Ok((
            Self {
                config,
                store: Mutex::new(store),
                source,
                noise,
                snapshot_log,
                escalation_tx,
                tick_running: AtomicBool::new(false),
            },
            escalation_rx,
        ))
    }

    /// Advisory noise counters.
    pub fn noise_stats(&self) -> NoiseStats {
        self.noise.stats()
    }

    /// Operator action: zero the noise counters.
    pub fn reset_noise_stats(&self) {
        self.noise.reset_stats()
    }

    /// Run both schedulers until the process shuts down.
    pub async fn run(self) {
        info!(
            canary = %self.config.canary_path.display(),
            integrity_interval_secs = self.config.integrity_interval_secs,
            noise_interval_secs = self.config.noise.interval_secs,
            "CanaryWatch daemon starting"
        );

        let daemon = Arc::new(self);

        let noise_daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            noise_daemon.noise_loop().await;
        });

        daemon.integrity_loop().await;
    }

    /// One full integrity cycle: check the canary, collect signals, score,
    /// persist the snapshot, escalate if triggered, refresh the canary.
    ///
    /// Every completed tick produces a snapshot; the only silent outcome in
    /// the scheduler is the explicit reentrancy skip in [`integrity_loop`],
    /// which logs a warning.
    pub async fn tick_once(&self) -> EntropySnapshot {
        let status = self.store.lock().await.check_canary();
        let outcome = probe(self.source.as_ref(), self.config.fetch_timeout()).await;

        let weights = &self.config.weights;
        let components = vec![
            RiskSignal::new(
                SIGNAL_REPOSITORY_HEALTH,
                outcome.health,
                weights.repository_health,
            ),
            RiskSignal::new(
                SIGNAL_CANARY_STATUS,
                status_map::status_risk(status),
                weights.canary_status,
            ),
            RiskSignal::new(SIGNAL_ACTIVITY, outcome.activity, weights.activity),
            RiskSignal::new(
                SIGNAL_PROBE_LATENCY,
                outcome.latency,
                weights.probe_latency,
            ),
        ];

        let snapshot = build_snapshot(components, self.config.trigger_threshold);
        info!(
            status = %status,
            composite = snapshot.composite,
            level = %snapshot.level,
            triggered = snapshot.triggered,
            "integrity tick complete"
        );

        if let Err(e) = self.snapshot_log.append(&snapshot) {
            error!(error = %e, "failed to persist snapshot");
        }

        if snapshot.triggered {
            match self.escalation_tx.try_send(snapshot.clone()) {
                Ok(()) => debug!("escalation event emitted"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("escalation channel full; dropping event")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!("escalation consumer gone; dropping event")
                }
            }
        }

        // Refresh only when nothing needs an operator: a tamper finding is
        // never cleared here, and the STALE observation above already made it
        // into this tick's snapshot before the refresh.
        if matches!(status, CanaryStatus::Ok | CanaryStatus::Stale) {
            match self.store.lock().await.write_canary() {
                Ok(_) => {}
                Err(CanaryWatchError::RateLimited { remaining_secs }) => {
                    debug!(remaining_secs, "canary refresh deferred by rate limit")
                }
                Err(e) => error!(error = %e, "canary refresh failed"),
            }
        }

        snapshot
    }

    async fn integrity_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.integrity_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            // Reentrancy guard: a tick still running (slow probe) means this
            // interval is skipped, never overlapped; overlapping ticks would
            // race writes to the canary file.
            if self.tick_running.swap(true, Ordering::SeqCst) {
                warn!("previous integrity tick still running; skipping this interval");
                continue;
            }

            let daemon = Arc::clone(&self);
            tokio::spawn(async move {
                daemon.tick_once().await;
                daemon.tick_running.store(false, Ordering::SeqCst);
            });
        }
    }

    async fn noise_loop(&self) {
        loop {
            let jitter = rand::rng().random_range(0..=self.config.noise.jitter_secs);
            tokio::time::sleep(Duration::from_secs(
                self.config.noise.interval_secs + jitter,
            ))
            .await;
            self.noise.run_metabolic_noise();
        }
    }
}
