//! Playback engine: the periodic evaluate-and-act loop

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use syncstream_api::{
    EngineLifecycle, EngineStatus, EvaluationOutcome, EvaluationRecord, StrategyAction,
    TrackSummary,
};
use syncstream_provider::PlaybackProvider;
use syncstream_store::{AuditEvent, AuditEventType, Store};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{CoreError, CoreEvent, CoreResult, StrategyCatalog, StrategyFactory};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct EngineState {
    lifecycle: EngineLifecycle,
    last_evaluation: Option<EvaluationRecord>,
    current_track: Option<TrackSummary>,
}

struct EngineInner {
    provider: Arc<dyn PlaybackProvider>,
    catalog: StrategyCatalog,
    factory: StrategyFactory,
    store: Arc<dyn Store>,
    poll_interval: Duration,
    /// One evaluation in flight at a time, loop or manual
    cycle: tokio::sync::Mutex<()>,
    state: Mutex<EngineState>,
    events: broadcast::Sender<CoreEvent>,
}

/// The playback engine.
///
/// Cheap to clone; clones share the same state. Each cycle fetches the
/// playback state, resolves the active strategy, enriches the track with
/// features when missing, evaluates, and skips when the strategy says so.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    pub fn new(
        provider: Arc<dyn PlaybackProvider>,
        catalog: StrategyCatalog,
        factory: StrategyFactory,
        store: Arc<dyn Store>,
        poll_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(EngineInner {
                provider,
                catalog,
                factory,
                store,
                poll_interval,
                cycle: tokio::sync::Mutex::new(()),
                state: Mutex::new(EngineState {
                    lifecycle: EngineLifecycle::Idle,
                    last_evaluation: None,
                    current_track: None,
                }),
                events,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.inner.catalog
    }

    pub fn factory(&self) -> &StrategyFactory {
        &self.inner.factory
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.name()
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    pub fn lifecycle(&self) -> EngineLifecycle {
        self.state().lifecycle
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    fn set_lifecycle(&self, lifecycle: EngineLifecycle) {
        let changed = {
            let mut state = self.state();
            let changed = state.lifecycle != lifecycle;
            state.lifecycle = lifecycle;
            changed
        };

        if changed {
            debug!(?lifecycle, "Engine lifecycle changed");
            let _ = self.inner.events.send(CoreEvent::LifecycleChanged(lifecycle));
        }
    }

    /// Idle or Stopped becomes Running; a stop already in progress is left alone
    fn enter_running(&self) {
        let entered = {
            let mut state = self.state();
            let entered = matches!(
                state.lifecycle,
                EngineLifecycle::Idle | EngineLifecycle::Stopped
            );
            if entered {
                state.lifecycle = EngineLifecycle::Running;
            }
            entered
        };

        if entered {
            let _ = self
                .inner
                .events
                .send(CoreEvent::LifecycleChanged(EngineLifecycle::Running));
        }
    }

    /// Snapshot for status queries
    pub fn status(&self) -> CoreResult<EngineStatus> {
        let active_strategy_id = self.inner.catalog.active_id()?;
        let state = self.state();

        Ok(EngineStatus {
            active_strategy_id,
            is_running: state.lifecycle == EngineLifecycle::Running,
            lifecycle: state.lifecycle,
            last_evaluation: state.last_evaluation.clone(),
            current_track: state.current_track.clone(),
        })
    }

    /// Run one evaluation cycle now.
    ///
    /// Serialized with the loop: a manual trigger waits for an in-flight
    /// cycle to finish. Errors are recorded as the last evaluation and
    /// returned to the caller.
    pub async fn apply_strategy(&self) -> CoreResult<EvaluationOutcome> {
        let _cycle = self.inner.cycle.lock().await;

        let result = self.evaluate_once().await;
        let outcome = match &result {
            Ok(outcome) => outcome.clone(),
            Err(e) => EvaluationOutcome::Failed {
                error: e.to_string(),
            },
        };
        self.record(outcome);
        result
    }

    fn record(&self, outcome: EvaluationOutcome) {
        let record = EvaluationRecord {
            at: syncstream_util::now(),
            outcome,
        };
        self.state().last_evaluation = Some(record.clone());
        let _ = self.inner.events.send(CoreEvent::Evaluated(record));
    }

    async fn evaluate_once(&self) -> CoreResult<EvaluationOutcome> {
        let inner = &self.inner;

        let playback = inner.provider.current_playback().await?;
        let Some(mut track) = playback.and_then(|p| p.into_playing_track()) else {
            info!("No active playback found or playback is paused");
            self.state().current_track = None;
            return Ok(EvaluationOutcome::NothingPlaying);
        };
        self.state().current_track = Some(track.summary());

        let config = match inner.catalog.get_active() {
            Ok(config) if config.is_active => config,
            Ok(config) => {
                warn!(strategy = %config.id, "Active strategy is disabled");
                return Ok(EvaluationOutcome::NoActiveStrategy {
                    reason: format!("strategy '{}' is disabled", config.id),
                });
            }
            Err(e) if e.is_configuration() => {
                warn!(error = %e, "No active strategy configured");
                return Ok(EvaluationOutcome::NoActiveStrategy {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if track.features.is_none() {
            match inner.provider.audio_features(&track.id).await? {
                Some(features) => {
                    track.attach_features(features);
                }
                None => {
                    warn!(track_id = %track.id, "Missing audio features, cannot evaluate strategy");
                    return Ok(EvaluationOutcome::MissingFeatures {
                        track: track.summary(),
                    });
                }
            }
        }

        let strategy = match inner.factory.make(&config) {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(strategy = %config.id, error = %e, "Active strategy has no implementation");
                return Ok(EvaluationOutcome::NoActiveStrategy {
                    reason: e.to_string(),
                });
            }
        };

        match strategy.evaluate(&track) {
            StrategyAction::Keep => {
                debug!(track_id = %track.id, strategy = %config.id, "Track kept");
                Ok(EvaluationOutcome::Kept {
                    track: track.summary(),
                    strategy_id: config.id,
                })
            }
            StrategyAction::Skip => {
                info!(
                    track_name = %track.name,
                    track_id = %track.id,
                    strategy = %config.id,
                    "Policy violated, skipping track"
                );
                let acknowledged = inner.provider.skip_next().await?;

                if let Err(e) = inner.store.append_audit(AuditEvent::new(AuditEventType::TrackSkipped {
                    track_id: track.id.clone(),
                    track_name: track.name.clone(),
                    strategy_id: config.id.clone(),
                })) {
                    warn!(error = %e, "Failed to record skip");
                }

                Ok(EvaluationOutcome::Skipped {
                    track: track.summary(),
                    strategy_id: config.id,
                    acknowledged,
                })
            }
        }
    }

    /// Drive cycles until `cancel` fires.
    ///
    /// A failing cycle is logged and the loop sleeps the normal interval.
    /// Cancellation cuts the sleep short but never interrupts a cycle.
    pub async fn run(&self, cancel: CancellationToken) {
        if !cancel.is_cancelled() {
            self.enter_running();
        }
        info!(
            provider = self.inner.provider.name(),
            interval_secs = self.inner.poll_interval.as_secs_f64(),
            "Engine lifecycle started"
        );

        while !cancel.is_cancelled() {
            if let Err(e) = self.apply_strategy().await {
                error!(error = %e, "Evaluation cycle failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
            }
        }

        self.set_lifecycle(EngineLifecycle::Stopped);
        info!("Engine lifecycle stopped");
    }

    /// Spawn the loop on the runtime
    pub fn start(&self) -> CoreResult<EngineHandle> {
        {
            let mut state = self.state();
            if matches!(
                state.lifecycle,
                EngineLifecycle::Running | EngineLifecycle::Stopping
            ) {
                return Err(CoreError::InvalidArgument("engine is already running".into()));
            }
            state.lifecycle = EngineLifecycle::Running;
        }
        let _ = self
            .inner
            .events
            .send(CoreEvent::LifecycleChanged(EngineLifecycle::Running));

        let cancel = CancellationToken::new();
        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { engine.run(token).await });

        Ok(EngineHandle {
            engine: self.clone(),
            cancel,
            task,
        })
    }
}

/// Handle to a running engine loop
pub struct EngineHandle {
    engine: PlaybackEngine,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Token that stops the loop when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait until it has exited.
    ///
    /// An in-flight cycle runs to completion first.
    pub async fn stop(self) {
        if self.engine.lifecycle() == EngineLifecycle::Running {
            self.engine.set_lifecycle(EngineLifecycle::Stopping);
        }
        self.cancel.cancel();

        if let Err(e) = self.task.await {
            error!(error = %e, "Engine task ended abnormally");
        }
        self.engine.set_lifecycle(EngineLifecycle::Stopped);
    }
}
