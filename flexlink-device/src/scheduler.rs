//! Turns signals into timed callback invocations
//!
//! ## Accepting a signal
//!
//! [`SignalScheduler::accept`] validates the signal, sorts its items, and
//! for each target entity tries to advance the `(entity, type)` watermark to
//! the signal's `generated_at`, taken in whole milliseconds so redeliveries
//! of one signal compare equal. Entities where the watermark moves are owned
//! by this signal: the values in force right now are delivered to them
//! immediately, on the caller's thread.
//!
//! If the signal has a later change, one timer task is armed for the owned
//! entities. It sleeps until the next element starts, drops entities that a
//! newer signal has since claimed, delivers the element, and moves on to the
//! following one until the signal is exhausted or no entity is left.
//!
//! ```text
//! accept(sig, gen=T2) ──► watermark(L1, oe-add) := T2 ──► fire current values
//!                                              │
//!                               timer: sleep to next.start
//!                                              │
//!                    watermark still T2? ──no──► stop
//!                                              │yes
//!                                 fire, re-arm for the element after
//! ```
//!
//! ## Workers
//!
//! Timer-time invocations run on a small blocking pool bounded by
//! `SchedulerConfig::workers`, one job per entity. When every permit is
//! taken the timer task runs the job itself. A panicking callback is logged
//! and does not affect other entities or later elements.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flexlink_core::time::truncate_millis;
use flexlink_core::{SystemTime, TimeSource};
use flexlink_schemas::{Message, Signal, SignalElement, SignalError};
use log::{debug, error, warn};
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::watermark::Watermarks;

/// One value delivered to the application
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInvocation {
    pub entity: String,
    /// The per-value variable name, or the signal type when unset.
    pub variable: String,
    pub value: f64,
}

/// Application callback receiving every [`SignalInvocation`].
pub type SignalCallback = Arc<dyn Fn(&SignalInvocation) + Send + Sync>;

struct Engine {
    watermarks: Arc<Watermarks>,
    workers: Arc<Semaphore>,
    clock: Arc<dyn TimeSource>,
    granularity: Duration,
    cancel: CancellationToken,
}

/// A signal with a pending timer.
struct Armed {
    signal: Signal,
    generated_at: DateTime<Utc>,
    entities: Vec<String>,
    callback: SignalCallback,
}

/// Signal scheduler with per-(entity, type) staleness suppression
pub struct SignalScheduler {
    engine: Arc<Engine>,
    runtime: Handle,
}

impl SignalScheduler {
    /// Scheduler on the system clock, with its own watermark map.
    pub fn new(config: SchedulerConfig) -> Result<Self, ScheduleError> {
        Self::with_clock(config, Arc::new(SystemTime))
    }

    pub fn with_clock(
        config: SchedulerConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, ScheduleError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;
        Ok(Self {
            engine: Arc::new(Engine {
                watermarks: Arc::new(Watermarks::new()),
                workers: Arc::new(Semaphore::new(config.workers)),
                clock,
                granularity: config.delay_granularity,
                cancel: CancellationToken::new(),
            }),
            runtime,
        })
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.engine.watermarks
    }

    /// Validates and schedules `signal`.
    ///
    /// Returns an error (and schedules nothing) when the signal is malformed.
    /// A signal that is stale for every entity is accepted and ignored.
    pub fn accept<F>(&self, signal: Signal, callback: F) -> Result<(), ScheduleError>
    where
        F: Fn(&SignalInvocation) + Send + Sync + 'static,
    {
        self.accept_shared(signal, Arc::new(callback))
    }

    /// Same as [`accept`](Self::accept) for an already shared callback.
    pub fn accept_shared(&self, mut signal: Signal, callback: SignalCallback) -> Result<(), ScheduleError> {
        signal.validate()?;
        let generated_at = signal
            .generated_at
            .map(truncate_millis)
            .ok_or(SignalError::MissingGeneratedAt)?;
        signal.sort_items();

        let engine = &self.engine;
        let kind = signal.kind().to_string();
        let entities: Vec<String> = signal
            .entities
            .iter()
            .filter(|entity| engine.watermarks.try_advance(entity, &kind, generated_at))
            .cloned()
            .collect();

        if entities.is_empty() {
            debug!("signal {} generated at {} is stale, ignoring", kind, generated_at);
            return Ok(());
        }
        debug!("accepted signal {} for {:?}", kind, entities);

        let now = engine.clock.now_utc();
        if let Some(element) = signal.current_values(now) {
            for entity in &entities {
                deliver(&callback, &invocations(&signal, entity, &element));
            }
        }

        if signal.next_change(now).is_some() {
            let armed = Armed {
                signal,
                generated_at,
                entities,
                callback,
            };
            self.runtime.spawn(run_timer(Arc::clone(engine), armed, now));
        }
        Ok(())
    }

    /// Decodes an inbound payload and accepts the signal it carries.
    pub fn accept_json<F>(&self, payload: &str, callback: F) -> Result<(), ScheduleError>
    where
        F: Fn(&SignalInvocation) + Send + Sync + 'static,
    {
        let message = Message::from_json(payload)?;
        let topic = message.topic();
        let signal = message
            .into_signal()
            .ok_or(ScheduleError::NotASignal(topic))?;
        self.accept(signal, callback)
    }

    /// Cancels every pending timer. Signals accepted afterwards still fire
    /// their current values but arm nothing.
    pub fn shutdown(&self) {
        self.engine.cancel.cancel();
    }
}

impl Drop for SignalScheduler {
    fn drop(&mut self) {
        self.engine.cancel.cancel();
    }
}

fn invocations(signal: &Signal, entity: &str, element: &SignalElement) -> Vec<SignalInvocation> {
    element
        .values
        .iter()
        .map(|value| SignalInvocation {
            entity: entity.to_string(),
            variable: signal.variable_for(value).to_string(),
            value: value.value,
        })
        .collect()
}

fn deliver(callback: &SignalCallback, invocations: &[SignalInvocation]) {
    for invocation in invocations {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(invocation))) {
            error!(
                "signal callback panicked for {}/{}: {}",
                invocation.entity,
                invocation.variable,
                panic_message(panic.as_ref())
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Delay until `start`, rounded up to a multiple of `granularity`.
fn delay_until(start: DateTime<Utc>, now: DateTime<Utc>, granularity: Duration) -> Duration {
    let ms = u64::try_from((start - now).num_milliseconds()).unwrap_or(0);
    let step = u64::try_from(granularity.as_millis()).unwrap_or(u64::MAX).max(1);
    Duration::from_millis(ms.div_ceil(step).saturating_mul(step))
}

async fn run_timer(engine: Arc<Engine>, mut armed: Armed, mut cursor: DateTime<Utc>) {
    let kind = armed.signal.kind().to_string();

    while let Some(element) = armed.signal.next_change(cursor) {
        let delay = delay_until(element.start, engine.clock.now_utc(), engine.granularity);
        debug!("signal {} armed for {} (in {:?})", kind, element.start, delay);

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => {}
            _ = engine.cancel.cancelled() => {
                debug!("signal {} timer cancelled", kind);
                return;
            }
        }

        let generated_at = armed.generated_at;
        armed.entities.retain(|entity| {
            let current = engine.watermarks.is_current(entity, &kind, generated_at);
            if !current {
                warn!("signal {} for {} superseded, dropping timer", kind, entity);
            }
            current
        });
        if armed.entities.is_empty() {
            return;
        }

        dispatch(&engine, &armed, &element).await;
        cursor = element.start;
    }
    debug!("signal {} exhausted", kind);
}

async fn dispatch(engine: &Engine, armed: &Armed, element: &SignalElement) {
    let mut jobs = JoinSet::new();
    for entity in &armed.entities {
        let batch = invocations(&armed.signal, entity, element);
        match Arc::clone(&engine.workers).try_acquire_owned() {
            Ok(permit) => {
                let callback = Arc::clone(&armed.callback);
                jobs.spawn_blocking(move || {
                    let _permit = permit;
                    deliver(&callback, &batch);
                });
            }
            Err(_) => {
                debug!("signal workers busy, delivering to {} inline", entity);
                deliver(&armed.callback, &batch);
            }
        }
    }
    while let Some(joined) = jobs.join_next().await {
        if let Err(err) = joined {
            error!("signal worker failed: {}", err);
        }
    }
}
