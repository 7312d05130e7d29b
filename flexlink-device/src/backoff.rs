//! Backoff window shared by everything that sends on one hub connection
//!
//! A retriable status opens a window (if none is open) lasting the current
//! interval, then widens the interval by one step for the next window, up to
//! the ceiling. Any terminal status resets the interval to the floor and
//! closes the window.
//!
//! ```text
//! statuses : BUSY     BUSY     BUSY  ...  OK
//! interval : 2s->4s   4s->6s   ...        ->2s
//! window   : [now, now+2s)  (extends only after it expires)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use crate::config::RetryConfig;

#[derive(Debug)]
struct State {
    current: Duration,
    until: Option<Instant>,
}

/// Process-wide backoff state for one logical connection.
#[derive(Debug)]
pub struct BackoffController {
    config: RetryConfig,
    state: Mutex<State>,
}

impl BackoffController {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            state: Mutex::new(State {
                current: config.min_interval,
                until: None,
            }),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a retriable status. Returns the end of the active window.
    pub fn on_retriable(&self) -> Instant {
        let now = Instant::now();
        let mut state = self.lock();
        let until = match state.until {
            Some(until) if until > now => until,
            _ => {
                let until = now + state.current;
                debug!("backoff window opened for {:?}", state.current);
                state.until = Some(until);
                until
            }
        };
        state.current = state.current.saturating_add(self.config.step).min(self.config.max_interval);
        until
    }

    /// Records a terminal status.
    pub fn on_terminal(&self) {
        let mut state = self.lock();
        if state.until.is_some() || state.current != self.config.min_interval {
            debug!("backoff reset");
        }
        state.current = self.config.min_interval;
        state.until = None;
    }

    /// End of the active window, if one is open.
    pub fn backoff_until(&self) -> Option<Instant> {
        let now = Instant::now();
        self.lock().until.filter(|until| *until > now)
    }

    pub fn is_backing_off(&self) -> bool {
        self.backoff_until().is_some()
    }

    /// Length of the next window that would be opened.
    pub fn current_interval(&self) -> Duration {
        self.lock().current
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
