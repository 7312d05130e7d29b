//! Last-applied generation time per (entity, signal type).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

/// Map from `(entity, type)` to the `generated_at` of the newest signal applied to it
#[derive(Debug, Default)]
pub struct Watermarks {
    latest: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), DateTime<Utc>>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `generated_at` if it is newer than what is stored (or nothing is).
    /// Returns whether the watermark moved.
    pub fn try_advance(&self, entity: &str, kind: &str, generated_at: DateTime<Utc>) -> bool {
        let mut latest = self.lock();
        match latest.get_mut(&(entity.to_string(), kind.to_string())) {
            Some(current) if *current >= generated_at => false,
            Some(current) => {
                *current = generated_at;
                true
            }
            None => {
                latest.insert((entity.to_string(), kind.to_string()), generated_at);
                true
            }
        }
    }

    /// True unless a signal newer than `generated_at` has been applied.
    pub fn is_current(&self, entity: &str, kind: &str, generated_at: DateTime<Utc>) -> bool {
        self.latest(entity, kind)
            .map_or(true, |latest| latest <= generated_at)
    }

    pub fn latest(&self, entity: &str, kind: &str) -> Option<DateTime<Utc>> {
        self.lock()
            .get(&(entity.to_string(), kind.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
