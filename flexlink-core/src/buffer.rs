//! Bounded Priority Buffer with Per-Entry Leases
//!
//! ## Overview
//!
//! [`PriorityBuffer`] holds outbound messages between the moment they are
//! published and the moment the hub acknowledges them. It is the only place a
//! message lives while a delivery attempt is in flight, so losing an entry
//! means losing telemetry.
//!
//! Entries are ordered by a signed 64-bit priority (higher = more important).
//! Ties are broken by insertion order using the monotonically increasing
//! [`Token`] assigned at `put` time.
//!
//! ## Design Rationale
//!
//! ### Leases instead of removal
//!
//! A delivery attempt must have exclusive use of an entry, but the entry has
//! to stay visible (it still counts toward capacity, it can still be evicted,
//! it can still be looked up by token from the delivery callback). Each slot
//! therefore carries an atomic lease flag:
//!
//! ```text
//!            put(leased=false)          peek_lease()
//!   ─────────────► [ Free ] ─────────────────────► [ Leased ]
//!                     ▲                                │
//!                     └────────── release(token) ──────┘
//!
//!   delete(token) removes the slot from either state
//! ```
//!
//! Acquiring is a compare-and-swap from free to leased, so two concurrent
//! `peek_lease` callers can never both win the same slot. Releasing is an
//! unconditional store and therefore idempotent.
//!
//! ### Eviction
//!
//! When the buffer is full, a new entry is accepted only if its priority is
//! strictly greater than the current minimum. The oldest entry holding that
//! minimum is evicted, leased or not. Otherwise `put` fails with
//! [`BufferError::Full`] and the caller decides what to do; nothing is
//! dropped silently.
//!
//! ### Layout
//!
//! ```text
//! ordered: BTreeMap<(priority, token), Arc<Slot>>   lowest ... highest
//! index:   HashMap<token, priority>                  token → ordered key
//! ```
//!
//! Both maps are guarded by one mutex. `put`, `delete` and token lookups are
//! O(log n); `peek_lease` walks from the highest key down and stops at the
//! first free slot.
//!
//! ## Usage Example
//!
//! ```rust
//! use flexlink_core::buffer::PriorityBuffer;
//!
//! let buffer = PriorityBuffer::new(3).unwrap();
//! buffer.put("low", 1, false).unwrap();
//! let high = buffer.put("high", 9, false).unwrap();
//!
//! let entry = buffer.peek_lease().unwrap();
//! assert_eq!(entry.token(), high);
//! assert_eq!(**entry.payload(), "high");
//!
//! // ... delivery succeeded
//! buffer.delete(high);
//! assert_eq!(buffer.len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{BufferError, BufferResult};

/// Opaque handle identifying one buffered entry
///
/// Tokens are unique for the lifetime of a buffer and increase with every
/// `put`, so they also encode insertion order.
pub type Token = u64;

#[derive(Debug)]
struct Slot<T> {
    payload: Arc<T>,
    leased: AtomicBool,
}

impl<T> Slot<T> {
    fn try_lease(&self) -> bool {
        self.leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug)]
struct Inner<T> {
    ordered: BTreeMap<(i64, Token), Arc<Slot<T>>>,
    index: HashMap<Token, i64>,
}

/// Snapshot of a buffered entry
///
/// Returned by [`PriorityBuffer::peek_lease`] and [`PriorityBuffer::get`].
/// The payload is shared, not copied.
#[derive(Debug)]
pub struct BufferedEntry<T> {
    token: Token,
    priority: i64,
    leased: bool,
    payload: Arc<T>,
}

impl<T> BufferedEntry<T> {
    /// Handle assigned by `put`
    pub fn token(&self) -> Token {
        self.token
    }

    /// Priority given at insertion
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Lease state at the time the snapshot was taken
    pub fn is_leased(&self) -> bool {
        self.leased
    }

    /// Shared payload; the buffer keeps its own reference until the entry is deleted
    pub fn payload(&self) -> &Arc<T> {
        &self.payload
    }

    /// Consumes the snapshot and returns its payload
    pub fn into_payload(self) -> Arc<T> {
        self.payload
    }
}

impl<T> Clone for BufferedEntry<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            priority: self.priority,
            leased: self.leased,
            payload: Arc::clone(&self.payload),
        }
    }
}

/// Bounded, priority-ordered store with single-holder leases
///
/// Safe to share between any number of producers, a drain worker and a
/// delivery-status callback (wrap it in an `Arc`).
///
/// ## Invariants
///
/// - `len() <= capacity()` after every operation
/// - a given token is handed out by `peek_lease` to at most one caller until
///   it is released or deleted
/// - a rejected `put` leaves the buffer unchanged
#[derive(Debug)]
pub struct PriorityBuffer<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    next_token: AtomicU64,
    total_inserted: AtomicU64,
}

impl<T> PriorityBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                ordered: BTreeMap::new(),
                index: HashMap::new(),
            }),
            next_token: AtomicU64::new(1),
            total_inserted: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Every mutation leaves both maps consistent before any call that
        // could panic, so a poisoned lock still guards valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `payload` with the given priority
    ///
    /// With `leased = true` the entry is created already leased, for callers
    /// that buffer a message and attempt delivery in the same step.
    ///
    /// When the buffer is full the lowest-priority entry (oldest first among
    /// equals) is evicted if `priority` beats it; otherwise the call fails
    /// with [`BufferError::Full`] and the buffer is unchanged.
    pub fn put(&self, payload: T, priority: i64, leased: bool) -> BufferResult<Token> {
        let mut inner = self.lock();

        if inner.ordered.len() >= self.capacity {
            let victim = inner.ordered.keys().next().copied();
            if let Some((minimum, victim_token)) = victim {
                if priority <= minimum {
                    log_warn!(
                        "buffer full ({} entries): rejecting priority {} (minimum {})",
                        self.capacity,
                        priority,
                        minimum
                    );
                    return Err(BufferError::Full {
                        capacity: self.capacity,
                        priority,
                        minimum,
                    });
                }
                inner.ordered.remove(&(minimum, victim_token));
                inner.index.remove(&victim_token);
                log_debug!("evicted token {} (priority {})", victim_token, minimum);
            }
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            payload: Arc::new(payload),
            leased: AtomicBool::new(leased),
        });
        inner.ordered.insert((priority, token), slot);
        inner.index.insert(token, priority);
        self.total_inserted.fetch_add(1, Ordering::Relaxed);

        log_debug!("put token {} priority {} leased={}", token, priority, leased);
        Ok(token)
    }

    /// Leases the highest-priority free entry
    ///
    /// Among equal priorities the most recently inserted entry wins. Returns
    /// [`BufferError::NotFound`] when the buffer is empty or every entry is
    /// already leased; this is the normal idle condition.
    pub fn peek_lease(&self) -> BufferResult<BufferedEntry<T>> {
        let inner = self.lock();

        for (&(priority, token), slot) in inner.ordered.iter().rev() {
            if slot.try_lease() {
                log_debug!("leased token {}", token);
                return Ok(BufferedEntry {
                    token,
                    priority,
                    leased: true,
                    payload: Arc::clone(&slot.payload),
                });
            }
        }

        Err(BufferError::NotFound { token: None })
    }

    /// Looks up an entry without touching its lease
    pub fn get(&self, token: Token) -> BufferResult<BufferedEntry<T>> {
        let inner = self.lock();
        inner
            .index
            .get(&token)
            .and_then(|&priority| {
                inner.ordered.get(&(priority, token)).map(|slot| BufferedEntry {
                    token,
                    priority,
                    leased: slot.leased.load(Ordering::Acquire),
                    payload: Arc::clone(&slot.payload),
                })
            })
            .ok_or(BufferError::NotFound { token: Some(token) })
    }

    /// Clears the lease on `token`. Unknown tokens and free entries are ignored.
    pub fn release(&self, token: Token) {
        let inner = self.lock();
        if let Some(slot) = inner
            .index
            .get(&token)
            .and_then(|&priority| inner.ordered.get(&(priority, token)))
        {
            slot.leased.store(false, Ordering::Release);
            log_debug!("released token {}", token);
        }
    }

    /// Removes `token` whatever its lease state. Unknown tokens are ignored.
    pub fn delete(&self, token: Token) {
        let mut inner = self.lock();
        if let Some(priority) = inner.index.remove(&token) {
            inner.ordered.remove(&(priority, token));
            log_debug!("deleted token {}", token);
        }
    }

    /// Number of entries, leased and free
    pub fn len(&self) -> usize {
        self.lock().ordered.len()
    }

    /// True when no entries are held
    pub fn is_empty(&self) -> bool {
        self.lock().ordered.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count of successful `put` calls since creation (monitoring only)
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted.load(Ordering::Relaxed)
    }

    /// Number of entries currently leased
    pub fn leased_count(&self) -> usize {
        self.lock()
            .ordered
            .values()
            .filter(|slot| slot.leased.load(Ordering::Acquire))
            .count()
    }
}
