//! Property tests for the priority buffer and span arithmetic
//!
//! The buffer is checked against a straightforward reference model (a vector
//! scanned for its minimum) over arbitrary put/lease/release/delete sequences.

use chrono::{DateTime, Duration, TimeZone, Utc};
use flexlink_core::{BufferError, PriorityBuffer, RecurringSpan, Span, Token};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put { priority: i64, leased: bool },
    Lease,
    Release(usize),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-20i64..20, any::<bool>()).prop_map(|(priority, leased)| Op::Put { priority, leased }),
        2 => Just(Op::Lease),
        1 => (0usize..64).prop_map(Op::Release),
        1 => (0usize..64).prop_map(Op::Delete),
    ]
}

/// Reference model: entries as (priority, token, leased)
#[derive(Default)]
struct Model {
    entries: Vec<(i64, Token, bool)>,
}

impl Model {
    fn minimum(&self) -> Option<(i64, Token)> {
        self.entries.iter().map(|&(p, t, _)| (p, t)).min()
    }

    fn remove(&mut self, token: Token) {
        self.entries.retain(|&(_, t, _)| t != token);
    }
}

fn epoch_plus(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_600_000_000_000 + ms).unwrap()
}

proptest! {
    #[test]
    fn buffer_matches_reference_model(
        capacity in 1usize..8,
        ops in proptest::collection::vec(arb_op(), 1..80),
    ) {
        let buffer = PriorityBuffer::new(capacity).unwrap();
        let mut model = Model::default();
        let mut issued: Vec<Token> = Vec::new();

        for op in ops {
            match op {
                Op::Put { priority, leased } => {
                    let expected_full = model.entries.len() >= capacity
                        && model.minimum().map_or(false, |(min, _)| priority <= min);
                    match buffer.put((), priority, leased) {
                        Ok(token) => {
                            prop_assert!(!expected_full);
                            if model.entries.len() >= capacity {
                                let (_, victim) = model.minimum().unwrap();
                                model.remove(victim);
                            }
                            model.entries.push((priority, token, leased));
                            issued.push(token);
                        }
                        Err(BufferError::Full { .. }) => prop_assert!(expected_full),
                        Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                    }
                }
                Op::Lease => {
                    let expected = model
                        .entries
                        .iter()
                        .filter(|e| !e.2)
                        .map(|&(p, t, _)| (p, t))
                        .max();
                    match (buffer.peek_lease(), expected) {
                        (Ok(entry), Some((_, token))) => {
                            prop_assert_eq!(entry.token(), token);
                            for e in model.entries.iter_mut().filter(|e| e.1 == token) {
                                e.2 = true;
                            }
                        }
                        (Err(err), None) => prop_assert!(err.is_not_found()),
                        (got, want) => prop_assert!(false, "lease mismatch: {got:?} vs {want:?}"),
                    }
                }
                Op::Release(i) => {
                    if let Some(&token) = issued.get(i) {
                        buffer.release(token);
                        for e in model.entries.iter_mut().filter(|e| e.1 == token) {
                            e.2 = false;
                        }
                    }
                }
                Op::Delete(i) => {
                    if let Some(&token) = issued.get(i) {
                        buffer.delete(token);
                        model.remove(token);
                    }
                }
            }

            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.len(), model.entries.len());
        }

        for &(priority, token, leased) in &model.entries {
            let entry = buffer.get(token).unwrap();
            prop_assert_eq!(entry.priority(), priority);
            prop_assert_eq!(entry.is_leased(), leased);
        }
    }

    #[test]
    fn eviction_never_keeps_a_lower_priority_than_it_rejected(
        priorities in proptest::collection::vec(-100i64..100, 1..60),
        capacity in 1usize..6,
    ) {
        let buffer = PriorityBuffer::new(capacity).unwrap();
        let mut tokens = Vec::new();
        let mut highest_rejected: Option<i64> = None;

        for p in priorities {
            match buffer.put(p, p, false) {
                Ok(t) => tokens.push(t),
                Err(BufferError::Full { minimum, .. }) => {
                    prop_assert!(p <= minimum);
                    highest_rejected = Some(highest_rejected.map_or(p, |h| h.max(p)));
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }

        let survivors: Vec<i64> = tokens
            .iter()
            .filter_map(|&t| buffer.get(t).ok())
            .map(|e| e.priority())
            .collect();
        prop_assert!(survivors.len() <= capacity);
        if let Some(rejected) = highest_rejected {
            prop_assert!(survivors.iter().all(|&s| s >= rejected));
        }
    }

    #[test]
    fn span_is_left_closed_right_open(
        start in -1_000_000i64..1_000_000,
        length in 1i64..10_000_000,
        probe in 0i64..10_000_000,
    ) {
        let span = Span::new(epoch_plus(start), Duration::milliseconds(length)).unwrap();
        prop_assert!(span.contains(span.start()));
        prop_assert!(!span.contains(span.end()));
        prop_assert_eq!(span.contains(epoch_plus(start + probe)), probe < length);
    }

    #[test]
    fn next_span_agrees_with_stepping(
        length in 1i64..500,
        repeat in 1i64..500,
        now in -1_000i64..20_000,
    ) {
        let base = Span::new(epoch_plus(0), Duration::milliseconds(length)).unwrap();
        let recurring = RecurringSpan::new(base, Duration::milliseconds(repeat)).unwrap();
        let now = epoch_plus(now);

        let mut stepped = base;
        while !(stepped.contains(now) || stepped.start() > now) {
            stepped = stepped.starting_at(stepped.start() + Duration::milliseconds(repeat));
        }

        prop_assert_eq!(recurring.next_span(now), Some(stepped));
    }
}
