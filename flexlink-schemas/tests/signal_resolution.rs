//! Signal resolution against a straightforward reference scan
//!
//! For sorted point items the current element is the last item starting at
//! or before `t`, and the next change is the first item starting after `t`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use flexlink_core::Prioritizer;
use flexlink_schemas::{
    types, Event, FfrPrioritizer, Level, Message, Reading, Signal, SignalItem, SignalValue,
};
use proptest::prelude::*;

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_467_331_200_000 + ms).unwrap()
}

fn point_signal(offsets: &[i64]) -> Signal {
    let mut signal = Signal::new("oe-add", at(0)).with_entity("L1");
    for (i, &offset) in offsets.iter().enumerate() {
        signal = signal.with_item(SignalItem::point(at(offset), i as f64));
    }
    signal.sort_items();
    signal
}

proptest! {
    #[test]
    fn current_is_last_started_item(
        mut offsets in proptest::collection::vec(0i64..10_000, 1..12),
        probe in -1_000i64..12_000,
    ) {
        offsets.sort_unstable();
        let signal = point_signal(&offsets);
        let t = at(probe);

        let expected = signal.items.iter().rev().find(|item| item.sort_key() <= t);
        let got = signal.current_values(t);
        match (expected, got) {
            (None, None) => {}
            (Some(item), Some(element)) => {
                prop_assert_eq!(element.start, item.sort_key());
                prop_assert_eq!(element.values, item.values());
            }
            (e, g) => prop_assert!(false, "expected {:?}, got {:?}", e, g),
        }
    }

    #[test]
    fn next_is_first_future_item(
        mut offsets in proptest::collection::vec(0i64..10_000, 1..12),
        probe in -1_000i64..12_000,
    ) {
        offsets.sort_unstable();
        let signal = point_signal(&offsets);
        let t = at(probe);

        let expected = signal.items.iter().find(|item| item.sort_key() > t);
        let got = signal.next_change(t);
        prop_assert_eq!(expected.map(|i| i.sort_key()), got.map(|e| e.start));
    }

    #[test]
    fn ffr_readings_outrank_plain_readings_from_same_instant(ts in 1i64..4_000_000_000_000) {
        let mut critical: Message = Reading::new("L1", types::POWER, 1.0).into();
        critical.stamp(ts);
        let mut plain: Message = Reading::new("L1", types::SETPOINT, 1.0).into();
        plain.stamp(ts);
        let mut chatter: Message = Event::new("L1", "heartbeat", Level::Debug).into();
        chatter.stamp(ts);

        let p = FfrPrioritizer;
        prop_assert!(p.score(&critical) > p.score(&plain));
        prop_assert!(p.score(&plain) > p.score(&chatter));
    }
}

#[test]
fn batch_signal_round_trips_through_json() {
    let signal = Signal::new(types::OE_VARS, at(0))
        .with_entity("L1")
        .with_item(SignalItem::batch(
            at(1_000),
            vec![SignalValue::new(types::OE_ADD, 0.5)],
        ))
        .with_item(SignalItem::point(at(2_000), 0.0));
    let message = Message::Signal(signal.clone());

    let json = serde_json::to_string(&message).unwrap();
    let decoded = Message::from_json(&json).unwrap().into_signal().unwrap();

    assert_eq!(decoded, signal);
    assert_eq!(
        decoded.next_change(at(0)).unwrap().start,
        at(0) + Duration::seconds(1)
    );
}
