//! Property-based tests for reservation status transitions.

use super::{Reservation, ReservationId, ReservationStatus};
use crate::{DeviceId, RequesterId};
use proptest::prelude::*;
use std::time::{Duration, SystemTime};

fn status_strategy() -> impl Strategy<Value = ReservationStatus> {
    prop_oneof![
        Just(ReservationStatus::Active),
        Just(ReservationStatus::Completed),
        Just(ReservationStatus::Cancelled),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 1000,
        .. ProptestConfig::default()
    })]

    // Only an active reservation may move, and only into a terminal status
    #[test]
    fn transitions_leave_active_only(from in status_strategy(), to in status_strategy()) {
        let allowed = from.can_transition_to(to);
        prop_assert_eq!(allowed, from == ReservationStatus::Active && to.is_terminal());
        prop_assert_eq!(from.check_transition(to).is_ok(), allowed);
    }

    // Any walk through the table reaches a fixed point after at most one step
    #[test]
    fn walks_stop_after_one_move(steps in prop::collection::vec(status_strategy(), 0..10)) {
        let mut current = ReservationStatus::Active;
        let mut moves = 0;
        for next in steps {
            if current.can_transition_to(next) {
                current = next;
                moves += 1;
            }
        }
        prop_assert!(moves <= 1);
    }

    // Storage names parse back to the same status
    #[test]
    fn storage_names_round_trip(status in status_strategy()) {
        prop_assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
    }

    // Stored timestamps rebuild a reservation with identical fields
    #[test]
    fn builder_preserves_fields(
        id in 1i64..1_000_000,
        device in 1i64..1_000,
        requester in 1i64..1_000,
        age_secs in 0u64..1_000_000,
        status in status_strategy(),
    ) {
        let created = SystemTime::now() - Duration::from_secs(age_secs);
        let reservation = Reservation::builder(ReservationId(id), DeviceId(device), RequesterId(requester))
            .status(status)
            .created_at(created)
            .build()
            .unwrap();

        prop_assert_eq!(reservation.id(), ReservationId(id));
        prop_assert_eq!(reservation.status(), status);
        prop_assert_eq!(reservation.created_at(), created);
        prop_assert_eq!(reservation.updated_at(), created);
    }
}
