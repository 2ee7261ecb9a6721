//! Dispatch assignments and the assignment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siren_core::{AssignmentId, OrderId, UnitId};

use crate::unit::UnitStatus;

/// Status of one unit's binding to one order.
///
/// `Completed`, `Cancelled` and `Replaced` are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    EnRoute,
    OnSite,
    Completed,
    Cancelled,
    Replaced,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Replaced)
    }

    /// Legal transition table:
    ///
    /// | current  | allowed next                 |
    /// |----------|------------------------------|
    /// | Assigned | EnRoute, Cancelled, Replaced |
    /// | EnRoute  | OnSite, Cancelled            |
    /// | OnSite   | Completed, Cancelled         |
    /// | terminal | none                         |
    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        match self {
            Assigned => matches!(next, EnRoute | Cancelled | Replaced),
            EnRoute => matches!(next, OnSite | Cancelled),
            OnSite => matches!(next, Completed | Cancelled),
            Completed | Cancelled | Replaced => false,
        }
    }

    /// Unit status implied by an assignment entering this status.
    pub fn implied_unit_status(&self) -> UnitStatus {
        match self {
            Self::Assigned => UnitStatus::Assigned,
            Self::EnRoute => UnitStatus::EnRoute,
            Self::OnSite => UnitStatus::OnSite,
            Self::Completed | Self::Cancelled | Self::Replaced => UnitStatus::Available,
        }
    }

    /// Numeric wire encoding used in published events ("1".."6").
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::Assigned => "1",
            Self::EnRoute => "2",
            Self::OnSite => "3",
            Self::Completed => "4",
            Self::Cancelled => "5",
            Self::Replaced => "6",
        }
    }
}

/// A binding of one unit to one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAssignment {
    pub id: AssignmentId,
    pub order_id: OrderId,
    pub unit_id: UnitId,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
}

impl DispatchAssignment {
    pub fn new(order_id: OrderId, unit_id: UnitId, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            order_id,
            unit_id,
            assigned_at,
            status: AssignmentStatus::Assigned,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssignmentStatus::*;

    const ALL: [AssignmentStatus; 6] = [Assigned, EnRoute, OnSite, Completed, Cancelled, Replaced];

    #[test]
    fn transition_table_matches_specified_edges() {
        let legal = [
            (Assigned, EnRoute),
            (Assigned, Cancelled),
            (Assigned, Replaced),
            (EnRoute, OnSite),
            (EnRoute, Cancelled),
            (OnSite, Completed),
            (OnSite, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_free_the_unit() {
        for status in [Completed, Cancelled, Replaced] {
            assert!(status.is_terminal());
            assert_eq!(status.implied_unit_status(), UnitStatus::Available);
        }
    }

    #[test]
    fn wire_codes_are_stable() {
        let codes: Vec<&str> = ALL.iter().map(|s| s.wire_code()).collect();
        assert_eq!(codes, ["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn active_statuses_mirror_unit_status() {
        assert_eq!(Assigned.implied_unit_status(), UnitStatus::Assigned);
        assert_eq!(EnRoute.implied_unit_status(), UnitStatus::EnRoute);
        assert_eq!(OnSite.implied_unit_status(), UnitStatus::OnSite);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_status() -> impl Strategy<Value = AssignmentStatus> {
            proptest::sample::select(ALL.to_vec())
        }

        proptest! {
            /// No transition ever leaves a terminal status.
            #[test]
            fn terminal_statuses_admit_nothing(
                from in any_status(),
                to in any_status(),
            ) {
                if from.is_terminal() {
                    prop_assert!(!from.can_transition_to(to));
                }
            }

            /// Every legal path from `Assigned` reaches `Completed` only
            /// through `EnRoute` then `OnSite`.
            #[test]
            fn completion_requires_full_progression(path in proptest::collection::vec(any_status(), 1..5)) {
                let mut current = Assigned;
                let mut visited = vec![current];
                for next in path {
                    if !current.can_transition_to(next) {
                        break;
                    }
                    current = next;
                    visited.push(current);
                }
                if current == Completed {
                    prop_assert_eq!(visited, vec![Assigned, EnRoute, OnSite, Completed]);
                }
            }
        }
    }
}
