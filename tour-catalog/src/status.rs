use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Excursion lifecycle.
///
/// ```text
/// DRAFT --activate(departure > now)--> ACTIVE
/// ACTIVE --seats exhausted--> FULL
/// FULL --capacity increased--> ACTIVE
/// ACTIVE/FULL --finish--> FINISHED
/// any non-terminal --cancel--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExcursionStatus {
    Draft,
    Active,
    Full,
    Cancelled,
    Finished,
}

impl ExcursionStatus {
    pub const ALL: [ExcursionStatus; 5] = [
        ExcursionStatus::Draft,
        ExcursionStatus::Active,
        ExcursionStatus::Full,
        ExcursionStatus::Cancelled,
        ExcursionStatus::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExcursionStatus::Draft => "DRAFT",
            ExcursionStatus::Active => "ACTIVE",
            ExcursionStatus::Full => "FULL",
            ExcursionStatus::Cancelled => "CANCELLED",
            ExcursionStatus::Finished => "FINISHED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExcursionStatus::Cancelled | ExcursionStatus::Finished)
    }

    /// Edges of the lifecycle graph, ignoring the guards that depend on the excursion's data
    /// (departure date, seat counts). Nothing leaves a terminal state.
    pub fn can_transition_to(&self, target: ExcursionStatus) -> bool {
        use ExcursionStatus::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, target),
            (_, Cancelled)
                | (Draft, Active)
                | (Active, Full)
                | (Full, Active)
                | (Active, Finished)
                | (Full, Finished)
        )
    }
}

impl fmt::Display for ExcursionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExcursionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExcursionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown excursion status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExcursionStatus::*;

    #[test]
    fn test_lifecycle_edges() {
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Full));
        assert!(Full.can_transition_to(Active));
        assert!(Active.can_transition_to(Finished));
        assert!(Full.can_transition_to(Finished));

        assert!(!Draft.can_transition_to(Full));
        assert!(!Draft.can_transition_to(Finished));
        assert!(!Active.can_transition_to(Draft));
    }

    #[test]
    fn test_cancel_from_any_open_state() {
        for status in [Draft, Active, Full] {
            assert!(status.can_transition_to(Cancelled), "{} -> CANCELLED", status);
        }
    }

    #[test]
    fn test_terminal_states_are_closed() {
        for from in [Cancelled, Finished] {
            for to in ExcursionStatus::ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_parse_round_trip() {
        for status in ExcursionStatus::ALL {
            assert_eq!(status.as_str().parse::<ExcursionStatus>().unwrap(), status);
        }
        assert!("LOTADA".parse::<ExcursionStatus>().is_err());
    }
}
