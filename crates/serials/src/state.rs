use core::str::FromStr;

use serde::{Deserialize, Serialize};

use serialtrack_core::DomainError;

/// Custody state of a serial unit. Closed set; storage rejects anything else.
///
/// Variant order is the lifecycle order used when listing units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SerialState {
    /// In warehouse custody and available for allocation.
    #[default]
    InStock,
    Installed,
    Damaged,
    Retired,
}

impl SerialState {
    pub const ALL: [SerialState; 4] = [
        SerialState::InStock,
        SerialState::Installed,
        SerialState::Damaged,
        SerialState::Retired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SerialState::InStock => "IN_STOCK",
            SerialState::Installed => "INSTALLED",
            SerialState::Damaged => "DAMAGED",
            SerialState::Retired => "RETIRED",
        }
    }

    /// Whether a unit in `self` may move to `next`.
    ///
    /// No transition graph is enforced: every state may follow every state,
    /// including itself.
    pub fn can_transition_to(self, _next: SerialState) -> bool {
        true
    }
}

impl core::fmt::Display for SerialState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerialState {
    type Err = DomainError;

    /// Parses the wire name, ignoring surrounding whitespace and case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        SerialState::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "invalid state '{}': expected one of IN_STOCK, INSTALLED, DAMAGED, RETIRED",
                    s.trim()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("IN_STOCK".parse::<SerialState>().unwrap(), SerialState::InStock);
        assert_eq!(" installed ".parse::<SerialState>().unwrap(), SerialState::Installed);
        assert_eq!("Damaged".parse::<SerialState>().unwrap(), SerialState::Damaged);
        assert_eq!("retired".parse::<SerialState>().unwrap(), SerialState::Retired);
    }

    #[test]
    fn rejects_unknown_state() {
        let err = "LOST".parse::<SerialState>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("LOST")));
        assert!("IN STOCK".parse::<SerialState>().is_err());
        assert!("".parse::<SerialState>().is_err());
    }

    #[test]
    fn serde_and_display_share_wire_names() {
        for state in SerialState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
        let parsed: SerialState = serde_json::from_str("\"DAMAGED\"").unwrap();
        assert_eq!(parsed, SerialState::Damaged);
    }

    #[test]
    fn every_transition_is_allowed() {
        for from in SerialState::ALL {
            for to in SerialState::ALL {
                assert!(from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn lifecycle_order() {
        let mut states = vec![
            SerialState::Retired,
            SerialState::Damaged,
            SerialState::InStock,
            SerialState::Installed,
        ];
        states.sort();
        assert_eq!(states, SerialState::ALL.to_vec());
    }
}
