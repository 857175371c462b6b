//! Outcome and state enums for the quest lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ACCEPT OUTCOME
// ============================================================================

/// Result of asking whether an agent may accept a quest.
///
/// Checks run in declaration order; the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcceptOutcome {
    /// The quest may be accepted
    Accept,
    /// No quest with that id is registered
    NotFound,
    /// The agent already holds progress for this quest
    AlreadyActive,
    /// The quest is not repeatable and the agent has completed it
    AlreadyCompleted,
    /// The cooldown since the last completion has not elapsed
    OnCooldown,
    /// The daily completion limit for this quest has been reached
    DailyLimitReached,
    /// At least one prerequisite quest has not been completed
    PrerequisiteUnmet,
    /// The agent holds the configured maximum of active quests
    MaxActiveReached,
}

impl AcceptOutcome {
    pub const ALL: [AcceptOutcome; 8] = [
        AcceptOutcome::Accept,
        AcceptOutcome::NotFound,
        AcceptOutcome::AlreadyActive,
        AcceptOutcome::AlreadyCompleted,
        AcceptOutcome::OnCooldown,
        AcceptOutcome::DailyLimitReached,
        AcceptOutcome::PrerequisiteUnmet,
        AcceptOutcome::MaxActiveReached,
    ];

    /// Stable name, as written by `Display` and read by `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptOutcome::Accept => "Accept",
            AcceptOutcome::NotFound => "NotFound",
            AcceptOutcome::AlreadyActive => "AlreadyActive",
            AcceptOutcome::AlreadyCompleted => "AlreadyCompleted",
            AcceptOutcome::OnCooldown => "OnCooldown",
            AcceptOutcome::DailyLimitReached => "DailyLimitReached",
            AcceptOutcome::PrerequisiteUnmet => "PrerequisiteUnmet",
            AcceptOutcome::MaxActiveReached => "MaxActiveReached",
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, AcceptOutcome::Accept)
    }

    /// Rejections that no amount of waiting will lift.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcceptOutcome::NotFound | AcceptOutcome::AlreadyCompleted)
    }
}

impl fmt::Display for AcceptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcceptOutcome {
    type Err = AcceptOutcomeParseError;

    /// Case-insensitive on the names `as_str` produces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AcceptOutcomeParseError(s.to_string()))
    }
}

/// Error when parsing an invalid accept outcome string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcomeParseError(pub String);

impl fmt::Display for AcceptOutcomeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid accept outcome: {}", self.0)
    }
}

impl std::error::Error for AcceptOutcomeParseError {}

// ============================================================================
// QUEST STATE
// ============================================================================

/// Lifecycle state of one quest for one agent.
///
/// ```text
/// NotAccepted ── accept() ──→ Accepted ── submit_all() ──→ Completed
///      ↑                          │                           │
///      └───────── reset() ────────┘            (repeatable) Cooldown ──→ NotAccepted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestState {
    NotAccepted,
    Accepted,
    /// Completed and not repeatable
    Completed,
    /// Completed and waiting out its cooldown
    Cooldown,
}

impl QuestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestState::NotAccepted => "NotAccepted",
            QuestState::Accepted => "Accepted",
            QuestState::Completed => "Completed",
            QuestState::Cooldown => "Cooldown",
        }
    }
}

impl fmt::Display for QuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_outcome_display_parses_back() {
        for outcome in AcceptOutcome::ALL {
            assert_eq!(outcome.to_string().parse(), Ok(outcome));
        }
    }

    #[test]
    fn test_accept_outcome_parse_is_case_insensitive_and_strict() {
        assert_eq!("oncooldown".parse(), Ok(AcceptOutcome::OnCooldown));
        assert_eq!("ALREADYCOMPLETED".parse(), Ok(AcceptOutcome::AlreadyCompleted));
        for retired in ["delay", "onetime", "requirements", "max_active", "maybe"] {
            assert_eq!(
                retired.parse::<AcceptOutcome>(),
                Err(AcceptOutcomeParseError(retired.to_string()))
            );
        }
    }

    #[test]
    fn test_only_accept_is_accept() {
        assert_eq!(AcceptOutcome::ALL.iter().filter(|o| o.is_accept()).count(), 1);
        assert!(AcceptOutcome::AlreadyCompleted.is_terminal());
        assert!(!AcceptOutcome::OnCooldown.is_terminal());
    }
}
