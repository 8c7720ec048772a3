use serde::{Deserialize, Serialize};

/// Lifecycle state of a stored trigger.
///
/// `BLOCKED`/`PAUSED_BLOCKED` are mutually exclusive with acquisition:
/// a registry never hands a blocked trigger to the firing loop.
/// `COMPLETE` and `ERROR` triggers are likewise never acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    /// Eligible for acquisition once its next fire time is due.
    Normal,
    /// Paused directly, or via its group, or via `pause_all`.
    Paused,
    /// No further fire times; terminal until replaced.
    Complete,
    /// The recurrence computation failed irrecoverably; terminal until
    /// external intervention (e.g. `replace_trigger`).
    Error,
    /// The trigger's job is stateful and currently executing via another
    /// trigger; not acquirable until that execution completes.
    Blocked,
    /// Paused while blocked; resumes to `Blocked`, not `Normal`, until the
    /// job finishes.
    PausedBlocked,
    /// Not present in the registry.
    None,
}

impl TriggerState {
    /// Whether a trigger in this state may be returned by
    /// `acquire_next_triggers`.
    pub fn is_acquirable(self) -> bool {
        matches!(self, TriggerState::Normal)
    }

    /// Apply a pause, honoring the blocked/unblocked split.
    pub fn paused(self) -> Self {
        match self {
            TriggerState::Blocked | TriggerState::PausedBlocked => TriggerState::PausedBlocked,
            TriggerState::Complete | TriggerState::Error | TriggerState::None => self,
            _ => TriggerState::Paused,
        }
    }

    /// Apply a resume, honoring the blocked/unblocked split.
    pub fn resumed(self) -> Self {
        match self {
            TriggerState::PausedBlocked => TriggerState::Blocked,
            TriggerState::Paused => TriggerState::Normal,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_resume_round_trip_normal() {
        let s = TriggerState::Normal;
        assert_eq!(s.paused().resumed(), TriggerState::Normal);
    }

    #[test]
    fn pause_resume_round_trip_blocked() {
        let s = TriggerState::Blocked;
        assert_eq!(s.paused(), TriggerState::PausedBlocked);
        assert_eq!(s.paused().resumed(), TriggerState::Blocked);
    }

    #[test]
    fn terminal_states_are_unaffected_by_pause() {
        assert_eq!(TriggerState::Complete.paused(), TriggerState::Complete);
        assert_eq!(TriggerState::Error.paused(), TriggerState::Error);
    }

    #[test]
    fn only_normal_is_acquirable() {
        assert!(TriggerState::Normal.is_acquirable());
        assert!(!TriggerState::Paused.is_acquirable());
        assert!(!TriggerState::Blocked.is_acquirable());
        assert!(!TriggerState::Complete.is_acquirable());
    }
}
