use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

/// Per-trigger instruction governing how a missed fire time is handled.
///
/// `SmartPolicy` is never acted on directly — it is translated to a
/// concrete instruction per trigger variant before being applied (see
/// `Trigger::update_after_misfire`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MisfireInstruction {
    /// Translate to a variant-specific concrete instruction at check time.
    SmartPolicy,
    /// Set the next fire time to now (simple triggers).
    FireNow,
    /// Set the next fire time to now (cron triggers).
    FireOnceNow,
    /// Skip missed fires; compute the next fire time strictly after now.
    DoNothing,
    /// Advance past missed fires without touching the repeat count.
    RescheduleNextWithExistingCount,
    /// Advance past missed fires, decrementing the remaining count by the
    /// number of fires skipped.
    RescheduleNextWithRemainingCount,
    /// Fire immediately, keeping the existing repeat count.
    RescheduleNowWithExistingCount,
    /// Keep the original schedule even if overdue; do not apply misfire
    /// handling at all.
    IgnoreMisfirePolicy,
}

const SIMPLE_ALLOWED: &[MisfireInstruction] = &[
    MisfireInstruction::SmartPolicy,
    MisfireInstruction::FireNow,
    MisfireInstruction::DoNothing,
    MisfireInstruction::RescheduleNextWithExistingCount,
    MisfireInstruction::RescheduleNextWithRemainingCount,
    MisfireInstruction::RescheduleNowWithExistingCount,
    MisfireInstruction::IgnoreMisfirePolicy,
];

const CRON_ALLOWED: &[MisfireInstruction] = &[
    MisfireInstruction::SmartPolicy,
    MisfireInstruction::FireOnceNow,
    MisfireInstruction::DoNothing,
    MisfireInstruction::IgnoreMisfirePolicy,
];

impl MisfireInstruction {
    /// Validate this instruction against the set a [`crate::trigger::SimpleTrigger`]
    /// accepts.
    pub fn validate_for_simple(self) -> Result<(), SchedulerError> {
        validate(self, SIMPLE_ALLOWED, "SimpleTrigger")
    }

    /// Validate this instruction against the set a [`crate::trigger::CronTrigger`]
    /// accepts.
    pub fn validate_for_cron(self) -> Result<(), SchedulerError> {
        validate(self, CRON_ALLOWED, "CronTrigger")
    }
}

fn validate(
    instruction: MisfireInstruction,
    allowed: &[MisfireInstruction],
    variant: &str,
) -> Result<(), SchedulerError> {
    if allowed.contains(&instruction) {
        Ok(())
    } else {
        Err(SchedulerError::InvalidConfiguration(format!(
            "{instruction:?} is not a valid misfire instruction for {variant}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_rejects_fire_once_now() {
        assert!(MisfireInstruction::FireOnceNow.validate_for_simple().is_err());
    }

    #[test]
    fn cron_rejects_reschedule_with_count() {
        assert!(MisfireInstruction::RescheduleNextWithExistingCount
            .validate_for_cron()
            .is_err());
    }

    #[test]
    fn smart_policy_and_ignore_are_universal() {
        assert!(MisfireInstruction::SmartPolicy.validate_for_simple().is_ok());
        assert!(MisfireInstruction::SmartPolicy.validate_for_cron().is_ok());
        assert!(MisfireInstruction::IgnoreMisfirePolicy
            .validate_for_simple()
            .is_ok());
        assert!(MisfireInstruction::IgnoreMisfirePolicy
            .validate_for_cron()
            .is_ok());
    }
}
