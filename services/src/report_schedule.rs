//! When a similarity report should be generated for a submission.

use chrono::{DateTime, Utc};
use db::models::course_module::ReportGeneration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub to_generate: bool,
    pub generation_time: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn none() -> Self {
        Self {
            to_generate: false,
            generation_time: None,
        }
    }
}

/// Target for a submission entering the queue.
pub fn initial(
    policy: ReportGeneration,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Schedule {
    let target = match policy {
        ReportGeneration::Immediate | ReportGeneration::ImmediateAndDueDate => now,
        ReportGeneration::DueDate => match due_date {
            Some(due) if due > now => due,
            _ => now,
        },
    };
    Schedule {
        to_generate: true,
        generation_time: Some(target),
    }
}

/// Target after a report request went out. Only the immediate-and-due-date
/// policy schedules a second generation.
pub fn after_request(
    policy: ReportGeneration,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Schedule {
    match (policy, due_date) {
        (ReportGeneration::ImmediateAndDueDate, Some(due)) if due > now => Schedule {
            to_generate: true,
            generation_time: Some(due),
        },
        _ => Schedule::none(),
    }
}

/// New target for a pending generation after the module's due date moved.
/// Returns `None` when the row keeps its current target.
pub fn after_due_date_change(
    current: Schedule,
    old_due: Option<DateTime<Utc>>,
    new_due: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if !current.to_generate {
        return None;
    }
    let new_due = new_due?;
    match current.generation_time {
        Some(target) if Some(target) == old_due && target != new_due => Some(new_due),
        Some(target) if target > new_due => Some(new_due),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn due_date_policy_waits_for_future_due_date() {
        let now = Utc::now();
        let due = now + Duration::days(2);

        let s = initial(ReportGeneration::DueDate, Some(due), now);
        assert_eq!(s.generation_time, Some(due));

        let past = now - Duration::days(1);
        let s = initial(ReportGeneration::DueDate, Some(past), now);
        assert_eq!(s.generation_time, Some(now));

        let s = initial(ReportGeneration::ImmediateAndDueDate, Some(due), now);
        assert_eq!(s.generation_time, Some(now));
        assert!(s.to_generate);
    }

    #[test]
    fn second_generation_only_for_future_due_date() {
        let now = Utc::now();
        let due = now + Duration::days(2);

        let s = after_request(ReportGeneration::ImmediateAndDueDate, Some(due), now);
        assert!(s.to_generate);
        assert_eq!(s.generation_time, Some(due));

        let s = after_request(ReportGeneration::ImmediateAndDueDate, Some(now - Duration::hours(1)), now);
        assert!(!s.to_generate);

        let s = after_request(ReportGeneration::Immediate, Some(due), now);
        assert_eq!(s, Schedule::none());
    }

    #[test]
    fn moved_due_date_pulls_targets_along() {
        let now = Utc::now();
        let old_due = now + Duration::days(5);
        let new_due = now + Duration::days(3);

        let following = Schedule {
            to_generate: true,
            generation_time: Some(old_due),
        };
        assert_eq!(after_due_date_change(following, Some(old_due), Some(new_due)), Some(new_due));

        let later_due = now + Duration::days(9);
        assert_eq!(
            after_due_date_change(following, Some(old_due), Some(later_due)),
            Some(later_due)
        );

        let immediate = Schedule {
            to_generate: true,
            generation_time: Some(now),
        };
        assert_eq!(after_due_date_change(immediate, Some(old_due), Some(new_due)), None);

        assert_eq!(after_due_date_change(Schedule::none(), Some(old_due), Some(new_due)), None);
    }
}
