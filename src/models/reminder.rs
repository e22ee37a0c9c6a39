use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REMINDER_TITLE: &str = "Bring an umbrella today! ☂️";

/// Identifier handed back by the delivery subsystem for a scheduled reminder
pub type ReminderHandle = i64;

/// The single pending reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub trigger_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl ScheduledReminder {
    pub fn new(trigger_at: DateTime<Utc>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            trigger_at,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.trigger_at <= now
    }

    pub fn local_trigger(&self) -> DateTime<Local> {
        self.trigger_at.with_timezone(&Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn reminder_is_due_at_and_after_trigger() {
        let trigger_at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        let reminder = ScheduledReminder::new(trigger_at, DEFAULT_REMINDER_TITLE, "body");

        assert!(!reminder.is_due(trigger_at - Duration::seconds(1)));
        assert!(reminder.is_due(trigger_at));
        assert!(reminder.is_due(trigger_at + Duration::minutes(5)));
    }
}
