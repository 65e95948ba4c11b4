use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::config::SchedulingConfig;

const NANOS_PER_DAY: i64 = 86_400_000_000_000;
const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    Overdue,
    DueSoon,
    Normal,
}

/// Display classification of a scheduled date relative to "now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueStatus {
    pub label: String,
    pub bucket: DueBucket,
    pub days_until: i64,
}

/// Maps scheduled dates onto overdue / due-soon / normal buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueDateClassifier {
    due_soon_days: i64,
}

impl Default for DueDateClassifier {
    fn default() -> Self {
        Self::from(&SchedulingConfig::default())
    }
}

impl From<&SchedulingConfig> for DueDateClassifier {
    fn from(config: &SchedulingConfig) -> Self {
        Self::new(config.due_soon_days)
    }
}

impl DueDateClassifier {
    pub fn new(due_soon_days: i64) -> Self {
        Self {
            due_soon_days: due_soon_days.max(0),
        }
    }

    /// `days_until` is the ceiling of the whole-day distance from `now` to the start
    /// of `scheduled`.
    pub fn classify(&self, scheduled: NaiveDate, now: NaiveDateTime) -> DueStatus {
        let days_until = ceil_days(scheduled.and_time(NaiveTime::default()) - now);
        let bucket = if days_until < 0 {
            DueBucket::Overdue
        } else if days_until <= self.due_soon_days {
            DueBucket::DueSoon
        } else {
            DueBucket::Normal
        };

        DueStatus {
            label: label_for(days_until),
            bucket,
            days_until,
        }
    }

    pub fn classify_on(&self, scheduled: NaiveDate, today: NaiveDate) -> DueStatus {
        self.classify(scheduled, today.and_time(NaiveTime::default()))
    }
}

/// Classification with the default seven day due-soon window.
pub fn classify(scheduled: NaiveDate, now: NaiveDateTime) -> DueStatus {
    DueDateClassifier::default().classify(scheduled, now)
}

fn ceil_days(delta: chrono::Duration) -> i64 {
    // Nanosecond precision overflows past ~292 years; milliseconds cover the rest.
    match delta.num_nanoseconds() {
        Some(nanos) => ceil_div(nanos, NANOS_PER_DAY),
        None => ceil_div(delta.num_milliseconds(), MILLIS_PER_DAY),
    }
}

fn ceil_div(value: i64, unit: i64) -> i64 {
    let whole = value.div_euclid(unit);
    if value.rem_euclid(unit) > 0 {
        whole + 1
    } else {
        whole
    }
}

fn label_for(days_until: i64) -> String {
    match days_until {
        i64::MIN..=-2 => format!("Overdue by {} days", -days_until),
        -1 => "Overdue by 1 day".to_string(),
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        days => format!("Due in {days} days"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
    }

    fn mid_morning() -> NaiveDateTime {
        today().and_hms_opt(10, 30, 0).expect("valid time")
    }

    #[test]
    fn yesterday_is_overdue() {
        let status = classify(today() - Duration::days(1), mid_morning());
        assert_eq!(status.bucket, DueBucket::Overdue);
        assert_eq!(status.days_until, -1);
        assert_eq!(status.label, "Overdue by 1 day");
    }

    #[test]
    fn seven_days_out_is_due_soon_and_eight_is_normal() {
        let soon = classify(today() + Duration::days(7), mid_morning());
        assert_eq!(soon.bucket, DueBucket::DueSoon);
        assert_eq!(soon.days_until, 7);

        let later = classify(today() + Duration::days(8), mid_morning());
        assert_eq!(later.bucket, DueBucket::Normal);
        assert_eq!(later.label, "Due in 8 days");
    }

    #[test]
    fn today_is_due_soon_even_after_midnight() {
        let status = classify(today(), mid_morning());
        assert_eq!(status.bucket, DueBucket::DueSoon);
        assert_eq!(status.days_until, 0);
        assert_eq!(status.label, "Due today");
    }

    #[test]
    fn fractional_seconds_count_toward_the_ceiling() {
        let eve = NaiveDate::from_ymd_opt(2025, 3, 2).expect("valid date");

        let half_second = eve.and_hms_milli_opt(23, 59, 59, 500).expect("valid time");
        let status = classify(today(), half_second);
        assert_eq!(status.days_until, 8);
        assert_eq!(status.bucket, DueBucket::Normal);

        let one_micro = eve.and_hms_micro_opt(23, 59, 59, 999_999).expect("valid time");
        assert_eq!(classify(today(), one_micro).days_until, 8);

        let midnight = eve.succ_opt().expect("valid date").and_time(NaiveTime::default());
        let status = classify(today(), midnight);
        assert_eq!(status.days_until, 7);
        assert_eq!(status.bucket, DueBucket::DueSoon);
    }

    #[test]
    fn just_past_midnight_of_the_scheduled_day_is_still_today() {
        let status = classify(today(), today().and_hms_milli_opt(0, 0, 0, 1).expect("valid time"));
        assert_eq!(status.days_until, 0);
        assert_eq!(status.label, "Due today");
    }

    #[test]
    fn classify_on_uses_whole_days() {
        let classifier = DueDateClassifier::new(3);
        assert_eq!(
            classifier
                .classify_on(today() + Duration::days(3), today())
                .bucket,
            DueBucket::DueSoon
        );
        assert_eq!(
            classifier
                .classify_on(today() + Duration::days(4), today())
                .bucket,
            DueBucket::Normal
        );
        assert_eq!(
            classifier
                .classify_on(today() - Duration::days(12), today())
                .label,
            "Overdue by 12 days"
        );
    }
}
