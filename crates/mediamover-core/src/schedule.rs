//! Schedule for unattended transfers.

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::MediaFilter;

/// Every day of the week, Monday first.
pub const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// When and what the automatic transfer moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Whether automatic transfers run at all.
    pub enabled: bool,
    /// Hour of day (0-23).
    pub hour: u32,
    /// Minute of hour (0-59).
    pub minute: u32,
    /// Move images.
    pub include_images: bool,
    /// Move videos.
    pub include_videos: bool,
    /// Days on which the transfer runs.
    pub days: Vec<Weekday>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: 0,
            minute: 0,
            include_images: true,
            include_videos: true,
            days: ALL_DAYS.to_vec(),
        }
    }
}

impl ScheduleConfig {
    /// Validate the time of day.
    pub fn validate(&self) -> Result<()> {
        self.time_of_day().map(|_| ())
    }

    /// The configured time of day.
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            Error::Configuration(format!(
                "invalid schedule time {:02}:{:02}",
                self.hour, self.minute
            ))
        })
    }

    /// Media kinds the job moves.
    #[must_use]
    pub const fn filter(&self) -> MediaFilter {
        MediaFilter {
            images: self.include_images,
            videos: self.include_videos,
        }
    }

    /// Whether the job should run on `weekday`.
    #[must_use]
    pub fn is_due_on(&self, weekday: Weekday) -> bool {
        self.enabled && self.days.contains(&weekday)
    }

    /// The first scheduled run strictly after `now`.
    ///
    /// Returns `None` when the schedule is disabled, has no days selected, or
    /// has an invalid time.
    #[must_use]
    pub fn next_run_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled || self.days.is_empty() {
            return None;
        }
        let time = self.time_of_day().ok()?;

        (0..=7u64)
            .filter_map(|offset| now.date().checked_add_days(Days::new(offset)))
            .map(|date| date.and_time(time))
            .find(|candidate| *candidate > now && self.days.contains(&candidate.weekday()))
    }

    /// Human readable list of selected days.
    #[must_use]
    pub fn days_label(&self) -> String {
        if ALL_DAYS.iter().all(|d| self.days.contains(d)) {
            return "every day".to_string();
        }
        ALL_DAYS
            .iter()
            .filter(|d| self.days.contains(d))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// 2024-01-01 is a Monday.
    fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid date")
    }

    fn enabled(hour: u32, minute: u32, days: &[Weekday]) -> ScheduleConfig {
        ScheduleConfig {
            enabled: true,
            hour,
            minute,
            days: days.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let schedule = ScheduleConfig::default();
        assert!(!schedule.enabled);
        assert_eq!(schedule.days.len(), 7);
        assert_eq!(schedule.filter(), MediaFilter::ALL);
        assert_eq!(schedule.days_label(), "every day");
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn test_invalid_time() {
        let schedule = ScheduleConfig {
            hour: 24,
            ..Default::default()
        };
        assert!(schedule.validate().is_err());
        let schedule = ScheduleConfig {
            minute: 60,
            ..Default::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_is_due_on() {
        let schedule = enabled(2, 0, &[Weekday::Mon, Weekday::Fri]);
        assert!(schedule.is_due_on(Weekday::Mon));
        assert!(schedule.is_due_on(Weekday::Fri));
        assert!(!schedule.is_due_on(Weekday::Sun));

        let disabled = ScheduleConfig {
            enabled: false,
            ..schedule
        };
        assert!(!disabled.is_due_on(Weekday::Mon));
    }

    #[test]
    fn test_next_run_later_today() {
        let schedule = enabled(22, 30, &ALL_DAYS);
        assert_eq!(
            schedule.next_run_after(monday_at(8, 0)),
            Some(monday_at(22, 30))
        );
    }

    #[test]
    fn test_next_run_skips_unselected_days() {
        let schedule = enabled(2, 0, &[Weekday::Wed]);
        let next = schedule.next_run_after(monday_at(8, 0)).expect("next run");
        assert_eq!(next.weekday(), Weekday::Wed);
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 1, 3).expect("date"));
    }

    #[test]
    fn test_next_run_same_day_next_week() {
        let schedule = enabled(8, 0, &[Weekday::Mon]);
        let next = schedule.next_run_after(monday_at(8, 0)).expect("next run");
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 1, 8).expect("date"));
    }

    #[test]
    fn test_next_run_none() {
        assert!(ScheduleConfig::default().next_run_after(monday_at(0, 0)).is_none());
        assert!(enabled(1, 0, &[]).next_run_after(monday_at(0, 0)).is_none());
    }

    #[test]
    fn test_days_label() {
        let schedule = enabled(0, 0, &[Weekday::Sat, Weekday::Mon]);
        assert_eq!(schedule.days_label(), "Mon, Sat");
    }

    #[test]
    fn test_serde_round_trip() {
        let schedule = enabled(6, 15, &[Weekday::Tue]);
        let json = serde_json::to_string(&schedule).expect("serialize");
        let parsed: ScheduleConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, schedule);

        let partial: ScheduleConfig = serde_json::from_str(r#"{"enabled":true}"#).expect("partial");
        assert!(partial.enabled);
        assert_eq!(partial.days.len(), 7);
    }
}
