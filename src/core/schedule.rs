//! Opening hours model.
//!
//! Settings can describe opening hours in two shapes: a per-day weekly schedule,
//! or the older "business hours + saturday hours + working days" fields. Both are
//! accepted as [`ScheduleConfig`] and normalised exactly once, by
//! [`ScheduleConfig::resolve`], into a [`WeeklySchedule`] that the slot engine
//! and booking validation consult. Nothing downstream branches on the stored
//! shape.
//!
//! Times of day are zero-padded 24-hour `HH:mm` strings on the wire. Parsing
//! rejects anything else, which keeps ordering of [`TimeOfDay`] identical to
//! the lexicographic ordering of its string form.

use std::fmt;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A wall-clock time with minute precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Builds a time from hour and minute, clamping invalid input to midnight.
    #[must_use]
    pub fn hm(hour: u32, minute: u32) -> Self {
        Self(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Parses a zero-padded `HH:mm` string.
    ///
    /// # Errors
    /// Returns a validation error for anything that is not exactly five
    /// characters of the form `HH:mm` within `00:00..=23:59`.
    pub fn parse(raw: &str) -> Result<Self> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 2 || b.is_ascii_digit());
        if !well_formed {
            return Err(Error::validation(format!(
                "time {raw:?} must be zero-padded HH:mm"
            )));
        }
        NaiveTime::parse_from_str(raw, "%H:%M")
            .map(Self)
            .map_err(|e| Error::validation(format!("time {raw:?} is invalid: {e}")))
    }

    /// Truncates a time to the minute, the precision used for period membership.
    #[must_use]
    pub fn from_time(time: NaiveTime) -> Self {
        Self::hm(time.hour(), time.minute())
    }

    #[must_use]
    pub const fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A half-open opening period `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Period {
    /// Whether `time` falls inside the period. The end boundary is exclusive.
    #[must_use]
    pub fn contains(&self, time: TimeOfDay) -> bool {
        time >= self.start && time < self.end
    }
}

/// Builds a period only when both bounds are configured.
fn pair(start: Option<TimeOfDay>, end: Option<TimeOfDay>) -> Option<Period> {
    match (start, end) {
        (Some(start), Some(end)) => Some(Period { start, end }),
        _ => None,
    }
}

/// Effective opening hours of one day: up to two periods around a midday break.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DayHours {
    pub period1: Option<Period>,
    pub period2: Option<Period>,
}

impl DayHours {
    /// Periods in emission order, period 1 first.
    pub fn periods(&self) -> impl Iterator<Item = &Period> {
        self.period1.iter().chain(self.period2.iter())
    }

    /// Whether `time` falls in either period.
    #[must_use]
    pub fn contains(&self, time: TimeOfDay) -> bool {
        self.periods().any(|p| p.contains(time))
    }
}

/// Resolved opening hours for each day of the week, indexed from Sunday.
/// `None` means closed all day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [Option<DayHours>; 7],
}

impl WeeklySchedule {
    /// Opening hours for `weekday`, or `None` if the shop does not open.
    #[must_use]
    pub fn hours_for(&self, weekday: Weekday) -> Option<&DayHours> {
        self.days[weekday.num_days_from_sunday() as usize].as_ref()
    }
}

/// One entry of a per-day weekly schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    /// 0 = Sunday ... 6 = Saturday
    pub day: u8,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub period1_start: Option<TimeOfDay>,
    #[serde(default)]
    pub period1_end: Option<TimeOfDay>,
    #[serde(default)]
    pub period2_start: Option<TimeOfDay>,
    #[serde(default)]
    pub period2_end: Option<TimeOfDay>,
}

impl DayEntry {
    fn hours(&self) -> DayHours {
        DayHours {
            period1: pair(self.period1_start, self.period1_end),
            period2: pair(self.period2_start, self.period2_end),
        }
    }
}

/// Legacy weekday opening hours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessHours {
    pub period1_start: Option<TimeOfDay>,
    pub period1_end: Option<TimeOfDay>,
    pub period2_start: Option<TimeOfDay>,
    pub period2_end: Option<TimeOfDay>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            period1_start: Some(TimeOfDay::hm(9, 0)),
            period1_end: Some(TimeOfDay::hm(12, 0)),
            period2_start: Some(TimeOfDay::hm(13, 0)),
            period2_end: Some(TimeOfDay::hm(18, 0)),
        }
    }
}

impl BusinessHours {
    fn hours(&self) -> DayHours {
        DayHours {
            period1: pair(self.period1_start, self.period1_end),
            period2: pair(self.period2_start, self.period2_end),
        }
    }
}

/// Legacy saturday hours with their own on/off switch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaturdayHours {
    pub period1_start: Option<TimeOfDay>,
    pub period1_end: Option<TimeOfDay>,
    pub period2_start: Option<TimeOfDay>,
    pub period2_end: Option<TimeOfDay>,
    pub active: bool,
}

impl Default for SaturdayHours {
    fn default() -> Self {
        Self {
            period1_start: Some(TimeOfDay::hm(9, 0)),
            period1_end: Some(TimeOfDay::hm(12, 0)),
            period2_start: Some(TimeOfDay::hm(13, 0)),
            period2_end: Some(TimeOfDay::hm(14, 0)),
            active: true,
        }
    }
}

impl SaturdayHours {
    fn hours(&self) -> DayHours {
        DayHours {
            period1: pair(self.period1_start, self.period1_end),
            period2: pair(self.period2_start, self.period2_end),
        }
    }
}

fn default_working_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

/// Opening hours as stored and as accepted from admins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleConfig {
    /// Explicit per-day schedule. Days without an active entry are closed.
    Weekly {
        #[serde(default)]
        days: Vec<DayEntry>,
    },
    /// Weekday hours on `working_days`, saturday hours on saturdays.
    #[serde(rename_all = "camelCase")]
    Legacy {
        #[serde(default)]
        business_hours: BusinessHours,
        #[serde(default)]
        saturday_hours: SaturdayHours,
        #[serde(default = "default_working_days")]
        working_days: Vec<u8>,
    },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::Legacy {
            business_hours: BusinessHours::default(),
            saturday_hours: SaturdayHours::default(),
            working_days: default_working_days(),
        }
    }
}

impl ScheduleConfig {
    /// Normalises either shape into per-day effective hours.
    ///
    /// A weekly schedule with no entries carries no information, so it falls
    /// back to the legacy defaults. When a weekly schedule lists the same day
    /// twice, the first entry wins.
    #[must_use]
    pub fn resolve(&self) -> WeeklySchedule {
        let mut days: [Option<DayHours>; 7] = [None; 7];
        match self {
            Self::Weekly { days: entries } if entries.is_empty() => {
                return Self::default().resolve();
            }
            Self::Weekly { days: entries } => {
                let mut seen = [false; 7];
                for entry in entries {
                    let idx = usize::from(entry.day);
                    if idx >= 7 || seen[idx] {
                        continue;
                    }
                    seen[idx] = true;
                    if entry.active {
                        days[idx] = Some(entry.hours());
                    }
                }
            }
            Self::Legacy {
                business_hours,
                saturday_hours,
                working_days,
            } => {
                for (idx, slot) in days.iter_mut().enumerate() {
                    let is_saturday = idx == 6;
                    let works = working_days.iter().any(|d| usize::from(*d) == idx)
                        || (is_saturday && saturday_hours.active);
                    if works {
                        *slot = Some(if is_saturday {
                            saturday_hours.hours()
                        } else {
                            business_hours.hours()
                        });
                    }
                }
            }
        }
        WeeklySchedule { days }
    }

    /// Rejects day indexes outside `0..=6` and periods that end before they start.
    ///
    /// # Errors
    /// Returns a validation error describing the first offending entry.
    pub fn validate(&self) -> Result<()> {
        let check_period = |label: &str, start: Option<TimeOfDay>, end: Option<TimeOfDay>| {
            match pair(start, end) {
                Some(p) if p.end <= p.start => Err(Error::validation(format!(
                    "{label}: period end {} must be after start {}",
                    p.end, p.start
                ))),
                _ => Ok(()),
            }
        };

        match self {
            Self::Weekly { days } => {
                for entry in days {
                    if entry.day > 6 {
                        return Err(Error::validation(format!(
                            "day {} is not a weekday index (0-6)",
                            entry.day
                        )));
                    }
                    let label = format!("day {}", entry.day);
                    check_period(&label, entry.period1_start, entry.period1_end)?;
                    check_period(&label, entry.period2_start, entry.period2_end)?;
                }
            }
            Self::Legacy {
                business_hours,
                saturday_hours,
                working_days,
            } => {
                if let Some(day) = working_days.iter().find(|d| **d > 6) {
                    return Err(Error::validation(format!(
                        "working day {day} is not a weekday index (0-6)"
                    )));
                }
                check_period(
                    "businessHours",
                    business_hours.period1_start,
                    business_hours.period1_end,
                )?;
                check_period(
                    "businessHours",
                    business_hours.period2_start,
                    business_hours.period2_end,
                )?;
                check_period(
                    "saturdayHours",
                    saturday_hours.period1_start,
                    saturday_hours.period1_end,
                )?;
                check_period(
                    "saturdayHours",
                    saturday_hours.period2_start,
                    saturday_hours.period2_end,
                )?;
            }
        }
        Ok(())
    }
}
