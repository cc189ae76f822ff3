use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of a week in the two-week rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WeekNumber {
    One,
    Two,
}

impl WeekNumber {
    pub fn as_u8(self) -> u8 {
        match self {
            WeekNumber::One => 1,
            WeekNumber::Two => 2,
        }
    }

    /// Week 1 for even cycle indices, Week 2 for odd ones (negative indices included).
    pub fn from_cycle_index(index: i64) -> Self {
        if index.rem_euclid(2) == 0 {
            WeekNumber::One
        } else {
            WeekNumber::Two
        }
    }
}

impl TryFrom<u8> for WeekNumber {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WeekNumber::One),
            2 => Ok(WeekNumber::Two),
            other => Err(format!("week number must be 1 or 2 (got {other})")),
        }
    }
}

impl From<WeekNumber> for u8 {
    fn from(value: WeekNumber) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for WeekNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A recurring interval keyed by day of week, rotation week and start/end time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub id: i64,
    pub day_of_week: Weekday,
    pub week_number: WeekNumber,
    /// Canonical zero-padded `HH:MM`, so string order equals time order.
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInput {
    pub day_of_week: Weekday,
    pub week_number: WeekNumber,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub label: String,
}

impl SlotInput {
    pub fn new(
        day_of_week: Weekday,
        week_number: WeekNumber,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            day_of_week,
            week_number,
            start_time: start_time.into(),
            end_time: end_time.into(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl TimetableSlot {
    pub fn from_input(id: i64, input: SlotInput) -> Self {
        Self {
            id,
            day_of_week: input.day_of_week,
            week_number: input.week_number,
            start_time: input.start_time,
            end_time: input.end_time,
            label: input.label,
        }
    }
}
