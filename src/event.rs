use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{TimetableError, TimetableResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    /// Same weekday, only in Week 1 of the rotation.
    #[serde(rename = "week1")]
    Week1,
    /// Same weekday, only in Week 2 of the rotation.
    #[serde(rename = "week2")]
    Week2,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Week1 => "week1",
            RecurrenceType::Week2 => "week2",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(RecurrenceType::Daily),
            "weekly" => Ok(RecurrenceType::Weekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "week1" => Ok(RecurrenceType::Week1),
            "week2" => Ok(RecurrenceType::Week2),
            other => Err(format!("unknown recurrence type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_type: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
    /// Set on rows generated from a recurring event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_type: Option<RecurrenceType>,
    #[serde(default)]
    pub recurrence_end_date: Option<NaiveDate>,
}

impl Event {
    pub fn from_input(id: i64, input: EventInput) -> Self {
        Self {
            id,
            title: input.title,
            start_time: input.start_time,
            end_time: input.end_time,
            is_recurring: input.is_recurring,
            recurrence_type: input.recurrence_type,
            recurrence_end_date: input.recurrence_end_date,
            parent_event_id: None,
        }
    }
}

impl EventInput {
    pub fn single(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start_time: start,
            end_time: end,
            is_recurring: false,
            recurrence_type: None,
            recurrence_end_date: None,
        }
    }

    pub fn recurring(
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        recurrence: RecurrenceType,
        until: Option<NaiveDate>,
    ) -> Self {
        Self {
            title: title.into(),
            start_time: start,
            end_time: end,
            is_recurring: true,
            recurrence_type: Some(recurrence),
            recurrence_end_date: until,
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        if self.title.trim().is_empty() {
            return Err(TimetableError::validation("title", "is required"));
        }
        if self.end_time <= self.start_time {
            return Err(TimetableError::validation(
                "endTime",
                "end time must be after start time",
            ));
        }
        if self.is_recurring && self.recurrence_type.is_none() {
            return Err(TimetableError::validation(
                "recurrenceType",
                "recurring events need a recurrence type",
            ));
        }
        if let Some(until) = self.recurrence_end_date {
            if until < self.start_time.date() {
                return Err(TimetableError::validation(
                    "recurrenceEndDate",
                    "recurrence end date precedes the first occurrence",
                ));
            }
        }
        Ok(())
    }
}
