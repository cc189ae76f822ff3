use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{TimetableError, TimetableResult};

pub const MAX_TEXT_LEN: usize = 200;

/// A dated teaching occurrence delivered in a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub slot_id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub class_name: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    pub slot_id: i64,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub subject_name: String,
}

/// The class and subject bound to a slot. At most one per slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: i64,
    pub slot_id: i64,
    pub class_name: String,
    pub subject_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntryInput {
    pub class_name: String,
    pub subject_name: String,
    #[serde(default)]
    pub room: Option<String>,
}

/// A non-teaching assignment (meeting, duty, ...) bound to a slot. At most one per slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableActivity {
    pub id: i64,
    pub slot_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableActivityInput {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn require_text(field: &'static str, value: &str) -> TimetableResult<()> {
    if value.trim().is_empty() {
        return Err(TimetableError::validation(field, "is required"));
    }
    limit_text(field, value)
}

fn limit_text(field: &'static str, value: &str) -> TimetableResult<()> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(TimetableError::validation(
            field,
            format!("must be at most {MAX_TEXT_LEN} characters"),
        ));
    }
    Ok(())
}

impl LessonInput {
    pub fn new(slot_id: i64, date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            slot_id,
            date,
            title: title.into(),
            class_name: String::new(),
            subject_name: String::new(),
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        require_text("title", &self.title)?;
        limit_text("className", &self.class_name)?;
        limit_text("subjectName", &self.subject_name)
    }
}

impl TimetableEntryInput {
    pub fn new(class_name: impl Into<String>, subject_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            subject_name: subject_name.into(),
            room: None,
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        require_text("className", &self.class_name)?;
        require_text("subjectName", &self.subject_name)?;
        if let Some(room) = &self.room {
            limit_text("room", room)?;
        }
        Ok(())
    }
}

impl TimetableActivityInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notes: None,
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        require_text("title", &self.title)
    }
}
