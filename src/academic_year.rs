use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{TimetableError, TimetableResult};

pub const MAX_YEAR_NAME_LEN: usize = 100;

/// How the Week 1 / Week 2 labels advance through the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekCycleMode {
    /// Every calendar week flips the label.
    Continuous,
    /// Weeks whose Monday-Friday are all holiday-covered do not advance the cycle.
    SkipHolidayWeeks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// The first Monday on or after this date is the Week 1 anchor.
    pub week_cycle_start_date: NaiveDate,
    pub is_active: bool,
    pub skip_holiday_weeks: bool,
}

/// Writable fields of an academic year, as supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYearInput {
    #[serde(default)]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week_cycle_start_date: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub skip_holiday_weeks: bool,
}

impl AcademicYear {
    pub fn from_input(id: i64, input: AcademicYearInput) -> Self {
        Self {
            id,
            name: input.name,
            start_date: input.start_date,
            end_date: input.end_date,
            week_cycle_start_date: input.week_cycle_start_date,
            is_active: input.is_active,
            skip_holiday_weeks: input.skip_holiday_weeks,
        }
    }

    pub fn cycle_mode(&self) -> WeekCycleMode {
        if self.skip_holiday_weeks {
            WeekCycleMode::SkipHolidayWeeks
        } else {
            WeekCycleMode::Continuous
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl AcademicYearInput {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, week_cycle_start_date: NaiveDate) -> Self {
        Self {
            name: String::new(),
            start_date,
            end_date,
            week_cycle_start_date,
            is_active: false,
            skip_holiday_weeks: false,
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        if self.name.chars().count() > MAX_YEAR_NAME_LEN {
            return Err(TimetableError::validation(
                "name",
                format!("must be at most {MAX_YEAR_NAME_LEN} characters"),
            ));
        }
        if self.start_date > self.end_date {
            return Err(TimetableError::validation(
                "endDate",
                format!(
                    "end date {} must be on or after start date {}",
                    self.end_date, self.start_date
                ),
            ));
        }
        if self.week_cycle_start_date < self.start_date
            || self.week_cycle_start_date > self.end_date
        {
            return Err(TimetableError::validation(
                "weekCycleStartDate",
                format!(
                    "week cycle start {} must lie between {} and {}",
                    self.week_cycle_start_date, self.start_date, self.end_date
                ),
            ));
        }
        Ok(())
    }
}
