use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{TimetableError, TimetableResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayType {
    Holiday,
    HalfTerm,
    TrainingDay,
    PlanningDay,
}

impl HolidayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayType::Holiday => "holiday",
            HolidayType::HalfTerm => "half_term",
            HolidayType::TrainingDay => "training_day",
            HolidayType::PlanningDay => "planning_day",
        }
    }

    pub fn variants() -> [HolidayType; 4] {
        [
            HolidayType::Holiday,
            HolidayType::HalfTerm,
            HolidayType::TrainingDay,
            HolidayType::PlanningDay,
        ]
    }
}

impl fmt::Display for HolidayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolidayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::variants()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown holiday type '{s}'"))
    }
}

/// An inclusive non-teaching date range owned by one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: i64,
    pub academic_year_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type")]
    pub holiday_type: HolidayType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayInput {
    /// Taken from the route when posted under an academic year.
    #[serde(default)]
    pub academic_year_id: i64,
    #[serde(default)]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type", default = "default_holiday_type")]
    pub holiday_type: HolidayType,
}

fn default_holiday_type() -> HolidayType {
    HolidayType::Holiday
}

impl Holiday {
    pub fn from_input(id: i64, input: HolidayInput) -> Self {
        Self {
            id,
            academic_year_id: input.academic_year_id,
            name: input.name,
            start_date: input.start_date,
            end_date: input.end_date,
            holiday_type: input.holiday_type,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl HolidayInput {
    pub fn new(
        academic_year_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        holiday_type: HolidayType,
    ) -> Self {
        Self {
            academic_year_id,
            name: String::new(),
            start_date,
            end_date,
            holiday_type,
        }
    }

    pub fn validate(&self) -> TimetableResult<()> {
        if self.start_date > self.end_date {
            return Err(TimetableError::validation(
                "endDate",
                format!(
                    "end date {} must be on or after start date {}",
                    self.end_date, self.start_date
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holiday_type_parses_wire_names() {
        for kind in HolidayType::variants() {
            assert_eq!(kind.as_str().parse::<HolidayType>(), Ok(kind));
        }
        assert!("summer".parse::<HolidayType>().is_err());
    }

    #[test]
    fn covers_is_inclusive() {
        let holiday = Holiday::from_input(
            1,
            HolidayInput::new(
                1,
                NaiveDate::from_ymd_opt(2024, 12, 23).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
                HolidayType::Holiday,
            ),
        );
        assert!(holiday.covers(NaiveDate::from_ymd_opt(2024, 12, 23).unwrap()));
        assert!(holiday.covers(NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()));
        assert!(!holiday.covers(NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()));
    }
}
