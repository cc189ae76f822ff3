use super::{PersistenceError, PersistenceResult};
use crate::academic_year::{AcademicYear, AcademicYearInput};
use crate::calendar::AcademicYearCalendar;
use crate::holiday::{Holiday, HolidayInput};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarSnapshot {
    academic_year: AcademicYear,
    #[serde(default)]
    holidays: Vec<Holiday>,
}

impl CalendarSnapshot {
    fn from_calendar(calendar: &AcademicYearCalendar) -> Self {
        Self {
            academic_year: calendar.year().clone(),
            holidays: calendar.holidays().to_vec(),
        }
    }

    fn into_calendar(self) -> PersistenceResult<AcademicYearCalendar> {
        let year = self.academic_year;
        year_input(&year)
            .validate()
            .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        for holiday in &self.holidays {
            holiday_input(holiday)
                .validate()
                .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        }
        Ok(AcademicYearCalendar::new(year, self.holidays))
    }
}

/// Writable fields of a stored year, for re-creating it elsewhere.
pub fn year_input(year: &AcademicYear) -> AcademicYearInput {
    AcademicYearInput {
        name: year.name.clone(),
        start_date: year.start_date,
        end_date: year.end_date,
        week_cycle_start_date: year.week_cycle_start_date,
        is_active: year.is_active,
        skip_holiday_weeks: year.skip_holiday_weeks,
    }
}

pub fn holiday_input(holiday: &Holiday) -> HolidayInput {
    HolidayInput {
        academic_year_id: holiday.academic_year_id,
        name: holiday.name.clone(),
        start_date: holiday.start_date,
        end_date: holiday.end_date,
        holiday_type: holiday.holiday_type,
    }
}

pub fn save_calendar_to_json<P: AsRef<Path>>(
    calendar: &AcademicYearCalendar,
    path: P,
) -> PersistenceResult<()> {
    let snapshot = CalendarSnapshot::from_calendar(calendar);
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_calendar_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<AcademicYearCalendar> {
    let file = File::open(path)?;
    let snapshot: CalendarSnapshot = serde_json::from_reader(file)?;
    snapshot.into_calendar()
}
