use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::academic_year::{AcademicYear, AcademicYearInput};
use crate::calendar::{self, AcademicYearCalendar};
use crate::error::{TimetableError, TimetableResult};
use crate::holiday::{Holiday, HolidayInput};
use crate::persistence::file::{holiday_input, year_input};
use crate::persistence::queries;
use crate::persistence::sqlite::SqliteTimetableStore;
use crate::persistence::{PersistenceResult, UserId};

/// A saved holiday and the number of lessons its range removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayWrite {
    pub holiday: Holiday,
    pub deleted_lessons_count: usize,
}

/// Academic years and their holidays.
///
/// A user has at most one active year: activating one deactivates the rest in
/// the same transaction, backed by a partial unique index.
pub struct AcademicYearRegistry<'a> {
    store: &'a SqliteTimetableStore,
}

fn owned_year(conn: &Connection, user: UserId, id: i64) -> TimetableResult<AcademicYear> {
    queries::get_year(conn, user, id)?.ok_or_else(|| TimetableError::not_found("academic year", id))
}

impl<'a> AcademicYearRegistry<'a> {
    pub fn new(store: &'a SqliteTimetableStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input))]
    pub fn create_year(&self, user: UserId, input: AcademicYearInput) -> TimetableResult<AcademicYear> {
        input.validate()?;
        let id = self.store.write(|tx| -> TimetableResult<i64> {
            if input.is_active {
                queries::deactivate_other_years(tx, user, -1)?;
            }
            Ok(queries::insert_year(tx, user, &input)?)
        })?;
        info!(year_id = id, active = input.is_active, "academic year created");
        Ok(AcademicYear::from_input(id, input))
    }

    #[instrument(skip(self, input))]
    pub fn update_year(
        &self,
        user: UserId,
        id: i64,
        input: AcademicYearInput,
    ) -> TimetableResult<AcademicYear> {
        input.validate()?;
        self.store.write(|tx| {
            owned_year(tx, user, id)?;
            if input.is_active {
                queries::deactivate_other_years(tx, user, id)?;
            }
            queries::update_year(tx, user, id, &input)?;
            Ok::<_, TimetableError>(())
        })?;
        info!(year_id = id, "academic year updated");
        Ok(AcademicYear::from_input(id, input))
    }

    /// Makes `id` the user's only active year.
    #[instrument(skip(self))]
    pub fn activate(&self, user: UserId, id: i64) -> TimetableResult<AcademicYear> {
        let year = self.store.write(|tx| {
            let mut year = owned_year(tx, user, id)?;
            queries::deactivate_other_years(tx, user, id)?;
            queries::set_year_active(tx, user, id)?;
            year.is_active = true;
            Ok::<_, TimetableError>(year)
        })?;
        info!(year_id = id, "academic year activated");
        Ok(year)
    }

    pub fn get_year(&self, user: UserId, id: i64) -> TimetableResult<AcademicYear> {
        self.store.read(|conn| owned_year(conn, user, id))
    }

    pub fn list_years(&self, user: UserId) -> TimetableResult<Vec<AcademicYear>> {
        Ok(self.store.read(|conn| queries::list_years(conn, user))?)
    }

    /// Deletes a year together with its holidays.
    pub fn delete_year(&self, user: UserId, id: i64) -> TimetableResult<()> {
        let removed = self.store.write(|tx| queries::delete_year(tx, user, id))?;
        if !removed {
            return Err(TimetableError::not_found("academic year", id));
        }
        info!(year_id = id, "academic year deleted");
        Ok(())
    }

    pub fn active_year(&self, user: UserId) -> TimetableResult<Option<AcademicYear>> {
        let years = self.list_years(user)?;
        Ok(years.into_iter().find(|year| year.is_active))
    }

    pub fn year_for_date(&self, user: UserId, date: NaiveDate) -> TimetableResult<Option<AcademicYear>> {
        let years = self.list_years(user)?;
        Ok(calendar::academic_year_for_date(date, &years).cloned())
    }

    pub fn calendar(&self, user: UserId, year_id: i64) -> TimetableResult<AcademicYearCalendar> {
        self.store.read(|conn| {
            let year = owned_year(conn, user, year_id)?;
            let holidays = queries::list_holidays(conn, user, year_id)?;
            Ok(AcademicYearCalendar::new(year, holidays))
        })
    }

    /// Calendar of the active year, if the user has one.
    pub fn active_calendar(&self, user: UserId) -> TimetableResult<Option<AcademicYearCalendar>> {
        match self.active_year(user)? {
            Some(year) => Ok(Some(self.calendar(user, year.id)?)),
            None => Ok(None),
        }
    }

    /// Stores a calendar loaded from elsewhere as a new year with new ids.
    #[instrument(skip(self, source))]
    pub fn import_calendar(
        &self,
        user: UserId,
        source: &AcademicYearCalendar,
    ) -> TimetableResult<AcademicYearCalendar> {
        let input = year_input(source.year());
        input.validate()?;
        for holiday in source.holidays() {
            holiday_input(holiday).validate()?;
        }
        let year_id = self.store.write(|tx| -> TimetableResult<i64> {
            if input.is_active {
                queries::deactivate_other_years(tx, user, -1)?;
            }
            let year_id = queries::insert_year(tx, user, &input)?;
            for holiday in source.holidays() {
                let mut holiday = holiday_input(holiday);
                holiday.academic_year_id = year_id;
                queries::insert_holiday(tx, user, &holiday)?;
            }
            Ok(year_id)
        })?;
        info!(year_id, holidays = source.holidays().len(), "calendar imported");
        self.calendar(user, year_id)
    }

    pub fn list_holidays(&self, user: UserId, year_id: i64) -> TimetableResult<Vec<Holiday>> {
        self.store.read(|conn| {
            owned_year(conn, user, year_id)?;
            Ok(queries::list_holidays(conn, user, year_id)?)
        })
    }

    pub fn get_holiday(&self, user: UserId, id: i64) -> TimetableResult<Holiday> {
        self.store
            .read(|conn| queries::get_holiday(conn, user, id))?
            .ok_or_else(|| TimetableError::not_found("holiday", id))
    }

    /// Saves a holiday, then removes the user's lessons dated inside it.
    #[instrument(skip(self, input), fields(start = %input.start_date, end = %input.end_date))]
    pub fn create_holiday(&self, user: UserId, input: HolidayInput) -> TimetableResult<HolidayWrite> {
        input.validate()?;
        let id = self.store.write(|tx| -> TimetableResult<i64> {
            owned_year(tx, user, input.academic_year_id)?;
            Ok(queries::insert_holiday(tx, user, &input)?)
        })?;
        info!(holiday_id = id, "holiday created");
        let holiday = Holiday::from_input(id, input);
        let deleted_lessons_count = self.cascade_lessons(user, &holiday);
        Ok(HolidayWrite {
            holiday,
            deleted_lessons_count,
        })
    }

    /// Updates a holiday, then removes lessons dated inside its new range.
    #[instrument(skip(self, input), fields(start = %input.start_date, end = %input.end_date))]
    pub fn update_holiday(
        &self,
        user: UserId,
        id: i64,
        mut input: HolidayInput,
    ) -> TimetableResult<HolidayWrite> {
        input.validate()?;
        let input = self.store.write(|tx| -> TimetableResult<HolidayInput> {
            let existing = queries::get_holiday(tx, user, id)?
                .ok_or_else(|| TimetableError::not_found("holiday", id))?;
            // A zero year id keeps the holiday in its current year.
            if input.academic_year_id == 0 {
                input.academic_year_id = existing.academic_year_id;
            }
            owned_year(tx, user, input.academic_year_id)?;
            queries::update_holiday(tx, user, id, &input)?;
            Ok(input)
        })?;
        info!(holiday_id = id, "holiday updated");
        let holiday = Holiday::from_input(id, input);
        let deleted_lessons_count = self.cascade_lessons(user, &holiday);
        Ok(HolidayWrite {
            holiday,
            deleted_lessons_count,
        })
    }

    /// Deletes the holiday only; lessons are not touched.
    pub fn delete_holiday(&self, user: UserId, id: i64) -> TimetableResult<()> {
        let removed = self.store.write(|tx| queries::delete_holiday(tx, user, id))?;
        if !removed {
            return Err(TimetableError::not_found("holiday", id));
        }
        info!(holiday_id = id, "holiday deleted");
        Ok(())
    }

    /// Best effort: the holiday is already committed, so a failure here is
    /// logged and reported as zero deletions instead of failing the write.
    fn cascade_lessons(&self, user: UserId, holiday: &Holiday) -> usize {
        let result: PersistenceResult<usize> = self.store.write(|tx| {
            queries::delete_lessons_between(tx, user, holiday.start_date, holiday.end_date)
        });
        match result {
            Ok(count) => {
                debug!(holiday_id = holiday.id, deleted = count, "holiday lesson cascade");
                count
            }
            Err(err) => {
                warn!(holiday_id = holiday.id, error = %err, "holiday lesson cascade failed");
                0
            }
        }
    }
}
