//! Row-level statements. Every function is scoped to one user and takes a
//! plain connection, so callers decide which transaction it runs in.

use super::{PersistenceResult, UserId};
use crate::academic_year::{AcademicYear, AcademicYearInput};
use crate::event::{Event, EventInput, RecurrenceType};
use crate::holiday::{Holiday, HolidayInput, HolidayType};
use crate::lesson::{
    Lesson, LessonInput, TimetableActivity, TimetableActivityInput, TimetableEntry,
    TimetableEntryInput,
};
use crate::slot::{SlotInput, TimetableSlot, WeekNumber};
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

impl ToSql for WeekNumber {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.as_u8())))
    }
}

impl FromSql for WeekNumber {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        u8::try_from(raw)
            .map_err(|_| FromSqlError::OutOfRange(raw))
            .and_then(|v| WeekNumber::try_from(v).map_err(|e| FromSqlError::Other(e.into())))
    }
}

impl ToSql for HolidayType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for HolidayType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for RecurrenceType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecurrenceType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn weekday_index(day: Weekday) -> i64 {
    i64::from(day.num_days_from_monday())
}

fn weekday_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Weekday> {
    let raw: i64 = row.get(idx)?;
    let day = match raw {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Integer,
                format!("invalid weekday index {other}").into(),
            ));
        }
    };
    Ok(day)
}

// ---- academic years -------------------------------------------------------

const YEAR_COLUMNS: &str =
    "id, name, start_date, end_date, week_cycle_start_date, is_active, skip_holiday_weeks";

fn year_from_row(row: &Row<'_>) -> rusqlite::Result<AcademicYear> {
    Ok(AcademicYear {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        week_cycle_start_date: row.get(4)?,
        is_active: row.get(5)?,
        skip_holiday_weeks: row.get(6)?,
    })
}

pub fn insert_year(
    conn: &Connection,
    user: UserId,
    input: &AcademicYearInput,
) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO academic_years
            (user_id, name, start_date, end_date, week_cycle_start_date, is_active, skip_holiday_weeks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.0,
            input.name,
            input.start_date,
            input.end_date,
            input.week_cycle_start_date,
            input.is_active,
            input.skip_holiday_weeks
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_year(
    conn: &Connection,
    user: UserId,
    id: i64,
    input: &AcademicYearInput,
) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "UPDATE academic_years
            SET name = ?3, start_date = ?4, end_date = ?5, week_cycle_start_date = ?6,
                is_active = ?7, skip_holiday_weeks = ?8
          WHERE user_id = ?1 AND id = ?2",
        params![
            user.0,
            id,
            input.name,
            input.start_date,
            input.end_date,
            input.week_cycle_start_date,
            input.is_active,
            input.skip_holiday_weeks
        ],
    )?;
    Ok(changed > 0)
}

/// Clears `is_active` on every year of the user except `keep`.
pub fn deactivate_other_years(conn: &Connection, user: UserId, keep: i64) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "UPDATE academic_years SET is_active = 0
          WHERE user_id = ?1 AND id <> ?2 AND is_active = 1",
        params![user.0, keep],
    )?;
    Ok(changed)
}

pub fn set_year_active(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "UPDATE academic_years SET is_active = 1 WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}

pub fn get_year(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<Option<AcademicYear>> {
    let sql = format!("SELECT {YEAR_COLUMNS} FROM academic_years WHERE user_id = ?1 AND id = ?2");
    let year = conn
        .query_row(&sql, params![user.0, id], year_from_row)
        .optional()?;
    Ok(year)
}

pub fn list_years(conn: &Connection, user: UserId) -> PersistenceResult<Vec<AcademicYear>> {
    let sql =
        format!("SELECT {YEAR_COLUMNS} FROM academic_years WHERE user_id = ?1 ORDER BY start_date");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0], year_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_year(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "DELETE FROM academic_years WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}

// ---- holidays -------------------------------------------------------------

const HOLIDAY_COLUMNS: &str = "id, academic_year_id, name, start_date, end_date, holiday_type";

fn holiday_from_row(row: &Row<'_>) -> rusqlite::Result<Holiday> {
    Ok(Holiday {
        id: row.get(0)?,
        academic_year_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        holiday_type: row.get(5)?,
    })
}

pub fn insert_holiday(conn: &Connection, user: UserId, input: &HolidayInput) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO holidays (user_id, academic_year_id, name, start_date, end_date, holiday_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.0,
            input.academic_year_id,
            input.name,
            input.start_date,
            input.end_date,
            input.holiday_type
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_holiday(
    conn: &Connection,
    user: UserId,
    id: i64,
    input: &HolidayInput,
) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "UPDATE holidays
            SET academic_year_id = ?3, name = ?4, start_date = ?5, end_date = ?6, holiday_type = ?7
          WHERE user_id = ?1 AND id = ?2",
        params![
            user.0,
            id,
            input.academic_year_id,
            input.name,
            input.start_date,
            input.end_date,
            input.holiday_type
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_holiday(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<Option<Holiday>> {
    let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE user_id = ?1 AND id = ?2");
    let holiday = conn
        .query_row(&sql, params![user.0, id], holiday_from_row)
        .optional()?;
    Ok(holiday)
}

pub fn list_holidays(conn: &Connection, user: UserId, year_id: i64) -> PersistenceResult<Vec<Holiday>> {
    let sql = format!(
        "SELECT {HOLIDAY_COLUMNS} FROM holidays
          WHERE user_id = ?1 AND academic_year_id = ?2
          ORDER BY start_date, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0, year_id], holiday_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_holiday(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "DELETE FROM holidays WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}

// ---- slots ----------------------------------------------------------------

const SLOT_COLUMNS: &str = "id, day_of_week, week_number, start_time, end_time, label";

fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<TimetableSlot> {
    Ok(TimetableSlot {
        id: row.get(0)?,
        day_of_week: weekday_column(row, 1)?,
        week_number: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        label: row.get(5)?,
    })
}

pub fn insert_slot(conn: &Connection, user: UserId, input: &SlotInput) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO timetable_slots (user_id, day_of_week, week_number, start_time, end_time, label)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.0,
            weekday_index(input.day_of_week),
            input.week_number,
            input.start_time,
            input.end_time,
            input.label
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_slot(
    conn: &Connection,
    user: UserId,
    id: i64,
    input: &SlotInput,
) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "UPDATE timetable_slots
            SET day_of_week = ?3, week_number = ?4, start_time = ?5, end_time = ?6, label = ?7
          WHERE user_id = ?1 AND id = ?2",
        params![
            user.0,
            id,
            weekday_index(input.day_of_week),
            input.week_number,
            input.start_time,
            input.end_time,
            input.label
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_slot(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<Option<TimetableSlot>> {
    let sql = format!("SELECT {SLOT_COLUMNS} FROM timetable_slots WHERE user_id = ?1 AND id = ?2");
    let slot = conn
        .query_row(&sql, params![user.0, id], slot_from_row)
        .optional()?;
    Ok(slot)
}

pub fn list_slots(conn: &Connection, user: UserId) -> PersistenceResult<Vec<TimetableSlot>> {
    let sql = format!(
        "SELECT {SLOT_COLUMNS} FROM timetable_slots
          WHERE user_id = ?1
          ORDER BY week_number, day_of_week, start_time, end_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0], slot_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Id of a slot with the same (day, week, start, end) tuple, ignoring `exclude`.
pub fn find_slot_conflict(
    conn: &Connection,
    user: UserId,
    input: &SlotInput,
    exclude: Option<i64>,
) -> PersistenceResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM timetable_slots
              WHERE user_id = ?1 AND day_of_week = ?2 AND week_number = ?3
                AND start_time = ?4 AND end_time = ?5 AND id <> ?6
              LIMIT 1",
            params![
                user.0,
                weekday_index(input.day_of_week),
                input.week_number,
                input.start_time,
                input.end_time,
                exclude.unwrap_or(-1)
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn delete_slot(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "DELETE FROM timetable_slots WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}

// ---- lessons --------------------------------------------------------------

const LESSON_COLUMNS: &str = "id, slot_id, date, title, class_name, subject_name";

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        date: row.get(2)?,
        title: row.get(3)?,
        class_name: row.get(4)?,
        subject_name: row.get(5)?,
    })
}

pub fn insert_lesson(conn: &Connection, user: UserId, input: &LessonInput) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO lessons (user_id, slot_id, date, title, class_name, subject_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.0,
            input.slot_id,
            input.date,
            input.title,
            input.class_name,
            input.subject_name
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_lesson(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<Option<Lesson>> {
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE user_id = ?1 AND id = ?2");
    let lesson = conn
        .query_row(&sql, params![user.0, id], lesson_from_row)
        .optional()?;
    Ok(lesson)
}

pub fn delete_lesson(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "DELETE FROM lessons WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}

pub fn count_lessons_for_slot(conn: &Connection, user: UserId, slot_id: i64) -> PersistenceResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM lessons WHERE user_id = ?1 AND slot_id = ?2",
        params![user.0, slot_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Lessons of a slot ordered by date, at most `limit` of them.
pub fn lessons_for_slot(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
    limit: usize,
) -> PersistenceResult<Vec<Lesson>> {
    let sql = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
          WHERE user_id = ?1 AND slot_id = ?2
          ORDER BY date, id
          LIMIT ?3"
    );
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0, slot_id, limit], lesson_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn lessons_between(
    conn: &Connection,
    user: UserId,
    start: NaiveDate,
    end: NaiveDate,
) -> PersistenceResult<Vec<Lesson>> {
    let sql = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
          WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
          ORDER BY date, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0, start, end], lesson_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_lessons_for_slot(conn: &Connection, user: UserId, slot_id: i64) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "DELETE FROM lessons WHERE user_id = ?1 AND slot_id = ?2",
        params![user.0, slot_id],
    )?;
    Ok(changed)
}

/// Removes the user's lessons dated inside the inclusive range, whatever their slot.
pub fn delete_lessons_between(
    conn: &Connection,
    user: UserId,
    start: NaiveDate,
    end: NaiveDate,
) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "DELETE FROM lessons WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3",
        params![user.0, start, end],
    )?;
    Ok(changed)
}

// ---- entries and activities -----------------------------------------------

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TimetableEntry> {
    Ok(TimetableEntry {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        class_name: row.get(2)?,
        subject_name: row.get(3)?,
        room: row.get(4)?,
    })
}

pub fn insert_entry(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
    input: &TimetableEntryInput,
) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO timetable_entries (user_id, slot_id, class_name, subject_name, room)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.0, slot_id, input.class_name, input.subject_name, input.room],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn entry_for_slot(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
) -> PersistenceResult<Option<TimetableEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, slot_id, class_name, subject_name, room FROM timetable_entries
              WHERE user_id = ?1 AND slot_id = ?2",
            params![user.0, slot_id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub fn delete_entry_for_slot(conn: &Connection, user: UserId, slot_id: i64) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "DELETE FROM timetable_entries WHERE user_id = ?1 AND slot_id = ?2",
        params![user.0, slot_id],
    )?;
    Ok(changed)
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<TimetableActivity> {
    Ok(TimetableActivity {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        title: row.get(2)?,
        notes: row.get(3)?,
    })
}

pub fn insert_activity(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
    input: &TimetableActivityInput,
) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO timetable_activities (user_id, slot_id, title, notes)
         VALUES (?1, ?2, ?3, ?4)",
        params![user.0, slot_id, input.title, input.notes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn activity_for_slot(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
) -> PersistenceResult<Option<TimetableActivity>> {
    let activity = conn
        .query_row(
            "SELECT id, slot_id, title, notes FROM timetable_activities
              WHERE user_id = ?1 AND slot_id = ?2",
            params![user.0, slot_id],
            activity_from_row,
        )
        .optional()?;
    Ok(activity)
}

pub fn delete_activity_for_slot(conn: &Connection, user: UserId, slot_id: i64) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "DELETE FROM timetable_activities WHERE user_id = ?1 AND slot_id = ?2",
        params![user.0, slot_id],
    )?;
    Ok(changed)
}

// ---- events ---------------------------------------------------------------

const EVENT_COLUMNS: &str = "id, title, start_time, end_time, is_recurring, recurrence_type, \
                             recurrence_end_date, parent_event_id";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        is_recurring: row.get(4)?,
        recurrence_type: row.get(5)?,
        recurrence_end_date: row.get(6)?,
        parent_event_id: row.get(7)?,
    })
}

pub fn insert_event(conn: &Connection, user: UserId, input: &EventInput) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO events
            (user_id, title, start_time, end_time, is_recurring, recurrence_type, recurrence_end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.0,
            input.title,
            input.start_time,
            input.end_time,
            input.is_recurring,
            input.recurrence_type,
            input.recurrence_end_date
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts one generated, non-recurring occurrence of `parent`.
pub fn insert_child_event(
    conn: &Connection,
    user: UserId,
    parent: &Event,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> PersistenceResult<i64> {
    conn.execute(
        "INSERT INTO events (user_id, title, start_time, end_time, is_recurring, parent_event_id)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![user.0, parent.title, start, end, parent.id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_event(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<Option<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE user_id = ?1 AND id = ?2");
    let event = conn
        .query_row(&sql, params![user.0, id], event_from_row)
        .optional()?;
    Ok(event)
}

/// Events created directly by the user, excluding generated occurrences.
pub fn list_events(conn: &Connection, user: UserId) -> PersistenceResult<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
          WHERE user_id = ?1 AND parent_event_id IS NULL
          ORDER BY start_time, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0], event_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn child_events(conn: &Connection, user: UserId, parent_id: i64) -> PersistenceResult<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
          WHERE user_id = ?1 AND parent_event_id = ?2
          ORDER BY start_time, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user.0, parent_id], event_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn delete_child_events(conn: &Connection, user: UserId, parent_id: i64) -> PersistenceResult<usize> {
    let changed = conn.execute(
        "DELETE FROM events WHERE user_id = ?1 AND parent_event_id = ?2",
        params![user.0, parent_id],
    )?;
    Ok(changed)
}

pub fn delete_event(conn: &Connection, user: UserId, id: i64) -> PersistenceResult<bool> {
    let changed = conn.execute(
        "DELETE FROM events WHERE user_id = ?1 AND id = ?2",
        params![user.0, id],
    )?;
    Ok(changed > 0)
}
