use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::{TimetableError, TimetableResult};
use crate::lesson::{
    Lesson, LessonInput, TimetableActivity, TimetableActivityInput, TimetableEntry,
    TimetableEntryInput,
};
use crate::persistence::UserId;
use crate::persistence::queries;
use crate::persistence::sqlite::SqliteTimetableStore;
use crate::slot::TimetableSlot;

/// Records that hang off a slot: dated lessons, its entry and its activity.
pub struct LessonRegistry<'a> {
    store: &'a SqliteTimetableStore,
}

fn owned_slot(conn: &Connection, user: UserId, slot_id: i64) -> TimetableResult<TimetableSlot> {
    queries::get_slot(conn, user, slot_id)?.ok_or_else(|| TimetableError::not_found("slot", slot_id))
}

impl<'a> LessonRegistry<'a> {
    pub fn new(store: &'a SqliteTimetableStore) -> Self {
        Self { store }
    }

    /// Adds a lesson on `input.date`, which must fall on the slot's weekday.
    #[instrument(skip(self, input), fields(slot_id = input.slot_id, date = %input.date))]
    pub fn create_lesson(&self, user: UserId, input: LessonInput) -> TimetableResult<Lesson> {
        input.validate()?;
        let id = self.store.write(|tx| {
            let slot = owned_slot(tx, user, input.slot_id)?;
            if input.date.weekday() != slot.day_of_week {
                return Err(TimetableError::validation(
                    "date",
                    format!(
                        "{} is a {}, slot {} runs on {}",
                        input.date,
                        input.date.weekday(),
                        slot.id,
                        slot.day_of_week
                    ),
                ));
            }
            queries::insert_lesson(tx, user, &input).map_err(|err| match TimetableError::from(err) {
                TimetableError::Conflict { .. } => TimetableError::conflict(format!(
                    "slot {} already has a lesson on {}",
                    input.slot_id, input.date
                )),
                other => other,
            })
        })?;
        info!(lesson_id = id, "lesson created");
        Ok(Lesson {
            id,
            slot_id: input.slot_id,
            date: input.date,
            title: input.title,
            class_name: input.class_name,
            subject_name: input.subject_name,
        })
    }

    pub fn get_lesson(&self, user: UserId, id: i64) -> TimetableResult<Lesson> {
        self.store
            .read(|conn| queries::get_lesson(conn, user, id))?
            .ok_or_else(|| TimetableError::not_found("lesson", id))
    }

    pub fn delete_lesson(&self, user: UserId, id: i64) -> TimetableResult<()> {
        let removed = self.store.write(|tx| queries::delete_lesson(tx, user, id))?;
        if !removed {
            return Err(TimetableError::not_found("lesson", id));
        }
        Ok(())
    }

    pub fn lessons_between(
        &self,
        user: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TimetableResult<Vec<Lesson>> {
        Ok(self
            .store
            .read(|conn| queries::lessons_between(conn, user, start, end))?)
    }

    #[instrument(skip(self, input))]
    pub fn set_entry(
        &self,
        user: UserId,
        slot_id: i64,
        input: TimetableEntryInput,
    ) -> TimetableResult<TimetableEntry> {
        input.validate()?;
        let id = self.store.write(|tx| {
            owned_slot(tx, user, slot_id)?;
            if queries::entry_for_slot(tx, user, slot_id)?.is_some() {
                return Err(TimetableError::conflict(format!(
                    "slot {slot_id} already has a timetable entry"
                )));
            }
            Ok(queries::insert_entry(tx, user, slot_id, &input)?)
        })?;
        info!(entry_id = id, "timetable entry created");
        Ok(TimetableEntry {
            id,
            slot_id,
            class_name: input.class_name,
            subject_name: input.subject_name,
            room: input.room,
        })
    }

    pub fn entry(&self, user: UserId, slot_id: i64) -> TimetableResult<Option<TimetableEntry>> {
        self.store.read(|conn| {
            owned_slot(conn, user, slot_id)?;
            Ok(queries::entry_for_slot(conn, user, slot_id)?)
        })
    }

    /// Removes the slot's entry; returns whether there was one.
    pub fn clear_entry(&self, user: UserId, slot_id: i64) -> TimetableResult<bool> {
        self.store.write(|tx| {
            owned_slot(tx, user, slot_id)?;
            Ok(queries::delete_entry_for_slot(tx, user, slot_id)? > 0)
        })
    }

    #[instrument(skip(self, input))]
    pub fn set_activity(
        &self,
        user: UserId,
        slot_id: i64,
        input: TimetableActivityInput,
    ) -> TimetableResult<TimetableActivity> {
        input.validate()?;
        let id = self.store.write(|tx| {
            owned_slot(tx, user, slot_id)?;
            if queries::activity_for_slot(tx, user, slot_id)?.is_some() {
                return Err(TimetableError::conflict(format!(
                    "slot {slot_id} already has an activity"
                )));
            }
            Ok(queries::insert_activity(tx, user, slot_id, &input)?)
        })?;
        info!(activity_id = id, "timetable activity created");
        Ok(TimetableActivity {
            id,
            slot_id,
            title: input.title,
            notes: input.notes,
        })
    }

    pub fn activity(&self, user: UserId, slot_id: i64) -> TimetableResult<Option<TimetableActivity>> {
        self.store.read(|conn| {
            owned_slot(conn, user, slot_id)?;
            Ok(queries::activity_for_slot(conn, user, slot_id)?)
        })
    }

    pub fn clear_activity(&self, user: UserId, slot_id: i64) -> TimetableResult<bool> {
        self.store.write(|tx| {
            owned_slot(tx, user, slot_id)?;
            Ok(queries::delete_activity_for_slot(tx, user, slot_id)? > 0)
        })
    }
}
