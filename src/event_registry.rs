use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::academic_registry::AcademicYearRegistry;
use crate::calendar::AcademicYearCalendar;
use crate::error::{TimetableError, TimetableResult};
use crate::event::{Event, EventInput};
use crate::persistence::UserId;
use crate::persistence::queries;
use crate::persistence::sqlite::SqliteTimetableStore;
use crate::recurrence::{self, Occurrence};

/// Events and the occurrences generated from recurring ones.
pub struct EventRegistry<'a> {
    store: &'a SqliteTimetableStore,
}

impl<'a> EventRegistry<'a> {
    pub fn new(store: &'a SqliteTimetableStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(recurring = input.is_recurring))]
    pub fn create(&self, user: UserId, input: EventInput) -> TimetableResult<Event> {
        input.validate()?;
        let id = self.store.write(|tx| queries::insert_event(tx, user, &input))?;
        info!(event_id = id, "event created");
        Ok(Event::from_input(id, input))
    }

    pub fn get(&self, user: UserId, id: i64) -> TimetableResult<Event> {
        self.store
            .read(|conn| queries::get_event(conn, user, id))?
            .ok_or_else(|| TimetableError::not_found("event", id))
    }

    pub fn list(&self, user: UserId) -> TimetableResult<Vec<Event>> {
        Ok(self.store.read(|conn| queries::list_events(conn, user))?)
    }

    /// Rows previously generated from `parent_id`.
    pub fn occurrences(&self, user: UserId, parent_id: i64) -> TimetableResult<Vec<Event>> {
        self.get(user, parent_id)?;
        Ok(self
            .store
            .read(|conn| queries::child_events(conn, user, parent_id))?)
    }

    /// Deletes an event; generated occurrences go with it.
    pub fn delete(&self, user: UserId, id: i64) -> TimetableResult<()> {
        let removed = self.store.write(|tx| queries::delete_event(tx, user, id))?;
        if !removed {
            return Err(TimetableError::not_found("event", id));
        }
        info!(event_id = id, "event deleted");
        Ok(())
    }

    /// Occurrences of a recurring event, governed by the user's active year.
    pub fn expand(
        &self,
        user: UserId,
        id: i64,
        horizon: Option<NaiveDate>,
    ) -> TimetableResult<Vec<Occurrence>> {
        let event = self.get(user, id)?;
        let calendar = AcademicYearRegistry::new(self.store).active_calendar(user)?;
        let occurrences = expand_with(&event, calendar.as_ref(), horizon)?;
        debug!(event_id = id, count = occurrences.len(), "event expanded");
        Ok(occurrences)
    }

    /// Replaces the generated rows of a recurring event with a fresh expansion.
    #[instrument(skip(self))]
    pub fn materialize(
        &self,
        user: UserId,
        id: i64,
        horizon: Option<NaiveDate>,
    ) -> TimetableResult<Vec<Event>> {
        let event = self.get(user, id)?;
        let calendar = AcademicYearRegistry::new(self.store).active_calendar(user)?;
        let occurrences = expand_with(&event, calendar.as_ref(), horizon)?;
        let (removed, children) = self.store.write(|tx| -> TimetableResult<_> {
            if queries::get_event(tx, user, id)?.is_none() {
                return Err(TimetableError::not_found("event", id));
            }
            let removed = queries::delete_child_events(tx, user, id)?;
            for occurrence in &occurrences {
                queries::insert_child_event(
                    tx,
                    user,
                    &event,
                    occurrence.start_time,
                    occurrence.end_time,
                )?;
            }
            Ok((removed, queries::child_events(tx, user, id)?))
        })?;
        info!(event_id = id, removed, created = children.len(), "event materialized");
        Ok(children)
    }
}

fn expand_with(
    event: &Event,
    calendar: Option<&AcademicYearCalendar>,
    horizon: Option<NaiveDate>,
) -> TimetableResult<Vec<Occurrence>> {
    let plan = recurrence::expand(event, calendar, horizon)?;
    Ok(plan.iter().collect())
}
