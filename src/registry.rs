use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::calendar::AcademicYearCalendar;
use crate::dependencies::{DEFAULT_PREVIEW_LIMIT, DependencyPreview, SlotDeletion, SlotDependencyResolver};
use crate::error::{TimetableError, TimetableResult};
use crate::persistence::UserId;
use crate::persistence::queries;
use crate::persistence::sqlite::SqliteTimetableStore;
use crate::slot::{SlotInput, TimetableSlot, WeekNumber};
use crate::slot_validation;

/// A (day, week) pair skipped by a bulk create because it already existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSlot {
    pub day_of_week: Weekday,
    pub week_number: WeekNumber,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkCreateReport {
    pub created: Vec<TimetableSlot>,
    pub skipped: Vec<SkippedSlot>,
}

/// CRUD over a user's recurring slots.
pub struct TimetableSlotRegistry<'a> {
    store: &'a SqliteTimetableStore,
    preview_limit: usize,
}

impl<'a> TimetableSlotRegistry<'a> {
    pub fn new(store: &'a SqliteTimetableStore) -> Self {
        Self {
            store,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    fn resolver(&self) -> SlotDependencyResolver<'a> {
        SlotDependencyResolver::new(self.store).with_preview_limit(self.preview_limit)
    }

    /// Creates a slot.
    ///
    /// The lookup for an identical tuple only gives a friendlier message; the
    /// unique index is what keeps concurrent creates from both succeeding, and
    /// its violation is reported as the same conflict.
    #[instrument(skip(self, input), fields(day = %input.day_of_week, week = %input.week_number))]
    pub fn create(&self, user: UserId, input: SlotInput) -> TimetableResult<TimetableSlot> {
        slot_validation::validate_slot(&input)?;
        let id = self.store.write(|tx| {
            if let Some(existing) = queries::find_slot_conflict(tx, user, &input, None)? {
                return Err(conflict(&input, existing));
            }
            Ok::<_, TimetableError>(queries::insert_slot(tx, user, &input)?)
        })?;
        info!(slot_id = id, "slot created");
        Ok(TimetableSlot::from_input(id, input))
    }

    /// Creates the same interval on every selected (day, week) pair.
    ///
    /// Pairs that already exist are skipped. Fails with a conflict only when
    /// no pair could be created; any other error aborts the remaining pairs.
    #[instrument(skip(self, template, days, weeks))]
    pub fn create_bulk(
        &self,
        user: UserId,
        days: &[Weekday],
        weeks: &[WeekNumber],
        template: SlotInput,
    ) -> TimetableResult<BulkCreateReport> {
        if days.is_empty() {
            return Err(TimetableError::validation("daysOfWeek", "select at least one day"));
        }
        if weeks.is_empty() {
            return Err(TimetableError::validation("weekNumbers", "select at least one week"));
        }
        slot_validation::validate_slot(&template)?;

        let mut report = BulkCreateReport::default();
        for &week_number in weeks {
            for &day_of_week in days {
                let input = SlotInput {
                    day_of_week,
                    week_number,
                    ..template.clone()
                };
                match self.create(user, input) {
                    Ok(slot) => report.created.push(slot),
                    Err(TimetableError::Conflict { message }) => {
                        debug!(%day_of_week, %week_number, "bulk create skipped existing slot");
                        report.skipped.push(SkippedSlot {
                            day_of_week,
                            week_number,
                            reason: message,
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if report.created.is_empty() {
            return Err(TimetableError::conflict(format!(
                "all {} selected slot(s) already exist",
                report.skipped.len()
            )));
        }
        Ok(report)
    }

    #[instrument(skip(self, input))]
    pub fn update(&self, user: UserId, id: i64, input: SlotInput) -> TimetableResult<TimetableSlot> {
        slot_validation::validate_slot(&input)?;
        self.store.write(|tx| {
            if queries::get_slot(tx, user, id)?.is_none() {
                return Err(TimetableError::not_found("slot", id));
            }
            if let Some(existing) = queries::find_slot_conflict(tx, user, &input, Some(id))? {
                return Err(conflict(&input, existing));
            }
            queries::update_slot(tx, user, id, &input)?;
            Ok(())
        })?;
        info!(slot_id = id, "slot updated");
        Ok(TimetableSlot::from_input(id, input))
    }

    pub fn get(&self, user: UserId, id: i64) -> TimetableResult<TimetableSlot> {
        self.store
            .read(|conn| queries::get_slot(conn, user, id))?
            .ok_or_else(|| TimetableError::not_found("slot", id))
    }

    /// All slots ordered by week, day and start time.
    pub fn list(&self, user: UserId) -> TimetableResult<Vec<TimetableSlot>> {
        Ok(self.store.read(|conn| queries::list_slots(conn, user))?)
    }

    /// Slots that run on `date`: none on non-school days, otherwise those
    /// matching the date's weekday and rotation week.
    pub fn list_for_date(
        &self,
        user: UserId,
        date: NaiveDate,
        calendar: &AcademicYearCalendar,
    ) -> TimetableResult<Vec<TimetableSlot>> {
        if !calendar.is_school_day(date) {
            return Ok(Vec::new());
        }
        let Some(week) = calendar.week_number(date) else {
            return Ok(Vec::new());
        };
        let slots = self.list(user)?;
        Ok(slots
            .into_iter()
            .filter(|slot| slot.day_of_week == date.weekday() && slot.week_number == week)
            .collect())
    }

    pub fn dependencies(&self, user: UserId, id: i64) -> TimetableResult<DependencyPreview> {
        self.resolver().preview(user, id)
    }

    pub fn delete(&self, user: UserId, id: i64, force: bool) -> TimetableResult<SlotDeletion> {
        self.resolver().delete(user, id, force)
    }
}

fn conflict(input: &SlotInput, existing: i64) -> TimetableError {
    TimetableError::conflict(format!(
        "slot {existing} already covers {} week {} {}-{}",
        input.day_of_week, input.week_number, input.start_time, input.end_time
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(1);

    fn monday(week: WeekNumber) -> SlotInput {
        SlotInput::new(Weekday::Mon, week, "09:00", "10:00")
    }

    #[test]
    fn duplicate_tuple_is_a_conflict_but_other_week_is_not() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let registry = TimetableSlotRegistry::new(&store);
        registry.create(USER, monday(WeekNumber::One)).unwrap();
        let err = registry.create(USER, monday(WeekNumber::One)).unwrap_err();
        assert!(err.is_conflict(), "{err:?}");
        registry.create(USER, monday(WeekNumber::Two)).unwrap();
        assert_eq!(registry.list(USER).unwrap().len(), 2);
    }

    #[test]
    fn same_tuple_for_another_user_is_allowed() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let registry = TimetableSlotRegistry::new(&store);
        registry.create(USER, monday(WeekNumber::One)).unwrap();
        registry.create(UserId(2), monday(WeekNumber::One)).unwrap();
    }

    #[test]
    fn update_may_keep_its_own_tuple() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let registry = TimetableSlotRegistry::new(&store);
        let slot = registry.create(USER, monday(WeekNumber::One)).unwrap();
        let updated = registry
            .update(USER, slot.id, monday(WeekNumber::One).with_label("Period 1"))
            .unwrap();
        assert_eq!(updated.label, "Period 1");
        assert_eq!(registry.get(USER, slot.id).unwrap().label, "Period 1");
    }

    #[test]
    fn update_onto_another_slot_conflicts() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let registry = TimetableSlotRegistry::new(&store);
        registry.create(USER, monday(WeekNumber::One)).unwrap();
        let second = registry.create(USER, monday(WeekNumber::Two)).unwrap();
        let err = registry
            .update(USER, second.id, monday(WeekNumber::One))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn invalid_times_never_reach_the_store() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let registry = TimetableSlotRegistry::new(&store);
        let err = registry
            .create(USER, SlotInput::new(Weekday::Mon, WeekNumber::One, "10:00", "09:00"))
            .unwrap_err();
        assert_eq!(err.field(), Some("endTime"));
        assert!(registry.list(USER).unwrap().is_empty());
    }
}
