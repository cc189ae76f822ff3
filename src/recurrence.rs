use chrono::{Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::AcademicYearCalendar;
use crate::event::{Event, RecurrenceType};
use crate::slot::WeekNumber;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("event {0} is not recurring")]
    NotRecurring(i64),
    #[error("{0} recurrence needs an academic year calendar")]
    MissingCalendar(RecurrenceType),
    #[error("recurrence has no end date, horizon or academic year to stop at")]
    Unbounded,
}

/// One concrete instance of a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub parent_event_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

/// A bounded expansion plan. Iterating it is lazy, and every call to
/// [`RecurrenceExpansion::iter`] starts again from the first occurrence.
#[derive(Debug, Clone)]
pub struct RecurrenceExpansion<'a> {
    event_id: i64,
    pattern: RecurrenceType,
    first: NaiveDate,
    until: NaiveDate,
    time_of_day: NaiveTime,
    length: TimeDelta,
    calendar: Option<&'a AcademicYearCalendar>,
}

/// Builds the expansion of a recurring `event`.
///
/// The last date considered is the earlier of the event's recurrence end
/// date and `horizon`; with neither, the governing year's end date. `week1`
/// and `week2` keep only dates whose rotation week matches under `calendar`.
pub fn expand<'a>(
    event: &Event,
    calendar: Option<&'a AcademicYearCalendar>,
    horizon: Option<NaiveDate>,
) -> Result<RecurrenceExpansion<'a>, RecurrenceError> {
    let pattern = match (event.is_recurring, event.recurrence_type) {
        (true, Some(pattern)) => pattern,
        _ => return Err(RecurrenceError::NotRecurring(event.id)),
    };
    if matches!(pattern, RecurrenceType::Week1 | RecurrenceType::Week2) && calendar.is_none() {
        return Err(RecurrenceError::MissingCalendar(pattern));
    }
    let until = match (event.recurrence_end_date, horizon) {
        (Some(end), Some(horizon)) => end.min(horizon),
        (Some(end), None) => end,
        (None, Some(horizon)) => horizon,
        (None, None) => calendar
            .map(|calendar| calendar.year().end_date)
            .ok_or(RecurrenceError::Unbounded)?,
    };
    Ok(RecurrenceExpansion {
        event_id: event.id,
        pattern,
        first: event.start_time.date(),
        until,
        time_of_day: event.start_time.time(),
        length: event.end_time - event.start_time,
        calendar,
    })
}

impl<'a> RecurrenceExpansion<'a> {
    pub fn until(&self) -> NaiveDate {
        self.until
    }

    pub fn iter(&self) -> Occurrences<'_, 'a> {
        Occurrences {
            plan: self,
            step: 0,
            finished: false,
        }
    }

    /// Candidate date of the `step`-th repetition, before week filtering.
    fn candidate(&self, step: u32) -> Option<NaiveDate> {
        match self.pattern {
            RecurrenceType::Daily => self
                .first
                .checked_add_signed(Duration::days(i64::from(step))),
            RecurrenceType::Weekly | RecurrenceType::Week1 | RecurrenceType::Week2 => self
                .first
                .checked_add_signed(Duration::weeks(i64::from(step))),
            // Always offset from the first date so a clamped month-end does
            // not drag later months to an earlier day.
            RecurrenceType::Monthly => self.first.checked_add_months(Months::new(step)),
        }
    }

    fn wanted_week(&self) -> Option<WeekNumber> {
        match self.pattern {
            RecurrenceType::Week1 => Some(WeekNumber::One),
            RecurrenceType::Week2 => Some(WeekNumber::Two),
            _ => None,
        }
    }

    /// `None` once the end time no longer fits in a `NaiveDateTime`.
    fn occurrence(&self, date: NaiveDate) -> Option<Occurrence> {
        let start_time = date.and_time(self.time_of_day);
        Some(Occurrence {
            parent_event_id: self.event_id,
            date,
            start_time,
            end_time: start_time.checked_add_signed(self.length)?,
        })
    }
}

impl<'p, 'a> IntoIterator for &'p RecurrenceExpansion<'a> {
    type Item = Occurrence;
    type IntoIter = Occurrences<'p, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Occurrences<'p, 'a> {
    plan: &'p RecurrenceExpansion<'a>,
    step: u32,
    finished: bool,
}

impl Iterator for Occurrences<'_, '_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        while !self.finished {
            let candidate = self.plan.candidate(self.step);
            self.step = self.step.saturating_add(1);
            let date = match candidate {
                Some(date) if date <= self.plan.until => date,
                _ => {
                    self.finished = true;
                    break;
                }
            };
            if let Some(wanted) = self.plan.wanted_week() {
                let week = self.plan.calendar.and_then(|calendar| calendar.week_number(date));
                if week != Some(wanted) {
                    continue;
                }
            }
            match self.plan.occurrence(date) {
                Some(occurrence) => return Some(occurrence),
                None => self.finished = true,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic_year::{AcademicYear, AcademicYearInput};
    use crate::event::EventInput;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(pattern: RecurrenceType, start: NaiveDate, until: Option<NaiveDate>) -> Event {
        let start = start.and_hms_opt(8, 30, 0).unwrap();
        let end = start + Duration::minutes(45);
        Event::from_input(5, EventInput::recurring("Duty", start, end, pattern, until))
    }

    fn calendar() -> AcademicYearCalendar {
        let input = AcademicYearInput::new(d(2024, 9, 1), d(2025, 7, 20), d(2024, 9, 2));
        AcademicYearCalendar::new(AcademicYear::from_input(1, input), Vec::new())
    }

    #[test]
    fn daily_is_inclusive_of_end_date() {
        let e = event(RecurrenceType::Daily, d(2024, 9, 2), Some(d(2024, 9, 4)));
        let plan = expand(&e, None, None).unwrap();
        let dates: Vec<_> = plan.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![d(2024, 9, 2), d(2024, 9, 3), d(2024, 9, 4)]);
    }

    #[test]
    fn occurrences_keep_time_of_day_and_length() {
        let e = event(RecurrenceType::Weekly, d(2024, 9, 2), Some(d(2024, 9, 9)));
        let plan = expand(&e, None, None).unwrap();
        let second = plan.iter().nth(1).unwrap();
        assert_eq!(second.start_time, d(2024, 9, 9).and_hms_opt(8, 30, 0).unwrap());
        assert_eq!(second.end_time, d(2024, 9, 9).and_hms_opt(9, 15, 0).unwrap());
        assert_eq!(second.parent_event_id, 5);
    }

    #[test]
    fn monthly_clamps_to_month_end_without_drift() {
        let e = event(RecurrenceType::Monthly, d(2025, 1, 31), Some(d(2025, 4, 30)));
        let plan = expand(&e, None, None).unwrap();
        let dates: Vec<_> = plan.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![d(2025, 1, 31), d(2025, 2, 28), d(2025, 3, 31), d(2025, 4, 30)]
        );
    }

    #[test]
    fn week_patterns_need_a_calendar() {
        let e = event(RecurrenceType::Week1, d(2024, 9, 2), Some(d(2024, 10, 1)));
        assert_eq!(
            expand(&e, None, None).unwrap_err(),
            RecurrenceError::MissingCalendar(RecurrenceType::Week1)
        );
    }

    #[test]
    fn week2_keeps_alternate_weeks() {
        let cal = calendar();
        let e = event(RecurrenceType::Week2, d(2024, 9, 2), Some(d(2024, 9, 30)));
        let plan = expand(&e, Some(&cal), None).unwrap();
        let dates: Vec<_> = plan.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![d(2024, 9, 9), d(2024, 9, 23)]);
    }

    #[test]
    fn unbounded_without_calendar_or_horizon_is_rejected() {
        let e = event(RecurrenceType::Daily, d(2024, 9, 2), None);
        assert_eq!(expand(&e, None, None).unwrap_err(), RecurrenceError::Unbounded);
    }

    #[test]
    fn year_end_bounds_open_ended_event() {
        let cal = calendar();
        let e = event(RecurrenceType::Weekly, d(2025, 7, 1), None);
        let plan = expand(&e, Some(&cal), None).unwrap();
        assert_eq!(plan.until(), d(2025, 7, 20));
        assert_eq!(plan.iter().count(), 3);
    }

    #[test]
    fn iteration_restarts_from_the_beginning() {
        let e = event(RecurrenceType::Daily, d(2024, 9, 2), None);
        let plan = expand(&e, None, Some(d(2024, 9, 11))).unwrap();
        let first: Vec<_> = plan.iter().take(3).collect();
        let again: Vec<_> = (&plan).into_iter().take(3).collect();
        assert_eq!(first, again);
        assert_eq!(plan.iter().count(), 10);
    }

    #[test]
    fn stops_when_the_end_time_runs_past_the_last_date() {
        let day_before = NaiveDate::MAX.pred_opt().unwrap();
        let start = day_before.and_hms_opt(23, 30, 0).unwrap();
        let end = NaiveDate::MAX.and_hms_opt(0, 15, 0).unwrap();
        let input = EventInput::recurring("Late", start, end, RecurrenceType::Daily, Some(NaiveDate::MAX));
        let plan = expand(&Event::from_input(9, input), None, None).unwrap();
        let occurrences: Vec<_> = plan.iter().collect();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].end_time, end);
    }
}
