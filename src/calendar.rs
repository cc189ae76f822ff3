use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::academic_year::{AcademicYear, WeekCycleMode};
use crate::holiday::Holiday;
use crate::slot::WeekNumber;

/// Monday of the week containing `date` (Sunday belongs to the week before).
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let offset = Duration::days(i64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_signed(offset).unwrap_or(NaiveDate::MIN)
}

/// First Monday on or after the year's week cycle start; Week 1 begins here.
pub fn anchor_monday(year: &AcademicYear) -> NaiveDate {
    let start = year.week_cycle_start_date;
    let days_ahead = (7 - start.weekday().num_days_from_monday()) % 7;
    start
        .checked_add_signed(Duration::days(i64::from(days_ahead)))
        .unwrap_or(NaiveDate::MAX)
}

fn weeks_between(from_monday: NaiveDate, to_monday: NaiveDate) -> i64 {
    (to_monday - from_monday).num_days().div_euclid(7)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_holiday(date: NaiveDate, holidays: &[Holiday]) -> bool {
    holidays.iter().any(|holiday| holiday.covers(date))
}

/// Week 1 / Week 2 label of `date`, counting every calendar week from the anchor.
///
/// `None` outside the academic year. Holidays are not consulted here.
pub fn week_number_for_date(date: NaiveDate, year: &AcademicYear) -> Option<WeekNumber> {
    if !year.contains(date) {
        return None;
    }
    let weeks_diff = weeks_between(anchor_monday(year), monday_of(date));
    Some(WeekNumber::from_cycle_index(weeks_diff))
}

pub fn is_school_day(date: NaiveDate, year: &AcademicYear, holidays: &[Holiday]) -> bool {
    year.contains(date) && !is_weekend(date) && !is_holiday(date, holidays)
}

/// All school days in the inclusive range, in order.
pub fn school_days_between(
    start: NaiveDate,
    end: NaiveDate,
    year: &AcademicYear,
    holidays: &[Holiday],
) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start.max(year.start_date);
    let last = end.min(year.end_date);
    while current <= last {
        if is_school_day(current, year, holidays) {
            days.push(current);
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// True when Monday through Friday of `date`'s week are each inside some holiday.
///
/// Overlapping holidays are fine: coverage is the union of all ranges.
pub fn is_week_fully_covered_by_holidays(date: NaiveDate, holidays: &[Holiday]) -> bool {
    let monday = monday_of(date);
    (0..5).all(|offset| {
        monday
            .checked_add_signed(Duration::days(offset))
            .is_some_and(|day| is_holiday(day, holidays))
    })
}

/// First active year whose range contains `date`.
pub fn academic_year_for_date(date: NaiveDate, years: &[AcademicYear]) -> Option<&AcademicYear> {
    years
        .iter()
        .find(|year| year.is_active && year.contains(date))
}

/// An academic year together with its holidays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYearCalendar {
    year: AcademicYear,
    holidays: Vec<Holiday>,
}

impl AcademicYearCalendar {
    pub fn new(year: AcademicYear, holidays: Vec<Holiday>) -> Self {
        Self { year, holidays }
    }

    pub fn year(&self) -> &AcademicYear {
        &self.year
    }

    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }

    pub fn mode(&self) -> WeekCycleMode {
        self.year.cycle_mode()
    }

    /// Index of `date`'s week in the rotation; even indices are Week 1.
    ///
    /// Under [`WeekCycleMode::SkipHolidayWeeks`] only weeks that are not fully
    /// holiday-covered advance the index. A covered week carries the index of
    /// the next active week, so the cycle resumes where it paused.
    pub fn cycle_index(&self, date: NaiveDate) -> Option<i64> {
        if !self.year.contains(date) {
            return None;
        }
        let anchor = anchor_monday(&self.year);
        let week = monday_of(date);
        match self.mode() {
            WeekCycleMode::Continuous => Some(weeks_between(anchor, week)),
            WeekCycleMode::SkipHolidayWeeks => {
                if week >= anchor {
                    Some(self.active_weeks_in(anchor, week))
                } else {
                    Some(-self.active_weeks_in(week, anchor))
                }
            }
        }
    }

    /// Active (not fully covered) weeks whose Monday lies in `[from, to)`.
    fn active_weeks_in(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let mut count = 0;
        let mut monday = from;
        while monday < to {
            if !is_week_fully_covered_by_holidays(monday, &self.holidays) {
                count += 1;
            }
            monday = monday + Duration::days(7);
        }
        count
    }

    pub fn week_number(&self, date: NaiveDate) -> Option<WeekNumber> {
        self.cycle_index(date).map(WeekNumber::from_cycle_index)
    }

    pub fn is_school_day(&self, date: NaiveDate) -> bool {
        is_school_day(date, &self.year, &self.holidays)
    }

    pub fn school_days_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        school_days_between(start, end, &self.year, &self.holidays)
    }

    pub fn is_week_fully_covered(&self, date: NaiveDate) -> bool {
        is_week_fully_covered_by_holidays(date, &self.holidays)
    }

    /// Holidays whose range contains `date`.
    pub fn holidays_on(&self, date: NaiveDate) -> impl Iterator<Item = &Holiday> {
        self.holidays.iter().filter(move |holiday| holiday.covers(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic_year::AcademicYearInput;
    use crate::holiday::{HolidayInput, HolidayType};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn year(cycle_start: NaiveDate) -> AcademicYear {
        let mut input = AcademicYearInput::new(d(2024, 9, 1), d(2025, 7, 20), cycle_start);
        input.is_active = true;
        AcademicYear::from_input(1, input)
    }

    fn holiday(start: NaiveDate, end: NaiveDate) -> Holiday {
        Holiday::from_input(1, HolidayInput::new(1, start, end, HolidayType::Holiday))
    }

    #[test]
    fn anchor_moves_forward_to_monday() {
        // 2024-09-04 is a Wednesday.
        assert_eq!(anchor_monday(&year(d(2024, 9, 4))), d(2024, 9, 9));
        assert_eq!(anchor_monday(&year(d(2024, 9, 2))), d(2024, 9, 2));
    }

    #[test]
    fn sunday_belongs_to_preceding_monday() {
        assert_eq!(monday_of(d(2024, 9, 8)), d(2024, 9, 2));
        assert_eq!(monday_of(d(2024, 9, 9)), d(2024, 9, 9));
    }

    #[test]
    fn week_numbers_alternate_from_anchor() {
        let y = year(d(2024, 9, 2));
        assert_eq!(week_number_for_date(d(2024, 9, 2), &y), Some(WeekNumber::One));
        assert_eq!(week_number_for_date(d(2024, 9, 9), &y), Some(WeekNumber::Two));
        assert_eq!(week_number_for_date(d(2024, 9, 16), &y), Some(WeekNumber::One));
        assert_eq!(week_number_for_date(d(2024, 9, 10), &y), Some(WeekNumber::Two));
    }

    #[test]
    fn dates_before_anchor_continue_the_pattern_backwards() {
        let y = year(d(2024, 9, 9));
        // Week of 2024-09-02 is one week before the anchor.
        assert_eq!(week_number_for_date(d(2024, 9, 3), &y), Some(WeekNumber::Two));
        assert_eq!(week_number_for_date(d(2024, 8, 31), &y), None);
    }

    #[test]
    fn partial_holiday_week_is_not_covered() {
        let holidays = vec![holiday(d(2024, 10, 28), d(2024, 10, 31))];
        assert!(!is_week_fully_covered_by_holidays(d(2024, 10, 29), &holidays));
    }

    #[test]
    fn overlapping_holidays_cover_as_union() {
        let holidays = vec![
            holiday(d(2024, 10, 28), d(2024, 10, 30)),
            holiday(d(2024, 10, 30), d(2024, 11, 1)),
        ];
        assert!(is_week_fully_covered_by_holidays(d(2024, 11, 3), &holidays));
    }

    #[test]
    fn skip_mode_pauses_cycle_over_covered_weeks() {
        let mut y = year(d(2024, 9, 2));
        y.skip_holiday_weeks = true;
        // 2024-09-16 week is fully covered.
        let calendar = AcademicYearCalendar::new(y, vec![holiday(d(2024, 9, 16), d(2024, 9, 20))]);
        assert_eq!(calendar.week_number(d(2024, 9, 2)), Some(WeekNumber::One));
        assert_eq!(calendar.week_number(d(2024, 9, 9)), Some(WeekNumber::Two));
        assert_eq!(calendar.week_number(d(2024, 9, 17)), Some(WeekNumber::One));
        assert_eq!(calendar.week_number(d(2024, 9, 23)), Some(WeekNumber::One));
        assert_eq!(calendar.week_number(d(2024, 9, 30)), Some(WeekNumber::Two));
    }

    #[test]
    fn continuous_mode_ignores_holidays() {
        let calendar = AcademicYearCalendar::new(
            year(d(2024, 9, 2)),
            vec![holiday(d(2024, 9, 16), d(2024, 9, 20))],
        );
        assert_eq!(calendar.week_number(d(2024, 9, 23)), Some(WeekNumber::Two));
        assert_eq!(calendar.cycle_index(d(2024, 9, 23)), Some(3));
    }

    #[test]
    fn school_days_stay_inside_the_year() {
        let y = year(d(2024, 9, 2));
        assert!(school_days_between(NaiveDate::MAX, NaiveDate::MAX, &y, &[]).is_empty());
        assert!(school_days_between(NaiveDate::MIN, NaiveDate::MIN, &y, &[]).is_empty());
        let days = school_days_between(d(2025, 7, 17), NaiveDate::MAX, &y, &[]);
        assert_eq!(days, vec![d(2025, 7, 17), d(2025, 7, 18)]);
    }

    #[test]
    fn year_ending_on_the_last_date_does_not_overflow() {
        let last = NaiveDate::MAX;
        let input = AcademicYearInput::new(d(262_142, 12, 1), last, d(262_142, 12, 1));
        let y = AcademicYear::from_input(1, input);
        // +262142-12-31 is a Monday after a weekend.
        assert_eq!(school_days_between(d(262_142, 12, 29), last, &y, &[]), vec![last]);
        assert_eq!(week_number_for_date(last, &y), Some(WeekNumber::One));
    }
}
