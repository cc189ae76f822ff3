use chrono::{NaiveDate, Weekday};
use tempfile::NamedTempFile;
use timetable_tool::persistence::{load_calendar_from_json, save_calendar_to_json};
use timetable_tool::{
    AcademicYearInput, AcademicYearRegistry, HolidayInput, HolidayType, LessonInput,
    LessonRegistry, SlotInput, SqliteTimetableStore, TimetableError, TimetableSlotRegistry, UserId,
    WeekNumber,
};

const USER: UserId = UserId(1);

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn year_input(active: bool) -> AcademicYearInput {
    let mut input = AcademicYearInput::new(d(2024, 9, 1), d(2025, 7, 18), d(2024, 9, 2));
    input.name = "2024/25".into();
    input.is_active = active;
    input
}

#[test]
fn only_one_year_stays_active() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let first = years.create_year(USER, year_input(true)).unwrap();
    let mut next = AcademicYearInput::new(d(2025, 9, 1), d(2026, 7, 17), d(2025, 9, 1));
    next.is_active = true;
    let second = years.create_year(USER, next).unwrap();

    let active: Vec<_> = years
        .list_years(USER)
        .unwrap()
        .into_iter()
        .filter(|year| year.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);

    years.activate(USER, first.id).unwrap();
    assert_eq!(years.active_year(USER).unwrap().map(|y| y.id), Some(first.id));
    assert_eq!(years.year_for_date(USER, d(2025, 10, 1)).unwrap(), None);
}

#[test]
fn other_users_keep_their_own_active_year() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    years.create_year(USER, year_input(true)).unwrap();
    years.create_year(UserId(2), year_input(true)).unwrap();
    assert!(years.active_year(USER).unwrap().is_some());
    assert!(years.active_year(UserId(2)).unwrap().is_some());
}

#[test]
fn invalid_year_names_the_field() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let mut input = year_input(false);
    input.week_cycle_start_date = d(2025, 8, 1);
    let err = years.create_year(USER, input).unwrap_err();
    assert_eq!(err.field(), Some("weekCycleStartDate"));
    let mut input = year_input(false);
    input.end_date = d(2024, 8, 1);
    let err = years.create_year(USER, input).unwrap_err();
    assert_eq!(err.field(), Some("endDate"));
}

#[test]
fn holiday_write_deletes_lessons_inside_the_range() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();

    let slots = TimetableSlotRegistry::new(&store);
    let monday = slots
        .create(USER, SlotInput::new(Weekday::Mon, WeekNumber::One, "09:00", "10:00"))
        .unwrap();
    let tuesday = slots
        .create(USER, SlotInput::new(Weekday::Tue, WeekNumber::Two, "11:00", "12:00"))
        .unwrap();
    let lessons = LessonRegistry::new(&store);
    let inside_a = lessons
        .create_lesson(USER, LessonInput::new(monday.id, d(2024, 10, 28), "Revision"))
        .unwrap();
    let inside_b = lessons
        .create_lesson(USER, LessonInput::new(tuesday.id, d(2024, 10, 29), "Essays"))
        .unwrap();
    let outside = lessons
        .create_lesson(USER, LessonInput::new(monday.id, d(2024, 11, 4), "Poetry"))
        .unwrap();

    let mut input = HolidayInput::new(year.id, d(2024, 10, 28), d(2024, 11, 1), HolidayType::HalfTerm);
    input.name = "Autumn half term".into();
    let written = years.create_holiday(USER, input).unwrap();
    assert_eq!(written.deleted_lessons_count, 2);
    assert!(lessons.get_lesson(USER, inside_a.id).is_err());
    assert!(lessons.get_lesson(USER, inside_b.id).is_err());
    assert!(lessons.get_lesson(USER, outside.id).is_ok());

    // Widening the range picks up the next Monday.
    let wider = HolidayInput::new(year.id, d(2024, 10, 28), d(2024, 11, 4), HolidayType::HalfTerm);
    let written = years.update_holiday(USER, written.holiday.id, wider).unwrap();
    assert_eq!(written.deleted_lessons_count, 1);
    assert_eq!(written.holiday.end_date, d(2024, 11, 4));
}

#[test]
fn holiday_cascade_spares_other_users() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();
    let other = UserId(2);
    let slot = TimetableSlotRegistry::new(&store)
        .create(other, SlotInput::new(Weekday::Mon, WeekNumber::One, "09:00", "10:00"))
        .unwrap();
    let lesson = LessonRegistry::new(&store)
        .create_lesson(other, LessonInput::new(slot.id, d(2024, 12, 23), "Carols"))
        .unwrap();

    let written = years
        .create_holiday(
            USER,
            HolidayInput::new(year.id, d(2024, 12, 23), d(2025, 1, 3), HolidayType::Holiday),
        )
        .unwrap();
    assert_eq!(written.deleted_lessons_count, 0);
    assert!(LessonRegistry::new(&store).get_lesson(other, lesson.id).is_ok());
}

#[test]
fn holiday_is_kept_when_the_lesson_cascade_fails() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();
    let slot = TimetableSlotRegistry::new(&store)
        .create(USER, SlotInput::new(Weekday::Mon, WeekNumber::One, "09:00", "10:00"))
        .unwrap();
    let lessons = LessonRegistry::new(&store);
    let lesson = lessons
        .create_lesson(USER, LessonInput::new(slot.id, d(2024, 12, 23), "Carols"))
        .unwrap();
    store
        .read(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER refuse_lesson_delete BEFORE DELETE ON lessons
                 BEGIN SELECT RAISE(ABORT, 'lesson delete refused'); END;",
            )
        })
        .unwrap();

    let written = years
        .create_holiday(
            USER,
            HolidayInput::new(year.id, d(2024, 12, 23), d(2025, 1, 3), HolidayType::Holiday),
        )
        .unwrap();
    assert_eq!(written.deleted_lessons_count, 0);
    assert_eq!(years.get_holiday(USER, written.holiday.id).unwrap(), written.holiday);
    assert!(lessons.get_lesson(USER, lesson.id).is_ok());
}

#[test]
fn holiday_delete_leaves_lessons_alone() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();
    let holiday = years
        .create_holiday(
            USER,
            HolidayInput::new(year.id, d(2025, 2, 17), d(2025, 2, 21), HolidayType::HalfTerm),
        )
        .unwrap()
        .holiday;
    let slot = TimetableSlotRegistry::new(&store)
        .create(USER, SlotInput::new(Weekday::Mon, WeekNumber::One, "09:00", "10:00"))
        .unwrap();
    let lesson = LessonRegistry::new(&store)
        .create_lesson(USER, LessonInput::new(slot.id, d(2025, 2, 17), "Catch-up"))
        .unwrap();

    years.delete_holiday(USER, holiday.id).unwrap();
    assert!(LessonRegistry::new(&store).get_lesson(USER, lesson.id).is_ok());
    assert!(matches!(
        years.get_holiday(USER, holiday.id).unwrap_err(),
        TimetableError::NotFound { .. }
    ));
}

#[test]
fn holiday_for_foreign_year_is_not_found() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();
    let err = years
        .create_holiday(
            UserId(2),
            HolidayInput::new(year.id, d(2025, 2, 17), d(2025, 2, 21), HolidayType::HalfTerm),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn deleting_a_year_removes_its_holidays() {
    let store = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&store);
    let year = years.create_year(USER, year_input(true)).unwrap();
    let holiday = years
        .create_holiday(
            USER,
            HolidayInput::new(year.id, d(2025, 4, 7), d(2025, 4, 18), HolidayType::Holiday),
        )
        .unwrap()
        .holiday;
    years.delete_year(USER, year.id).unwrap();
    assert!(years.get_holiday(USER, holiday.id).is_err());
    assert!(years.active_calendar(USER).unwrap().is_none());
}

#[test]
fn calendar_survives_a_json_round_trip_into_another_store() {
    let source = SqliteTimetableStore::in_memory().unwrap();
    let years = AcademicYearRegistry::new(&source);
    let year = years.create_year(USER, year_input(true)).unwrap();
    years
        .create_holiday(
            USER,
            HolidayInput::new(year.id, d(2024, 12, 23), d(2025, 1, 3), HolidayType::Holiday),
        )
        .unwrap();
    let calendar = years.calendar(USER, year.id).unwrap();

    let file = NamedTempFile::new().unwrap();
    save_calendar_to_json(&calendar, file.path()).unwrap();
    let loaded = load_calendar_from_json(file.path()).unwrap();

    let target = SqliteTimetableStore::in_memory().unwrap();
    let imported = AcademicYearRegistry::new(&target)
        .import_calendar(USER, &loaded)
        .unwrap();
    assert_eq!(imported.year().start_date, calendar.year().start_date);
    assert_eq!(imported.holidays().len(), 1);
    assert_eq!(imported.holidays()[0].academic_year_id, imported.year().id);
    assert_eq!(
        imported.week_number(d(2024, 9, 9)),
        calendar.week_number(d(2024, 9, 9))
    );
}
