use chrono::{NaiveDate, Weekday};
use tempfile::NamedTempFile;
use timetable_tool::{
    AcademicYearInput, AcademicYearRegistry, EventInput, EventRegistry, HolidayInput, HolidayType,
    LessonInput, LessonRegistry, RecurrenceType, SlotInput, SqliteTimetableStore,
    TimetableEntryInput, TimetableSlotRegistry, UserId, WeekNumber,
};

const USER: UserId = UserId(5);

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn sqlite_store_keeps_data_across_reopen() {
    let file = NamedTempFile::new().unwrap();
    let (year_id, slot_id, lesson_id) = {
        let store = SqliteTimetableStore::new(file.path()).unwrap();
        let years = AcademicYearRegistry::new(&store);
        let mut input = AcademicYearInput::new(d(2024, 9, 1), d(2025, 7, 18), d(2024, 9, 2));
        input.is_active = true;
        input.skip_holiday_weeks = true;
        let year = years.create_year(USER, input).unwrap();
        years
            .create_holiday(
                USER,
                HolidayInput::new(year.id, d(2024, 10, 28), d(2024, 11, 1), HolidayType::HalfTerm),
            )
            .unwrap();
        let slot = TimetableSlotRegistry::new(&store)
            .create(
                USER,
                SlotInput::new(Weekday::Mon, WeekNumber::Two, "13:15", "14:15").with_label("P5"),
            )
            .unwrap();
        let lessons = LessonRegistry::new(&store);
        let lesson = lessons
            .create_lesson(USER, LessonInput::new(slot.id, d(2024, 9, 9), "Volcanoes"))
            .unwrap();
        lessons
            .set_entry(USER, slot.id, TimetableEntryInput::new("9C", "Geography"))
            .unwrap();
        (year.id, slot.id, lesson.id)
    };

    let store = SqliteTimetableStore::new(file.path()).unwrap();
    let calendar = AcademicYearRegistry::new(&store)
        .active_calendar(USER)
        .unwrap()
        .expect("active calendar");
    assert_eq!(calendar.year().id, year_id);
    assert!(calendar.year().skip_holiday_weeks);
    assert_eq!(calendar.holidays()[0].holiday_type, HolidayType::HalfTerm);

    let slot = TimetableSlotRegistry::new(&store).get(USER, slot_id).unwrap();
    assert_eq!(slot.day_of_week, Weekday::Mon);
    assert_eq!(slot.week_number, WeekNumber::Two);
    assert_eq!(slot.label, "P5");

    let lessons = LessonRegistry::new(&store);
    assert_eq!(lessons.get_lesson(USER, lesson_id).unwrap().title, "Volcanoes");
    assert_eq!(
        lessons.entry(USER, slot_id).unwrap().unwrap().subject_name,
        "Geography"
    );
    assert_eq!(
        lessons.lessons_between(USER, d(2024, 9, 1), d(2024, 9, 30)).unwrap().len(),
        1
    );
}

#[test]
fn materialized_occurrences_are_stored_as_children() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteTimetableStore::new(file.path()).unwrap();
    let events = EventRegistry::new(&store);
    let first = d(2025, 1, 31);
    let event = events
        .create(
            USER,
            EventInput::recurring(
                "Data drop",
                first.and_hms_opt(16, 0, 0).unwrap(),
                first.and_hms_opt(17, 0, 0).unwrap(),
                RecurrenceType::Monthly,
                Some(d(2025, 3, 31)),
            ),
        )
        .unwrap();
    events.materialize(USER, event.id, None).unwrap();
    drop(events);
    drop(store);

    let store = SqliteTimetableStore::new(file.path()).unwrap();
    let events = EventRegistry::new(&store);
    let children = events.occurrences(USER, event.id).unwrap();
    let dates: Vec<_> = children.iter().map(|child| child.start_time.date()).collect();
    assert_eq!(dates, vec![d(2025, 1, 31), d(2025, 2, 28), d(2025, 3, 31)]);
    assert!(children.iter().all(|child| !child.is_recurring));
    assert_eq!(events.list(USER).unwrap().len(), 1);
    assert!(events.occurrences(UserId(6), event.id).is_err());
}
