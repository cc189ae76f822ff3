#![cfg(feature = "cli_api")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::{NamedTempFile, TempDir};

#[allow(deprecated)]
fn run_cli(db: &TempDir, script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env("TIMETABLE_DB_PATH", db.path().join("timetable.db"))
        .env("TIMETABLE_USER_ID", "1")
        .env_remove("TIMETABLE_CONFIG")
        .write_stdin(script.to_string())
        .assert()
}

#[test]
fn cli_reports_week_numbers() {
    let db = TempDir::new().unwrap();
    run_cli(
        &db,
        "year add 2024-09-01 2025-07-18 2024-09-02 2024/25\nweek 2024-09-10\nweek 2024-09-16\nquit\n",
    )
    .success()
    .stdout(str_contains("2024-09-10 is in Week 2."))
    .stdout(str_contains("2024-09-16 is in Week 1."));
}

#[test]
fn cli_rejects_duplicate_slot() {
    let db = TempDir::new().unwrap();
    run_cli(
        &db,
        "slot add Mon 1 09:00 10:00 P1\nslot add Mon 1 09:00 10:00\nslot add Mon 2 09:00 10:00\nquit\n",
    )
    .success()
    .stdout(str_contains("Slot created: #1 Mon week 1 09:00-10:00 P1"))
    .stdout(str_contains("Error: slot 1 already covers"))
    .stdout(str_contains("Slot created: #2 Mon week 2 09:00-10:00"));
}

#[test]
fn cli_blocks_delete_until_forced() {
    let db = TempDir::new().unwrap();
    run_cli(
        &db,
        "slot add Mon 1 09:00 10:00\nlesson add 1 2024-09-02 Fractions\nlesson add 1 2024-09-16 Decimals\nentry set 1 7B Maths\nslot delete 1\nslot delete 1 force\nslot list\nquit\n",
    )
    .success()
    .stdout(str_contains(
        "Slot 1 has dependents: 2 lesson(s), 1 entry, 0 activity.",
    ))
    .stdout(str_contains(
        "Slot 1 deleted with 2 lesson(s), 1 entry, 0 activity.",
    ))
    .stdout(str_contains("No slots."));
}

#[test]
fn cli_holiday_removes_lessons_and_school_day() {
    let db = TempDir::new().unwrap();
    run_cli(
        &db,
        "year add 2024-09-01 2025-07-18 2024-09-02\nslot add Mon 1 09:00 10:00\nlesson add 1 2024-12-23 Carols\nholiday add 1 2024-12-23 2025-01-03 holiday Christmas\nschoolday 2024-12-25\nquit\n",
    )
    .success()
    .stdout(str_contains("1 lesson(s) removed."))
    .stdout(str_contains("2024-12-25 is not a school day: Christmas (holiday)."));
}

#[test]
fn cli_calendar_save_and_load_round_trip() {
    let db = TempDir::new().unwrap();
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_string_lossy().into_owned();
    let script = format!(
        "year add 2024-09-01 2025-07-18 2024-09-02\nholiday add 1 2025-02-17 2025-02-21 half_term\ncalendar save 1 {path}\ncalendar load {path}\nyear list\nquit\n"
    );
    run_cli(&db, &script)
        .success()
        .stdout(str_contains(format!("Calendar saved to {path}.")))
        .stdout(str_contains(
            "Calendar imported as academic year 2 with 1 holiday(s).",
        ));
}

#[test]
fn cli_expands_recurring_events() {
    let db = TempDir::new().unwrap();
    run_cli(
        &db,
        "event add weekly 2024-09-02T08:00 2024-09-02T08:30 2024-09-16 Briefing\nevent expand 1\nquit\n",
    )
    .success()
    .stdout(str_contains("Event 1 created."))
    .stdout(str_contains("2024-09-16 08:00-08:30"));
}

#[test]
fn cli_usage_and_unknown_commands() {
    let db = TempDir::new().unwrap();
    run_cli(&db, "slot add Mon\nfrobnicate\nweek 2024-13-01\nquit\n")
        .success()
        .stdout(str_contains("Usage: slot add"))
        .stdout(str_contains("Unknown command 'frobnicate'"))
        .stdout(str_contains("Invalid date (YYYY-MM-DD)"));
}
