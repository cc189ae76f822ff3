use std::error::Error;
use std::io::{self, Write};

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use timetable_tool::persistence::{load_calendar_from_json, save_calendar_to_json};
use timetable_tool::{
    AcademicYearInput, AcademicYearRegistry, EventInput, EventRegistry, HolidayInput, HolidayType,
    LessonInput, LessonRegistry, RecurrenceError, RecurrenceType, SlotInput, SqliteTimetableStore,
    TimetableConfig, TimetableEntryInput, TimetableError, TimetableSlot, TimetableSlotRegistry,
    UserId, WeekNumber,
};
use tracing_subscriber::EnvFilter;

type CmdResult = Result<String, Box<dyn Error>>;

struct Session {
    store: SqliteTimetableStore,
    config: TimetableConfig,
    user: UserId,
}

fn print_help() {
    println!(
        "Commands:\n  help                                          Show this help\n  year add <start> <end> <cycle_start> [name]   Create and activate an academic year\n  year list                                     List academic years\n  year activate <id>                            Make a year the active one\n  year skip <id> <on|off>                       Pause the week cycle over holiday weeks\n  week <YYYY-MM-DD>                             Week 1 / Week 2 of a date\n  schoolday <YYYY-MM-DD>                        Whether a date is a school day\n  holiday add <year_id> <start> <end> <type> [name]\n                                                Add a holiday (holiday|half_term|training_day|planning_day)\n  holiday list <year_id>                        List holidays of a year\n  slot add <day> <week> <HH:MM> <HH:MM> [label] Create a slot (day like Mon, week 1|2)\n  slot bulk <days_csv> <weeks_csv> <HH:MM> <HH:MM> [label]\n                                                Create a slot on several days and weeks\n  slot list [YYYY-MM-DD]                        List slots, or those running on a date\n  slot deps <id>                                Show what depends on a slot\n  slot delete <id> [force]                      Delete a slot, with its dependents when forced\n  lesson add <slot_id> <YYYY-MM-DD> <title>     Add a lesson\n  entry set <slot_id> <class> <subject> [room]  Bind a class and subject to a slot\n  event add <type> <start> <end> <until|-> <title>\n                                                Add a recurring event (start/end YYYY-MM-DDTHH:MM)\n  event expand <id> [horizon]                   List occurrences of a recurring event\n  calendar save <year_id> <path>                Export a year and its holidays as JSON\n  calendar load <path>                          Import a year exported with 'calendar save'\n  quit|exit                                     Exit"
    );
}

fn parse_date(raw: &str) -> Result<NaiveDate, Box<dyn Error>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| "Invalid date (YYYY-MM-DD)".into())
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, Box<dyn Error>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|_| "Invalid date-time (YYYY-MM-DDTHH:MM)".into())
}

fn parse_id(raw: &str) -> Result<i64, Box<dyn Error>> {
    raw.parse().map_err(|_| format!("Invalid id '{raw}'").into())
}

fn parse_week(raw: &str) -> Result<WeekNumber, Box<dyn Error>> {
    let value: u8 = raw.parse().map_err(|_| format!("Invalid week '{raw}' (1|2)"))?;
    Ok(WeekNumber::try_from(value)?)
}

fn parse_day(raw: &str) -> Result<Weekday, Box<dyn Error>> {
    raw.parse::<Weekday>()
        .map_err(|_| format!("Invalid day '{raw}' (Mon..Sun)").into())
}

fn rest(args: &[&str], from: usize) -> String {
    args.get(from..).map(|words| words.join(" ")).unwrap_or_default()
}

fn render_slot(slot: &TimetableSlot) -> String {
    let mut line = format!(
        "#{} {} week {} {}-{}",
        slot.id, slot.day_of_week, slot.week_number, slot.start_time, slot.end_time
    );
    if !slot.label.is_empty() {
        line.push(' ');
        line.push_str(&slot.label);
    }
    line
}

impl Session {
    fn slots(&self) -> TimetableSlotRegistry<'_> {
        TimetableSlotRegistry::new(&self.store).with_preview_limit(self.config.preview_limit)
    }

    fn years(&self) -> AcademicYearRegistry<'_> {
        AcademicYearRegistry::new(&self.store)
    }

    fn active_calendar(&self) -> Result<timetable_tool::AcademicYearCalendar, Box<dyn Error>> {
        self.years()
            .active_calendar(self.user)?
            .ok_or_else(|| "No active academic year; use 'year add' first".into())
    }

    fn year(&self, args: &[&str]) -> CmdResult {
        match args {
            ["add", start, end, cycle, ..] => {
                let mut input =
                    AcademicYearInput::new(parse_date(start)?, parse_date(end)?, parse_date(cycle)?);
                input.name = rest(args, 4);
                input.is_active = true;
                let year = self.years().create_year(self.user, input)?;
                Ok(format!("Academic year {} created and active.", year.id))
            }
            ["list"] => {
                let years = self.years().list_years(self.user)?;
                if years.is_empty() {
                    return Ok("No academic years.".to_string());
                }
                Ok(years
                    .iter()
                    .map(|year| {
                        format!(
                            "#{} {} {}..{} cycle from {}{}",
                            year.id,
                            year.name,
                            year.start_date,
                            year.end_date,
                            year.week_cycle_start_date,
                            if year.is_active { " (active)" } else { "" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ["activate", id] => {
                let year = self.years().activate(self.user, parse_id(id)?)?;
                Ok(format!("Academic year {} is now active.", year.id))
            }
            ["skip", id, flag] => {
                let skip = match *flag {
                    "on" => true,
                    "off" => false,
                    _ => return Err("Usage: year skip <id> <on|off>".into()),
                };
                let year = self.years().get_year(self.user, parse_id(id)?)?;
                let mut input = AcademicYearInput::new(
                    year.start_date,
                    year.end_date,
                    year.week_cycle_start_date,
                );
                input.name = year.name;
                input.is_active = year.is_active;
                input.skip_holiday_weeks = skip;
                let year = self.years().update_year(self.user, year.id, input)?;
                Ok(format!(
                    "Academic year {} week cycle: {:?}.",
                    year.id,
                    year.cycle_mode()
                ))
            }
            _ => Err("Usage: year add <start> <end> <cycle_start> [name] | year list | year activate <id> | year skip <id> <on|off>".into()),
        }
    }

    fn week(&self, args: &[&str]) -> CmdResult {
        let [date] = args else {
            return Err("Usage: week <YYYY-MM-DD>".into());
        };
        let date = parse_date(date)?;
        let calendar = self.active_calendar()?;
        Ok(match calendar.week_number(date) {
            Some(week) => format!("{date} is in Week {week}."),
            None => format!("{date} is outside the active academic year."),
        })
    }

    fn schoolday(&self, args: &[&str]) -> CmdResult {
        let [date] = args else {
            return Err("Usage: schoolday <YYYY-MM-DD>".into());
        };
        let date = parse_date(date)?;
        let calendar = self.active_calendar()?;
        if calendar.is_school_day(date) {
            return Ok(format!("{date} is a school day."));
        }
        let reasons: Vec<String> = calendar
            .holidays_on(date)
            .map(|holiday| format!("{} ({})", holiday.name, holiday.holiday_type))
            .collect();
        if reasons.is_empty() {
            Ok(format!("{date} is not a school day."))
        } else {
            Ok(format!("{date} is not a school day: {}.", reasons.join(", ")))
        }
    }

    fn holiday(&self, args: &[&str]) -> CmdResult {
        match args {
            ["add", year_id, start, end, kind, ..] => {
                let kind: HolidayType = kind.parse()?;
                let mut input =
                    HolidayInput::new(parse_id(year_id)?, parse_date(start)?, parse_date(end)?, kind);
                input.name = rest(args, 5);
                let written = self.years().create_holiday(self.user, input)?;
                Ok(format!(
                    "Holiday {} saved; {} lesson(s) removed.",
                    written.holiday.id, written.deleted_lessons_count
                ))
            }
            ["list", year_id] => {
                let holidays = self.years().list_holidays(self.user, parse_id(year_id)?)?;
                if holidays.is_empty() {
                    return Ok("No holidays.".to_string());
                }
                Ok(holidays
                    .iter()
                    .map(|holiday| {
                        format!(
                            "#{} {} {}..{} {}",
                            holiday.id,
                            holiday.holiday_type,
                            holiday.start_date,
                            holiday.end_date,
                            holiday.name
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            _ => Err("Usage: holiday add <year_id> <start> <end> <type> [name] | holiday list <year_id>".into()),
        }
    }

    fn slot(&self, args: &[&str]) -> CmdResult {
        match args {
            ["add", day, week, start, end, ..] => {
                let input = SlotInput::new(parse_day(day)?, parse_week(week)?, *start, *end)
                    .with_label(rest(args, 5));
                let slot = self.slots().create(self.user, input)?;
                Ok(format!("Slot created: {}", render_slot(&slot)))
            }
            ["bulk", days, weeks, start, end, ..] => {
                let days = days
                    .split(',')
                    .map(|day| parse_day(day.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                let weeks = weeks
                    .split(',')
                    .map(|week| parse_week(week.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                let template = SlotInput::new(Weekday::Mon, WeekNumber::One, *start, *end)
                    .with_label(rest(args, 5));
                let report = self.slots().create_bulk(self.user, &days, &weeks, template)?;
                Ok(format!(
                    "Created {} slot(s), skipped {} existing.",
                    report.created.len(),
                    report.skipped.len()
                ))
            }
            ["list"] => {
                let slots = self.slots().list(self.user)?;
                if slots.is_empty() {
                    return Ok("No slots.".to_string());
                }
                Ok(slots.iter().map(render_slot).collect::<Vec<_>>().join("\n"))
            }
            ["list", date] => {
                let date = parse_date(date)?;
                let calendar = self.active_calendar()?;
                let slots = self.slots().list_for_date(self.user, date, &calendar)?;
                if slots.is_empty() {
                    return Ok(format!("No slots run on {date}."));
                }
                Ok(slots.iter().map(render_slot).collect::<Vec<_>>().join("\n"))
            }
            ["deps", id] => {
                let preview = self.slots().dependencies(self.user, parse_id(id)?)?;
                let mut out = format!(
                    "Slot {}: {} lesson(s), {} entry, {} activity.",
                    preview.slot_id,
                    preview.lessons_count,
                    preview.entries_count,
                    preview.activities_count
                );
                for lesson in &preview.lessons {
                    out.push_str(&format!("\n  lesson #{} {} {}", lesson.id, lesson.date, lesson.title));
                }
                Ok(out)
            }
            ["delete", id] | ["delete", id, "force"] => {
                let id = parse_id(id)?;
                let force = args.len() == 3;
                match self.slots().delete(self.user, id, force) {
                    Ok(deleted) => Ok(format!(
                        "Slot {} deleted with {} lesson(s), {} entry, {} activity.",
                        deleted.slot_id,
                        deleted.deleted_lessons,
                        deleted.deleted_entries,
                        deleted.deleted_activities
                    )),
                    Err(TimetableError::DeleteBlocked(preview)) => Ok(format!(
                        "Slot {} has dependents: {} lesson(s), {} entry, {} activity. Use 'slot delete {} force'.",
                        preview.slot_id,
                        preview.lessons_count,
                        preview.entries_count,
                        preview.activities_count,
                        preview.slot_id
                    )),
                    Err(err) => Err(err.into()),
                }
            }
            _ => Err("Usage: slot add|bulk|list|deps|delete ... (see help)".into()),
        }
    }

    fn lesson(&self, args: &[&str]) -> CmdResult {
        let ["add", slot_id, date, _, ..] = args else {
            return Err("Usage: lesson add <slot_id> <YYYY-MM-DD> <title>".into());
        };
        let input = LessonInput::new(parse_id(slot_id)?, parse_date(date)?, rest(args, 3));
        let lesson = LessonRegistry::new(&self.store).create_lesson(self.user, input)?;
        Ok(format!("Lesson {} created on {}.", lesson.id, lesson.date))
    }

    fn entry(&self, args: &[&str]) -> CmdResult {
        let ["set", slot_id, class, subject, ..] = args else {
            return Err("Usage: entry set <slot_id> <class> <subject> [room]".into());
        };
        let mut input = TimetableEntryInput::new(*class, *subject);
        input.room = args.get(4).map(|room| room.to_string());
        let entry = LessonRegistry::new(&self.store).set_entry(self.user, parse_id(slot_id)?, input)?;
        Ok(format!("Entry {} set on slot {}.", entry.id, entry.slot_id))
    }

    fn event(&self, args: &[&str]) -> CmdResult {
        let events = EventRegistry::new(&self.store);
        match args {
            ["add", kind, start, end, until, _, ..] => {
                let kind: RecurrenceType = kind.parse()?;
                let until = match *until {
                    "-" => None,
                    raw => Some(parse_date(raw)?),
                };
                let input = EventInput::recurring(
                    rest(args, 5),
                    parse_datetime(start)?,
                    parse_datetime(end)?,
                    kind,
                    until,
                );
                let event = events.create(self.user, input)?;
                Ok(format!("Event {} created.", event.id))
            }
            ["expand", id] | ["expand", id, _] => {
                let id = parse_id(id)?;
                let horizon = match args.get(2) {
                    Some(raw) => {
                        let start = events.get(self.user, id)?.start_time.date();
                        Some(self.config.clamp_horizon(start, parse_date(raw)?))
                    }
                    None => None,
                };
                let occurrences = match events.expand(self.user, id, horizon) {
                    Err(TimetableError::Recurrence(RecurrenceError::Unbounded)) => {
                        let event = events.get(self.user, id)?;
                        let fallback = self.config.fallback_horizon(event.start_time.date());
                        events.expand(self.user, id, Some(fallback))?
                    }
                    other => other?,
                };
                if occurrences.is_empty() {
                    return Ok("No occurrences.".to_string());
                }
                Ok(occurrences
                    .iter()
                    .map(|occurrence| {
                        format!(
                            "{} {}-{}",
                            occurrence.date,
                            occurrence.start_time.format("%H:%M"),
                            occurrence.end_time.format("%H:%M")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            _ => Err("Usage: event add <type> <start> <end> <until|-> <title> | event expand <id> [horizon]".into()),
        }
    }

    fn calendar(&self, args: &[&str]) -> CmdResult {
        match args {
            ["save", year_id, path] => {
                let calendar = self.years().calendar(self.user, parse_id(year_id)?)?;
                save_calendar_to_json(&calendar, path)?;
                Ok(format!("Calendar saved to {path}."))
            }
            ["load", path] => {
                let calendar = load_calendar_from_json(path)?;
                let stored = self.years().import_calendar(self.user, &calendar)?;
                Ok(format!(
                    "Calendar imported as academic year {} with {} holiday(s).",
                    stored.year().id,
                    stored.holidays().len()
                ))
            }
            _ => Err("Usage: calendar save <year_id> <path> | calendar load <path>".into()),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = TimetableConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_writer(io::stderr)
        .init();

    let store = SqliteTimetableStore::new(&config.database_path)?;
    let session = Session {
        store,
        user: config.user(),
        config,
    };

    println!("Timetable Tool (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let words: Vec<&str> = input.split_whitespace().collect();
        let (cmd, args) = (words[0], &words[1..]);
        let result = match cmd {
            "help" => {
                print_help();
                continue;
            }
            "quit" | "exit" => break,
            "year" => session.year(args),
            "week" => session.week(args),
            "schoolday" => session.schoolday(args),
            "holiday" => session.holiday(args),
            "slot" => session.slot(args),
            "lesson" => session.lesson(args),
            "entry" => session.entry(args),
            "event" => session.event(args),
            "calendar" => session.calendar(args),
            other => {
                println!("Unknown command '{other}'; type 'help' for commands");
                continue;
            }
        };
        match result {
            Ok(message) => println!("{message}"),
            Err(e) => println!("Error: {e}"),
        }
    }
    Ok(())
}
