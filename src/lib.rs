pub mod academic_registry;
pub mod academic_year;
pub mod calendar;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod event;
pub mod event_registry;
pub mod holiday;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod lesson;
pub mod lesson_registry;
pub mod persistence;
pub mod recurrence;
pub mod registry;
pub mod slot;
pub(crate) mod slot_validation;

pub use academic_registry::{AcademicYearRegistry, HolidayWrite};
pub use academic_year::{AcademicYear, AcademicYearInput, WeekCycleMode};
pub use calendar::{
    AcademicYearCalendar, academic_year_for_date, is_school_day,
    is_week_fully_covered_by_holidays, school_days_between, week_number_for_date,
};
pub use config::{ConfigError, TimetableConfig};
pub use dependencies::{
    DependencyPreview, EntryPreview, LessonPreview, ActivityPreview, SlotDeletion,
    SlotDependencyResolver,
};
pub use error::{TimetableError, TimetableResult};
pub use event::{Event, EventInput, RecurrenceType};
pub use event_registry::EventRegistry;
pub use holiday::{Holiday, HolidayInput, HolidayType};
pub use lesson::{
    Lesson, LessonInput, TimetableActivity, TimetableActivityInput, TimetableEntry,
    TimetableEntryInput,
};
pub use lesson_registry::LessonRegistry;
pub use persistence::sqlite::SqliteTimetableStore;
pub use persistence::{PersistenceError, PersistenceResult, UserId};
pub use recurrence::{Occurrence, Occurrences, RecurrenceError, RecurrenceExpansion, expand};
pub use registry::{BulkCreateReport, SkippedSlot, TimetableSlotRegistry};
pub use slot::{SlotInput, TimetableSlot, WeekNumber};
