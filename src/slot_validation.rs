use regex::Regex;
use std::sync::LazyLock;

use crate::error::{TimetableError, TimetableResult};
use crate::slot::SlotInput;

pub const MAX_LABEL_LEN: usize = 100;

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex"));

/// Strict 24-hour `HH:MM`; `9:00`, `24:00` and `09:00:00` are all rejected.
pub fn is_valid_time(value: &str) -> bool {
    TIME_PATTERN.is_match(value)
}

fn validate_time(field: &'static str, value: &str) -> TimetableResult<()> {
    if value.is_empty() {
        return Err(TimetableError::validation(field, "is required"));
    }
    if !is_valid_time(value) {
        return Err(TimetableError::validation(
            field,
            format!("'{value}' is not a 24-hour HH:MM time"),
        ));
    }
    Ok(())
}

pub fn validate_slot(input: &SlotInput) -> TimetableResult<()> {
    validate_time("startTime", &input.start_time)?;
    validate_time("endTime", &input.end_time)?;
    // Zero-padded times compare correctly as strings.
    if input.end_time <= input.start_time {
        return Err(TimetableError::validation(
            "endTime",
            format!(
                "end time {} must be after start time {}",
                input.end_time, input.start_time
            ),
        ));
    }
    if input.label.chars().count() > MAX_LABEL_LEN {
        return Err(TimetableError::validation(
            "label",
            format!("must be at most {MAX_LABEL_LEN} characters"),
        ));
    }
    Ok(())
}
