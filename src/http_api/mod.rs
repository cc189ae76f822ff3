use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::{
    AcademicYear, AcademicYearCalendar, AcademicYearInput, AcademicYearRegistry, BulkCreateReport,
    DependencyPreview, Event, EventInput, EventRegistry, Holiday, HolidayInput, HolidayWrite,
    Lesson, LessonInput, LessonRegistry, Occurrence, RecurrenceError, SlotDeletion, SlotInput,
    SqliteTimetableStore, TimetableActivity, TimetableActivityInput, TimetableConfig,
    TimetableEntry, TimetableEntryInput, TimetableError, TimetableSlot, TimetableSlotRegistry,
    UserId, WeekNumber,
};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    store: Arc<SqliteTimetableStore>,
    config: Arc<TimetableConfig>,
}

impl AppState {
    pub fn new(store: SqliteTimetableStore, config: TimetableConfig) -> Self {
        Self::with_shared(Arc::new(store), config)
    }

    pub fn with_shared(store: Arc<SqliteTimetableStore>, config: TimetableConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    fn slots(&self) -> TimetableSlotRegistry<'_> {
        TimetableSlotRegistry::new(&self.store).with_preview_limit(self.config.preview_limit)
    }

    fn years(&self) -> AcademicYearRegistry<'_> {
        AcademicYearRegistry::new(&self.store)
    }

    fn lessons(&self) -> LessonRegistry<'_> {
        LessonRegistry::new(&self.store)
    }

    fn events(&self) -> EventRegistry<'_> {
        EventRegistry::new(&self.store)
    }

    fn active_calendar(&self, user: UserId) -> Result<AcademicYearCalendar, ApiError> {
        self.years()
            .active_calendar(user)?
            .ok_or_else(|| ApiError::NotFound("no active academic year".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<DependencyPreview>,
}

#[derive(Debug)]
enum ApiError {
    Unauthorized(String),
    Invalid(String),
    Conflict(String),
    HasDependencies(String, Box<DependencyPreview>),
    NotFound(String),
    Internal(String),
}

impl From<TimetableError> for ApiError {
    fn from(value: TimetableError) -> Self {
        let message = value.to_string();
        match value {
            TimetableError::Validation { .. } | TimetableError::Recurrence(_) => {
                ApiError::Invalid(message)
            }
            TimetableError::Conflict { .. } => ApiError::Conflict(message),
            TimetableError::DeleteBlocked(preview) => ApiError::HasDependencies(message, preview),
            TimetableError::NotFound { .. } => ApiError::NotFound(message),
            TimetableError::Persistence(err) => {
                error!(error = %err, "storage failure");
                ApiError::Internal("storage failure".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, dependencies) = match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message, None)
            }
            ApiError::Invalid(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message, None)
            }
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message, None),
            ApiError::HasDependencies(message, preview) => (
                StatusCode::CONFLICT,
                "has_dependencies",
                message,
                Some(*preview),
            ),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message, None),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                None,
            ),
        };
        let body = Json(ErrorBody {
            error,
            message,
            dependencies,
        });
        (status, body).into_response()
    }
}

fn current_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER} header")))?;
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .map(UserId)
        .ok_or_else(|| ApiError::Unauthorized(format!("invalid {USER_HEADER} header")))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendar/week-number", get(week_number))
        .route("/calendar/school-day", get(school_day))
        .route("/calendar/school-days", get(school_days))
        .route("/academic-years", get(list_years).post(create_year))
        .route(
            "/academic-years/:id",
            get(get_year).put(update_year).delete(delete_year),
        )
        .route("/academic-years/:id/activate", post(activate_year))
        .route(
            "/academic-years/:id/holidays",
            get(list_holidays).post(create_holiday),
        )
        .route(
            "/holidays/:id",
            get(get_holiday).put(update_holiday).delete(delete_holiday),
        )
        .route("/slots", get(list_slots).post(create_slot))
        .route("/slots/bulk", post(create_slots_bulk))
        .route(
            "/slots/:id",
            get(get_slot).put(update_slot).delete(delete_slot),
        )
        .route("/slots/:id/dependencies", get(slot_dependencies))
        .route(
            "/slots/:id/entry",
            get(get_entry).put(set_entry).delete(clear_entry),
        )
        .route(
            "/slots/:id/activity",
            get(get_activity).put(set_activity).delete(clear_activity),
        )
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route("/lessons/:id", get(get_lesson).delete(delete_lesson))
        .route("/events", get(list_events).post(create_event))
        .route("/events/:id", get(get_event).delete(delete_event))
        .route("/events/:id/occurrences", get(event_occurrences))
        .route("/events/:id/materialize", post(materialize_event))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    store: SqliteTimetableStore,
    config: TimetableConfig,
) -> std::io::Result<()> {
    let app = router(AppState::new(store, config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeekNumberResponse {
    date: NaiveDate,
    week_number: Option<WeekNumber>,
    academic_year_id: i64,
}

async fn week_number(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<WeekNumberResponse>, ApiError> {
    let user = current_user(&headers)?;
    let calendar = state.active_calendar(user)?;
    Ok(Json(WeekNumberResponse {
        date: query.date,
        week_number: calendar.week_number(query.date),
        academic_year_id: calendar.year().id,
    }))
}

async fn school_day(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers)?;
    let calendar = state.active_calendar(user)?;
    let holidays: Vec<&Holiday> = calendar.holidays_on(query.date).collect();
    Ok(Json(json!({
        "date": query.date,
        "isSchoolDay": calendar.is_school_day(query.date),
        "holidays": holidays,
    })))
}

async fn school_days(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<NaiveDate>>, ApiError> {
    let user = current_user(&headers)?;
    let calendar = state.active_calendar(user)?;
    Ok(Json(calendar.school_days_between(query.start, query.end)))
}

async fn list_years(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AcademicYear>>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().list_years(user)?))
}

async fn create_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<AcademicYearInput>,
) -> Result<(StatusCode, Json<AcademicYear>), ApiError> {
    let user = current_user(&headers)?;
    let year = state.years().create_year(user, input)?;
    Ok((StatusCode::CREATED, Json(year)))
}

async fn get_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AcademicYear>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().get_year(user, id)?))
}

async fn update_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<AcademicYearInput>,
) -> Result<Json<AcademicYear>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().update_year(user, id, input)?))
}

async fn delete_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    state.years().delete_year(user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_year(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AcademicYear>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().activate(user, id)?))
}

async fn list_holidays(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(year_id): Path<i64>,
) -> Result<Json<Vec<Holiday>>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().list_holidays(user, year_id)?))
}

async fn create_holiday(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(year_id): Path<i64>,
    Json(mut input): Json<HolidayInput>,
) -> Result<(StatusCode, Json<HolidayWrite>), ApiError> {
    let user = current_user(&headers)?;
    input.academic_year_id = year_id;
    let written = state.years().create_holiday(user, input)?;
    Ok((StatusCode::CREATED, Json(written)))
}

async fn get_holiday(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Holiday>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().get_holiday(user, id)?))
}

async fn update_holiday(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<HolidayInput>,
) -> Result<Json<HolidayWrite>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.years().update_holiday(user, id, input)?))
}

async fn delete_holiday(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    state.years().delete_holiday(user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SlotListQuery {
    date: Option<NaiveDate>,
}

async fn list_slots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SlotListQuery>,
) -> Result<Json<Vec<TimetableSlot>>, ApiError> {
    let user = current_user(&headers)?;
    let slots = match query.date {
        Some(date) => {
            let calendar = state.active_calendar(user)?;
            state.slots().list_for_date(user, date, &calendar)?
        }
        None => state.slots().list(user)?,
    };
    Ok(Json(slots))
}

async fn create_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SlotInput>,
) -> Result<(StatusCode, Json<TimetableSlot>), ApiError> {
    let user = current_user(&headers)?;
    let slot = state.slots().create(user, input)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkSlotPayload {
    days_of_week: Vec<Weekday>,
    week_numbers: Vec<WeekNumber>,
    start_time: String,
    end_time: String,
    #[serde(default)]
    label: String,
}

async fn create_slots_bulk(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BulkSlotPayload>,
) -> Result<(StatusCode, Json<BulkCreateReport>), ApiError> {
    let user = current_user(&headers)?;
    let day = payload.days_of_week.first().copied().unwrap_or(Weekday::Mon);
    let week = payload.week_numbers.first().copied().unwrap_or(WeekNumber::One);
    let template =
        SlotInput::new(day, week, payload.start_time, payload.end_time).with_label(payload.label);
    let report = state.slots().create_bulk(
        user,
        &payload.days_of_week,
        &payload.week_numbers,
        template,
    )?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn get_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<TimetableSlot>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.slots().get(user, id)?))
}

async fn update_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<SlotInput>,
) -> Result<Json<TimetableSlot>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.slots().update(user, id, input)?))
}

#[derive(Debug, Default, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    force: bool,
}

async fn delete_slot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<SlotDeletion>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.slots().delete(user, id, query.force)?))
}

async fn slot_dependencies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<DependencyPreview>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.slots().dependencies(user, id)?))
}

async fn get_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Result<Json<TimetableEntry>, ApiError> {
    let user = current_user(&headers)?;
    state
        .lessons()
        .entry(user, slot_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("slot {slot_id} has no timetable entry")))
}

async fn set_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
    Json(input): Json<TimetableEntryInput>,
) -> Result<(StatusCode, Json<TimetableEntry>), ApiError> {
    let user = current_user(&headers)?;
    let entry = state.lessons().set_entry(user, slot_id, input)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn clear_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    if !state.lessons().clear_entry(user, slot_id)? {
        return Err(ApiError::NotFound(format!(
            "slot {slot_id} has no timetable entry"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Result<Json<TimetableActivity>, ApiError> {
    let user = current_user(&headers)?;
    state
        .lessons()
        .activity(user, slot_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("slot {slot_id} has no activity")))
}

async fn set_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
    Json(input): Json<TimetableActivityInput>,
) -> Result<(StatusCode, Json<TimetableActivity>), ApiError> {
    let user = current_user(&headers)?;
    let activity = state.lessons().set_activity(user, slot_id, input)?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn clear_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slot_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    if !state.lessons().clear_activity(user, slot_id)? {
        return Err(ApiError::NotFound(format!("slot {slot_id} has no activity")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_lessons(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.lessons().lessons_between(user, query.start, query.end)?))
}

async fn create_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LessonInput>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    let user = current_user(&headers)?;
    let lesson = state.lessons().create_lesson(user, input)?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn get_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Lesson>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.lessons().get_lesson(user, id)?))
}

async fn delete_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    state.lessons().delete_lesson(user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Event>>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.events().list(user)?))
}

async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<EventInput>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let user = current_user(&headers)?;
    let event = state.events().create(user, input)?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
    let user = current_user(&headers)?;
    Ok(Json(state.events().get(user, id)?))
}

async fn delete_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&headers)?;
    state.events().delete(user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct HorizonQuery {
    horizon: Option<NaiveDate>,
}

/// Without an explicit horizon an otherwise unbounded event falls back to the
/// configured window from its first date.
fn fallback_horizon(state: &AppState, user: UserId, id: i64) -> Result<NaiveDate, ApiError> {
    let event = state.events().get(user, id)?;
    Ok(state.config.fallback_horizon(event.start_time.date()))
}

/// A requested horizon never reaches past the configured window.
fn requested_horizon(
    state: &AppState,
    user: UserId,
    id: i64,
    horizon: Option<NaiveDate>,
) -> Result<Option<NaiveDate>, ApiError> {
    let Some(horizon) = horizon else {
        return Ok(None);
    };
    let event = state.events().get(user, id)?;
    Ok(Some(state.config.clamp_horizon(event.start_time.date(), horizon)))
}

async fn event_occurrences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
    let user = current_user(&headers)?;
    let horizon = requested_horizon(&state, user, id, query.horizon)?;
    let occurrences = match state.events().expand(user, id, horizon) {
        Err(TimetableError::Recurrence(RecurrenceError::Unbounded)) => {
            let horizon = fallback_horizon(&state, user, id)?;
            state.events().expand(user, id, Some(horizon))?
        }
        other => other?,
    };
    Ok(Json(occurrences))
}

async fn materialize_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HorizonQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let user = current_user(&headers)?;
    let horizon = requested_horizon(&state, user, id, query.horizon)?;
    let children = match state.events().materialize(user, id, horizon) {
        Err(TimetableError::Recurrence(RecurrenceError::Unbounded)) => {
            let horizon = fallback_horizon(&state, user, id)?;
            state.events().materialize(user, id, Some(horizon))?
        }
        other => other?,
    };
    Ok(Json(children))
}
