use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{TimetableError, TimetableResult};
use crate::persistence::UserId;
use crate::persistence::queries;
use crate::persistence::sqlite::SqliteTimetableStore;

pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPreview {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub class_name: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPreview {
    pub id: i64,
    pub class_name: String,
    pub subject_name: String,
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPreview {
    pub id: i64,
    pub title: String,
}

/// What deleting a slot would remove. Counts are exact, lists are truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPreview {
    pub slot_id: i64,
    pub lessons_count: usize,
    pub entries_count: usize,
    pub activities_count: usize,
    pub lessons: Vec<LessonPreview>,
    pub entries: Vec<EntryPreview>,
    pub activities: Vec<ActivityPreview>,
}

impl DependencyPreview {
    pub fn is_empty(&self) -> bool {
        self.lessons_count == 0 && self.entries_count == 0 && self.activities_count == 0
    }
}

/// Rows removed by a completed slot delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDeletion {
    pub slot_id: i64,
    pub deleted_lessons: usize,
    pub deleted_entries: usize,
    pub deleted_activities: usize,
}

/// Decides whether a slot may be deleted and performs the cascade.
pub struct SlotDependencyResolver<'a> {
    store: &'a SqliteTimetableStore,
    preview_limit: usize,
}

impl<'a> SlotDependencyResolver<'a> {
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

    /// Dependents of a slot owned by `user`, without changing anything.
    pub fn preview(&self, user: UserId, slot_id: i64) -> TimetableResult<DependencyPreview> {
        self.store.read(|conn| {
            if queries::get_slot(conn, user, slot_id)?.is_none() {
                return Err(TimetableError::not_found("slot", slot_id));
            }
            collect(conn, user, slot_id, self.preview_limit)
        })
    }

    /// Deletes the slot.
    ///
    /// Without `force`, a slot with dependents is left untouched and the
    /// preview comes back as [`TimetableError::DeleteBlocked`]. With `force`,
    /// lessons, the entry, the activity and the slot are removed in one
    /// immediate transaction that also holds the dependency scan, so a lesson
    /// inserted concurrently either blocks on the lock or is seen and removed.
    #[instrument(skip(self))]
    pub fn delete(&self, user: UserId, slot_id: i64, force: bool) -> TimetableResult<SlotDeletion> {
        let deletion = self.store.write(|tx| {
            if queries::get_slot(tx, user, slot_id)?.is_none() {
                return Err(TimetableError::not_found("slot", slot_id));
            }
            let preview = collect(tx, user, slot_id, self.preview_limit)?;
            if !preview.is_empty() && !force {
                debug!(
                    lessons = preview.lessons_count,
                    entries = preview.entries_count,
                    activities = preview.activities_count,
                    "slot delete blocked by dependents"
                );
                return Err(TimetableError::DeleteBlocked(Box::new(preview)));
            }
            let deleted_lessons = queries::delete_lessons_for_slot(tx, user, slot_id)?;
            let deleted_entries = queries::delete_entry_for_slot(tx, user, slot_id)?;
            let deleted_activities = queries::delete_activity_for_slot(tx, user, slot_id)?;
            if !queries::delete_slot(tx, user, slot_id)? {
                return Err(TimetableError::not_found("slot", slot_id));
            }
            Ok(SlotDeletion {
                slot_id,
                deleted_lessons,
                deleted_entries,
                deleted_activities,
            })
        })?;
        info!(
            slot_id,
            lessons = deletion.deleted_lessons,
            entries = deletion.deleted_entries,
            activities = deletion.deleted_activities,
            "slot deleted"
        );
        Ok(deletion)
    }
}

fn collect(
    conn: &Connection,
    user: UserId,
    slot_id: i64,
    limit: usize,
) -> TimetableResult<DependencyPreview> {
    let lessons_count = queries::count_lessons_for_slot(conn, user, slot_id)?;
    let lessons = queries::lessons_for_slot(conn, user, slot_id, limit)?
        .into_iter()
        .map(|lesson| LessonPreview {
            id: lesson.id,
            title: lesson.title,
            date: lesson.date,
            class_name: lesson.class_name,
            subject_name: lesson.subject_name,
        })
        .collect();
    let entries: Vec<EntryPreview> = queries::entry_for_slot(conn, user, slot_id)?
        .into_iter()
        .map(|entry| EntryPreview {
            id: entry.id,
            class_name: entry.class_name,
            subject_name: entry.subject_name,
            room: entry.room,
        })
        .collect();
    let activities: Vec<ActivityPreview> = queries::activity_for_slot(conn, user, slot_id)?
        .into_iter()
        .map(|activity| ActivityPreview {
            id: activity.id,
            title: activity.title,
        })
        .collect();
    Ok(DependencyPreview {
        slot_id,
        lessons_count,
        entries_count: entries.len(),
        activities_count: activities.len(),
        lessons,
        entries,
        activities,
    })
}
