use super::PersistenceResult;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS academic_years (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        week_cycle_start_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        skip_holiday_weeks INTEGER NOT NULL DEFAULT 0,
        CHECK (start_date <= end_date),
        CHECK (week_cycle_start_date BETWEEN start_date AND end_date)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS academic_years_one_active
        ON academic_years (user_id) WHERE is_active = 1;

    CREATE TABLE IF NOT EXISTS holidays (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        academic_year_id INTEGER NOT NULL
            REFERENCES academic_years (id) ON DELETE CASCADE,
        name TEXT NOT NULL DEFAULT '',
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        holiday_type TEXT NOT NULL,
        CHECK (start_date <= end_date)
    );
    CREATE INDEX IF NOT EXISTS holidays_by_year ON holidays (user_id, academic_year_id);

    CREATE TABLE IF NOT EXISTS timetable_slots (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
        week_number INTEGER NOT NULL CHECK (week_number IN (1, 2)),
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        label TEXT NOT NULL DEFAULT '',
        CHECK (start_time < end_time),
        UNIQUE (user_id, day_of_week, week_number, start_time, end_time)
    );

    CREATE TABLE IF NOT EXISTS timetable_entries (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        slot_id INTEGER NOT NULL UNIQUE REFERENCES timetable_slots (id),
        class_name TEXT NOT NULL,
        subject_name TEXT NOT NULL,
        room TEXT
    );

    CREATE TABLE IF NOT EXISTS timetable_activities (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        slot_id INTEGER NOT NULL UNIQUE REFERENCES timetable_slots (id),
        title TEXT NOT NULL,
        notes TEXT
    );

    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        slot_id INTEGER NOT NULL REFERENCES timetable_slots (id),
        date TEXT NOT NULL,
        title TEXT NOT NULL,
        class_name TEXT NOT NULL DEFAULT '',
        subject_name TEXT NOT NULL DEFAULT '',
        UNIQUE (slot_id, date)
    );
    CREATE INDEX IF NOT EXISTS lessons_by_date ON lessons (user_id, date);

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        is_recurring INTEGER NOT NULL DEFAULT 0,
        recurrence_type TEXT,
        recurrence_end_date TEXT,
        parent_event_id INTEGER REFERENCES events (id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS events_by_parent ON events (user_id, parent_event_id);
"#;

/// SQLite-backed relational store shared by all registries.
///
/// Dependents reference slots without `ON DELETE CASCADE`, so the database
/// itself refuses a slot delete that would orphan lessons or assignments.
pub struct SqliteTimetableStore {
    connection: Mutex<Connection>,
}

impl SqliteTimetableStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        connection.busy_timeout(BUSY_TIMEOUT)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;
        debug!("timetable schema ready");
        Ok(())
    }

    /// Runs `f` against the connection outside any explicit transaction.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.connection.lock();
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// The write lock is taken before `f` starts, so reads made inside `f`
    /// cannot be invalidated by another writer before commit. The transaction
    /// commits only when `f` returns `Ok`; any error or early return drops it
    /// uncommitted, which rolls back every statement `f` executed.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.connection.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_expected_tables() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let tables: Vec<String> = store
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()
            })
            .unwrap();
        for expected in [
            "academic_years",
            "events",
            "holidays",
            "lessons",
            "timetable_activities",
            "timetable_entries",
            "timetable_slots",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn failed_write_rolls_back() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let result: Result<(), rusqlite::Error> = store.write(|tx| {
            tx.execute(
                "INSERT INTO timetable_slots (user_id, day_of_week, week_number, start_time, end_time)
                 VALUES (1, 0, 1, '09:00', '10:00')",
                [],
            )?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());
        let count: i64 = store
            .read(|conn| conn.query_row("SELECT COUNT(*) FROM timetable_slots", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_block_orphaning_lessons() {
        let store = SqliteTimetableStore::in_memory().unwrap();
        let result: Result<(), rusqlite::Error> = store.write(|tx| {
            tx.execute(
                "INSERT INTO timetable_slots (id, user_id, day_of_week, week_number, start_time, end_time)
                 VALUES (1, 1, 0, 1, '09:00', '10:00')",
                [],
            )?;
            tx.execute(
                "INSERT INTO lessons (user_id, slot_id, date, title) VALUES (1, 1, '2024-09-02', 'L')",
                [],
            )?;
            tx.execute("DELETE FROM timetable_slots WHERE id = 1", [])?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
