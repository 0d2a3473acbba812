use std::path::Path;
use std::time::{Duration, Instant};

use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::import::categories::CategorySet;
use crate::import::normalize::{
    CanonicalRecord, DescriptiveRecord, McqRecord, DEFAULT_SUBTOPIC, DEFAULT_SUBTOPIC_2,
    DEFAULT_TOPIC,
};
use crate::import::{IdentityKey, RecordId, RecordStore, StorageError};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("quizbank.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS mcq_records(
            id TEXT PRIMARY KEY,
            bank TEXT NOT NULL,
            kind TEXT NOT NULL,
            question TEXT NOT NULL,
            day TEXT NOT NULL,
            option_1 TEXT NOT NULL,
            option_2 TEXT NOT NULL,
            option_3 TEXT,
            option_4 TEXT,
            option_5 TEXT,
            ans INTEGER NOT NULL,
            chapter INTEGER,
            difficulty TEXT,
            extra TEXT NOT NULL DEFAULT '',
            year_exam TEXT NOT NULL DEFAULT '',
            topic TEXT NOT NULL,
            subtopic TEXT NOT NULL,
            subtopic_2 TEXT NOT NULL,
            home INTEGER NOT NULL DEFAULT 0,
            mocktest INTEGER NOT NULL DEFAULT 0,
            is_live INTEGER NOT NULL DEFAULT 1,
            categories TEXT NOT NULL DEFAULT '{}',
            year_now TEXT NOT NULL,
            month TEXT NOT NULL,
            creation_time TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(question, day)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mcq_records_bank_day ON mcq_records(bank, day)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS descriptive_records(
            id TEXT PRIMARY KEY,
            upper_heading TEXT NOT NULL,
            yellow_heading TEXT NOT NULL,
            day TEXT NOT NULL,
            key_1 TEXT NOT NULL DEFAULT '',
            key_2 TEXT NOT NULL DEFAULT '',
            key_3 TEXT NOT NULL DEFAULT '',
            key_4 TEXT NOT NULL DEFAULT '',
            all_key_points TEXT NOT NULL DEFAULT '',
            paragraph TEXT NOT NULL DEFAULT '',
            link TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            categories TEXT NOT NULL DEFAULT '{}',
            year_now TEXT NOT NULL,
            month TEXT NOT NULL,
            creation_time TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(upper_heading, yellow_heading, day)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_descriptive_records_day ON descriptive_records(day)",
        [],
    )?;

    Ok(conn)
}

fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Column assignments for one write. On insert, fields the record leaves out
/// fall back to their defaults; on update they are skipped.
struct Columns {
    creating: bool,
    cols: Vec<(&'static str, SqlValue)>,
}

impl Columns {
    fn new(creating: bool) -> Self {
        Columns {
            creating,
            cols: Vec::new(),
        }
    }

    fn set(&mut self, name: &'static str, v: SqlValue) {
        self.cols.push((name, v));
    }

    fn opt(&mut self, name: &'static str, v: Option<SqlValue>, default: SqlValue) {
        match v {
            Some(v) => self.set(name, v),
            None if self.creating => self.set(name, default),
            None => {}
        }
    }
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

fn flag(b: bool) -> SqlValue {
    SqlValue::Integer(i64::from(b))
}

fn categories_json(set: &CategorySet) -> SqlValue {
    SqlValue::Text(set.to_flags().to_string())
}

const OPTION_COLUMNS: [&str; 5] = ["option_1", "option_2", "option_3", "option_4", "option_5"];
const KEY_COLUMNS: [&str; 4] = ["key_1", "key_2", "key_3", "key_4"];

fn mcq_columns(m: &McqRecord, creating: bool) -> Columns {
    let mut c = Columns::new(creating);
    c.set("bank", text(&m.bank));
    c.set("kind", text(m.kind.as_str()));
    c.set("question", text(&m.question));
    c.set("day", text(&m.date.day_string()));
    for (i, col) in OPTION_COLUMNS.into_iter().enumerate() {
        c.opt(col, m.options.get(i).map(|o| text(o)), SqlValue::Null);
    }
    c.set("ans", SqlValue::Integer(i64::from(m.answer)));
    c.opt("chapter", m.chapter.map(|n| SqlValue::Integer(i64::from(n))), SqlValue::Null);
    c.opt("difficulty", m.difficulty.map(|d| text(d.as_str())), SqlValue::Null);
    c.opt("extra", m.explanation.as_deref().map(text), text(""));
    c.opt("year_exam", m.year_exam.as_deref().map(text), text(""));
    c.opt("topic", m.topic.as_deref().map(text), text(DEFAULT_TOPIC));
    c.opt("subtopic", m.subtopic.as_deref().map(text), text(DEFAULT_SUBTOPIC));
    c.opt("subtopic_2", m.subtopic_2.as_deref().map(text), text(DEFAULT_SUBTOPIC_2));
    c.opt("home", m.home.map(flag), flag(false));
    c.opt("mocktest", m.mocktest.map(flag), flag(false));
    c.opt("is_live", m.is_live.map(flag), flag(true));
    c.set("categories", categories_json(&m.categories));
    c.set("year_now", text(&m.date.year_now));
    c.set("month", text(m.date.month));
    c.set("creation_time", text(&m.date.time_string()));
    c
}

fn descriptive_columns(d: &DescriptiveRecord, creating: bool) -> Columns {
    let mut c = Columns::new(creating);
    c.set("upper_heading", text(&d.upper_heading));
    c.set("yellow_heading", text(&d.yellow_heading));
    c.set("day", text(&d.date.day_string()));
    for (col, kp) in KEY_COLUMNS.into_iter().zip(d.key_points.iter()) {
        c.opt(col, kp.as_deref().map(text), text(""));
    }
    c.opt("all_key_points", d.all_key_points.as_deref().map(text), text(""));
    c.opt("paragraph", d.paragraph.as_deref().map(text), text(""));
    c.opt("link", d.link.as_deref().map(text), text(""));
    c.opt("url", d.url.as_deref().map(text), text(""));
    c.set("categories", categories_json(&d.categories));
    c.set("year_now", text(&d.date.year_now));
    c.set("month", text(d.date.month));
    c.set("creation_time", text(&d.date.time_string()));
    c
}

fn table_and_columns(record: &CanonicalRecord, creating: bool) -> (&'static str, Columns) {
    match record {
        CanonicalRecord::Mcq(m) => ("mcq_records", mcq_columns(m, creating)),
        CanonicalRecord::Descriptive(d) => ("descriptive_records", descriptive_columns(d, creating)),
    }
}

/// `RecordStore` over a workspace connection. Every storage call is bounded by
/// `timeout`: lock waits through SQLite's busy handler, whole upserts by
/// elapsed time.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
    timeout: Duration,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection, timeout: Duration) -> Result<Self, StorageError> {
        let store = SqliteStore { conn, timeout };
        conn.busy_timeout(timeout)
            .map_err(|e| store.storage_err(e))?;
        Ok(store)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn storage_err(&self, e: rusqlite::Error) -> StorageError {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Timeout(self.timeout_ms())
            }
            _ => StorageError::Unavailable(e.to_string()),
        }
    }
}

impl RecordStore for SqliteStore<'_> {
    fn find_by_identity_key(&mut self, key: &IdentityKey) -> Result<Option<RecordId>, StorageError> {
        let found = match key {
            IdentityKey::Mcq { question, day } => self
                .conn
                .query_row(
                    "SELECT id FROM mcq_records WHERE question = ? AND day = ?",
                    (question, day.format("%Y-%m-%d").to_string()),
                    |r| r.get::<_, String>(0),
                )
                .optional(),
            IdentityKey::Descriptive {
                upper_heading,
                yellow_heading,
                day,
            } => self
                .conn
                .query_row(
                    "SELECT id FROM descriptive_records
                     WHERE upper_heading = ? AND yellow_heading = ? AND day = ?",
                    (upper_heading, yellow_heading, day.format("%Y-%m-%d").to_string()),
                    |r| r.get::<_, String>(0),
                )
                .optional(),
        };
        found.map_err(|e| self.storage_err(e))
    }

    fn insert(&mut self, record: &CanonicalRecord) -> Result<RecordId, StorageError> {
        let id = Uuid::new_v4().to_string();
        let (table, mut c) = table_and_columns(record, true);
        c.set("id", text(&id));
        c.set("created_at", text(&now_string()));

        let names: Vec<&str> = c.cols.iter().map(|(n, _)| *n).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            table,
            names.join(", "),
            placeholders
        );
        self.conn
            .execute(&sql, params_from_iter(c.cols.into_iter().map(|(_, v)| v)))
            .map_err(|e| self.storage_err(e))?;
        Ok(id)
    }

    fn update(&mut self, id: &RecordId, record: &CanonicalRecord) -> Result<(), StorageError> {
        let (table, mut c) = table_and_columns(record, false);
        c.set("updated_at", text(&now_string()));

        let assignments = c
            .cols
            .iter()
            .map(|(n, _)| format!("{} = ?", n))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments);
        let mut values: Vec<SqlValue> = c.cols.into_iter().map(|(_, v)| v).collect();
        values.push(text(id));

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| self.storage_err(e))?;
        if changed == 0 {
            return Err(StorageError::Unavailable(format!("record {} vanished during update", id)));
        }
        Ok(())
    }

    fn atomically<T, F>(&mut self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Self) -> Result<T, StorageError>,
    {
        let started = Instant::now();
        let conn = self.conn;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|e| self.storage_err(e))?;

        let out = match f(self) {
            Ok(_) if started.elapsed() > self.timeout => Err(StorageError::Timeout(self.timeout_ms())),
            other => other,
        };
        match out {
            Ok(v) => {
                tx.commit().map_err(|e| self.storage_err(e))?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

fn bool_col(v: i64) -> bool {
    v != 0
}

fn flags_col(s: &str) -> Value {
    let v: Value = serde_json::from_str(s).unwrap_or_else(|_| json!({}));
    CategorySet::from_flags(&v).to_flags()
}

fn mcq_row_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
    let options: Vec<Option<String>> = (0..5usize)
        .map(|i| row.get::<_, Option<String>>(5 + i))
        .collect::<Result<_, _>>()?;
    let categories: String = row.get(20)?;
    Ok(json!({
        "id": row.get::<_, String>(0)?,
        "bank": row.get::<_, String>(1)?,
        "kind": row.get::<_, String>(2)?,
        "question": row.get::<_, String>(3)?,
        "day": row.get::<_, String>(4)?,
        "options": options.into_iter().flatten().collect::<Vec<_>>(),
        "ans": row.get::<_, i64>(10)?,
        "chapter": row.get::<_, Option<i64>>(11)?,
        "difficulty": row.get::<_, Option<String>>(12)?,
        "extra": row.get::<_, String>(13)?,
        "yearExam": row.get::<_, String>(14)?,
        "topic": row.get::<_, String>(15)?,
        "subtopic": row.get::<_, String>(16)?,
        "subtopic2": row.get::<_, String>(17)?,
        "home": bool_col(row.get(18)?),
        "mocktest": bool_col(row.get(19)?),
        "isLive": bool_col(row.get(21)?),
        "categories": flags_col(&categories),
        "yearNow": row.get::<_, String>(22)?,
        "month": row.get::<_, String>(23)?,
        "creationTime": row.get::<_, String>(24)?,
        "createdAt": row.get::<_, String>(25)?,
        "updatedAt": row.get::<_, Option<String>>(26)?,
    }))
}

const MCQ_SELECT: &str = "SELECT id, bank, kind, question, day,
        option_1, option_2, option_3, option_4, option_5,
        ans, chapter, difficulty, extra, year_exam,
        topic, subtopic, subtopic_2, home, mocktest,
        categories, is_live, year_now, month, creation_time,
        created_at, updated_at
     FROM mcq_records";

pub fn mcq_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Value>> {
    conn.query_row(&format!("{} WHERE id = ?", MCQ_SELECT), [id], mcq_row_json)
        .optional()
}

pub fn mcq_list(
    conn: &Connection,
    bank: Option<&str>,
    day: Option<&str>,
) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, bank, kind, question, day, ans
         FROM mcq_records
         WHERE (?1 IS NULL OR bank = ?1) AND (?2 IS NULL OR day = ?2)
         ORDER BY day, created_at, rowid",
    )?;
    let rows = stmt.query_map((bank, day), |row| {
        Ok(json!({
            "id": row.get::<_, String>(0)?,
            "bank": row.get::<_, String>(1)?,
            "kind": row.get::<_, String>(2)?,
            "question": row.get::<_, String>(3)?,
            "day": row.get::<_, String>(4)?,
            "ans": row.get::<_, i64>(5)?,
        }))
    })?;
    rows.collect()
}

fn descriptive_row_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
    let key_points: Vec<String> = (0..4usize)
        .map(|i| row.get::<_, String>(4 + i))
        .collect::<Result<_, _>>()?;
    let categories: String = row.get(12)?;
    Ok(json!({
        "id": row.get::<_, String>(0)?,
        "upperHeading": row.get::<_, String>(1)?,
        "yellowHeading": row.get::<_, String>(2)?,
        "day": row.get::<_, String>(3)?,
        "keyPoints": key_points,
        "allKeyPoints": row.get::<_, String>(8)?,
        "paragraph": row.get::<_, String>(9)?,
        "link": row.get::<_, String>(10)?,
        "url": row.get::<_, String>(11)?,
        "categories": flags_col(&categories),
        "yearNow": row.get::<_, String>(13)?,
        "month": row.get::<_, String>(14)?,
        "creationTime": row.get::<_, String>(15)?,
        "createdAt": row.get::<_, String>(16)?,
        "updatedAt": row.get::<_, Option<String>>(17)?,
    }))
}

const DESCRIPTIVE_SELECT: &str = "SELECT id, upper_heading, yellow_heading, day,
        key_1, key_2, key_3, key_4,
        all_key_points, paragraph, link, url,
        categories, year_now, month, creation_time,
        created_at, updated_at
     FROM descriptive_records";

pub fn descriptive_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Value>> {
    conn.query_row(
        &format!("{} WHERE id = ?", DESCRIPTIVE_SELECT),
        [id],
        descriptive_row_json,
    )
    .optional()
}

pub fn descriptive_list(conn: &Connection, day: Option<&str>) -> rusqlite::Result<Vec<Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, upper_heading, yellow_heading, day
         FROM descriptive_records
         WHERE (?1 IS NULL OR day = ?1)
         ORDER BY day, created_at, rowid",
    )?;
    let rows = stmt.query_map([day], |row| {
        Ok(json!({
            "id": row.get::<_, String>(0)?,
            "upperHeading": row.get::<_, String>(1)?,
            "yellowHeading": row.get::<_, String>(2)?,
            "day": row.get::<_, String>(3)?,
        }))
    })?;
    rows.collect()
}
