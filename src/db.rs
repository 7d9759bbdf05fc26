use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

use crate::extract::{FieldMap, FIELD_KEYS};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("report database error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("field map is missing `{0}`")]
    MissingField(&'static str),
    #[error("update touched {0} rows, expected exactly 1")]
    RowCount(usize),
}

/// The report is one fixed row; the UPDATE below never inserts or deletes.
/// Column order mirrors `FIELD_KEYS`.
const UPDATE_SQL: &str = "UPDATE village_report SET
    weather_icon = ?1,
    village_temp = ?2,
    village_wind = ?3,
    village_visibility = ?4,
    today_weather_icon = ?5,
    tomorrow_weather_icon = ?6,
    next_day_weather_icon = ?7,
    today_high = ?8,
    today_low = ?9,
    tomorrow_high = ?10,
    tomorrow_low = ?11,
    next_day_high = ?12,
    next_day_low = ?13,
    todays_forecast_comment = ?14,
    updated_at = datetime('now')
 WHERE id = 1";

pub fn connect(path: &str, timeout_secs: u64) -> Result<Connection, PersistenceError> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(timeout_secs))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS village_report (
            id                      INTEGER PRIMARY KEY CHECK (id = 1),
            weather_icon            TEXT,
            village_temp            TEXT,
            village_wind            TEXT,
            village_visibility      TEXT,
            today_weather_icon      TEXT,
            tomorrow_weather_icon   TEXT,
            next_day_weather_icon   TEXT,
            today_high              TEXT,
            today_low               TEXT,
            tomorrow_high           TEXT,
            tomorrow_low            TEXT,
            next_day_high           TEXT,
            next_day_low            TEXT,
            todays_forecast_comment TEXT,
            updated_at              TEXT
        );
        INSERT OR IGNORE INTO village_report (id) VALUES (1);
        ",
    )?;
    Ok(())
}

/// Write the field map into the report row with one parameterized UPDATE.
///
/// Every key of the closed set must be present. Values are trimmed here,
/// at the write boundary; the extractor hands them over raw. Feed text is
/// untrusted, so values only ever travel as bound parameters.
pub fn update_report(conn: &Connection, fields: &FieldMap) -> Result<(), PersistenceError> {
    let mut values = Vec::with_capacity(FIELD_KEYS.len());
    for key in FIELD_KEYS {
        let value = fields
            .get(key)
            .ok_or(PersistenceError::MissingField(key))?;
        values.push(value.trim().to_string());
    }

    let changed = conn.execute(UPDATE_SQL, rusqlite::params_from_iter(values.iter()))?;
    if changed != 1 {
        return Err(PersistenceError::RowCount(changed));
    }
    Ok(())
}

// ── Tests ──
