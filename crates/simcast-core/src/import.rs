//! CSV import of daily usage logs
//!
//! Columns are located by header name, so their order does not matter.
//! Besides the canonical names, the column names of the carrier's database
//! export are accepted (`data_uso`, `id_usuario`, `consumo`, `cargo`, ...).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::UsageRecord;

const DATE_COLUMNS: &[&str] = &["date", "data_uso", "data"];
const ENTITY_COLUMNS: &[&str] = &["entity_id", "id_usuario", "usuario", "user"];
const VOLUME_COLUMNS: &[&str] = &["volume_gb", "consumo_dados_gb", "consumo"];
const ROLE_COLUMNS: &[&str] = &["role", "cargo"];
const DEPARTMENT_COLUMNS: &[&str] = &["department", "departamento"];
const DEVICE_COLUMNS: &[&str] = &["device_type", "device", "dispositivo"];
const STATUS_COLUMNS: &[&str] = &["status", "situacao"];
const EVENT_COLUMNS: &[&str] = &["event", "evento"];

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    entity: usize,
    volume: usize,
    role: usize,
    department: usize,
    device: Option<usize>,
    status: Option<usize>,
    event: Option<usize>,
}

/// Position of the first alias present, in alias order
fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}

fn require_column(headers: &StringRecord, names: &[&str]) -> Result<usize> {
    find_column(headers, names)
        .ok_or_else(|| Error::Import(format!("Missing required column: {}", names[0])))
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        Ok(Self {
            date: require_column(headers, DATE_COLUMNS)?,
            entity: require_column(headers, ENTITY_COLUMNS)?,
            volume: require_column(headers, VOLUME_COLUMNS)?,
            role: require_column(headers, ROLE_COLUMNS)?,
            department: require_column(headers, DEPARTMENT_COLUMNS)?,
            device: find_column(headers, DEVICE_COLUMNS),
            status: find_column(headers, STATUS_COLUMNS),
            event: find_column(headers, EVENT_COLUMNS),
        })
    }
}

/// Parse usage records from CSV data with a header row
pub fn parse_usage_csv<R: Read>(reader: R) -> Result<Vec<UsageRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;
    let mut records = Vec::new();

    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| row.get(idx).unwrap_or("");
        let optional = |idx: Option<usize>| idx.map(field).unwrap_or("").to_string();

        let entity_id = field(columns.entity);
        if entity_id.is_empty() {
            return Err(Error::Import(format!("Line {}: empty entity id", line)));
        }

        records.push(UsageRecord {
            date: parse_date(field(columns.date))
                .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?,
            entity_id: entity_id.to_string(),
            volume_gb: parse_volume(field(columns.volume))
                .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?,
            role: field(columns.role).to_string(),
            department: field(columns.department).to_string(),
            device_type: optional(columns.device),
            status: optional(columns.status),
            event: optional(columns.event),
        });
    }

    debug!(records = records.len(), "Parsed usage CSV");
    Ok(records)
}

/// Read a usage CSV file from disk
pub fn load_usage_file(path: &Path) -> Result<Vec<UsageRecord>> {
    let file = File::open(path)?;
    parse_usage_csv(file)
}

/// Parse a date, ignoring any time-of-day part
fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%d/%m/%Y", // 15/01/2024
    ];
    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(format!("Unable to parse date: {}", s))
}

/// Parse a non-negative, finite volume
fn parse_volume(s: &str) -> std::result::Result<f64, String> {
    let volume: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Unable to parse volume: {}", s))?;
    if !volume.is_finite() {
        return Err(format!("Volume is not a finite number: {}", s));
    }
    if volume < 0.0 {
        return Err(format!("Negative volume: {}", s));
    }
    Ok(volume)
}
