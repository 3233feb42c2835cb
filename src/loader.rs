use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis;
use crate::models::{AttendanceRecord, AttendanceStatus};

pub const REQUIRED_COLUMNS: [&str; 12] = [
    "번호", "등록일자", "이름", "학과", "전공", "학번", "학년", "핸드폰", "이메일", "특강명", "출석여부", "비고",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no CSV files found in {0}")]
    NoCsvFiles(PathBuf),
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "번호")]
    row_no: String,
    #[serde(rename = "등록일자")]
    date: String,
    #[serde(rename = "이름")]
    name: String,
    #[serde(rename = "학과")]
    department: String,
    #[serde(rename = "전공", default)]
    major: String,
    #[serde(rename = "학번")]
    student_id: String,
    #[serde(rename = "학년", default)]
    grade: String,
    #[serde(rename = "핸드폰")]
    phone: String,
    #[serde(rename = "이메일")]
    email: String,
    #[serde(rename = "특강명")]
    lecture_name: String,
    #[serde(rename = "출석여부", default)]
    status: String,
    #[serde(rename = "비고", default)]
    note: String,
}

impl From<CsvRow> for AttendanceRecord {
    fn from(row: CsvRow) -> Self {
        AttendanceRecord {
            row_no: row.row_no,
            date: row.date,
            student_name: row.name,
            department: row.department,
            major: row.major,
            student_id: row.student_id,
            grade: row.grade,
            phone: row.phone,
            email: row.email,
            lecture_name: row.lecture_name,
            status: AttendanceStatus::parse(&row.status),
            note: row.note,
        }
    }
}

pub fn load_roster(path: &Path) -> Result<Vec<AttendanceRecord>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let roster = parse_roster(&bytes).map_err(|err| match err {
        LoadError::Encoding(_) => LoadError::Encoding(path.to_path_buf()),
        other => other,
    })?;
    info!(path = %path.display(), records = roster.len(), "Loaded roster");
    Ok(roster)
}

/// Parses a whole roster or nothing; any missing column or malformed row fails
/// the load. Rows may omit trailing optional fields.
pub fn parse_roster(bytes: &[u8]) -> Result<Vec<AttendanceRecord>, LoadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if std::str::from_utf8(bytes).is_err() {
        return Err(LoadError::Encoding(PathBuf::from("input")));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        records.push(AttendanceRecord::from(result?));
    }
    debug!(rows = records.len(), "Parsed CSV rows");

    Ok(analysis::normalize(&records))
}

pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(LoadError::NoCsvFiles(dir.to_path_buf()));
    }
    files.sort();
    Ok(files)
}
