use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    AttendanceRecord, Dimension, DimensionRate, Lecture, LectureStatusCount, Registration,
    StoreData, Student, StudentNoShow, TIMESTAMP_FORMAT,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX write failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Count(usize),
    Rate(f64),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Count(count) => count.to_string(),
            Cell::Rate(rate) => format!("{rate:.2}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Cell::Text(value.clone())
    }
}

/// A header row plus uniform data rows; the shared shape of every CSV and
/// XLSX export.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    Empty,
}

pub fn dimension_table(dimension: Dimension, rates: &[DimensionRate]) -> Table {
    let mut table = Table::new(&[dimension.column(), "총학생수", "노쇼학생수", "노쇼율"]);
    for rate in rates {
        table.rows.push(vec![
            Cell::from(&rate.value),
            Cell::Count(rate.total),
            Cell::Count(rate.no_show_count),
            Cell::Rate(rate.no_show_rate),
        ]);
    }
    table
}

pub fn student_no_show_table(students: &[StudentNoShow]) -> Table {
    let mut table = Table::new(&["학번", "이름", "학과", "전공", "학년", "노쇼횟수"]);
    for student in students {
        table.rows.push(vec![
            Cell::from(&student.student_id),
            Cell::from(&student.name),
            Cell::from(&student.department),
            Cell::from(&student.major),
            Cell::from(&student.grade),
            Cell::Count(student.no_show_count),
        ]);
    }
    table
}

pub fn records_table(records: &[AttendanceRecord]) -> Table {
    let mut table = Table::new(&[
        "번호", "학번", "이름", "학과", "전공", "학년", "핸드폰", "이메일", "특강명", "등록일자", "출석여부", "비고",
    ]);
    for record in records {
        table.rows.push(vec![
            Cell::from(&record.row_no),
            Cell::from(&record.student_id),
            Cell::from(&record.student_name),
            Cell::from(&record.department),
            Cell::from(&record.major),
            Cell::from(&record.grade),
            Cell::from(&record.phone),
            Cell::from(&record.email),
            Cell::from(&record.lecture_name),
            Cell::from(&record.date),
            Cell::from(record.status.label()),
            Cell::from(&record.note),
        ]);
    }
    table
}

pub fn lecture_status_table(distribution: &[LectureStatusCount]) -> Table {
    let mut table = Table::new(&["특강명", "출석여부", "인원수"]);
    for row in distribution {
        table.rows.push(vec![
            Cell::from(&row.lecture_name),
            Cell::from(row.status.label()),
            Cell::Count(row.count),
        ]);
    }
    table
}

pub fn students_table(students: &[Student]) -> Table {
    let mut table = Table::new(&[
        "student_id", "name", "department", "major", "grade", "email", "phone", "noshow_count", "registration_date",
    ]);
    for student in students {
        table.rows.push(vec![
            Cell::from(&student.student_id),
            Cell::from(&student.name),
            Cell::from(&student.department),
            Cell::from(&student.major),
            Cell::from(&student.grade),
            Cell::from(&student.email),
            Cell::from(&student.phone),
            Cell::Count(student.noshow_count as usize),
            Cell::Text(student.registration_date.format(TIMESTAMP_FORMAT).to_string()),
        ]);
    }
    table
}

pub fn lectures_table(lectures: &[Lecture]) -> Table {
    let mut table = Table::new(&[
        "lecture_id", "lecture_name", "lecture_date", "lecture_time", "location", "capacity", "instructor", "description",
    ]);
    for lecture in lectures {
        table.rows.push(vec![
            Cell::Text(lecture.lecture_id.to_string()),
            Cell::from(&lecture.lecture_name),
            Cell::Text(lecture.lecture_date.to_string()),
            Cell::from(&lecture.lecture_time),
            Cell::from(&lecture.location),
            Cell::Count(lecture.capacity as usize),
            Cell::from(&lecture.instructor),
            Cell::from(&lecture.description),
        ]);
    }
    table
}

pub fn registrations_table(registrations: &[Registration]) -> Table {
    let mut table = Table::new(&[
        "registration_id", "student_id", "student_name", "lecture_name", "lecture_date", "registration_date",
        "attendance_checked", "noshow",
    ]);
    for registration in registrations {
        table.rows.push(vec![
            Cell::Text(registration.registration_id.to_string()),
            Cell::from(&registration.student_id),
            Cell::from(&registration.student_name),
            Cell::from(&registration.lecture_name),
            Cell::Text(registration.lecture_date.to_string()),
            Cell::Text(registration.registration_date.format(TIMESTAMP_FORMAT).to_string()),
            Cell::Text(registration.attendance_checked.to_string()),
            Cell::Text(registration.noshow.to_string()),
        ]);
    }
    table
}

/// Serializes a table as CSV prefixed with a UTF-8 byte-order mark so
/// Korean-locale spreadsheets pick the right encoding.
pub fn csv_bytes(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::render))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Csv(csv::Error::from(err.into_error())))
}

pub fn xlsx_bytes(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }
    for (index, row) in table.rows.iter().enumerate() {
        let row_num = index as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => worksheet.write_string(row_num, col, text)?,
                Cell::Count(count) => worksheet.write_number(row_num, col, *count as f64)?,
                Cell::Rate(rate) => worksheet.write_number(row_num, col, *rate)?,
            };
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Csv,
    Xlsx,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Xlsx => "xlsx",
        }
    }
}

/// Writes `table` to `dir/<stem>.<ext>`. An empty table is reported, not
/// written.
pub fn write_table(
    table: &Table,
    format: Format,
    dir: &Path,
    stem: &str,
) -> Result<ExportOutcome, ExportError> {
    if table.is_empty() {
        warn!(stem, "Nothing to export");
        return Ok(ExportOutcome::Empty);
    }

    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    let bytes = match format {
        Format::Csv => csv_bytes(table)?,
        Format::Xlsx => xlsx_bytes(table, stem)?,
    };
    std::fs::write(&path, bytes).map_err(io_error(&path))?;

    info!(path = %path.display(), rows = table.rows.len(), "Export written");
    Ok(ExportOutcome::Written {
        rows: table.rows.len(),
        path,
    })
}

pub fn backup_file_name(now: NaiveDateTime) -> String {
    format!("backup_{}.json", now.format("%Y%m%d_%H%M%S"))
}

pub fn write_backup(data: &StoreData, dir: &Path, now: NaiveDateTime) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(backup_file_name(now));
    let file = std::fs::File::create(&path).map_err(io_error(&path))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush().map_err(io_error(&path))?;

    info!(path = %path.display(), "Backup written");
    Ok(path)
}

pub fn read_backup(path: &Path) -> Result<StoreData, ExportError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    Ok(serde_json::from_str(&content)?)
}
