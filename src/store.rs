use std::cell::RefCell;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Lecture, Registration, StoreData, Student};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store document: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResetScope {
    All,
    Students,
    Lectures,
    Registrations,
}

/// Whole-document persistence: callers read a snapshot and write back entire
/// collections. There is no partial update and no locking; the last writer
/// wins.
pub trait Store {
    fn load(&self) -> StoreResult<StoreData>;

    fn save_all(&self, data: &StoreData) -> StoreResult<()>;

    fn replace_students(&self, students: Vec<Student>) -> StoreResult<()> {
        let mut data = self.load()?;
        data.students = students;
        self.save_all(&data)
    }

    fn replace_lectures(&self, lectures: Vec<Lecture>) -> StoreResult<()> {
        let mut data = self.load()?;
        data.lectures = lectures;
        self.save_all(&data)
    }

    fn replace_registrations(&self, registrations: Vec<Registration>) -> StoreResult<()> {
        let mut data = self.load()?;
        data.registrations = registrations;
        self.save_all(&data)
    }

    fn reset(&self, scope: ResetScope) -> StoreResult<()> {
        let data = match scope {
            ResetScope::All => StoreData::default(),
            ResetScope::Students => StoreData {
                students: Vec::new(),
                ..self.load()?
            },
            ResetScope::Lectures => StoreData {
                lectures: Vec::new(),
                ..self.load()?
            },
            ResetScope::Registrations => StoreData {
                registrations: Vec::new(),
                ..self.load()?
            },
        };
        info!(?scope, "Store reset");
        self.save_all(&data)
    }
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> StoreResult<StoreData> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Store file missing, initializing");
            let empty = StoreData::default();
            self.save_all(&empty)?;
            return Ok(empty);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_all(&self, data: &StoreData) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        debug!(
            path = %self.path.display(),
            students = data.students.len(),
            lectures = data.lectures.len(),
            registrations = data.registrations.len(),
            "Store saved"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: RefCell<StoreData>,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self {
            data: RefCell::new(data),
        }
    }
}

impl Store for MemoryStore {
    fn load(&self) -> StoreResult<StoreData> {
        Ok(self.data.borrow().clone())
    }

    fn save_all(&self, data: &StoreData) -> StoreResult<()> {
        *self.data.borrow_mut() = data.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn student(id: &str) -> Student {
        Student {
            student_id: id.to_string(),
            name: "박지훈".to_string(),
            department: "전자공학과".to_string(),
            major: "반도체".to_string(),
            grade: "4".to_string(),
            email: String::new(),
            phone: String::new(),
            noshow_count: 0,
            registration_date: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn json_store_initializes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lecture_data.json");
        let store = JsonFileStore::new(&path);

        let data = store.load().unwrap();
        assert_eq!(data, StoreData::default());
        assert!(path.exists());
    }

    #[test]
    fn json_store_round_trips_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("lecture_data.json"));

        store.replace_students(vec![student("2024001")]).unwrap();
        let reopened = JsonFileStore::new(store.path().to_path_buf());
        let data = reopened.load().unwrap();
        assert_eq!(data.students, vec![student("2024001")]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"registration_date\": \"2026-03-01 10:30:00\""));
        assert!(raw.contains("\"lectures\": []"));
    }

    #[test]
    fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture_data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn reset_clears_only_requested_scope() {
        let store = MemoryStore::new(StoreData {
            students: vec![student("2024001")],
            ..StoreData::default()
        });
        store.reset(ResetScope::Registrations).unwrap();
        assert_eq!(store.load().unwrap().students.len(), 1);

        store.reset(ResetScope::All).unwrap();
        assert_eq!(store.load().unwrap(), StoreData::default());
    }
}
