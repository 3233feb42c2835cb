use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis;
use crate::models::{
    AttendanceRecord, Lecture, LectureTiming, Registration, StoreData, Student, TIMESTAMP_FORMAT,
    UNSPECIFIED,
};
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("required field is empty: {0}")]
    MissingField(&'static str),

    #[error("capacity must be at least 1")]
    InvalidCapacity,

    #[error("student {0} is already registered")]
    DuplicateStudent(String),

    #[error("lecture '{name}' already exists on {date}")]
    DuplicateLecture { name: String, date: NaiveDate },

    #[error("student {student_id} already applied for '{lecture_name}'")]
    DuplicateRegistration {
        student_id: String,
        lecture_name: String,
    },

    #[error("unknown student {0}")]
    UnknownStudent(String),

    #[error("unknown lecture {0}")]
    UnknownLecture(Uuid),

    #[error("lecture '{0}' has already taken place")]
    LectureClosed(String),

    #[error("attendance for '{0}' can only be marked on the lecture day")]
    NotLectureDay(String),

    #[error("student {student_id} is not registered for lecture {lecture_id}")]
    NotRegistered { student_id: String, lecture_id: Uuid },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub student_id: String,
    pub name: String,
    pub department: String,
    pub major: Option<String>,
    pub grade: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct NewLecture {
    pub lecture_name: String,
    pub lecture_date: NaiveDate,
    pub lecture_time: String,
    pub location: String,
    pub capacity: u32,
    pub instructor: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Id,
    Name,
    Department,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LectureWhen {
    All,
    Past,
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mark {
    Attended,
    NoShow,
}

/// Optional narrowing for the registration listing; `None` fields match all.
#[derive(Debug, Clone, Default)]
pub struct RegistrationQuery {
    pub student_contains: Option<String>,
    pub lecture_name: Option<String>,
    pub noshow: Option<bool>,
}

impl RegistrationQuery {
    fn matches(&self, registration: &Registration) -> bool {
        self.student_contains
            .as_deref()
            .map_or(true, |text| registration.student_id.contains(text))
            && self
                .lecture_name
                .as_deref()
                .map_or(true, |name| registration.lecture_name == name)
            && self
                .noshow
                .map_or(true, |noshow| registration.status().is_no_show() == noshow)
    }
}

#[derive(Debug, Clone)]
pub struct LectureOverview {
    pub lecture: Lecture,
    pub registration_count: usize,
    pub noshow_count: usize,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub student_count: usize,
    pub lecture_count: usize,
    pub registration_count: usize,
    pub noshow_count: usize,
    pub noshow_rate: f64,
    pub recent_registrations: Vec<Registration>,
    pub upcoming_lectures: Vec<LectureOverview>,
}

fn required(value: &str, field: &'static str) -> RegistryResult<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::MissingField(field));
    }
    Ok(())
}

pub struct Registry<S: Store> {
    store: S,
}

impl<S: Store> Registry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> RegistryResult<StoreData> {
        Ok(self.store.load()?)
    }

    pub fn add_student(&self, new: NewStudent, now: NaiveDateTime) -> RegistryResult<Student> {
        required(&new.student_id, "student_id")?;
        required(&new.name, "name")?;
        required(&new.department, "department")?;
        required(&new.grade, "grade")?;

        let mut students = self.store.load()?.students;
        if students.iter().any(|s| s.student_id == new.student_id) {
            return Err(RegistryError::DuplicateStudent(new.student_id));
        }

        let student = Student {
            student_id: new.student_id,
            name: new.name,
            department: new.department,
            major: new
                .major
                .filter(|major| !major.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED.to_string()),
            grade: new.grade,
            email: new.email,
            phone: new.phone,
            noshow_count: 0,
            registration_date: now,
        };
        students.push(student.clone());
        self.store.replace_students(students)?;

        info!(student_id = %student.student_id, name = %student.name, "Student registered");
        Ok(student)
    }

    pub fn search_students(&self, field: SearchField, text: &str) -> RegistryResult<Vec<Student>> {
        let students = self.store.load()?.students;
        Ok(students
            .into_iter()
            .filter(|student| {
                let haystack = match field {
                    SearchField::Id => &student.student_id,
                    SearchField::Name => &student.name,
                    SearchField::Department => &student.department,
                };
                haystack.contains(text)
            })
            .collect())
    }

    pub fn delete_student(&self, student_id: &str) -> RegistryResult<usize> {
        let mut data = self.store.load()?;
        let before = data.students.len();
        data.students.retain(|s| s.student_id != student_id);
        if data.students.len() == before {
            return Err(RegistryError::UnknownStudent(student_id.to_string()));
        }

        let registrations_before = data.registrations.len();
        data.registrations.retain(|r| r.student_id != student_id);
        let removed = registrations_before - data.registrations.len();
        self.store.save_all(&data)?;

        info!(student_id, removed_registrations = removed, "Student deleted");
        Ok(removed)
    }

    pub fn add_lecture(&self, new: NewLecture, now: NaiveDateTime) -> RegistryResult<Lecture> {
        required(&new.lecture_name, "lecture_name")?;
        required(&new.location, "location")?;
        required(&new.instructor, "instructor")?;
        if new.capacity == 0 {
            return Err(RegistryError::InvalidCapacity);
        }

        let mut lectures = self.store.load()?.lectures;
        if lectures
            .iter()
            .any(|l| l.lecture_name == new.lecture_name && l.lecture_date == new.lecture_date)
        {
            return Err(RegistryError::DuplicateLecture {
                name: new.lecture_name,
                date: new.lecture_date,
            });
        }

        let lecture = Lecture {
            lecture_id: Uuid::new_v4(),
            lecture_name: new.lecture_name,
            lecture_date: new.lecture_date,
            lecture_time: new.lecture_time,
            location: new.location,
            capacity: new.capacity,
            instructor: new.instructor,
            description: new.description,
            registration_date: now,
        };
        lectures.push(lecture.clone());
        self.store.replace_lectures(lectures)?;

        info!(lecture_id = %lecture.lecture_id, name = %lecture.lecture_name, date = %lecture.lecture_date, "Lecture created");
        Ok(lecture)
    }

    pub fn list_lectures(
        &self,
        when: LectureWhen,
        today: NaiveDate,
    ) -> RegistryResult<Vec<LectureOverview>> {
        let data = self.store.load()?;
        let mut lectures: Vec<LectureOverview> = data
            .lectures
            .iter()
            .filter(|lecture| match when {
                LectureWhen::All => true,
                LectureWhen::Past => lecture.timing(today) == LectureTiming::Past,
                LectureWhen::Upcoming => lecture.timing(today) != LectureTiming::Past,
            })
            .map(|lecture| overview(lecture, &data.registrations))
            .collect();
        lectures.sort_by(|a, b| a.lecture.lecture_date.cmp(&b.lecture.lecture_date));
        Ok(lectures)
    }

    pub fn todays_lectures(&self, today: NaiveDate) -> RegistryResult<Vec<Lecture>> {
        let lectures = self.store.load()?.lectures;
        Ok(lectures
            .into_iter()
            .filter(|lecture| lecture.timing(today) == LectureTiming::Today)
            .collect())
    }

    pub fn delete_lecture(&self, lecture_id: Uuid) -> RegistryResult<usize> {
        let mut data = self.store.load()?;
        let before = data.lectures.len();
        data.lectures.retain(|l| l.lecture_id != lecture_id);
        if data.lectures.len() == before {
            return Err(RegistryError::UnknownLecture(lecture_id));
        }

        let registrations_before = data.registrations.len();
        data.registrations.retain(|r| r.lecture_id != lecture_id);
        let removed = registrations_before - data.registrations.len();
        self.store.save_all(&data)?;

        info!(%lecture_id, removed_registrations = removed, "Lecture deleted");
        Ok(removed)
    }

    pub fn register(
        &self,
        student_id: &str,
        lecture_id: Uuid,
        now: NaiveDateTime,
    ) -> RegistryResult<Registration> {
        let mut data = self.store.load()?;
        let student = data
            .students
            .iter()
            .find(|s| s.student_id == student_id)
            .ok_or_else(|| RegistryError::UnknownStudent(student_id.to_string()))?;
        let lecture = data
            .lectures
            .iter()
            .find(|l| l.lecture_id == lecture_id)
            .ok_or(RegistryError::UnknownLecture(lecture_id))?;

        if lecture.timing(now.date()) == LectureTiming::Past {
            return Err(RegistryError::LectureClosed(lecture.label()));
        }
        if data
            .registrations
            .iter()
            .any(|r| r.student_id == student_id && r.lecture_id == lecture_id)
        {
            return Err(RegistryError::DuplicateRegistration {
                student_id: student_id.to_string(),
                lecture_name: lecture.lecture_name.clone(),
            });
        }

        let registration = Registration {
            registration_id: Uuid::new_v4(),
            student_id: student.student_id.clone(),
            student_name: student.name.clone(),
            lecture_id,
            lecture_name: lecture.lecture_name.clone(),
            lecture_date: lecture.lecture_date,
            registration_date: now,
            attendance_checked: false,
            noshow: false,
            note: String::new(),
        };
        data.registrations.push(registration.clone());
        self.store.replace_registrations(data.registrations)?;

        info!(student_id, lecture = %registration.lecture_name, "Registration created");
        Ok(registration)
    }

    pub fn cancel(&self, student_id: &str, lecture_id: Uuid) -> RegistryResult<Registration> {
        let mut registrations = self.store.load()?.registrations;
        let position = registrations
            .iter()
            .position(|r| r.student_id == student_id && r.lecture_id == lecture_id)
            .ok_or_else(|| RegistryError::NotRegistered {
                student_id: student_id.to_string(),
                lecture_id,
            })?;
        let removed = registrations.remove(position);
        self.store.replace_registrations(registrations)?;

        info!(student_id, lecture = %removed.lecture_name, "Registration cancelled");
        Ok(removed)
    }

    /// Marks attendance for one registration on the lecture day. The student's
    /// running no-show counter follows transitions into and out of the no-show
    /// state, so repeated marks do not inflate it.
    pub fn check_in(
        &self,
        student_id: &str,
        lecture_id: Uuid,
        mark: Mark,
        today: NaiveDate,
    ) -> RegistryResult<Registration> {
        let mut data = self.store.load()?;
        let lecture = data
            .lectures
            .iter()
            .find(|l| l.lecture_id == lecture_id)
            .ok_or(RegistryError::UnknownLecture(lecture_id))?;
        if lecture.timing(today) != LectureTiming::Today {
            return Err(RegistryError::NotLectureDay(lecture.label()));
        }

        let registration = data
            .registrations
            .iter_mut()
            .find(|r| r.student_id == student_id && r.lecture_id == lecture_id)
            .ok_or_else(|| RegistryError::NotRegistered {
                student_id: student_id.to_string(),
                lecture_id,
            })?;

        let was_noshow = registration.attendance_checked && registration.noshow;
        let is_noshow = mark == Mark::NoShow;
        registration.attendance_checked = true;
        registration.noshow = is_noshow;
        let updated = registration.clone();

        match data.students.iter_mut().find(|s| s.student_id == student_id) {
            Some(student) if is_noshow && !was_noshow => student.noshow_count += 1,
            Some(student) if was_noshow && !is_noshow => {
                student.noshow_count = student.noshow_count.saturating_sub(1)
            }
            Some(_) => {}
            None => warn!(student_id, "Check-in for a registration without a student record"),
        }
        self.store.save_all(&data)?;

        info!(student_id, lecture = %updated.lecture_name, ?mark, "Attendance marked");
        Ok(updated)
    }

    pub fn no_show_registrations(&self) -> RegistryResult<Vec<Registration>> {
        let registrations = self.store.load()?.registrations;
        Ok(registrations
            .into_iter()
            .filter(|r| r.status().is_no_show())
            .collect())
    }

    pub fn list_registrations(&self, query: &RegistrationQuery) -> RegistryResult<Vec<Registration>> {
        let registrations = self.store.load()?.registrations;
        Ok(registrations
            .into_iter()
            .filter(|r| query.matches(r))
            .collect())
    }

    pub fn dashboard(&self, today: NaiveDate) -> RegistryResult<Dashboard> {
        let data = self.store.load()?;
        let noshow_count = data
            .registrations
            .iter()
            .filter(|r| r.status().is_no_show())
            .count();

        let mut recent_registrations = data.registrations.clone();
        recent_registrations.sort_by(|a, b| b.registration_date.cmp(&a.registration_date));
        recent_registrations.truncate(10);

        let mut upcoming: Vec<&Lecture> = data
            .lectures
            .iter()
            .filter(|l| l.timing(today) != LectureTiming::Past)
            .collect();
        upcoming.sort_by(|a, b| a.lecture_date.cmp(&b.lecture_date));
        let upcoming_lectures = upcoming
            .into_iter()
            .take(5)
            .map(|lecture| overview(lecture, &data.registrations))
            .collect();

        Ok(Dashboard {
            student_count: data.students.len(),
            lecture_count: data.lectures.len(),
            registration_count: data.registrations.len(),
            noshow_count,
            noshow_rate: analysis::percentage(noshow_count, data.registrations.len()),
            recent_registrations,
            upcoming_lectures,
        })
    }
}

fn overview(lecture: &Lecture, registrations: &[Registration]) -> LectureOverview {
    let for_lecture = registrations
        .iter()
        .filter(|r| r.lecture_id == lecture.lecture_id);
    let (registration_count, noshow_count) =
        for_lecture.fold((0, 0), |(total, noshows), r| {
            (total + 1, noshows + usize::from(r.status().is_no_show()))
        });

    LectureOverview {
        lecture: lecture.clone(),
        registration_count,
        noshow_count,
    }
}

/// Joins registrations with the student list into an analysis roster.
/// Registrations whose student no longer exists keep the stored name and fall
/// into the unspecified groups.
pub fn roster(data: &StoreData) -> Vec<AttendanceRecord> {
    let records: Vec<AttendanceRecord> = data
        .registrations
        .iter()
        .enumerate()
        .map(|(index, registration)| {
            let student = data
                .students
                .iter()
                .find(|s| s.student_id == registration.student_id);
            AttendanceRecord {
                row_no: (index + 1).to_string(),
                date: registration
                    .registration_date
                    .format(TIMESTAMP_FORMAT)
                    .to_string(),
                student_name: student
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| registration.student_name.clone()),
                department: student
                    .map(|s| s.department.clone())
                    .unwrap_or_else(|| UNSPECIFIED.to_string()),
                major: student.map(|s| s.major.clone()).unwrap_or_default(),
                student_id: registration.student_id.clone(),
                grade: student.map(|s| s.grade.clone()).unwrap_or_default(),
                phone: student.map(|s| s.phone.clone()).unwrap_or_default(),
                email: student.map(|s| s.email.clone()).unwrap_or_default(),
                lecture_name: registration.lecture_name.clone(),
                status: registration.status(),
                note: registration.note.clone(),
            }
        })
        .collect();

    analysis::normalize(&records)
}
