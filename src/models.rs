use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNSPECIFIED: &str = "미지정";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttendanceStatus {
    /// Blank or absent in the source; normalized to `NoShow` before aggregation.
    Missing,
    /// Registered but not yet checked in.
    Pending,
    Attended,
    NoShow,
    Late,
    Absent,
    LeftEarly,
    SickLeave,
    OfficialLeave,
    Other(String),
}

/// Coarse reading of a status for views that only care whether a
/// registrant showed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkState {
    Unmarked,
    PresentLike,
    NoShowLike,
}

impl AttendanceStatus {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "" => Self::Missing,
            "미확인" => Self::Pending,
            "출석" => Self::Attended,
            "노쇼" => Self::NoShow,
            "지각" => Self::Late,
            "결석" => Self::Absent,
            "조퇴" => Self::LeftEarly,
            "병가" => Self::SickLeave,
            "공결" => Self::OfficialLeave,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Missing => "",
            Self::Pending => "미확인",
            Self::Attended => "출석",
            Self::NoShow => "노쇼",
            Self::Late => "지각",
            Self::Absent => "결석",
            Self::LeftEarly => "조퇴",
            Self::SickLeave => "병가",
            Self::OfficialLeave => "공결",
            Self::Other(text) => text,
        }
    }

    pub fn is_no_show(&self) -> bool {
        matches!(self, Self::NoShow)
    }

    pub fn mark_state(&self) -> MarkState {
        match self {
            Self::Missing | Self::Pending => MarkState::Unmarked,
            Self::NoShow | Self::Absent => MarkState::NoShowLike,
            _ => MarkState::PresentLike,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for AttendanceStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AttendanceStatus> for String {
    fn from(value: AttendanceStatus) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub row_no: String,
    pub date: String,
    pub student_name: String,
    pub department: String,
    pub major: String,
    pub student_id: String,
    pub grade: String,
    pub phone: String,
    pub email: String,
    pub lecture_name: String,
    pub status: AttendanceStatus,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Lecture,
    Department,
    Major,
    Grade,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Lecture,
        Dimension::Department,
        Dimension::Major,
        Dimension::Grade,
    ];

    pub fn value_of<'a>(&self, record: &'a AttendanceRecord) -> &'a str {
        match self {
            Dimension::Lecture => &record.lecture_name,
            Dimension::Department => &record.department,
            Dimension::Major => &record.major,
            Dimension::Grade => &record.grade,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Lecture => "특강명",
            Dimension::Department => "학과",
            Dimension::Major => "전공",
            Dimension::Grade => "학년",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Dimension::Lecture => "lecture",
            Dimension::Department => "department",
            Dimension::Major => "major",
            Dimension::Grade => "grade",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRate {
    pub value: String,
    pub total: usize,
    pub no_show_count: usize,
    pub no_show_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentNoShow {
    pub student_id: String,
    pub name: String,
    pub department: String,
    pub major: String,
    pub grade: String,
    pub no_show_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskBuckets {
    pub once: Vec<StudentNoShow>,
    pub twice: Vec<StudentNoShow>,
    pub multiple: Vec<StudentNoShow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LectureStatusCount {
    pub lecture_name: String,
    pub status: AttendanceStatus,
    pub count: usize,
}

/// Record counts per [`MarkState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkBreakdown {
    pub unmarked: usize,
    pub present_like: usize,
    pub no_show_like: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSummary {
    pub total_records: usize,
    pub unique_students: usize,
    pub unique_lectures: usize,
    pub no_show_count: usize,
    pub no_show_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub department: String,
    #[serde(default = "unspecified")]
    pub major: String,
    pub grade: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub noshow_count: u32,
    #[serde(with = "timestamp")]
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    pub lecture_id: Uuid,
    pub lecture_name: String,
    pub lecture_date: NaiveDate,
    pub lecture_time: String,
    pub location: String,
    pub capacity: u32,
    pub instructor: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "timestamp")]
    pub registration_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LectureTiming {
    Past,
    Today,
    Upcoming,
}

impl Lecture {
    pub fn timing(&self, today: NaiveDate) -> LectureTiming {
        if self.lecture_date < today {
            LectureTiming::Past
        } else if self.lecture_date == today {
            LectureTiming::Today
        } else {
            LectureTiming::Upcoming
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.lecture_name, self.lecture_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub registration_id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub lecture_id: Uuid,
    pub lecture_name: String,
    pub lecture_date: NaiveDate,
    #[serde(with = "timestamp")]
    pub registration_date: NaiveDateTime,
    #[serde(default)]
    pub attendance_checked: bool,
    #[serde(default)]
    pub noshow: bool,
    #[serde(default)]
    pub note: String,
}

impl Registration {
    pub fn status(&self) -> AttendanceStatus {
        match (self.attendance_checked, self.noshow) {
            (false, _) => AttendanceStatus::Pending,
            (true, true) => AttendanceStatus::NoShow,
            (true, false) => AttendanceStatus::Attended,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub lectures: Vec<Lecture>,
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

fn unspecified() -> String {
    UNSPECIFIED.to_string()
}

/// Store timestamps use a space separator; ISO `T` input is accepted too.
mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .or_else(|_| raw.parse::<NaiveDateTime>())
            .map_err(serde::de::Error::custom)
    }
}
