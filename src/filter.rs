use std::collections::BTreeSet;

use crate::models::{AttendanceRecord, Dimension};

/// Multi-select scoping applied before aggregation. An empty selection for a
/// dimension leaves that dimension unrestricted.
#[derive(Debug, Clone, Default)]
pub struct RosterFilter {
    pub departments: BTreeSet<String>,
    pub majors: BTreeSet<String>,
    pub grades: BTreeSet<String>,
    pub lectures: BTreeSet<String>,
}

impl RosterFilter {
    pub fn new(
        departments: Vec<String>,
        majors: Vec<String>,
        grades: Vec<String>,
        lectures: Vec<String>,
    ) -> Self {
        Self {
            departments: departments.into_iter().collect(),
            majors: majors.into_iter().collect(),
            grades: grades.into_iter().collect(),
            lectures: lectures.into_iter().collect(),
        }
    }

    fn selection(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Lecture => &self.lectures,
            Dimension::Department => &self.departments,
            Dimension::Major => &self.majors,
            Dimension::Grade => &self.grades,
        }
    }

    pub fn is_empty(&self) -> bool {
        Dimension::ALL
            .iter()
            .all(|dimension| self.selection(*dimension).is_empty())
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        Dimension::ALL.iter().all(|dimension| {
            let selected = self.selection(*dimension);
            selected.is_empty() || selected.contains(dimension.value_of(record))
        })
    }

    pub fn apply(&self, roster: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
        roster
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

/// Sorted distinct values per dimension, for building selection lists.
pub fn options(roster: &[AttendanceRecord], dimension: Dimension) -> Vec<String> {
    roster
        .iter()
        .map(|record| dimension.value_of(record).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;

    fn record(department: &str, grade: &str, lecture: &str) -> AttendanceRecord {
        AttendanceRecord {
            row_no: String::new(),
            date: String::new(),
            student_name: "홍길동".to_string(),
            department: department.to_string(),
            major: "미지정".to_string(),
            student_id: "2024001".to_string(),
            grade: grade.to_string(),
            phone: String::new(),
            email: String::new(),
            lecture_name: lecture.to_string(),
            status: AttendanceStatus::Attended,
            note: String::new(),
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let roster = vec![record("경영학과", "1", "L1"), record("컴퓨터공학과", "2", "L2")];
        let filter = RosterFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&roster).len(), 2);
    }

    #[test]
    fn selections_intersect_across_dimensions() {
        let roster = vec![
            record("경영학과", "1", "L1"),
            record("경영학과", "2", "L1"),
            record("컴퓨터공학과", "1", "L1"),
        ];
        let filter = RosterFilter::new(
            vec!["경영학과".to_string()],
            vec![],
            vec!["1".to_string()],
            vec![],
        );
        let scoped = filter.apply(&roster);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].department, "경영학과");
        assert_eq!(scoped[0].grade, "1");
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let roster = vec![
            record("컴퓨터공학과", "1", "L2"),
            record("경영학과", "1", "L1"),
            record("경영학과", "2", "L1"),
        ];
        assert_eq!(options(&roster, Dimension::Lecture), vec!["L1", "L2"]);
        assert_eq!(
            options(&roster, Dimension::Department),
            vec!["경영학과", "컴퓨터공학과"]
        );
    }
}
