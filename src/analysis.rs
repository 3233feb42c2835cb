use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{
    AttendanceRecord, AttendanceStatus, Dimension, DimensionRate, LectureStatusCount, MarkBreakdown,
    MarkState, RiskBuckets, RosterSummary, StudentNoShow, UNSPECIFIED,
};

/// Every derived table for one roster, computed once per render.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub summary: RosterSummary,
    pub marks: MarkBreakdown,
    pub status_counts: BTreeMap<AttendanceStatus, usize>,
    pub lecture_status: Vec<LectureStatusCount>,
    pub no_show_records: Vec<AttendanceRecord>,
    pub student_no_shows: Vec<StudentNoShow>,
    pub rates: Vec<(Dimension, Vec<DimensionRate>)>,
    pub buckets: RiskBuckets,
}

impl Analysis {
    pub fn rates_for(&self, dimension: Dimension) -> &[DimensionRate] {
        self.rates
            .iter()
            .find(|(dim, _)| *dim == dimension)
            .map(|(_, rates)| rates.as_slice())
            .unwrap_or(&[])
    }
}

pub fn analyze(roster: &[AttendanceRecord]) -> Analysis {
    let student_no_shows = student_no_show_counts(roster);
    let buckets = risk_buckets(&student_no_shows);

    Analysis {
        summary: summarize(roster),
        marks: mark_breakdown(roster),
        status_counts: status_counts(roster),
        lecture_status: lecture_status_distribution(roster),
        no_show_records: no_show_students(roster),
        rates: Dimension::ALL
            .iter()
            .map(|dimension| (*dimension, rate_by_dimension(roster, *dimension)))
            .collect(),
        student_no_shows,
        buckets,
    }
}

pub fn normalize(roster: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
    roster
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if record.status == AttendanceStatus::Missing {
                record.status = AttendanceStatus::NoShow;
            }
            if record.major.trim().is_empty() {
                record.major = UNSPECIFIED.to_string();
            }
            if record.grade.trim().is_empty() {
                record.grade = UNSPECIFIED.to_string();
            }
            record
        })
        .collect()
}

pub fn status_counts(roster: &[AttendanceRecord]) -> BTreeMap<AttendanceStatus, usize> {
    let mut counts = BTreeMap::new();
    for record in roster {
        *counts.entry(record.status.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn rate_by_dimension(roster: &[AttendanceRecord], dimension: Dimension) -> Vec<DimensionRate> {
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for record in roster {
        let entry = groups.entry(dimension.value_of(record)).or_insert((0, 0));
        entry.0 += 1;
        if record.status.is_no_show() {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(value, (total, no_show_count))| DimensionRate {
            value: value.to_string(),
            total,
            no_show_count,
            no_show_rate: percentage(no_show_count, total),
        })
        .collect()
}

pub fn no_show_students(roster: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
    roster
        .iter()
        .filter(|record| record.status.is_no_show())
        .cloned()
        .collect()
}

pub fn student_no_show_counts(roster: &[AttendanceRecord]) -> Vec<StudentNoShow> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in roster.iter().filter(|record| record.status.is_no_show()) {
        *counts.entry(record.student_id.as_str()).or_insert(0) += 1;
    }

    // Descriptive fields come from the first row carrying the id.
    let mut first_rows: HashMap<&str, &AttendanceRecord> = HashMap::new();
    for record in roster {
        first_rows.entry(record.student_id.as_str()).or_insert(record);
    }

    let mut students: Vec<StudentNoShow> = counts
        .into_iter()
        .filter_map(|(student_id, no_show_count)| {
            let row = first_rows.get(student_id)?;
            Some(StudentNoShow {
                student_id: student_id.to_string(),
                name: row.student_name.clone(),
                department: row.department.clone(),
                major: row.major.clone(),
                grade: row.grade.clone(),
                no_show_count,
            })
        })
        .collect();

    students.sort_by(|a, b| {
        b.no_show_count
            .cmp(&a.no_show_count)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    students
}

pub fn risk_buckets(students: &[StudentNoShow]) -> RiskBuckets {
    let mut buckets = RiskBuckets::default();
    for student in students {
        match student.no_show_count {
            0 => {}
            1 => buckets.once.push(student.clone()),
            2 => buckets.twice.push(student.clone()),
            _ => buckets.multiple.push(student.clone()),
        }
    }
    buckets
}

pub fn lecture_status_distribution(roster: &[AttendanceRecord]) -> Vec<LectureStatusCount> {
    let mut counts: BTreeMap<(&str, &AttendanceStatus), usize> = BTreeMap::new();
    for record in roster {
        *counts
            .entry((record.lecture_name.as_str(), &record.status))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((lecture_name, status), count)| LectureStatusCount {
            lecture_name: lecture_name.to_string(),
            status: status.clone(),
            count,
        })
        .collect()
}

pub fn summarize(roster: &[AttendanceRecord]) -> RosterSummary {
    let unique_students: BTreeSet<&str> = roster.iter().map(|r| r.student_id.as_str()).collect();
    let unique_lectures: BTreeSet<&str> = roster.iter().map(|r| r.lecture_name.as_str()).collect();
    let no_show_count = roster.iter().filter(|r| r.status.is_no_show()).count();

    RosterSummary {
        total_records: roster.len(),
        unique_students: unique_students.len(),
        unique_lectures: unique_lectures.len(),
        no_show_count,
        no_show_rate: percentage(no_show_count, roster.len()),
    }
}

/// Coarse attendance picture where absences count with no-shows and every
/// other marked status with attendance. The no-show rate stays strict.
pub fn mark_breakdown(roster: &[AttendanceRecord]) -> MarkBreakdown {
    roster
        .iter()
        .fold(MarkBreakdown::default(), |mut marks, record| {
            match record.status.mark_state() {
                MarkState::Unmarked => marks.unmarked += 1,
                MarkState::PresentLike => marks.present_like += 1,
                MarkState::NoShowLike => marks.no_show_like += 1,
            }
            marks
        })
}

/// `part / total * 100` rounded half away from zero to two places; zero when
/// `total` is zero.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = part as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(student_id: &str, lecture: &str, status: &str) -> AttendanceRecord {
        AttendanceRecord {
            row_no: String::new(),
            date: "2026-03-02".to_string(),
            student_name: format!("학생{student_id}"),
            department: "컴퓨터공학과".to_string(),
            major: String::new(),
            student_id: student_id.to_string(),
            grade: "3".to_string(),
            phone: String::new(),
            email: String::new(),
            lecture_name: lecture.to_string(),
            status: AttendanceStatus::parse(status),
            note: String::new(),
        }
    }

    fn mixed_roster() -> Vec<AttendanceRecord> {
        normalize(&[
            record("S1", "L1", "노쇼"),
            record("S1", "L2", "노쇼"),
            record("S1", "L3", ""),
            record("S1", "L4", "출석"),
            record("S2", "L1", "출석"),
            record("S2", "L2", "노쇼"),
            record("S3", "L1", "지각"),
            record("S3", "L3", "노쇼"),
            record("S3", "L4", "노쇼"),
        ])
    }

    #[test]
    fn normalize_fills_sentinels() {
        let roster = normalize(&[record("S1", "L1", "")]);
        assert_eq!(roster[0].status, AttendanceStatus::NoShow);
        assert_eq!(roster[0].major, UNSPECIFIED);
        assert_eq!(roster[0].grade, "3");
        assert_eq!(roster[0].note, "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = mixed_roster();
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn empty_roster_degrades_to_empty_results() {
        assert!(status_counts(&[]).is_empty());
        assert!(rate_by_dimension(&[], Dimension::Lecture).is_empty());
        assert_eq!(risk_buckets(&student_no_show_counts(&[])), RiskBuckets::default());
        let summary = summarize(&[]);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.no_show_rate, 0.0);
    }

    #[test]
    fn single_missing_status_counts_as_no_show() {
        let roster = normalize(&[record("S1", "L1", "")]);

        let counts = status_counts(&roster);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get(&AttendanceStatus::NoShow), Some(&1));

        let rates = rate_by_dimension(&roster, Dimension::Lecture);
        assert_eq!(
            rates,
            vec![DimensionRate {
                value: "L1".to_string(),
                total: 1,
                no_show_count: 1,
                no_show_rate: 100.0,
            }]
        );

        let students = student_no_show_counts(&roster);
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].student_id, "S1");
        assert_eq!(students[0].no_show_count, 1);

        let buckets = risk_buckets(&students);
        assert_eq!(buckets.once.len(), 1);
        assert!(buckets.twice.is_empty());
        assert!(buckets.multiple.is_empty());
    }

    #[test]
    fn status_counts_sum_to_roster_length() {
        let roster = mixed_roster();
        let total: usize = status_counts(&roster).values().sum();
        assert_eq!(total, roster.len());
    }

    #[test]
    fn dimension_totals_sum_to_roster_length() {
        let roster = mixed_roster();
        for dimension in Dimension::ALL {
            let rates = rate_by_dimension(&roster, dimension);
            let total: usize = rates.iter().map(|rate| rate.total).sum();
            assert_eq!(total, roster.len());
            for rate in &rates {
                assert!((0.0..=100.0).contains(&rate.no_show_rate));
            }
        }
    }

    #[test]
    fn rates_are_sorted_by_value() {
        let rates = rate_by_dimension(&mixed_roster(), Dimension::Lecture);
        let values: Vec<&str> = rates.iter().map(|rate| rate.value.as_str()).collect();
        assert_eq!(values, vec!["L1", "L2", "L3", "L4"]);
    }

    #[test]
    fn unspecified_major_is_its_own_group() {
        let rates = rate_by_dimension(&mixed_roster(), Dimension::Major);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].value, UNSPECIFIED);
        assert_eq!(rates[0].total, 9);
    }

    #[test]
    fn rate_rounds_to_two_places() {
        let roster = normalize(&[
            record("S1", "L1", "노쇼"),
            record("S2", "L1", "출석"),
            record("S3", "L1", "출석"),
        ]);
        let rates = rate_by_dimension(&roster, Dimension::Lecture);
        assert_eq!(rates[0].no_show_rate, 33.33);
        assert_eq!(percentage(2, 3), 66.67);
    }

    #[test]
    fn heavy_no_show_student_lands_only_in_multiple() {
        let students = student_no_show_counts(&mixed_roster());
        let s1 = students.iter().find(|s| s.student_id == "S1").unwrap();
        assert_eq!(s1.no_show_count, 3);

        let buckets = risk_buckets(&students);
        assert!(buckets.multiple.iter().any(|s| s.student_id == "S1"));
        assert!(!buckets.once.iter().any(|s| s.student_id == "S1"));
        assert!(!buckets.twice.iter().any(|s| s.student_id == "S1"));
        assert_eq!(buckets.once.len(), 1);
        assert_eq!(buckets.twice.len(), 1);
    }

    #[test]
    fn buckets_partition_students() {
        let students = student_no_show_counts(&mixed_roster());
        let buckets = risk_buckets(&students);
        let bucketed = buckets.once.len() + buckets.twice.len() + buckets.multiple.len();
        assert_eq!(bucketed, students.len());
        for student in &students {
            let hits = [&buckets.once, &buckets.twice, &buckets.multiple]
                .iter()
                .filter(|bucket| bucket.contains(student))
                .count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn student_counts_sort_by_count_then_id() {
        let students = student_no_show_counts(&mixed_roster());
        let order: Vec<&str> = students.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(order, vec!["S1", "S3", "S2"]);
    }

    #[test]
    fn descriptive_fields_come_from_first_row() {
        let mut first = record("S1", "L1", "출석");
        first.student_name = "첫번째".to_string();
        let mut second = record("S1", "L2", "노쇼");
        second.student_name = "두번째".to_string();

        let students = student_no_show_counts(&[first, second]);
        assert_eq!(students[0].name, "첫번째");
    }

    #[test]
    fn no_show_records_keep_roster_order() {
        let records = no_show_students(&mixed_roster());
        let keys: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.student_id.as_str(), r.lecture_name.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("S1", "L1"), ("S1", "L2"), ("S1", "L3"), ("S2", "L2"), ("S3", "L3"), ("S3", "L4")]
        );
    }

    #[test]
    fn lecture_distribution_counts_pairs() {
        let distribution = lecture_status_distribution(&mixed_roster());
        let l1: Vec<(String, usize)> = distribution
            .iter()
            .filter(|row| row.lecture_name == "L1")
            .map(|row| (row.status.to_string(), row.count))
            .collect();
        assert_eq!(
            l1,
            vec![
                ("출석".to_string(), 1),
                ("노쇼".to_string(), 1),
                ("지각".to_string(), 1)
            ]
        );
        let total: usize = distribution.iter().map(|row| row.count).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn analyze_bundles_every_table() {
        let analysis = analyze(&mixed_roster());
        assert_eq!(analysis.summary.total_records, 9);
        assert_eq!(analysis.summary.unique_students, 3);
        assert_eq!(analysis.summary.unique_lectures, 4);
        assert_eq!(analysis.summary.no_show_count, 6);
        assert_eq!(analysis.summary.no_show_rate, 66.67);
        assert_eq!(analysis.rates_for(Dimension::Lecture).len(), 4);
        assert_eq!(analysis.no_show_records.len(), 6);
    }

    #[test]
    fn mark_breakdown_groups_session_statuses() {
        let roster = normalize(&[
            record("S1", "L1", "노쇼"),
            record("S1", "L2", "결석"),
            record("S2", "L1", "병가"),
            record("S2", "L2", "지각"),
            record("S3", "L1", "미확인"),
            record("S3", "L2", ""),
        ]);
        let marks = mark_breakdown(&roster);
        assert_eq!(
            marks,
            MarkBreakdown {
                unmarked: 1,
                present_like: 2,
                no_show_like: 3,
            }
        );
        assert_eq!(summarize(&roster).no_show_count, 2);
        assert_eq!(analyze(&roster).marks, marks);
    }
}
