use chrono::NaiveDate;

use lecture_noshow_tracker::analysis::analyze;
use lecture_noshow_tracker::export::{self, ExportOutcome, Format};
use lecture_noshow_tracker::filter::RosterFilter;
use lecture_noshow_tracker::loader::load_roster;
use lecture_noshow_tracker::models::{AttendanceStatus, Dimension};
use lecture_noshow_tracker::registry::{self, Mark, NewLecture, NewStudent, Registry};
use lecture_noshow_tracker::store::{JsonFileStore, Store};

const ROSTER: &str = "\u{FEFF}번호,등록일자,이름,학과,전공,학번,학년,핸드폰,이메일,특강명,출석여부,비고
1,2026-03-02,김민수,컴퓨터공학과,AI,2024001,2,010-1111-2222,kim@example.com,Rust 입문,노쇼,
2,2026-03-02,이서연,경영학과,,2024002,1,010-3333-4444,lee@example.com,Rust 입문,출석,
3,2026-03-03,김민수,컴퓨터공학과,AI,2024001,2,010-1111-2222,kim@example.com,데이터 분석,,
4,2026-03-04,김민수,컴퓨터공학과,AI,2024001,2,010-1111-2222,kim@example.com,취업 특강,노쇼,연락 두절
5,2026-03-04,박지훈,경영학과,회계,2024003,,010-5555-6666,park@example.com,취업 특강,출석,
";

#[test]
fn csv_roster_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.csv");
    std::fs::write(&path, ROSTER).unwrap();

    let roster = load_roster(&path).expect("roster loads");
    assert_eq!(roster.len(), 5);
    assert_eq!(roster[2].status, AttendanceStatus::NoShow);

    let analysis = analyze(&roster);
    assert_eq!(analysis.summary.no_show_count, 3);
    assert_eq!(analysis.summary.no_show_rate, 60.0);
    assert_eq!(analysis.buckets.multiple.len(), 1);
    assert_eq!(analysis.buckets.multiple[0].student_id, "2024001");

    let majors: Vec<&str> = analysis
        .rates_for(Dimension::Major)
        .iter()
        .map(|rate| rate.value.as_str())
        .collect();
    assert_eq!(majors, vec!["AI", "미지정", "회계"]);

    let business = RosterFilter::new(vec!["경영학과".to_string()], vec![], vec![], vec![]);
    let scoped = analyze(&business.apply(&roster));
    assert_eq!(scoped.summary.total_records, 2);
    assert_eq!(scoped.summary.no_show_count, 0);

    let out = dir.path().join("exports");
    let table = export::dimension_table(Dimension::Lecture, analysis.rates_for(Dimension::Lecture));
    let outcome = export::write_table(&table, Format::Csv, &out, "lecture_stats").unwrap();
    assert_eq!(
        outcome,
        ExportOutcome::Written {
            path: out.join("lecture_stats.csv"),
            rows: 3
        }
    );
}

#[test]
fn store_backed_registry_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("data").join("lecture_data.json");
    let registry = Registry::new(JsonFileStore::new(&store_path));
    let now = NaiveDate::from_ymd_opt(2026, 3, 10)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();

    for (id, department) in [("2024001", "컴퓨터공학과"), ("2024002", "경영학과")] {
        registry
            .add_student(
                NewStudent {
                    student_id: id.to_string(),
                    name: format!("학생{id}"),
                    department: department.to_string(),
                    grade: "2".to_string(),
                    ..NewStudent::default()
                },
                now,
            )
            .unwrap();
    }
    let lecture = registry
        .add_lecture(
            NewLecture {
                lecture_name: "Rust 입문".to_string(),
                lecture_date: now.date(),
                lecture_time: "14:00".to_string(),
                location: "공학관 101".to_string(),
                capacity: 20,
                instructor: "최교수".to_string(),
                description: String::new(),
            },
            now,
        )
        .unwrap();
    registry.register("2024001", lecture.lecture_id, now).unwrap();
    registry.register("2024002", lecture.lecture_id, now).unwrap();
    registry.check_in("2024001", lecture.lecture_id, Mark::NoShow, now.date()).unwrap();
    registry.check_in("2024002", lecture.lecture_id, Mark::Attended, now.date()).unwrap();

    let reopened = Registry::new(JsonFileStore::new(&store_path));
    let data = reopened.snapshot().unwrap();
    let analysis = analyze(&registry::roster(&data));
    assert_eq!(analysis.summary.total_records, 2);
    assert_eq!(analysis.summary.no_show_rate, 50.0);
    assert_eq!(analysis.rates_for(Dimension::Department).len(), 2);
    assert_eq!(analysis.buckets.once.len(), 1);

    let backup = export::write_backup(&data, dir.path(), now).unwrap();
    reopened.store().reset(lecture_noshow_tracker::store::ResetScope::All).unwrap();
    assert!(reopened.snapshot().unwrap().registrations.is_empty());

    let restored = export::read_backup(&backup).unwrap();
    reopened.store().save_all(&restored).unwrap();
    assert_eq!(reopened.snapshot().unwrap(), data);
}
