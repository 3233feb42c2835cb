use std::fmt::Write;

use crate::analysis::Analysis;
use crate::models::{AttendanceRecord, StudentNoShow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    Multiple,
    Twice,
    Once,
}

impl RiskTier {
    pub fn title(&self) -> &'static str {
        match self {
            RiskTier::Multiple => "3회 이상 노쇼 학생 (최우선 관리)",
            RiskTier::Twice => "2회 노쇼 학생 (주의 관리)",
            RiskTier::Once => "1회 노쇼 학생 (일반 관리)",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            RiskTier::Multiple => "특강 참여 제한 및 상담 필요",
            RiskTier::Twice => "경고장 발송 및 유선 연락",
            RiskTier::Once => "이메일 알림",
        }
    }

    fn students<'a>(&self, analysis: &'a Analysis) -> &'a [StudentNoShow] {
        match self {
            RiskTier::Multiple => &analysis.buckets.multiple,
            RiskTier::Twice => &analysis.buckets.twice,
            RiskTier::Once => &analysis.buckets.once,
        }
    }
}

pub fn build_report(source: &str, scope: Option<&str>, analysis: &Analysis) -> String {
    let mut output = String::new();
    let summary = &analysis.summary;

    let _ = writeln!(output, "# 특강 노쇼 현황 분석");
    let _ = writeln!(
        output,
        "Source: {} ({})",
        source,
        scope.unwrap_or("all records")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- 총 데이터 수: {}건", summary.total_records);
    let _ = writeln!(output, "- 고유 학생 수: {}명", summary.unique_students);
    let _ = writeln!(output, "- 총 특강 수: {}개", summary.unique_lectures);
    let _ = writeln!(output, "- 노쇼 건수: {}건", summary.no_show_count);
    let _ = writeln!(output, "- 노쇼율: {:.2}%", summary.no_show_rate);
    let _ = writeln!(
        output,
        "- 출석 확인: 참석 {}건, 불참 {}건, 미확인 {}건",
        analysis.marks.present_like, analysis.marks.no_show_like, analysis.marks.unmarked
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## 특강별 출석 상태 분포");
    if analysis.lecture_status.is_empty() {
        let _ = writeln!(output, "No records in this scope.");
    }
    for rate in analysis.rates_for(crate::models::Dimension::Lecture) {
        let statuses: Vec<String> = analysis
            .lecture_status
            .iter()
            .filter(|row| row.lecture_name == rate.value)
            .map(|row| format!("{} {}", row.status.label(), row.count))
            .collect();
        let _ = writeln!(output, "### {}", rate.value);
        let _ = writeln!(output, "- 상태: {}", statuses.join(", "));
        let _ = writeln!(
            output,
            "- 전체 인원: {}명, 노쇼율: {:.2}%",
            rate.total, rate.no_show_rate
        );

        let names: Vec<&str> = analysis
            .no_show_records
            .iter()
            .filter(|record| record.lecture_name == rate.value)
            .map(|record| record.student_name.as_str())
            .collect();
        if names.is_empty() {
            let _ = writeln!(output, "- 노쇼 학생이 없습니다.");
        } else {
            let _ = writeln!(output, "- 노쇼 학생: {}", names.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 노쇼 학생 관리");
    for tier in [RiskTier::Multiple, RiskTier::Twice, RiskTier::Once] {
        let _ = writeln!(output, "### {}", tier.title());
        let students = tier.students(analysis);
        if students.is_empty() {
            let _ = writeln!(output, "해당하는 학생이 없습니다.");
            continue;
        }
        for student in students {
            let _ = writeln!(
                output,
                "- {} ({}, {} {} {}학년) 노쇼 {}회",
                student.name,
                student.student_id,
                student.department,
                student.major,
                student.grade,
                student.no_show_count
            );
        }
        let _ = writeln!(output, "조치사항: {}", tier.action());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 전체 노쇼 학생 명단");
    if analysis.no_show_records.is_empty() {
        let _ = writeln!(output, "노쇼 학생이 없습니다.");
    } else {
        for record in &analysis.no_show_records {
            let _ = writeln!(output, "{}", no_show_line(record));
        }
    }

    output
}

fn no_show_line(record: &AttendanceRecord) -> String {
    let mut line = format!(
        "- {} {} ({}) {} / {}",
        record.student_id, record.student_name, record.department, record.lecture_name, record.date
    );
    if !record.note.is_empty() {
        let _ = write!(line, " [{}]", record.note);
    }
    line
}
