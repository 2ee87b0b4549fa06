use crate::model::{AttendanceRecord, AttendanceStatus, Student, Subject, Teacher, Weekday};
use crate::roster::Roster;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// JavaScript `Math.round((attended / total) * 100)`: halves round up.
/// An empty denominator yields 0 instead of NaN.
pub fn percentage(attended: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((attended as f64 / total as f64) * 100.0 + 0.5).floor() as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

impl Tally {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut t = Tally::default();
        for s in statuses {
            t.total += 1;
            match s {
                AttendanceStatus::Present => t.present += 1,
                AttendanceStatus::Late => t.late += 1,
                AttendanceStatus::Absent => t.absent += 1,
            }
        }
        t
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        Self::from_statuses(records.into_iter().map(|r| r.status))
    }

    /// Late arrivals still count towards attendance.
    pub fn attended(&self) -> usize {
        self.present + self.late
    }

    pub fn percentage(&self) -> u32 {
        percentage(self.attended(), self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub excellent: u32,
    pub good: u32,
    pub average: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            excellent: 85,
            good: 75,
            average: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Excellent,
    Good,
    Average,
    Poor,
}

impl Thresholds {
    pub fn band(&self, pct: u32) -> Band {
        if pct >= self.excellent {
            Band::Excellent
        } else if pct >= self.good {
            Band::Good
        } else if pct >= self.average {
            Band::Average
        } else {
            Band::Poor
        }
    }

    pub fn needs_attention(&self, pct: u32) -> bool {
        pct < self.good
    }

    /// Points still missing to reach the attendance goal.
    pub fn goal_gap(&self, pct: u32) -> u32 {
        self.excellent.saturating_sub(pct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject: Subject,
    pub percentage: u32,
    pub total_classes: usize,
    pub attended_classes: usize,
    /// Absent when derived from subject counters, which do not track lateness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student: Student,
    pub total_classes: usize,
    pub attended_classes: usize,
    pub percentage: u32,
    pub subject_wise_stats: Vec<SubjectStat>,
}

/// Per-student aggregate over whatever record list is live. Every subject gets an
/// entry, including ones with no sittings yet.
pub fn student_stats(student: &Student, subjects: &[Subject], records: &[AttendanceRecord]) -> StudentStats {
    let own: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.student_id.as_deref() == Some(student.id.as_str()))
        .collect();

    let overall = Tally::from_records(own.iter().copied());
    StudentStats {
        student: student.clone(),
        total_classes: overall.total,
        attended_classes: overall.attended(),
        percentage: overall.percentage(),
        subject_wise_stats: subject_stats(subjects, &own),
    }
}

/// One entry per subject, in `subjects` order, tallied over `records`.
pub fn subject_stats(subjects: &[Subject], records: &[&AttendanceRecord]) -> Vec<SubjectStat> {
    subjects
        .iter()
        .map(|subject| {
            let tally = Tally::from_records(records.iter().copied().filter(|r| r.subject_id == subject.id));
            SubjectStat {
                subject: subject.clone(),
                percentage: tally.percentage(),
                total_classes: tally.total,
                attended_classes: tally.attended(),
                late_count: Some(tally.late),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_classes: usize,
    pub attended_classes: usize,
    pub percentage: u32,
    pub subject_wise_stats: Vec<SubjectStat>,
}

/// Overview built from the running counters on each subject rather than records.
pub fn counter_overview(subjects: &[Subject]) -> OverviewStats {
    let total: usize = subjects.iter().map(|s| s.total_classes as usize).sum();
    let attended: usize = subjects.iter().map(|s| s.attended_classes as usize).sum();
    let subject_wise_stats = subjects
        .iter()
        .map(|s| SubjectStat {
            subject: s.clone(),
            percentage: percentage(s.attended_classes as usize, s.total_classes as usize),
            total_classes: s.total_classes as usize,
            attended_classes: s.attended_classes as usize,
            late_count: None,
        })
        .collect();
    OverviewStats {
        total_classes: total,
        attended_classes: attended,
        percentage: percentage(attended, total),
        subject_wise_stats,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherStats {
    pub total_students: usize,
    pub total_classes: usize,
    pub average_attendance: u32,
    pub subjects_teaching: usize,
    pub classes_teaching: Vec<String>,
}

/// Whether the record is for a subject the teacher teaches and a student in one of their classes.
pub fn teacher_covers(teacher: &Teacher, roster: &Roster, record: &AttendanceRecord) -> bool {
    teacher.teaches_subject(&record.subject_id)
        && record
            .student_id
            .as_deref()
            .and_then(|sid| roster.student(sid))
            .map(|s| teacher.teaches_class(&s.class_label()))
            .unwrap_or(false)
}

/// Only records of students in the teacher's classes, for subjects the teacher teaches.
pub fn teacher_records<'a>(
    teacher: &Teacher,
    roster: &Roster,
    records: &'a [AttendanceRecord],
) -> Vec<&'a AttendanceRecord> {
    records
        .iter()
        .filter(|r| teacher_covers(teacher, roster, r))
        .collect()
}

pub fn teacher_stats(teacher: &Teacher, roster: &Roster, records: &[AttendanceRecord]) -> TeacherStats {
    let relevant = teacher_records(teacher, roster, records);
    let tally = Tally::from_records(relevant);
    TeacherStats {
        total_students: roster.students_in_classes(teacher).count(),
        total_classes: tally.total,
        average_attendance: tally.percentage(),
        subjects_teaching: teacher.subjects.len(),
        classes_teaching: teacher.classes.clone(),
    }
}

/// Rounded mean of student percentages; an empty class averages 0.
pub fn class_average(percentages: &[u32]) -> u32 {
    if percentages.is_empty() {
        return 0;
    }
    let sum: u64 = percentages.iter().map(|p| *p as u64).sum();
    ((sum as f64 / percentages.len() as f64) + 0.5).floor() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student: Student,
    pub total_classes: usize,
    pub attended_classes: usize,
    pub percentage: u32,
    pub band: Band,
}

impl StudentSummary {
    pub fn from_stats(stats: &StudentStats, thresholds: &Thresholds) -> Self {
        Self {
            student: stats.student.clone(),
            total_classes: stats.total_classes,
            attended_classes: stats.attended_classes,
            percentage: stats.percentage,
            band: thresholds.band(stats.percentage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_label: String,
    pub student_count: usize,
    pub average_attendance: u32,
    pub band: Band,
}

pub fn class_summaries(
    classes: &[String],
    students: &[StudentSummary],
    thresholds: &Thresholds,
) -> Vec<ClassSummary> {
    classes
        .iter()
        .map(|label| {
            let pcts: Vec<u32> = students
                .iter()
                .filter(|s| &s.student.class_label() == label)
                .map(|s| s.percentage)
                .collect();
            let avg = class_average(&pcts);
            ClassSummary {
                class_label: label.clone(),
                student_count: pcts.len(),
                average_attendance: avg,
                band: thresholds.band(avg),
            }
        })
        .collect()
}

pub fn needs_attention(students: &[StudentSummary], thresholds: &Thresholds) -> Vec<StudentSummary> {
    students
        .iter()
        .filter(|s| thresholds.needs_attention(s.percentage))
        .cloned()
        .collect()
}

pub const TOP_PERFORMERS: usize = 5;

pub fn top_performers(students: &[StudentSummary], thresholds: &Thresholds) -> Vec<StudentSummary> {
    let mut top: Vec<StudentSummary> = students
        .iter()
        .filter(|s| s.percentage >= thresholds.excellent)
        .cloned()
        .collect();
    top.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    top.truncate(TOP_PERFORMERS);
    top
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: String,
    pub records: Vec<AttendanceRecord>,
    pub total_classes: usize,
    pub present_classes: usize,
    pub late_classes: usize,
    pub absent_classes: usize,
    pub attended_classes: usize,
    pub percentage: u32,
}

/// Records on `date`, ordered by time slot.
pub fn day_summary<'a, I>(date: &str, records: I) -> DaySummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut day: Vec<AttendanceRecord> = records
        .into_iter()
        .filter(|r| r.date == date)
        .cloned()
        .collect();
    day.sort_by(|a, b| a.time_slot.cmp(&b.time_slot));
    let tally = Tally::from_records(&day);
    DaySummary {
        date: date.to_string(),
        total_classes: tally.total,
        present_classes: tally.present,
        late_classes: tally.late,
        absent_classes: tally.absent,
        attended_classes: tally.attended(),
        percentage: tally.percentage(),
        records: day,
    }
}

/// The last `days` school days up to and including `anchor`, newest first.
/// Weekends are skipped, so a weekend anchor starts from the Friday before.
pub fn recent_dates(anchor: NaiveDate, days: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(days);
    let mut day = anchor;
    while dates.len() < days {
        if Weekday::from_date(day).is_some() {
            dates.push(day);
        }
        day -= Duration::days(1);
    }
    dates
}

pub fn recent_days(anchor: NaiveDate, days: usize, records: &[AttendanceRecord]) -> Vec<DaySummary> {
    recent_dates(anchor, days)
        .into_iter()
        .map(|d| day_summary(&d.format("%Y-%m-%d").to_string(), records))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectSort {
    #[default]
    Name,
    Percentage,
    Total,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentSort {
    #[default]
    Name,
    Attendance,
    RollNumber,
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

pub fn sort_subject_stats(stats: &mut [SubjectStat], by: SubjectSort) {
    match by {
        SubjectSort::Name => stats.sort_by(|a, b| cmp_text(&a.subject.name, &b.subject.name)),
        SubjectSort::Percentage => stats.sort_by(|a, b| b.percentage.cmp(&a.percentage)),
        SubjectSort::Total => stats.sort_by(|a, b| b.total_classes.cmp(&a.total_classes)),
    }
}

pub fn sort_students(rows: &mut [StudentSummary], by: StudentSort) {
    match by {
        StudentSort::Name => rows.sort_by(|a, b| cmp_text(&a.student.name, &b.student.name)),
        StudentSort::Attendance => rows.sort_by(|a, b| b.percentage.cmp(&a.percentage)),
        StudentSort::RollNumber => {
            rows.sort_by(|a, b| cmp_text(&a.student.roll_number, &b.student.roll_number))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn rec(student: &str, subject: &str, date: &str, slot: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: format!("{student}-{subject}-{date}-{slot}"),
            student_id: Some(student.to_string()),
            subject_id: subject.to_string(),
            date: date.to_string(),
            status,
            time_slot: slot.to_string(),
            marked_by: None,
            marked_at: None,
        }
    }

    #[test]
    fn percentage_rounds_half_up_and_guards_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(7, 8), 88);
        assert_eq!(percentage(0, 4), 0);
    }

    #[test]
    fn tally_counts_late_as_attended() {
        use AttendanceStatus::*;
        let t = Tally::from_statuses([Present, Late, Absent, Absent]);
        assert_eq!(t.total, 4);
        assert_eq!(t.attended(), 2);
        assert_eq!(t.percentage(), 50);
    }

    #[test]
    fn student_stats_cover_every_subject() {
        use AttendanceStatus::*;
        let roster = seed::roster();
        let student = roster.student("std001").expect("student").clone();
        let records = vec![
            rec("std001", "1", "2024-01-15", "09:00-10:00", Present),
            rec("std001", "1", "2024-01-16", "09:00-10:00", Late),
            rec("std001", "2", "2024-01-15", "10:00-11:00", Absent),
            rec("std002", "2", "2024-01-15", "10:00-11:00", Present),
        ];
        let stats = student_stats(&student, &roster.subjects, &records);
        assert_eq!(stats.total_classes, 3);
        assert_eq!(stats.attended_classes, 2);
        assert_eq!(stats.percentage, 67);
        assert_eq!(stats.subject_wise_stats.len(), 5);

        let maths = &stats.subject_wise_stats[0];
        assert_eq!(maths.percentage, 100);
        assert_eq!(maths.late_count, Some(1));
        let physics = &stats.subject_wise_stats[1];
        assert_eq!(physics.percentage, 0);
        assert_eq!(physics.total_classes, 1);
        let english = &stats.subject_wise_stats[4];
        assert_eq!(english.total_classes, 0);
        assert_eq!(english.percentage, 0);
    }

    #[test]
    fn counter_overview_matches_seed_counters() {
        let overview = counter_overview(&seed::subjects());
        assert_eq!(overview.total_classes, 208);
        assert_eq!(overview.attended_classes, 194);
        assert_eq!(overview.percentage, 93);
        assert_eq!(overview.subject_wise_stats[1].percentage, 88);
        assert_eq!(overview.subject_wise_stats[1].late_count, None);
    }

    #[test]
    fn teacher_stats_restrict_to_taught_subjects() {
        use AttendanceStatus::*;
        let roster = seed::roster();
        let maths = roster.teacher("tch001").expect("teacher");
        let records = vec![
            rec("std001", "1", "2024-01-15", "09:00-10:00", Present),
            rec("std004", "1", "2024-01-15", "09:00-10:00", Absent),
            rec("std001", "2", "2024-01-15", "10:00-11:00", Absent),
        ];
        let stats = teacher_stats(maths, &roster, &records);
        assert_eq!(stats.total_students, 15);
        assert_eq!(stats.total_classes, 2);
        assert_eq!(stats.average_attendance, 50);
        assert_eq!(stats.subjects_teaching, 1);
        assert_eq!(stats.classes_teaching, vec!["12th-A", "12th-B"]);
    }

    #[test]
    fn bands_follow_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.band(85), Band::Excellent);
        assert_eq!(t.band(84), Band::Good);
        assert_eq!(t.band(75), Band::Good);
        assert_eq!(t.band(60), Band::Average);
        assert_eq!(t.band(59), Band::Poor);
        assert!(t.needs_attention(74));
        assert!(!t.needs_attention(75));
        assert_eq!(t.goal_gap(80), 5);
        assert_eq!(t.goal_gap(90), 0);
    }

    #[test]
    fn class_average_rounds_mean() {
        assert_eq!(class_average(&[]), 0);
        assert_eq!(class_average(&[80, 81]), 81);
        assert_eq!(class_average(&[90, 70, 75]), 78);
    }

    #[test]
    fn day_summary_sorts_by_slot() {
        use AttendanceStatus::*;
        let records = vec![
            rec("std001", "2", "2024-01-15", "14:00-15:00", Absent),
            rec("std001", "1", "2024-01-15", "09:00-10:00", Late),
            rec("std001", "1", "2024-01-16", "09:00-10:00", Present),
        ];
        let day = day_summary("2024-01-15", &records);
        assert_eq!(day.total_classes, 2);
        assert_eq!(day.late_classes, 1);
        assert_eq!(day.absent_classes, 1);
        assert_eq!(day.percentage, 50);
        assert_eq!(day.records[0].time_slot, "09:00-10:00");
    }

    #[test]
    fn recent_dates_walk_back_over_school_days() {
        let as_strings = |dates: Vec<NaiveDate>| -> Vec<String> {
            dates.into_iter().map(|d| d.to_string()).collect()
        };
        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 24).expect("date");
        assert_eq!(
            as_strings(recent_dates(wednesday, 7)),
            vec![
                "2024-01-24",
                "2024-01-23",
                "2024-01-22",
                "2024-01-19",
                "2024-01-18",
                "2024-01-17",
                "2024-01-16",
            ]
        );

        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3).expect("date");
        assert_eq!(
            as_strings(recent_dates(sunday, 3)),
            vec!["2024-03-01", "2024-02-29", "2024-02-28"]
        );
        assert!(recent_dates(sunday, 0).is_empty());
    }

    #[test]
    fn sorting_and_top_performers() {
        let t = Thresholds::default();
        let roster = seed::roster();
        let mk = |id: &str, pct: u32| StudentSummary {
            student: roster.student(id).expect("student").clone(),
            total_classes: 100,
            attended_classes: pct as usize,
            percentage: pct,
            band: t.band(pct),
        };
        let mut rows = vec![mk("std002", 70), mk("std001", 95), mk("std003", 88)];

        sort_students(&mut rows, StudentSort::Name);
        let names: Vec<&str> = rows.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Emma Johnson", "John Smith", "Michael Brown"]);

        sort_students(&mut rows, StudentSort::RollNumber);
        assert_eq!(rows[0].student.id, "std001");

        let top = top_performers(&rows, &t);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].percentage, 95);
        let low = needs_attention(&rows, &t);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].student.id, "std002");

        let classes = class_summaries(&["12th-A".to_string()], &rows, &t);
        assert_eq!(classes[0].student_count, 3);
        assert_eq!(classes[0].average_attendance, 84);
    }

    #[test]
    fn subject_sort_orders() {
        let mut stats = counter_overview(&seed::subjects()).subject_wise_stats;
        sort_subject_stats(&mut stats, SubjectSort::Total);
        assert_eq!(stats[0].subject.code, "CS101");
        sort_subject_stats(&mut stats, SubjectSort::Name);
        assert_eq!(stats[0].subject.name, "Chemistry");
        sort_subject_stats(&mut stats, SubjectSort::Percentage);
        let codes: Vec<&str> = stats.iter().map(|s| s.subject.code.as_str()).collect();
        assert_eq!(codes, vec!["CS101", "CHEM101", "ENG101", "MATH101", "PHY101"]);
    }
}
