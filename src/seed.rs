use crate::model::{
    AttendanceRecord, AttendanceStatus, Role, Student, Subject, Teacher, TimeSlot, Weekday,
    WeeklyTimetable,
};
use crate::roster::Roster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Dates the generated history covers (school days only).
pub const SEED_DATES: [&str; 8] = [
    "2024-01-15",
    "2024-01-16",
    "2024-01-17",
    "2024-01-18",
    "2024-01-19",
    "2024-01-22",
    "2024-01-23",
    "2024-01-24",
];

/// Slots a teacher can mark attendance for.
pub const MARKING_TIME_SLOTS: [&str; 5] = [
    "09:00-10:00",
    "10:00-11:00",
    "11:00-12:00",
    "14:00-15:00",
    "15:00-16:00",
];

const SUBJECTS: [(&str, &str, &str, &str, u32, u32); 5] = [
    ("1", "Mathematics", "MATH101", "#3B82F6", 45, 42),
    ("2", "Physics", "PHY101", "#10B981", 40, 35),
    ("3", "Chemistry", "CHEM101", "#F59E0B", 38, 36),
    ("4", "Computer Science", "CS101", "#8B5CF6", 50, 48),
    ("5", "English", "ENG101", "#EF4444", 35, 33),
];

// id, name, roll number, section, avatar background
const STUDENTS: [(&str, &str, &str, &str, &str); 15] = [
    ("std001", "John Smith", "CS2023001", "A", "3B82F6"),
    ("std002", "Emma Johnson", "CS2023002", "A", "10B981"),
    ("std003", "Michael Brown", "CS2023003", "A", "F59E0B"),
    ("std004", "Sophia Davis", "CS2023004", "B", "8B5CF6"),
    ("std005", "William Wilson", "CS2023005", "B", "EF4444"),
    ("std006", "Olivia Miller", "CS2023006", "A", "06B6D4"),
    ("std007", "James Moore", "CS2023007", "B", "84CC16"),
    ("std008", "Ava Taylor", "CS2023008", "A", "F97316"),
    ("std009", "Benjamin Anderson", "CS2023009", "B", "EC4899"),
    ("std010", "Isabella Thomas", "CS2023010", "A", "6366F1"),
    ("std011", "Lucas Jackson", "CS2023011", "B", "14B8A6"),
    ("std012", "Mia White", "CS2023012", "A", "F59E0B"),
    ("std013", "Henry Harris", "CS2023013", "B", "8B5CF6"),
    ("std014", "Charlotte Martin", "CS2023014", "A", "EF4444"),
    ("std015", "Alexander Garcia", "CS2023015", "B", "3B82F6"),
];

// id, name, teacher id, email, department, subjects, avatar background
const TEACHERS: [(&str, &str, &str, &str, &str, &[&str], &str); 6] = [
    ("tch001", "Dr. Sarah Wilson", "MATH001", "sarah.wilson", "Mathematics", &["1"], "3B82F6"),
    ("tch002", "Prof. David Martinez", "PHY001", "david.martinez", "Physics", &["2"], "10B981"),
    ("tch003", "Dr. Emily Chen", "CHEM001", "emily.chen", "Chemistry", &["3"], "F59E0B"),
    ("tch004", "Mr. James Rodriguez", "CS001", "james.rodriguez", "Computer Science", &["4"], "8B5CF6"),
    ("tch005", "Ms. Lisa Thompson", "ENG001", "lisa.thompson", "English", &["5"], "EF4444"),
    (
        "tch006",
        "Dr. Michael Kumar",
        "PRIN001",
        "michael.kumar",
        "Administration",
        &["1", "2", "3", "4", "5"],
        "6366F1",
    ),
];

const TEACHER_CLASSES: [&str; 2] = ["12th-A", "12th-B"];

// Subject index per period, `None` for the lunch break.
const WEEK_PLAN: [(Weekday, [Option<usize>; 6]); 5] = [
    (Weekday::Monday, [Some(0), Some(1), Some(2), None, Some(3), Some(4)]),
    (Weekday::Tuesday, [Some(1), Some(0), Some(3), None, Some(2), Some(4)]),
    (Weekday::Wednesday, [Some(2), Some(3), Some(0), None, Some(1), Some(4)]),
    (Weekday::Thursday, [Some(3), Some(2), Some(1), None, Some(0), Some(4)]),
    (Weekday::Friday, [Some(4), Some(0), Some(2), None, Some(3), Some(1)]),
];

const PERIODS: [(&str, &str); 6] = [
    ("09:00", "10:00"),
    ("10:00", "11:00"),
    ("11:00", "12:00"),
    ("12:00", "13:00"),
    ("14:00", "15:00"),
    ("15:00", "16:00"),
];

// Personal journal of the single-student dashboard: subject, date, status, slot.
const JOURNAL: [(&str, &str, AttendanceStatus, &str); 10] = [
    ("1", "2024-01-15", AttendanceStatus::Present, "09:00-10:00"),
    ("2", "2024-01-15", AttendanceStatus::Present, "10:00-11:00"),
    ("3", "2024-01-15", AttendanceStatus::Absent, "11:00-12:00"),
    ("4", "2024-01-15", AttendanceStatus::Present, "14:00-15:00"),
    ("1", "2024-01-16", AttendanceStatus::Late, "09:00-10:00"),
    ("5", "2024-01-16", AttendanceStatus::Present, "15:00-16:00"),
    ("2", "2024-01-17", AttendanceStatus::Present, "10:00-11:00"),
    ("3", "2024-01-17", AttendanceStatus::Present, "11:00-12:00"),
    ("4", "2024-01-17", AttendanceStatus::Present, "14:00-15:00"),
    ("1", "2024-01-18", AttendanceStatus::Present, "09:00-10:00"),
];

fn avatar_url(name: &str, background: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background={}&color=fff",
        name.replace(' ', "+"),
        background
    )
}

pub fn subjects() -> Vec<Subject> {
    SUBJECTS
        .iter()
        .map(|(id, name, code, color, total, attended)| Subject {
            id: id.to_string(),
            name: name.to_string(),
            code: code.to_string(),
            color: color.to_string(),
            total_classes: *total,
            attended_classes: *attended,
        })
        .collect()
}

pub fn students() -> Vec<Student> {
    STUDENTS
        .iter()
        .map(|(id, name, roll, section, bg)| Student {
            id: id.to_string(),
            name: name.to_string(),
            roll_number: roll.to_string(),
            email: Some(format!("{}@school.edu", name.to_lowercase().replace(' ', "."))),
            class: "12th".to_string(),
            section: section.to_string(),
            avatar: Some(avatar_url(name, bg)),
        })
        .collect()
}

pub fn teachers() -> Vec<Teacher> {
    TEACHERS
        .iter()
        .map(|(id, name, teacher_id, mailbox, dept, subjects, bg)| Teacher {
            id: id.to_string(),
            name: name.to_string(),
            teacher_id: teacher_id.to_string(),
            email: format!("{}@school.edu", mailbox),
            department: dept.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            classes: TEACHER_CLASSES.iter().map(|c| c.to_string()).collect(),
            avatar: Some(avatar_url(name, bg)),
            role: Role::Teacher,
        })
        .collect()
}

pub fn roster() -> Roster {
    Roster {
        subjects: subjects(),
        students: students(),
        teachers: teachers(),
    }
}

pub fn timetable(subjects: &[Subject]) -> WeeklyTimetable {
    let mut days = BTreeMap::new();
    for (day, plan) in WEEK_PLAN {
        let slots = plan
            .iter()
            .zip(PERIODS)
            .enumerate()
            .map(|(i, (subject_idx, (start, end)))| TimeSlot {
                id: format!("{}-{}", day.short(), i + 1),
                start_time: start.to_string(),
                end_time: end.to_string(),
                subject: subject_idx.and_then(|idx| subjects.get(idx).cloned()),
                day,
            })
            .collect();
        days.insert(day, slots);
    }
    WeeklyTimetable { days }
}

pub fn journal() -> Vec<AttendanceRecord> {
    JOURNAL
        .iter()
        .enumerate()
        .map(|(i, (subject_id, date, status, slot))| AttendanceRecord {
            id: (i + 1).to_string(),
            student_id: None,
            subject_id: subject_id.to_string(),
            date: date.to_string(),
            status: *status,
            time_slot: slot.to_string(),
            marked_by: None,
            marked_at: None,
        })
        .collect()
}

/// Pseudo-random class history: 3-4 sittings per student, date and subject,
/// each drawn against a per-sitting attendance rate in [0.75, 0.95).
pub fn generate_records(
    students: &[Student],
    subjects: &[Subject],
    seed: u64,
    marked_at: &str,
) -> Vec<AttendanceRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::new();

    for student in students {
        for date in SEED_DATES {
            for subject in subjects {
                let sittings: usize = rng.random_range(3..=4);
                for (i, slot) in MARKING_TIME_SLOTS.iter().enumerate().take(sittings) {
                    let rate = 0.75 + rng.random::<f64>() * 0.2;
                    let roll = rng.random::<f64>();
                    let status = if roll < rate * 0.85 {
                        AttendanceStatus::Present
                    } else if roll < rate * 0.95 {
                        AttendanceStatus::Late
                    } else {
                        AttendanceStatus::Absent
                    };
                    records.push(AttendanceRecord {
                        id: format!("{}-{}-{}-{}", student.id, subject.id, date, i),
                        student_id: Some(student.id.clone()),
                        subject_id: subject.id.clone(),
                        date: date.to_string(),
                        status,
                        time_slot: slot.to_string(),
                        marked_by: None,
                        marked_at: Some(marked_at.to_string()),
                    });
                }
            }
        }
    }
    records
}

/// Everything the daemon starts from before any stored state is applied.
#[derive(Debug, Clone)]
pub struct SeedData {
    pub roster: Roster,
    pub timetable: WeeklyTimetable,
    pub journal: Vec<AttendanceRecord>,
    pub records: Vec<AttendanceRecord>,
}

impl SeedData {
    pub fn generate(seed: u64, marked_at: &str) -> Self {
        let roster = roster();
        let timetable = timetable(&roster.subjects);
        let records = generate_records(&roster.students, &roster.subjects, seed, marked_at);
        tracing::debug!(seed, records = records.len(), "generated seed attendance");
        Self {
            roster,
            timetable,
            journal: journal(),
            records,
        }
    }
}
