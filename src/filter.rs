use crate::model::{AttendanceRecord, Student};
use crate::roster::Roster;
use serde::Deserialize;

/// Treat a missing, empty or `"all"` selector as "no filter".
fn selector(v: &Option<String>) -> Option<&str> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub date: Option<String>,
    pub subject_id: Option<String>,
    /// Class label such as `12th-A`; resolved through the record's student.
    #[serde(rename = "class")]
    pub class_label: Option<String>,
    pub student_id: Option<String>,
    pub time_slot: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &AttendanceRecord, roster: &Roster) -> bool {
        if let Some(date) = selector(&self.date) {
            if record.date != date {
                return false;
            }
        }
        if let Some(subject_id) = selector(&self.subject_id) {
            if record.subject_id != subject_id {
                return false;
            }
        }
        if let Some(student_id) = selector(&self.student_id) {
            if record.student_id.as_deref() != Some(student_id) {
                return false;
            }
        }
        if let Some(slot) = selector(&self.time_slot) {
            if record.time_slot != slot {
                return false;
            }
        }
        if let Some(label) = selector(&self.class_label) {
            let in_class = record
                .student_id
                .as_deref()
                .and_then(|sid| roster.student(sid))
                .map(|s| s.class_label() == label)
                .unwrap_or(false);
            if !in_class {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, records: &'a [AttendanceRecord], roster: &Roster) -> Vec<&'a AttendanceRecord> {
        records.iter().filter(|r| self.matches(r, roster)).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuery {
    /// Case-insensitive substring of name or roll number.
    pub search: Option<String>,
    #[serde(rename = "class")]
    pub class_label: Option<String>,
}

impl StudentQuery {
    pub fn matches(&self, student: &Student) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                student.name.to_lowercase().contains(&term)
                    || student.roll_number.to_lowercase().contains(&term)
            }
            _ => true,
        };
        let matches_class = match selector(&self.class_label) {
            Some(label) => student.class_label() == label,
            None => true,
        };
        matches_search && matches_class
    }
}
