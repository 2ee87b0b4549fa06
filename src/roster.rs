use crate::model::{Student, Subject, Teacher};

/// The static school directory: who exists, who teaches what, and the
/// credential table logins are checked against.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub subjects: Vec<Subject>,
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
}

impl Roster {
    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn teacher(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    /// Case-insensitive match on name and roll number.
    pub fn find_student_by_credentials(&self, name: &str, roll_number: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|s| eq_ignore_case(&s.name, name) && eq_ignore_case(&s.roll_number, roll_number))
    }

    /// Case-insensitive match on name and teacher id.
    pub fn find_teacher_by_credentials(&self, name: &str, teacher_id: &str) -> Option<&Teacher> {
        self.teachers
            .iter()
            .find(|t| eq_ignore_case(&t.name, name) && eq_ignore_case(&t.teacher_id, teacher_id))
    }

    pub fn students_in_classes<'a>(&'a self, teacher: &'a Teacher) -> impl Iterator<Item = &'a Student> + 'a {
        self.students
            .iter()
            .filter(move |s| teacher.teaches_class(&s.class_label()))
    }

    pub fn teacher_subjects<'a>(&'a self, teacher: &'a Teacher) -> impl Iterator<Item = &'a Subject> + 'a {
        self.subjects.iter().filter(move |s| teacher.teaches_subject(&s.id))
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
