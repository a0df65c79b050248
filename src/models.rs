use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matrix::CellChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Active,
    Archived,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Archived => "archived",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LifecycleStatus::Active),
            "archived" | "inactive" => Ok(LifecycleStatus::Archived),
            other => Err(format!("unknown lifecycle status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub status: LifecycleStatus,
}

/// Student fields as entered on a form or read from an import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub student_code: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOffering {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_capacity: i32,
    pub status: LifecycleStatus,
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_capacity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_capacity: Option<i32>,
    pub status: Option<LifecycleStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
}

/// Stored attendance status. "Unset" is the absence of a record, never a value here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Single-letter code used in the stored rows and the grid.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Absent => "A",
            AttendanceStatus::Late => "L",
            AttendanceStatus::Excused => "E",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "p" | "present" => Ok(AttendanceStatus::Present),
            "a" | "absent" => Ok(AttendanceStatus::Absent),
            "l" | "late" => Ok(AttendanceStatus::Late),
            "e" | "excused" => Ok(AttendanceStatus::Excused),
            other => Err(format!("unknown attendance status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// All students of one class who missed at least one session.
#[derive(Debug, Clone, Serialize)]
pub struct AbsenceEntry {
    pub student: Student,
    pub class: ClassOffering,
    pub absent_dates: Vec<NaiveDate>,
    pub total_absences: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub class_name: String,
    pub enrolled: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub attendance_rate: f64,
}

/// In-memory snapshot of the whole store. Reloaded wholesale, patched after
/// successful writes.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub classes: Vec<ClassOffering>,
    pub enrollments: Vec<Enrollment>,
    pub attendance: Vec<AttendanceRecord>,
    pub users: Vec<User>,
}

impl Dataset {
    pub fn student(&self, id: Uuid) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn class(&self, id: Uuid) -> Option<&ClassOffering> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn find_record(
        &self,
        student_id: Uuid,
        class_id: Uuid,
        date: NaiveDate,
    ) -> Option<&AttendanceRecord> {
        self.attendance
            .iter()
            .find(|a| a.student_id == student_id && a.class_id == class_id && a.date == date)
    }

    /// Mirror a change the store has accepted into the snapshot.
    pub fn apply(&mut self, change: &CellChange) {
        match change {
            CellChange::Unchanged => {}
            CellChange::Delete { record_id } => {
                self.attendance.retain(|a| a.id != *record_id);
            }
            CellChange::Update {
                record_id,
                status,
                notes,
            } => {
                if let Some(record) = self.attendance.iter_mut().find(|a| a.id == *record_id) {
                    record.status = *status;
                    record.notes = notes.clone();
                }
            }
            CellChange::Create(record) => {
                let duplicate = self
                    .find_record(record.student_id, record.class_id, record.date)
                    .is_some();
                if !duplicate {
                    self.attendance.push(record.clone());
                }
            }
        }
    }
}
