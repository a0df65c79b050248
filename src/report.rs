use std::fmt::Write;

use chrono::NaiveDate;

use crate::absences;
use crate::models::{AttendanceStatus, ClassSummary, Dataset, LifecycleStatus};
use crate::roster;

pub fn summarize_by_class(data: &Dataset) -> Vec<ClassSummary> {
    data.classes
        .iter()
        .map(|class| {
            let (mut present, mut absent, mut late, mut excused) = (0usize, 0usize, 0usize, 0usize);
            for record in data.attendance.iter().filter(|a| a.class_id == class.id) {
                match record.status {
                    AttendanceStatus::Present => present += 1,
                    AttendanceStatus::Absent => absent += 1,
                    AttendanceStatus::Late => late += 1,
                    AttendanceStatus::Excused => excused += 1,
                }
            }
            let recorded = present + absent + late + excused;

            ClassSummary {
                class_name: class.name.clone(),
                enrolled: roster::enrolled_students(data, class.id).len(),
                present,
                absent,
                late,
                excused,
                attendance_rate: if recorded == 0 {
                    0.0
                } else {
                    (present + late) as f64 / recorded as f64
                },
            }
        })
        .collect()
}

pub fn build_report(data: &Dataset, generated_on: NaiveDate) -> String {
    let summaries = summarize_by_class(data);
    let entries = absences::collect_absences(data);

    let mut output = String::new();
    let active_students = data
        .students
        .iter()
        .filter(|s| s.status == LifecycleStatus::Active)
        .count();
    let active_classes = data
        .classes
        .iter()
        .filter(|c| c.status == LifecycleStatus::Active)
        .count();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} active students, {} active classes, {} attendance records, {} staff accounts",
        active_students,
        active_classes,
        data.attendance.len(),
        data.users.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Classes");

    if summaries.is_empty() {
        let _ = writeln!(output, "No classes on file.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} enrolled, {} present, {} absent, {} late, {} excused (attendance {:.1}%)",
                summary.class_name,
                summary.enrolled,
                summary.present,
                summary.absent,
                summary.late,
                summary.excused,
                summary.attendance_rate * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Absences");

    if entries.is_empty() {
        let _ = writeln!(output, "No absences recorded.");
    } else {
        for entry in entries.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) in {}: {} absent",
                entry.student.full_name,
                entry.student.student_code,
                entry.class.name,
                entry.total_absences
            );
        }
    }

    let mut recent: Vec<_> = data
        .attendance
        .iter()
        .filter(|a| a.status == AttendanceStatus::Absent)
        .collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Absences");

    if recent.is_empty() {
        let _ = writeln!(output, "No absences recorded.");
    } else {
        for record in recent.iter().take(5) {
            let student = data
                .student(record.student_id)
                .map(|s| s.full_name.as_str())
                .unwrap_or("unknown student");
            let class = data
                .class(record.class_id)
                .map(|c| c.name.as_str())
                .unwrap_or("unknown class");
            if record.notes.is_empty() {
                let _ = writeln!(output, "- {} ({}) on {}", student, class, record.date);
            } else {
                let _ = writeln!(
                    output,
                    "- {} ({}) on {}: {}",
                    student, class, record.date, record.notes
                );
            }
        }
    }

    output
}
