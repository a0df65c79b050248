use crate::models::{AbsenceEntry, AttendanceStatus, Dataset};
use crate::roster;

/// Every (student, class) pair with at least one Absent record, most
/// absences first. Ties keep class order, then enrollment order.
pub fn collect_absences(data: &Dataset) -> Vec<AbsenceEntry> {
    let mut entries = Vec::new();

    for class in data.classes.iter() {
        for student in roster::enrolled_students(data, class.id) {
            let absent_dates: Vec<_> = data
                .attendance
                .iter()
                .filter(|a| {
                    a.student_id == student.id
                        && a.class_id == class.id
                        && a.status == AttendanceStatus::Absent
                })
                .map(|a| a.date)
                .collect();

            if absent_dates.is_empty() {
                continue;
            }

            entries.push(AbsenceEntry {
                student: student.clone(),
                class: class.clone(),
                total_absences: absent_dates.len(),
                absent_dates,
            });
        }
    }

    // sort_by is stable
    entries.sort_by(|a, b| b.total_absences.cmp(&a.total_absences));
    entries
}

/// Pick entries by their 1-based position in a ranked list, ignoring
/// positions that do not exist. Repeated positions select once.
pub fn select_entries(entries: &[AbsenceEntry], positions: &[usize]) -> Vec<AbsenceEntry> {
    let mut selected: Vec<AbsenceEntry> = Vec::new();

    for position in positions {
        let Some(entry) = position.checked_sub(1).and_then(|idx| entries.get(idx)) else {
            continue;
        };
        let already = selected
            .iter()
            .any(|s| s.student.id == entry.student.id && s.class.id == entry.class.id);
        if !already {
            selected.push(entry.clone());
        }
    }

    selected
}
