use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Dataset, LifecycleStatus, Student};

/// Students enrolled in `class_id`, in enrollment order. Enrollments that
/// point at a student no longer in the snapshot are skipped.
pub fn enrolled_students(data: &Dataset, class_id: Uuid) -> Vec<&Student> {
    data.enrollments
        .iter()
        .filter(|e| e.class_id == class_id)
        .filter_map(|e| {
            let student = data.student(e.student_id);
            if student.is_none() {
                debug!(student_id = %e.student_id, %class_id, "skipping enrollment for unknown student");
            }
            student
        })
        .collect()
}

pub fn is_enrolled(data: &Dataset, student_id: Uuid, class_id: Uuid) -> bool {
    data.enrollments
        .iter()
        .any(|e| e.student_id == student_id && e.class_id == class_id)
}

/// Whether `student_id` may be enrolled in `class_id`. Re-enrolling is
/// always fine; a capacity of zero or less means no limit.
pub fn check_enrollment(data: &Dataset, student_id: Uuid, class_id: Uuid) -> Result<(), AppError> {
    if data.student(student_id).is_none() {
        return Err(AppError::missing("student", student_id));
    }
    let class = data
        .class(class_id)
        .ok_or_else(|| AppError::missing("class", class_id))?;
    if is_enrolled(data, student_id, class_id) {
        return Ok(());
    }
    let enrolled = enrolled_students(data, class_id).len();
    if class.max_capacity > 0 && enrolled >= class.max_capacity as usize {
        return Err(AppError::ClassFull {
            class: class.name.clone(),
            capacity: class.max_capacity,
        });
    }
    Ok(())
}

/// A new capacity must still fit everyone already enrolled.
pub fn check_capacity(data: &Dataset, class_id: Uuid, capacity: i32) -> Result<(), AppError> {
    let class = data
        .class(class_id)
        .ok_or_else(|| AppError::missing("class", class_id))?;
    let enrolled = enrolled_students(data, class_id).len();
    if capacity > 0 && enrolled > capacity as usize {
        return Err(AppError::CapacityBelowEnrollment {
            class: class.name.clone(),
            capacity,
            enrolled,
        });
    }
    Ok(())
}

/// Case-insensitive match on name, student code or email. Archived students
/// are left out unless `include_archived` is set.
pub fn search_students<'a>(
    students: &'a [Student],
    term: &str,
    include_archived: bool,
) -> Vec<&'a Student> {
    let needle = term.trim().to_lowercase();

    students
        .iter()
        .filter(|s| include_archived || s.status == LifecycleStatus::Active)
        .filter(|s| {
            needle.is_empty()
                || s.full_name.to_lowercase().contains(&needle)
                || s.student_code.to_lowercase().contains(&needle)
                || s.email.to_lowercase().contains(&needle)
        })
        .collect()
}
