use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::NewStudent;

pub const PLACEHOLDER_PREFIX: &str = "TMP-";

/// Parse a roster export with one header row and the columns
/// `student code, full name, email, phone`. Rows without a name are dropped.
/// Rows without a code get a generated placeholder.
pub fn parse_students<R: Read>(input: R) -> Result<Vec<NewStudent>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let mut students = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        match student_from_record(&record) {
            Some(student) => students.push(student),
            None => debug!(row = row + 2, "skipping import row without a name"),
        }
    }

    Ok(students)
}

pub fn parse_students_from_path(path: &std::path::Path) -> Result<Vec<NewStudent>, AppError> {
    let file = std::fs::File::open(path)?;
    parse_students(file)
}

fn student_from_record(record: &StringRecord) -> Option<NewStudent> {
    let field = |idx: usize| record.get(idx).unwrap_or("").to_string();

    let full_name = field(1);
    if full_name.is_empty() {
        return None;
    }

    let mut student_code = field(0);
    if student_code.is_empty() {
        student_code = placeholder_code();
    }

    Some(NewStudent {
        student_code,
        full_name,
        email: field(2),
        phone: field(3),
    })
}

fn placeholder_code() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{PLACEHOLDER_PREFIX}{}", id[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_after_the_header() {
        let input = "Student ID, Full Name, Email, Phone\n\
                     GM001, John Doe, john@example.com, 555-0100\n\
                     GM002,Jane Roe,jane@example.com,555-0101\n";
        let students = parse_students(input.as_bytes()).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(
            students[0],
            NewStudent {
                student_code: "GM001".to_string(),
                full_name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                phone: "555-0100".to_string(),
            }
        );
        assert_eq!(students[1].full_name, "Jane Roe");
    }

    #[test]
    fn rows_without_a_name_are_dropped() {
        let input = "code,name,email,phone\nGM001,,ghost@example.com,\nGM002,Ana Ruiz\n";
        let students = parse_students(input.as_bytes()).unwrap();

        assert_eq!(students.len(), 1);
        assert_eq!(students[0].student_code, "GM002");
        assert_eq!(students[0].email, "");
        assert_eq!(students[0].phone, "");
    }

    #[test]
    fn missing_codes_get_placeholders() {
        let input = "code,name,email,phone\n,Ana Ruiz,ana@example.com,\n,Ben Ito,,\n";
        let students = parse_students(input.as_bytes()).unwrap();

        assert_eq!(students.len(), 2);
        for student in &students {
            assert!(student.student_code.starts_with(PLACEHOLDER_PREFIX));
            assert_eq!(student.student_code.len(), PLACEHOLDER_PREFIX.len() + 8);
        }
        assert_ne!(students[0].student_code, students[1].student_code);
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let input = "code,name,email,phone\nGM010,\"Lee, Jordan\",jordan@example.com,555-0110\n";
        let students = parse_students(input.as_bytes()).unwrap();
        assert_eq!(students[0].full_name, "Lee, Jordan");
    }

    #[test]
    fn header_only_input_yields_nothing() {
        let students = parse_students("code,name,email,phone\n".as_bytes()).unwrap();
        assert!(students.is_empty());
    }
}
