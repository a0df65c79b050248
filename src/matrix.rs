use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AttendanceRecord, AttendanceStatus, Dataset, Student};
use crate::roster;
use crate::schedule;

/// State of one grid cell. Cycles Unset -> Present -> Absent -> Late -> Excused -> Unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CellState {
    Unset,
    Present,
    Absent,
    Late,
    Excused,
}

impl CellState {
    pub fn next(self) -> CellState {
        match self {
            CellState::Unset => CellState::Present,
            CellState::Present => CellState::Absent,
            CellState::Absent => CellState::Late,
            CellState::Late => CellState::Excused,
            CellState::Excused => CellState::Unset,
        }
    }

    pub fn status(self) -> Option<AttendanceStatus> {
        match self {
            CellState::Unset => None,
            CellState::Present => Some(AttendanceStatus::Present),
            CellState::Absent => Some(AttendanceStatus::Absent),
            CellState::Late => Some(AttendanceStatus::Late),
            CellState::Excused => Some(AttendanceStatus::Excused),
        }
    }

    pub fn parse(value: &str) -> Result<CellState, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "-" | "unset" | "clear" => Ok(CellState::Unset),
            other => other.parse::<AttendanceStatus>().map(CellState::from),
        }
    }
}

impl From<AttendanceStatus> for CellState {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Present => CellState::Present,
            AttendanceStatus::Absent => CellState::Absent,
            AttendanceStatus::Late => CellState::Late,
            AttendanceStatus::Excused => CellState::Excused,
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => f.write_str(status.code()),
            None => f.write_str("-"),
        }
    }
}

/// Mutation the store has to perform for a cell edit. The grid never writes
/// anything itself.
#[derive(Debug, Clone, PartialEq)]
pub enum CellChange {
    Unchanged,
    Delete {
        record_id: Uuid,
    },
    Update {
        record_id: Uuid,
        status: AttendanceStatus,
        notes: String,
    },
    Create(AttendanceRecord),
}

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub cells: Vec<CellState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub class_name: String,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<GridRow>,
}

/// Attendance grid for one class. Only the makeup dates live here; every
/// cell is read from the snapshot on demand.
#[derive(Debug, Clone)]
pub struct AttendanceGrid {
    class_id: Uuid,
    makeup_dates: BTreeSet<NaiveDate>,
}

impl AttendanceGrid {
    pub fn new(class_id: Uuid) -> Self {
        Self {
            class_id,
            makeup_dates: BTreeSet::new(),
        }
    }

    /// Returns false when the date was already present.
    pub fn add_makeup_date(&mut self, date: NaiveDate) -> bool {
        self.makeup_dates.insert(date)
    }

    pub fn remove_makeup_date(&mut self, date: NaiveDate) -> bool {
        self.makeup_dates.remove(&date)
    }

    pub fn makeup_dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.makeup_dates.iter()
    }

    /// Regular weekly sessions merged with makeup dates, ascending, no repeats.
    pub fn dates(&self, data: &Dataset) -> Result<Vec<NaiveDate>, AppError> {
        let class = data
            .class(self.class_id)
            .ok_or_else(|| AppError::missing("class", self.class_id))?;

        let mut dates: BTreeSet<NaiveDate> =
            schedule::session_dates(class.start_date, class.end_date)
                .into_iter()
                .collect();
        dates.extend(self.makeup_dates.iter().copied());

        Ok(dates.into_iter().collect())
    }

    pub fn students<'a>(&self, data: &'a Dataset) -> Vec<&'a Student> {
        roster::enrolled_students(data, self.class_id)
    }

    pub fn get_status(&self, data: &Dataset, student_id: Uuid, date: NaiveDate) -> CellState {
        data.find_record(student_id, self.class_id, date)
            .map(|record| CellState::from(record.status))
            .unwrap_or(CellState::Unset)
    }

    /// Change needed to move the cell one step along the status cycle.
    pub fn advance_status(
        &self,
        data: &Dataset,
        student_id: Uuid,
        date: NaiveDate,
    ) -> Result<CellChange, AppError> {
        let target = self.get_status(data, student_id, date).next();
        self.set_status(data, student_id, date, target, None)
    }

    /// Change needed to put the cell into `target`. Existing notes are kept
    /// unless `notes` is given.
    pub fn set_status(
        &self,
        data: &Dataset,
        student_id: Uuid,
        date: NaiveDate,
        target: CellState,
        notes: Option<&str>,
    ) -> Result<CellChange, AppError> {
        self.check_cell(data, student_id, date)?;
        let existing = data.find_record(student_id, self.class_id, date);

        let change = match (target.status(), existing) {
            (None, None) => CellChange::Unchanged,
            (None, Some(record)) => CellChange::Delete {
                record_id: record.id,
            },
            (Some(status), Some(record)) => {
                let notes = notes.map(str::to_string).unwrap_or_else(|| record.notes.clone());
                if record.status == status && record.notes == notes {
                    CellChange::Unchanged
                } else {
                    CellChange::Update {
                        record_id: record.id,
                        status,
                        notes,
                    }
                }
            }
            (Some(status), None) => CellChange::Create(AttendanceRecord {
                id: Uuid::new_v4(),
                student_id,
                class_id: self.class_id,
                date,
                status,
                notes: notes.unwrap_or_default().to_string(),
            }),
        };

        Ok(change)
    }

    /// Full projection of enrolled students against session dates.
    pub fn view(&self, data: &Dataset) -> Result<GridView, AppError> {
        let dates = self.dates(data)?;
        let class_name = data
            .class(self.class_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        let rows = self
            .students(data)
            .into_iter()
            .map(|student| GridRow {
                student_id: student.id,
                student_name: student.full_name.clone(),
                cells: dates
                    .iter()
                    .map(|date| self.get_status(data, student.id, *date))
                    .collect(),
            })
            .collect();

        Ok(GridView {
            class_name,
            dates,
            rows,
        })
    }

    fn check_cell(&self, data: &Dataset, student_id: Uuid, date: NaiveDate) -> Result<(), AppError> {
        if data.student(student_id).is_none() {
            return Err(AppError::missing("student", student_id));
        }
        if !roster::is_enrolled(data, student_id, self.class_id) {
            return Err(AppError::missing("enrollment", format!("{student_id} in {}", self.class_id)));
        }
        if !self.dates(data)?.contains(&date) {
            return Err(AppError::InvalidDateRange(format!(
                "{date} is not a session date for this class"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::fixtures::*;

    fn setup() -> (Dataset, Uuid, Uuid) {
        let alex = student("GM001", "Alex Johnson");
        let robotics = class("Elementary Robotics", "2026-01-15", "2026-02-05");
        let mut data = Dataset {
            students: vec![alex.clone()],
            classes: vec![robotics.clone()],
            ..Dataset::default()
        };
        enroll(&mut data, alex.id, robotics.id);
        (data, alex.id, robotics.id)
    }

    fn records_for(data: &Dataset, student_id: Uuid, day: NaiveDate) -> usize {
        data.attendance
            .iter()
            .filter(|a| a.student_id == student_id && a.date == day)
            .count()
    }

    #[test]
    fn cycle_has_period_five() {
        let mut state = CellState::Unset;
        let mut seen = Vec::new();
        for _ in 0..5 {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                CellState::Present,
                CellState::Absent,
                CellState::Late,
                CellState::Excused,
                CellState::Unset
            ]
        );
    }

    #[test]
    fn five_advances_return_to_unset_without_a_record() {
        let (mut data, student_id, class_id) = setup();
        let grid = AttendanceGrid::new(class_id);
        let day = date("2026-01-22");

        for step in 0..5 {
            let change = grid.advance_status(&data, student_id, day).unwrap();
            if step == 0 {
                assert!(matches!(change, CellChange::Create(_)));
            }
            data.apply(&change);
            assert!(records_for(&data, student_id, day) <= 1);
        }

        assert_eq!(grid.get_status(&data, student_id, day), CellState::Unset);
        assert!(data.attendance.is_empty());
    }

    #[test]
    fn advancing_updates_the_existing_record_in_place() {
        let (mut data, student_id, class_id) = setup();
        let grid = AttendanceGrid::new(class_id);
        let day = date("2026-01-15");
        mark(&mut data, student_id, class_id, "2026-01-15", AttendanceStatus::Present);
        data.attendance[0].notes = "arrived with parent".to_string();
        let record_id = data.attendance[0].id;

        let change = grid.advance_status(&data, student_id, day).unwrap();
        assert_eq!(
            change,
            CellChange::Update {
                record_id,
                status: AttendanceStatus::Absent,
                notes: "arrived with parent".to_string(),
            }
        );
        data.apply(&change);
        assert_eq!(data.attendance.len(), 1);
        assert_eq!(grid.get_status(&data, student_id, day), CellState::Absent);
    }

    #[test]
    fn clearing_a_cell_deletes_its_record() {
        let (mut data, student_id, class_id) = setup();
        let grid = AttendanceGrid::new(class_id);
        mark(&mut data, student_id, class_id, "2026-01-29", AttendanceStatus::Excused);
        let record_id = data.attendance[0].id;

        let change = grid
            .advance_status(&data, student_id, date("2026-01-29"))
            .unwrap();
        assert_eq!(change, CellChange::Delete { record_id });

        let noop = grid
            .set_status(&data, student_id, date("2026-01-22"), CellState::Unset, None)
            .unwrap();
        assert_eq!(noop, CellChange::Unchanged);
    }

    #[test]
    fn new_records_start_with_empty_notes() {
        let (data, student_id, class_id) = setup();
        let grid = AttendanceGrid::new(class_id);
        match grid.advance_status(&data, student_id, date("2026-02-05")).unwrap() {
            CellChange::Create(record) => {
                assert_eq!(record.status, AttendanceStatus::Present);
                assert_eq!(record.class_id, class_id);
                assert!(record.notes.is_empty());
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn records_from_other_classes_do_not_leak_into_the_grid() {
        let (mut data, student_id, class_id) = setup();
        let other = Uuid::new_v4();
        mark(&mut data, student_id, other, "2026-01-15", AttendanceStatus::Absent);
        let grid = AttendanceGrid::new(class_id);
        assert_eq!(
            grid.get_status(&data, student_id, date("2026-01-15")),
            CellState::Unset
        );
    }

    #[test]
    fn makeup_dates_merge_sorted_and_deduplicated() {
        let (data, _, class_id) = setup();
        let mut grid = AttendanceGrid::new(class_id);

        assert!(grid.add_makeup_date(date("2026-01-24")));
        assert!(!grid.add_makeup_date(date("2026-01-24")));
        assert!(grid.add_makeup_date(date("2026-01-22")));

        let rendered: Vec<String> = grid
            .dates(&data)
            .unwrap()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(
            rendered,
            vec!["2026-01-15", "2026-01-22", "2026-01-24", "2026-01-29", "2026-02-05"]
        );

        assert!(grid.remove_makeup_date(date("2026-01-24")));
        assert!(!grid.remove_makeup_date(date("2026-01-24")));
        assert_eq!(grid.dates(&data).unwrap().len(), 4);
    }

    #[test]
    fn cells_on_makeup_dates_can_be_edited() {
        let (data, student_id, class_id) = setup();
        let mut grid = AttendanceGrid::new(class_id);
        let makeup = date("2026-01-31");

        assert!(matches!(
            grid.advance_status(&data, student_id, makeup),
            Err(AppError::InvalidDateRange(_))
        ));
        grid.add_makeup_date(makeup);
        assert!(matches!(
            grid.advance_status(&data, student_id, makeup),
            Ok(CellChange::Create(_))
        ));
    }

    #[test]
    fn unenrolled_students_are_rejected() {
        let (mut data, _, class_id) = setup();
        let outsider = student("GM009", "Emma Davis");
        data.students.push(outsider.clone());
        let grid = AttendanceGrid::new(class_id);

        assert!(matches!(
            grid.advance_status(&data, outsider.id, date("2026-01-15")),
            Err(AppError::MissingReference { .. })
        ));
        assert!(grid.view(&data).unwrap().rows.iter().all(|r| r.student_id != outsider.id));
    }

    #[test]
    fn view_projects_every_enrolled_student_against_every_date() {
        let (mut data, student_id, class_id) = setup();
        mark(&mut data, student_id, class_id, "2026-01-22", AttendanceStatus::Late);
        let view = AttendanceGrid::new(class_id).view(&data).unwrap();

        assert_eq!(view.class_name, "Elementary Robotics");
        assert_eq!(view.dates.len(), 4);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(
            view.rows[0].cells,
            vec![CellState::Unset, CellState::Late, CellState::Unset, CellState::Unset]
        );
    }

    #[test]
    fn unknown_class_is_a_missing_reference() {
        let (data, _, _) = setup();
        assert!(matches!(
            AttendanceGrid::new(Uuid::new_v4()).dates(&data),
            Err(AppError::MissingReference { .. })
        ));
    }

    #[test]
    fn cell_state_parses_codes_and_words() {
        assert_eq!(CellState::parse("A"), Ok(CellState::Absent));
        assert_eq!(CellState::parse("excused"), Ok(CellState::Excused));
        assert_eq!(CellState::parse("unset"), Ok(CellState::Unset));
        assert!(CellState::parse("maybe").is_err());
    }
}
