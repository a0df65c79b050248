use std::fmt::Write;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::config::AcademyProfile;
use crate::error::AppError;
use crate::models::AbsenceEntry;
use crate::schedule;

pub const DEFAULT_SLOT_TIME: &str = "10:00 AM - 12:00 PM";
pub const NO_SLOTS_FALLBACK: &str = "Please contact us to schedule a makeup session.";

/// A proposed makeup session. Either half may be blank while it is being
/// entered; blank slots never reach the email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub date: Option<NaiveDate>,
    pub time: String,
}

impl TimeSlot {
    pub fn new(date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            date: Some(date),
            time: time.into(),
        }
    }

    fn is_complete(&self) -> bool {
        self.date.is_some() && !self.time.trim().is_empty()
    }
}

/// Parses `DATE=TIME` form input. A blank half stays blank and is dropped
/// later by [`SlotSource::resolve`]; a date that is present but unreadable
/// is an error.
pub fn parse_slot(raw: &str) -> Result<TimeSlot, AppError> {
    let (date, time) = raw.split_once('=').unwrap_or((raw, ""));
    let date = match date.trim() {
        "" => None,
        value => Some(schedule::parse_iso_date(value)?),
    };
    Ok(TimeSlot {
        date,
        time: time.trim().to_string(),
    })
}

#[derive(Debug, Clone)]
pub enum SlotSource {
    /// The next `count` occurrences of `weekday`, all at the same time of day.
    Computed {
        weekday: Weekday,
        count: usize,
        time: String,
    },
    Custom(Vec<TimeSlot>),
}

impl Default for SlotSource {
    fn default() -> Self {
        SlotSource::Computed {
            weekday: Weekday::Sat,
            count: 3,
            time: DEFAULT_SLOT_TIME.to_string(),
        }
    }
}

impl SlotSource {
    pub fn resolve(&self, today: NaiveDate) -> Vec<TimeSlot> {
        match self {
            SlotSource::Computed {
                weekday,
                count,
                time,
            } => suggested_slots(today, *weekday, *count, time),
            SlotSource::Custom(slots) => slots.iter().filter(|s| s.is_complete()).cloned().collect(),
        }
    }
}

/// Next `count` dates falling on `weekday`, counting `today` itself when it matches.
pub fn suggested_slots(today: NaiveDate, weekday: Weekday, count: usize, time: &str) -> Vec<TimeSlot> {
    let offset = (weekday.num_days_from_sunday() + 7 - today.weekday().num_days_from_sunday()) % 7;
    let first = today + Duration::days(offset as i64);

    (0..count)
        .map(|week| TimeSlot::new(first + Duration::days(7 * week as i64), time))
        .collect()
}

/// "Saturday, January 17, 2026 - 10:00 AM - 12:00 PM"
pub fn format_slot(date: NaiveDate, time: &str) -> String {
    format!("{} - {}", date.format("%A, %B %-d, %Y"), time.trim())
}

pub fn compose_email(selected: &[AbsenceEntry], slots: &[TimeSlot], academy: &AcademyProfile) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Subject: Makeup Class Opportunity - {}", academy.name);
    let _ = writeln!(output);
    let _ = writeln!(output, "Dear Parents and Students,");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "We hope this message finds you well. We've noticed that some students have missed classes \
         recently and we'd like to offer makeup sessions to ensure everyone stays on track with their \
         learning goals."
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Students Eligible for Makeup Classes:");
    for entry in selected {
        let _ = writeln!(
            output,
            "• {} - {} ({} missed session{})",
            entry.student.full_name,
            entry.class.name,
            entry.total_absences,
            if entry.total_absences == 1 { "" } else { "s" }
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Proposed Makeup Sessions:");
    let formatted: Vec<String> = slots
        .iter()
        .filter(|s| s.is_complete())
        .filter_map(|s| s.date.map(|d| format!("• {}", format_slot(d, &s.time))))
        .collect();
    if formatted.is_empty() {
        let _ = writeln!(output, "{NO_SLOTS_FALLBACK}");
    } else {
        for line in formatted {
            let _ = writeln!(output, "{line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "These sessions will cover the material missed and provide additional hands-on practice. \
         Please RSVP by replying to this email or calling us at {}.",
        academy.phone
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Location: {}", academy.name);
    let _ = writeln!(output, "{}", academy.address);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "We're committed to your child's success and want to ensure they don't fall behind. These \
         makeup sessions are complimentary and designed to help students catch up and build confidence."
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Please let us know which session(s) work best for your schedule.");
    let _ = writeln!(output);
    let _ = writeln!(output, "Best regards,");
    let _ = writeln!(output, "{} Team", academy.name);
    let _ = writeln!(output, "{}", academy.email);
    let _ = write!(output, "{}", academy.phone);

    output
}

/// Distinct non-empty student emails, in selection order.
pub fn recipients(selected: &[AbsenceEntry]) -> Vec<String> {
    let mut emails: Vec<String> = Vec::new();
    for entry in selected {
        let email = entry.student.email.trim();
        if !email.is_empty() && !emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
            emails.push(email.to_string());
        }
    }
    emails
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::fixtures::*;

    #[test]
    fn slot_input_parses_date_and_time() {
        assert_eq!(
            parse_slot(" 2026-02-07 = 10:00 AM ").unwrap(),
            TimeSlot::new(date("2026-02-07"), "10:00 AM")
        );
    }

    #[test]
    fn unreadable_slot_date_is_rejected() {
        assert!(matches!(
            parse_slot("2026-02-30=10:00 AM"),
            Err(AppError::InvalidDateRange(_))
        ));
        assert!(matches!(parse_slot("next saturday=10:00 AM"), Err(AppError::InvalidDateRange(_))));
    }

    #[test]
    fn blank_slot_halves_are_dropped_on_resolve() {
        let slots = vec![
            parse_slot("=10:00 AM").unwrap(),
            parse_slot("2026-02-07=").unwrap(),
            parse_slot("2026-02-14").unwrap(),
            parse_slot("2026-02-21=1:00 PM").unwrap(),
        ];
        assert_eq!(slots[0].date, None);
        assert_eq!(slots[1].time, "");

        let resolved = SlotSource::Custom(slots).resolve(date("2026-01-23"));
        assert_eq!(resolved, vec![TimeSlot::new(date("2026-02-21"), "1:00 PM")]);
    }

    fn entry(name: &str, class_name: &str, absences: usize) -> AbsenceEntry {
        AbsenceEntry {
            student: student("GM001", name),
            class: class(class_name, "2026-01-15", "2026-05-30"),
            absent_dates: (0..absences)
                .map(|i| date("2026-01-15") + Duration::days(7 * i as i64))
                .collect(),
            total_absences: absences,
        }
    }

    #[test]
    fn empty_slot_list_uses_fallback_line() {
        let selected = vec![entry("Alex Johnson", "Elementary Robotics", 1)];
        let email = compose_email(&selected, &[], &AcademyProfile::default());

        assert!(email.starts_with("Subject: Makeup Class Opportunity - GearMinds Academy\n"));
        assert!(email.contains("• Alex Johnson - Elementary Robotics (1 missed session)\n"));
        assert!(email.contains("Proposed Makeup Sessions:\nPlease contact us to schedule a makeup session.\n"));
        assert!(email.ends_with("contactus@gearmindsacademy.com\n(469) 290-4561"));
    }

    #[test]
    fn plural_sessions_and_formatted_slots() {
        let selected = vec![
            entry("Sarah Williams", "Elementary Robotics", 2),
            entry("Emma Davis", "Middle School Python", 1),
        ];
        let slots = vec![TimeSlot::new(date("2026-01-17"), "10:00 AM - 12:00 PM")];
        let email = compose_email(&selected, &slots, &AcademyProfile::default());

        assert!(email.contains("• Sarah Williams - Elementary Robotics (2 missed sessions)\n"));
        assert!(email.contains("• Emma Davis - Middle School Python (1 missed session)\n"));
        assert!(email.contains("• Saturday, January 17, 2026 - 10:00 AM - 12:00 PM\n"));
        assert!(!email.contains(NO_SLOTS_FALLBACK));
    }

    #[test]
    fn footer_follows_the_academy_profile() {
        let academy = AcademyProfile {
            name: "Circuit Lab".to_string(),
            phone: "555-0199".to_string(),
            email: "hello@circuitlab.test".to_string(),
            address: "1 Main St, Springfield".to_string(),
        };
        let email = compose_email(&[], &[], &academy);
        assert!(email.contains("Location: Circuit Lab\n1 Main St, Springfield\n"));
        assert!(email.contains("calling us at 555-0199."));
        assert!(email.contains("Circuit Lab Team\nhello@circuitlab.test\n555-0199"));
    }

    #[test]
    fn computed_slots_land_on_the_next_three_saturdays() {
        // 2026-01-14 is a Wednesday
        let slots = SlotSource::default().resolve(date("2026-01-14"));
        let dates: Vec<NaiveDate> = slots.iter().filter_map(|s| s.date).collect();
        assert_eq!(
            dates,
            vec![date("2026-01-17"), date("2026-01-24"), date("2026-01-31")]
        );
        assert!(slots.iter().all(|s| s.time == DEFAULT_SLOT_TIME));
    }

    #[test]
    fn computed_slots_include_today_when_it_matches() {
        let slots = suggested_slots(date("2026-01-17"), Weekday::Sat, 2, "9 AM");
        assert_eq!(slots[0].date, Some(date("2026-01-17")));
        assert_eq!(slots[1].date, Some(date("2026-01-24")));

        let sunday = suggested_slots(date("2026-01-17"), Weekday::Sun, 1, "9 AM");
        assert_eq!(sunday[0].date, Some(date("2026-01-18")));
    }

    #[test]
    fn custom_slots_drop_incomplete_entries() {
        let source = SlotSource::Custom(vec![
            TimeSlot::new(date("2026-02-07"), "1:00 PM - 3:00 PM"),
            TimeSlot {
                date: None,
                time: "4:00 PM".to_string(),
            },
            TimeSlot::new(date("2026-02-08"), "   "),
        ]);
        let slots = source.resolve(date("2026-01-14"));
        assert_eq!(slots, vec![TimeSlot::new(date("2026-02-07"), "1:00 PM - 3:00 PM")]);

        let incomplete = SlotSource::Custom(vec![TimeSlot {
            date: None,
            time: String::new(),
        }]);
        let email = compose_email(
            &[entry("Alex Johnson", "Elementary Robotics", 1)],
            &incomplete.resolve(date("2026-01-14")),
            &AcademyProfile::default(),
        );
        assert!(email.contains(NO_SLOTS_FALLBACK));
    }

    #[test]
    fn recipients_are_distinct() {
        let first = entry("Alex Johnson", "Elementary Robotics", 2);
        let mut second = entry("Alex Johnson", "Middle School Python", 1);
        second.student.email = "ALEX@example.com".to_string();
        let third = entry("Sarah Williams", "Elementary Robotics", 1);

        assert_eq!(
            recipients(&[first, second, third]),
            vec!["alex@example.com".to_string(), "sarah@example.com".to_string()]
        );
    }
}
