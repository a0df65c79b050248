use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

mod absences;
mod config;
mod db;
mod error;
mod import;
mod logging;
mod matrix;
mod models;
mod notify;
mod report;
mod roster;
mod schedule;

use config::Config;
use error::AppError;
use matrix::{AttendanceGrid, CellState, GridView};
use models::{ClassPatch, Dataset, LifecycleStatus, NewClass, NewStudent, StudentPatch};
use notify::SlotSource;

#[derive(Parser)]
#[command(name = "academy-attendance")]
#[command(about = "Student, class and attendance records for a tutoring academy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the sample academy into an empty database
    Seed,
    /// Import students from a CSV file (code, full name, email, phone)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Manage students
    #[command(subcommand)]
    Students(StudentCommand),
    /// Manage classes
    #[command(subcommand)]
    Classes(ClassCommand),
    /// Enroll a student in a class
    Enroll {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        class: Uuid,
    },
    /// List the weekly session dates of a class
    Sessions {
        #[arg(long)]
        class: Uuid,
    },
    /// View and edit the attendance grid
    #[command(subcommand)]
    Attendance(AttendanceCommand),
    /// Rank students by missed sessions
    Absences {
        #[arg(long)]
        json: bool,
    },
    /// Compose a makeup-session email for ranked absence entries
    Email {
        /// Positions from the `absences` listing, starting at 1
        #[arg(long, num_args = 1.., required = true)]
        select: Vec<usize>,
        /// Proposed slot as DATE=TIME, e.g. 2026-02-07="10:00 AM - 12:00 PM".
        /// Without any slot the next three Saturdays are proposed.
        #[arg(long = "slot")]
        slots: Vec<String>,
        /// Date used to compute suggested slots (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown attendance report
    Report {
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum StudentCommand {
    /// List students, optionally filtered by name, code or email
    List {
        #[arg(long)]
        search: Option<String>,
        /// Include archived students
        #[arg(long)]
        all: bool,
    },
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    Edit {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Archive {
        #[arg(long)]
        id: Uuid,
    },
    Restore {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ClassCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// First session, YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Last possible session, YYYY-MM-DD
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = 12)]
        capacity: i32,
    },
    Edit {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        capacity: Option<i32>,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum AttendanceCommand {
    /// Print the grid for a class
    Grid {
        #[arg(long)]
        class: Uuid,
        /// Extra session dates shown for this run only
        #[arg(long)]
        makeup: Vec<NaiveDate>,
    },
    /// Move one cell to the next status (- P A L E -)
    Toggle {
        #[arg(long)]
        class: Uuid,
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        makeup: Vec<NaiveDate>,
    },
    /// Put one cell into a given status; `unset` clears it
    Set {
        #[arg(long)]
        class: Uuid,
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        status: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        makeup: Vec<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger()?;
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            if db::seed(&pool).await? {
                println!("Sample data inserted.");
            } else {
                println!("Data already exists, nothing inserted.");
            }
        }
        Commands::Import { csv } => {
            let students = import::parse_students_from_path(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let inserted = db::insert_students(&pool, &students).await?;
            println!("Imported {inserted} students from {}.", csv.display());
        }
        Commands::Students(command) => run_students(&pool, command).await?,
        Commands::Classes(command) => run_classes(&pool, command).await?,
        Commands::Enroll { student, class } => {
            let data = load(&pool).await?;
            roster::check_enrollment(&data, student, class)?;
            if db::create_enrollment(&pool, student, class).await? {
                println!("Enrolled.");
            } else {
                println!("Student is already enrolled in this class.");
            }
        }
        Commands::Sessions { class } => {
            let data = load(&pool).await?;
            let offering = data
                .class(class)
                .ok_or_else(|| AppError::missing("class", class))?;
            let dates = schedule::session_dates(offering.start_date, offering.end_date);
            if dates.is_empty() {
                println!("{} has no sessions in its date range.", offering.name);
            }
            for (idx, date) in dates.iter().enumerate() {
                println!("{:>2}. {} ({})", idx + 1, date, date.format("%A"));
            }
        }
        Commands::Attendance(command) => run_attendance(&pool, command).await?,
        Commands::Absences { json } => {
            let data = load(&pool).await?;
            let entries = absences::collect_absences(&data);

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("All students are up to date.");
            } else {
                for (idx, entry) in entries.iter().enumerate() {
                    let dates: Vec<String> =
                        entry.absent_dates.iter().map(|d| d.to_string()).collect();
                    println!(
                        "{:>2}. {} ({}) - {}: {} absent [{}]",
                        idx + 1,
                        entry.student.full_name,
                        entry.student.email,
                        entry.class.name,
                        entry.total_absences,
                        dates.join(", ")
                    );
                }
            }
        }
        Commands::Email {
            select,
            slots,
            today,
            json,
        } => {
            let data = load(&pool).await?;
            let entries = absences::collect_absences(&data);
            let selected = absences::select_entries(&entries, &select);
            if selected.is_empty() {
                anyhow::bail!("none of the selected positions exist; run `absences` to list them");
            }

            let source = if slots.is_empty() {
                SlotSource::default()
            } else {
                SlotSource::Custom(
                    slots
                        .iter()
                        .map(|s| notify::parse_slot(s))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            };
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let resolved = source.resolve(today);
            let body = notify::compose_email(&selected, &resolved, &config.academy);
            let recipients = notify::recipients(&selected);

            if json {
                let payload = serde_json::json!({
                    "recipients": recipients,
                    "slots": resolved,
                    "body": body,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("To: {}", recipients.join(","));
                println!("{body}");
            }
        }
        Commands::Report { out } => {
            let data = load(&pool).await?;
            let report = report::build_report(&data, Local::now().date_naive());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn load(pool: &PgPool) -> anyhow::Result<Dataset> {
    db::load_dataset(pool)
        .await
        .context("failed to load records, try again")
}

async fn run_students(pool: &PgPool, command: StudentCommand) -> anyhow::Result<()> {
    match command {
        StudentCommand::List { search, all } => {
            let data = load(pool).await?;
            let matches =
                roster::search_students(&data.students, search.as_deref().unwrap_or(""), all);
            if matches.is_empty() {
                println!("No students found.");
            }
            for student in matches {
                println!(
                    "{}  {:<8} {:<24} {:<28} {:<12} {}",
                    student.id,
                    student.student_code,
                    student.full_name,
                    student.email,
                    student.phone,
                    student.status.as_str()
                );
            }
        }
        StudentCommand::Add {
            code,
            name,
            email,
            phone,
        } => {
            let id = db::create_student(
                pool,
                &NewStudent {
                    student_code: code,
                    full_name: name,
                    email,
                    phone,
                },
            )
            .await?;
            println!("Created student {id}.");
        }
        StudentCommand::Edit {
            id,
            code,
            name,
            email,
            phone,
        } => {
            let patch = StudentPatch {
                student_code: code,
                full_name: name,
                email,
                phone,
            };
            db::update_student(pool, id, &patch).await?;
            println!("Updated student {id}.");
        }
        StudentCommand::Archive { id } => {
            db::set_student_status(pool, id, LifecycleStatus::Archived).await?;
            println!("Archived student {id}.");
        }
        StudentCommand::Restore { id } => {
            db::set_student_status(pool, id, LifecycleStatus::Active).await?;
            println!("Restored student {id}.");
        }
    }
    Ok(())
}

async fn run_classes(pool: &PgPool, command: ClassCommand) -> anyhow::Result<()> {
    match command {
        ClassCommand::List => {
            let data = load(pool).await?;
            if data.classes.is_empty() {
                println!("No classes found.");
            }
            for class in data.classes.iter() {
                let enrolled = roster::enrolled_students(&data, class.id).len();
                println!(
                    "{}  {:<24} {} to {}  {}/{} enrolled  {}",
                    class.id,
                    class.name,
                    class.start_date,
                    class.end_date,
                    enrolled,
                    class.max_capacity,
                    class.status.as_str()
                );
            }
        }
        ClassCommand::Add {
            name,
            description,
            start,
            end,
            capacity,
        } => {
            let sessions = schedule::session_dates_checked(&start, &end)?;
            let id = db::create_class(
                pool,
                &NewClass {
                    name,
                    description,
                    start_date: schedule::parse_iso_date(&start)?,
                    end_date: schedule::parse_iso_date(&end)?,
                    max_capacity: capacity,
                },
            )
            .await?;
            println!("Created class {id} with {} weekly sessions.", sessions.len());
        }
        ClassCommand::Edit {
            id,
            name,
            description,
            start,
            end,
            capacity,
            status,
        } => {
            let status = status
                .map(|s| s.parse::<LifecycleStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let data = load(pool).await?;
            let current = data.class(id).ok_or_else(|| AppError::missing("class", id))?;
            let new_start = start.unwrap_or(current.start_date);
            let new_end = end.unwrap_or(current.end_date);
            if new_start > new_end {
                return Err(AppError::InvalidDateRange(format!(
                    "start {new_start} is after end {new_end}"
                ))
                .into());
            }
            if let Some(capacity) = capacity {
                roster::check_capacity(&data, id, capacity)?;
            }

            let patch = ClassPatch {
                name,
                description,
                start_date: start,
                end_date: end,
                max_capacity: capacity,
                status,
            };
            db::update_class(pool, id, &patch).await?;
            println!("Updated class {id}.");
        }
    }
    Ok(())
}

async fn run_attendance(pool: &PgPool, command: AttendanceCommand) -> anyhow::Result<()> {
    match command {
        AttendanceCommand::Grid { class, makeup } => {
            let data = load(pool).await?;
            let grid = grid_with_makeup(class, &makeup);
            let view = grid.view(&data)?;
            print!("{}", render_grid(&view));
            let extra: Vec<String> = grid.makeup_dates().map(|d| d.to_string()).collect();
            if !extra.is_empty() {
                println!("Makeup dates: {}", extra.join(", "));
            }
        }
        AttendanceCommand::Toggle {
            class,
            student,
            date,
            makeup,
        } => {
            let mut data = load(pool).await?;
            let grid = grid_with_makeup(class, &makeup);
            let change = grid.advance_status(&data, student, date)?;
            save_cell(pool, &mut data, change).await?;
            println!("{} on {}: {}", student, date, grid.get_status(&data, student, date));
        }
        AttendanceCommand::Set {
            class,
            student,
            date,
            status,
            notes,
            makeup,
        } => {
            let target = CellState::parse(&status).map_err(anyhow::Error::msg)?;
            let mut data = load(pool).await?;
            let grid = grid_with_makeup(class, &makeup);
            let change = grid.set_status(&data, student, date, target, notes.as_deref())?;
            save_cell(pool, &mut data, change).await?;
            println!("{} on {}: {}", student, date, grid.get_status(&data, student, date));
        }
    }
    Ok(())
}

fn grid_with_makeup(class_id: Uuid, makeup: &[NaiveDate]) -> AttendanceGrid {
    let mut grid = AttendanceGrid::new(class_id);
    for date in makeup {
        if !grid.add_makeup_date(*date) {
            warn!(%date, "makeup date given twice, ignoring");
        }
    }
    grid
}

/// The snapshot is only patched once the store has accepted the write.
async fn save_cell(
    pool: &PgPool,
    data: &mut Dataset,
    change: matrix::CellChange,
) -> anyhow::Result<()> {
    let applied = match db::apply_cell_change(pool, change).await {
        Ok(applied) => applied,
        Err(err) if err.is_retryable() => {
            return Err(err).context("attendance was not saved, try again");
        }
        Err(err) => return Err(err.into()),
    };
    data.apply(&applied);
    info!("attendance saved");
    Ok(())
}

fn render_grid(view: &GridView) -> String {
    let mut output = format!("{}\n", view.class_name);
    let name_width = view
        .rows
        .iter()
        .map(|r| r.student_name.len())
        .max()
        .unwrap_or(0)
        .max(7);

    output.push_str(&format!("{:<width$}", "Student", width = name_width));
    for date in view.dates.iter() {
        output.push_str(&format!(" {}", date.format("%m-%d")));
    }
    output.push('\n');

    for row in view.rows.iter() {
        output.push_str(&format!("{:<width$}", row.student_name, width = name_width));
        for cell in row.cells.iter() {
            output.push_str(&format!(" {:^5}", cell.to_string()));
        }
        output.push('\n');
    }

    if view.rows.is_empty() {
        output.push_str("No students enrolled.\n");
    }
    output
}
