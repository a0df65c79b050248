use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::matrix::CellChange;
use crate::models::{
    AttendanceRecord, AttendanceStatus, ClassOffering, ClassPatch, Dataset, Enrollment,
    LifecycleStatus, NewClass, NewStudent, Student, StudentPatch, User,
};

pub async fn init_db(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Load the sample academy. Does nothing once any student exists.
pub async fn seed(pool: &PgPool) -> Result<bool, AppError> {
    let existing: i64 = sqlx::query("SELECT COUNT(*) AS total FROM academy.students")
        .fetch_one(pool)
        .await?
        .try_get("total")?;
    if existing > 0 {
        info!(existing, "students already present, skipping seed");
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO academy.users (id, email, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("admin@gearminds.com")
    .bind("Admin")
    .execute(pool)
    .await?;

    let students = [
        ("GM001", "Alex Johnson", "alex@example.com", "555-0101"),
        ("GM002", "Sarah Williams", "sarah@example.com", "555-0102"),
        ("GM003", "Michael Chen", "michael@example.com", "555-0103"),
        ("GM004", "Emma Davis", "emma@example.com", "555-0104"),
    ];
    let mut student_ids = Vec::new();
    for (code, name, email, phone) in students {
        let id = create_student(
            pool,
            &NewStudent {
                student_code: code.to_string(),
                full_name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
            },
        )
        .await?;
        student_ids.push(id);
    }

    let start = seed_date(2026, 1, 15)?;
    let end = seed_date(2026, 5, 30)?;
    let robotics = create_class(
        pool,
        &NewClass {
            name: "Elementary Robotics".to_string(),
            description: "Block coding and robots".to_string(),
            start_date: start,
            end_date: end,
            max_capacity: 12,
        },
    )
    .await?;
    let python = create_class(
        pool,
        &NewClass {
            name: "Middle School Python".to_string(),
            description: "Introduction to Python".to_string(),
            start_date: start,
            end_date: end,
            max_capacity: 10,
        },
    )
    .await?;

    for (idx, student_id) in student_ids.iter().enumerate() {
        let class_id = if idx < 3 { robotics } else { python };
        create_enrollment(pool, *student_id, class_id).await?;
    }

    Ok(true)
}

fn seed_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::InvalidDateRange(format!("{year}-{month}-{day}")))
}

/// Bulk-load every collection into a fresh snapshot.
pub async fn load_dataset(pool: &PgPool) -> Result<Dataset, AppError> {
    let (students, classes, enrollments, attendance, users) = tokio::try_join!(
        load_students(pool),
        load_classes(pool),
        load_enrollments(pool),
        load_attendance(pool),
        load_users(pool),
    )?;

    debug!(
        students = students.len(),
        classes = classes.len(),
        enrollments = enrollments.len(),
        attendance = attendance.len(),
        "dataset loaded"
    );

    Ok(Dataset {
        students,
        classes,
        enrollments,
        attendance,
        users,
    })
}

fn decode_err(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn student_from_row(row: &PgRow) -> Result<Student, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Student {
        id: row.try_get("id")?,
        student_code: row.try_get("student_code")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: status.parse().map_err(decode_err)?,
    })
}

fn class_from_row(row: &PgRow) -> Result<ClassOffering, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ClassOffering {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        max_capacity: row.try_get("max_capacity")?,
        status: status.parse().map_err(decode_err)?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        class_id: row.try_get("class_id")?,
        date: row.try_get("session_date")?,
        status: status.parse::<AttendanceStatus>().map_err(decode_err)?,
        notes: row.try_get("notes")?,
    })
}

async fn load_students(pool: &PgPool) -> Result<Vec<Student>, AppError> {
    let rows = sqlx::query(
        "SELECT id, student_code, full_name, email, phone, status \
         FROM academy.students ORDER BY created_at, student_code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(student_from_row).collect::<Result<_, _>>()?)
}

async fn load_classes(pool: &PgPool) -> Result<Vec<ClassOffering>, AppError> {
    let rows = sqlx::query(
        "SELECT id, name, description, start_date, end_date, max_capacity, status \
         FROM academy.classes ORDER BY created_at, name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(class_from_row).collect::<Result<_, _>>()?)
}

async fn load_enrollments(pool: &PgPool) -> Result<Vec<Enrollment>, AppError> {
    let rows = sqlx::query(
        "SELECT id, student_id, class_id FROM academy.enrollments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut enrollments = Vec::with_capacity(rows.len());
    for row in rows {
        enrollments.push(Enrollment {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            class_id: row.try_get("class_id")?,
        });
    }
    Ok(enrollments)
}

async fn load_attendance(pool: &PgPool) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows = sqlx::query(
        "SELECT id, student_id, class_id, session_date, status, notes \
         FROM academy.attendance ORDER BY session_date, created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(attendance_from_row).collect::<Result<_, _>>()?)
}

async fn load_users(pool: &PgPool) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query("SELECT id, email, role FROM academy.users ORDER BY created_at")
        .fetch_all(pool)
        .await?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
        });
    }
    Ok(users)
}

pub async fn create_student(pool: &PgPool, student: &NewStudent) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO academy.students (id, student_code, full_name, email, phone, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(&student.student_code)
    .bind(&student.full_name)
    .bind(&student.email)
    .bind(&student.phone)
    .bind(LifecycleStatus::Active.as_str())
    .execute(pool)
    .await?;

    info!(%id, code = %student.student_code, "student created");
    Ok(id)
}

/// Insert an import batch in one transaction; nothing lands if any row fails.
pub async fn insert_students(pool: &PgPool, students: &[NewStudent]) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;

    for student in students {
        sqlx::query(
            r#"
            INSERT INTO academy.students
                (id, student_code, full_name, email, phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, clock_timestamp())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&student.student_code)
        .bind(&student.full_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(LifecycleStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(count = students.len(), "students imported");
    Ok(students.len())
}

pub async fn update_student(pool: &PgPool, id: Uuid, patch: &StudentPatch) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE academy.students
        SET student_code = COALESCE($2, student_code),
            full_name = COALESCE($3, full_name),
            email = COALESCE($4, email),
            phone = COALESCE($5, phone),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(patch.student_code.as_deref())
    .bind(patch.full_name.as_deref())
    .bind(patch.email.as_deref())
    .bind(patch.phone.as_deref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::missing("student", id));
    }
    Ok(())
}

pub async fn set_student_status(
    pool: &PgPool,
    id: Uuid,
    status: LifecycleStatus,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE academy.students SET status = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::missing("student", id));
    }
    info!(%id, status = status.as_str(), "student status changed");
    Ok(())
}

pub async fn create_class(pool: &PgPool, class: &NewClass) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO academy.classes (id, name, description, start_date, end_date, max_capacity, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&class.name)
    .bind(&class.description)
    .bind(class.start_date)
    .bind(class.end_date)
    .bind(class.max_capacity)
    .bind(LifecycleStatus::Active.as_str())
    .execute(pool)
    .await?;

    info!(%id, name = %class.name, "class created");
    Ok(id)
}

pub async fn update_class(pool: &PgPool, id: Uuid, patch: &ClassPatch) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE academy.classes
        SET name = COALESCE($2, name),
            description = COALESCE($3, description),
            start_date = COALESCE($4, start_date),
            end_date = COALESCE($5, end_date),
            max_capacity = COALESCE($6, max_capacity),
            status = COALESCE($7, status),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(patch.name.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.start_date)
    .bind(patch.end_date)
    .bind(patch.max_capacity)
    .bind(patch.status.map(|s| s.as_str()))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::missing("class", id));
    }
    Ok(())
}

/// Returns false when the student was already enrolled.
pub async fn create_enrollment(
    pool: &PgPool,
    student_id: Uuid,
    class_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO academy.enrollments (id, student_id, class_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (student_id, class_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(class_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Update status and notes of the record for the same (student, class, date),
/// or insert `record` when there is none. Returns the id that was written.
pub async fn upsert_attendance(pool: &PgPool, record: &AttendanceRecord) -> Result<Uuid, AppError> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO academy.attendance (id, student_id, class_id, session_date, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (student_id, class_id, session_date) DO UPDATE
        SET status = EXCLUDED.status, notes = EXCLUDED.notes, updated_at = now()
        RETURNING id
        "#,
    )
    .bind(record.id)
    .bind(record.student_id)
    .bind(record.class_id)
    .bind(record.date)
    .bind(record.status.code())
    .bind(&record.notes)
    .fetch_one(pool)
    .await?
    .try_get("id")?;

    Ok(id)
}

pub async fn delete_attendance(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM academy.attendance WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Carry out a grid edit. The returned change carries the ids the store
/// actually used and is what should be mirrored into the snapshot.
pub async fn apply_cell_change(pool: &PgPool, change: CellChange) -> Result<CellChange, AppError> {
    match change {
        CellChange::Unchanged => Ok(CellChange::Unchanged),
        CellChange::Delete { record_id } => {
            delete_attendance(pool, record_id).await?;
            debug!(%record_id, "attendance cleared");
            Ok(CellChange::Delete { record_id })
        }
        CellChange::Update {
            record_id,
            status,
            notes,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE academy.attendance
                SET status = $2, notes = $3, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(record_id)
            .bind(status.code())
            .bind(&notes)
            .execute(pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::missing("attendance record", record_id));
            }
            debug!(%record_id, status = status.code(), "attendance updated");
            Ok(CellChange::Update {
                record_id,
                status,
                notes,
            })
        }
        CellChange::Create(mut record) => {
            record.id = upsert_attendance(pool, &record).await?;
            debug!(record_id = %record.id, status = record.status.code(), "attendance recorded");
            Ok(CellChange::Create(record))
        }
    }
}
