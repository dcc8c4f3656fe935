//! Database migrations
//!
//! Code-based migrations embedded in the binary; applied versions are
//! tracked in a `_migrations` table so re-running on start is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! use studytrack::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ordered)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements
    pub up: &'static str,
}

/// All migrations for studytrack.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_students",
        up: r#"
            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name VARCHAR(100) NOT NULL,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'student',
                is_active INTEGER NOT NULL DEFAULT 1,
                course VARCHAR(100),
                phone VARCHAR(30),
                address TEXT,
                mentor_name VARCHAR(100),
                photo_url TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_students_username ON students(username);
            CREATE INDEX IF NOT EXISTS idx_students_email ON students(email);
        "#,
    },
    // The UNIQUE(student_id, day) pair is the at-most-one-session-per-day
    // guarantee: a racing second check-in loses at INSERT time.
    Migration {
        version: 2,
        name: "create_attendance",
        up: r#"
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                day VARCHAR(10) NOT NULL,
                check_in_time TEXT,
                check_out_time TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'Absent',
                duration_hours REAL NOT NULL DEFAULT 0,
                tasks TEXT,
                proof_url TEXT,
                doubts TEXT,
                remarks TEXT,
                rating INTEGER,
                feedback TEXT,
                rated_by VARCHAR(50),
                UNIQUE(student_id, day),
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_attendance_day ON attendance(day);
            CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id);
            CREATE INDEX IF NOT EXISTS idx_attendance_day_status ON attendance(day, status);
        "#,
    },
    Migration {
        version: 3,
        name: "create_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                student_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (student_id) REFERENCES students(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_student_id ON sessions(student_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 4,
        name: "create_password_resets",
        up: r#"
            CREATE TABLE IF NOT EXISTS password_resets (
                token VARCHAR(64) PRIMARY KEY,
                email VARCHAR(255) NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_password_resets_email ON password_resets(email);
        "#,
    },
];

/// Run all pending migrations. Returns the number applied.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS {
        if !applied.contains(&migration.version) {
            tracing::info!("Applying migration {}: {}", migration.version, migration.name);
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;
    Ok(())
}

async fn applied_versions(pool: &SqlitePool) -> Result<Vec<i32>> {
    let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<i64, _>("version") as i32).collect())
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    // Migration SQL may contain multiple statements
    for statement in migration.up.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_then_rerun_is_noop() {
        let pool = create_test_pool().await.expect("Failed to create pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to re-run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_attendance_unique_per_student_day() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        sqlx::query(
            "INSERT INTO students (full_name, username, email, password_hash) VALUES ('A', 'a', 'a@x.com', 'h')",
        )
        .execute(&pool)
        .await
        .expect("Failed to insert student");

        let insert = "INSERT INTO attendance (student_id, day, status) VALUES (1, '2024-03-01', 'In Progress')";
        sqlx::query(insert).execute(&pool).await.expect("First insert should pass");
        let dup = sqlx::query(insert).execute(&pool).await;
        assert!(dup.is_err(), "second record for the same day must be rejected");
    }
}
