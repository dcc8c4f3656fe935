//! Student repository
//!
//! Database operations for student accounts.

use crate::models::{Student, StudentRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub course: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub mentor_name: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.course.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.mentor_name.is_none()
    }
}

/// Student repository trait
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Create a new student, returning it with the assigned id
    async fn create(&self, student: &Student) -> Result<Student>;

    /// Get a student by id
    async fn find_by_id(&self, id: i64) -> Result<Option<Student>>;

    /// Get a student by username
    async fn find_by_username(&self, username: &str) -> Result<Option<Student>>;

    /// Get a student by email
    async fn find_by_email(&self, email: &str) -> Result<Option<Student>>;

    /// List every student account (admins excluded)
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// Apply a profile patch
    async fn update_profile(&self, id: i64, patch: &ProfilePatch) -> Result<()>;

    /// Activate or deactivate an account
    async fn set_active(&self, id: i64, is_active: bool) -> Result<bool>;

    /// Replace the stored password hash
    async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<()>;

    /// Store the profile photo reference
    async fn set_photo_url(&self, id: i64, photo_url: &str) -> Result<()>;

    /// Permanently delete an account; returns false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based student repository implementation
pub struct SqlxStudentRepository {
    pool: SqlitePool,
}

impl SqlxStudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for dependency injection
    pub fn boxed(pool: SqlitePool) -> Arc<dyn StudentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StudentRepository for SqlxStudentRepository {
    async fn create(&self, student: &Student) -> Result<Student> {
        let result = sqlx::query(
            r#"
            INSERT INTO students (full_name, username, email, password_hash, role, is_active,
                                  course, phone, address, mentor_name, photo_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.full_name)
        .bind(&student.username)
        .bind(&student.email)
        .bind(&student.password_hash)
        .bind(student.role.to_string())
        .bind(student.is_active)
        .bind(&student.course)
        .bind(&student.phone)
        .bind(&student.address)
        .bind(&student.mentor_name)
        .bind(&student.photo_url)
        .bind(student.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create student")?;

        let mut created = student.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT * FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get student by id")?;

        row.map(|r| row_to_student(&r)).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT * FROM students WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get student by username")?;

        row.map(|r| row_to_student(&r)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT * FROM students WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get student by email")?;

        row.map(|r| row_to_student(&r)).transpose()
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query("SELECT * FROM students WHERE role = 'student' ORDER BY full_name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students")?;

        rows.iter().map(row_to_student).collect()
    }

    async fn update_profile(&self, id: i64, patch: &ProfilePatch) -> Result<()> {
        // COALESCE keeps the stored value when the patch field is NULL,
        // mirroring the "only update fields that were sent" contract.
        sqlx::query(
            r#"
            UPDATE students
            SET full_name = COALESCE(?, full_name),
                course = COALESCE(?, course),
                phone = COALESCE(?, phone),
                address = COALESCE(?, address),
                mentor_name = COALESCE(?, mentor_name)
            WHERE id = ?
            "#,
        )
        .bind(&patch.full_name)
        .bind(&patch.course)
        .bind(&patch.phone)
        .bind(&patch.address)
        .bind(&patch.mentor_name)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update profile")?;

        Ok(())
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE students SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update active flag")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE students SET password_hash = ? WHERE email = ?")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to update password hash")?;

        Ok(())
    }

    async fn set_photo_url(&self, id: i64, photo_url: &str) -> Result<()> {
        sqlx::query("UPDATE students SET photo_url = ? WHERE id = ?")
            .bind(photo_url)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update photo url")?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete student")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_student(row: &sqlx::sqlite::SqliteRow) -> Result<Student> {
    let role: String = row.get("role");
    Ok(Student {
        id: row.get("id"),
        full_name: row.get("full_name"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role.parse().unwrap_or(StudentRole::Student),
        is_active: row.get("is_active"),
        course: row.get("course"),
        phone: row.get("phone"),
        address: row.get("address"),
        mentor_name: row.get("mentor_name"),
        photo_url: row.get("photo_url"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxStudentRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxStudentRepository::new(pool)
    }

    fn sample(username: &str, email: &str) -> Student {
        Student::new(
            format!("Student {}", username),
            username.to_string(),
            email.to_string(),
            "$argon2id$stub".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = setup().await;

        let created = repo
            .create(&sample("ravi", "ravi@example.com"))
            .await
            .expect("Failed to create student");
        assert!(created.id > 0);

        let by_name = repo
            .find_by_username("ravi")
            .await
            .expect("Failed to query")
            .expect("Student not found");
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.email, "ravi@example.com");
        assert!(by_name.is_active);

        let by_email = repo.find_by_email("ravi@example.com").await.unwrap();
        assert!(by_email.is_some());
        assert!(repo.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup().await;
        repo.create(&sample("ravi", "ravi@example.com")).await.unwrap();

        let dup = repo.create(&sample("ravi", "other@example.com")).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_profile_patch_keeps_unset_fields() {
        let repo = setup().await;
        let mut student = sample("ravi", "ravi@example.com");
        student.course = Some("Rust 101".to_string());
        let created = repo.create(&student).await.unwrap();

        let patch = ProfilePatch {
            phone: Some("9999".to_string()),
            ..Default::default()
        };
        repo.update_profile(created.id, &patch).await.unwrap();

        let loaded = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.phone.as_deref(), Some("9999"));
        assert_eq!(loaded.course.as_deref(), Some("Rust 101"));
    }

    #[tokio::test]
    async fn test_set_active_and_delete() {
        let repo = setup().await;
        let created = repo.create(&sample("ravi", "ravi@example.com")).await.unwrap();

        assert!(repo.set_active(created.id, false).await.unwrap());
        let loaded = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_students_excludes_admins() {
        let repo = setup().await;
        repo.create(&sample("ravi", "ravi@example.com")).await.unwrap();
        let mut admin = sample("boss", "boss@example.com");
        admin.role = StudentRole::Admin;
        repo.create(&admin).await.unwrap();

        let students = repo.list_students().await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].username, "ravi");
    }
}
