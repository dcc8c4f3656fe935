//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific entity.

pub mod attendance;
pub mod password_reset;
pub mod session;
pub mod student;

pub use attendance::{AttendanceRepository, SqlxAttendanceRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use student::{ProfilePatch, SqlxStudentRepository, StudentRepository};
