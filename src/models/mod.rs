//! Data models
//!
//! Entities persisted by studytrack: students, their daily attendance
//! records, auth sessions and password-reset tokens.

pub mod attendance;
pub mod password_reset;
pub mod session;
pub mod student;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use password_reset::PasswordReset;
pub use session::Session;
pub use student::{Student, StudentRole};
