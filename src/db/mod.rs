//! Database layer
//!
//! SQLite via sqlx, with embedded code migrations and trait-based
//! repositories so services depend on interfaces rather than queries.
//!
//! The store guarantees the core relies on:
//! - atomic single-row read-modify-write
//! - a UNIQUE(student_id, day) constraint on attendance, which is what
//!   enforces at-most-one session per student per local day under
//!   concurrent check-ins (the losing insert is rejected)
//! - a set-based `UPDATE ... WHERE status = 'In Progress'` for the
//!   lockdown sweep

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool};
