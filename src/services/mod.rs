//! Business logic services

pub mod analytics;
pub mod attendance;
pub mod email;
pub mod password;
pub mod report;
pub mod scheduler;
pub mod storage;
pub mod user;

pub use analytics::{AnalyticsError, AnalyticsService, ProductivitySnapshot};
pub use attendance::{AttendanceError, AttendanceService, CheckOutInput};
pub use email::{Notifier, SmtpNotifier};
pub use report::{ReportError, ReportService, RosterEntry};
pub use scheduler::AutocloseScheduler;
pub use storage::{BlobStore, LocalBlobStore, StoredBlob};
pub use user::{RegisterInput, UserError, UserService};
