// Domain layer modules
pub mod announcement_policy;
pub mod schedule;

// Re-exports
pub use announcement_policy::AnnouncementDecision;
pub use schedule::{parse_event_date, parse_run_at, parse_utc_offset, today_with_offset};
