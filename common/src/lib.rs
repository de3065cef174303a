mod domain;
mod infrastructure;

pub mod test_utils;

// Persisted editorial table names

pub const ARTICLES_TABLE: &str = "editorial_articles";
pub const ASSIGNMENTS_TABLE: &str = "editorial_assignments";
pub const SCHEDULE_ENTRIES_TABLE: &str = "editorial_schedule_entries";
pub const DRAFT_SNAPSHOTS_TABLE: &str = "editorial_draft_snapshots";
pub const PUBLISH_EVENTS_TABLE: &str = "editorial_publish_events";
pub const AUDIT_LOG_TABLE: &str = "editorial_audit_log";

// Key used for snapshots of articles that were never saved

pub const NEW_ARTICLE_SNAPSHOT_KEY: &str = "new";

// expose domain module

pub use domain::*;

// expose database module

pub use infrastructure::database;
