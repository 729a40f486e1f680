/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier of a single applied change (and of its history node).
pub type ChangeId = uuid::Uuid;

/// Public identifier of a commit.
pub type CommitId = uuid::Uuid;
