/// Primary keys are snowflake ids stored as PostgreSQL BIGINT.
///
/// The snowflake layout keeps the sign bit clear, so every id is positive.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
