/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Association entry/exit dates are calendar days, not instants.
pub type Date = chrono::NaiveDate;
