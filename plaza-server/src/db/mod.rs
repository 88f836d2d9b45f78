//! Database access layer

pub mod shop;
pub mod voucher;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Check whether a sqlx error is a duplicate-primary-key violation.
///
/// The order pipeline leans on this: replaying a reservation with an
/// already-inserted order id must be treated as success, not failure.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
