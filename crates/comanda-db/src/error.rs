use comanda_core::AppError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Map a sqlx error to an [`AppError`].
///
/// Constraint violations caused by the request become `Conflict` or
/// `ValidationError`; everything else is a `DatabaseError`.
pub(crate) fn db_err(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        let constraint = db.constraint().unwrap_or("unknown").to_string();
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return AppError::Conflict(format!("Duplicate value violates {constraint}"));
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return AppError::ValidationError(format!(
                    "Referenced record does not exist or is still in use ({constraint})"
                ));
            }
            Some(CHECK_VIOLATION) => {
                return AppError::ValidationError(format!("Value violates {constraint}"));
            }
            _ => {}
        }
    }
    AppError::DatabaseError(e.to_string())
}

pub(crate) fn not_found(what: &str, id: uuid::Uuid) -> AppError {
    AppError::NotFound(format!("{what} not found: {id}"))
}
