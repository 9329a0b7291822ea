use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Fatal store error: {0}")]
    Fatal(String),
}

impl DatabaseError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DatabaseError::ConstraintViolation(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Transient(_))
    }
}

// SQLITE_BUSY / SQLITE_LOCKED surface from diesel as Unknown database errors,
// so those are classified by message.
impl From<diesel::result::Error> for DatabaseError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DatabaseError::ConstraintViolation(info.message().to_string())
            }
            Error::DatabaseError(_, info)
                if info.message().contains("database is locked")
                    || info.message().contains("database table is locked") =>
            {
                DatabaseError::Transient(info.message().to_string())
            }
            Error::NotFound => DatabaseError::NotFound("no matching row".to_string()),
            other => DatabaseError::Fatal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found() {
        let err = DatabaseError::from(diesel::result::Error::NotFound);
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[test]
    fn rollback_maps_to_fatal() {
        let err = DatabaseError::from(diesel::result::Error::RollbackTransaction);
        assert!(matches!(err, DatabaseError::Fatal(_)));
    }

    #[test]
    fn constraint_violation_predicate() {
        assert!(DatabaseError::ConstraintViolation("dup".into()).is_constraint_violation());
        assert!(!DatabaseError::Fatal("oops".into()).is_constraint_violation());
    }
}
