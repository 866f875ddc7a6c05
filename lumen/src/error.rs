use std::time::Duration;

use sea_orm::DbErr;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, LumenError>;

/// Errors returned by query and mutation builders
#[derive(Debug, thiserror::Error)]
pub enum LumenError {
    /// Zero rows where one or more were expected
    #[error("lumen: {label} not found")]
    NotFound { label: &'static str },

    /// More than one row where exactly one was expected
    #[error("lumen: {label} not singular")]
    NotSingular { label: &'static str },

    /// An edge was read before it was eager-loaded
    #[error("lumen: {edge} edge was not loaded")]
    NotLoaded { edge: &'static str },

    /// A builder was rejected before any statement was sent
    #[error("lumen: {message}")]
    Validation { name: String, message: String },

    /// The driver reported a constraint violation
    #[error("lumen: constraint failed: {message}")]
    Constraint {
        message: String,
        #[source]
        source: DbErr,
    },

    /// A foreign key pointed outside the set of rows it was expected to match
    #[error("lumen: {message}")]
    Consistency { message: String },

    /// A declared hook slot was never filled
    #[error("lumen: uninitialized hook for {label} (slot {slot})")]
    UninitializedHook { label: &'static str, slot: usize },

    /// A hook chain returned a value of the wrong shape
    #[error("lumen: unexpected mutation result for {label}: expected {expected}")]
    UnexpectedMutation {
        label: &'static str,
        expected: &'static str,
    },

    #[error("lumen: statement timed out after {after:?}")]
    Timeout { after: Duration },

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl LumenError {
    pub fn validation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Wraps a driver error, promoting constraint violations to [`LumenError::Constraint`]
    pub fn from_driver(err: DbErr) -> Self {
        if is_constraint_violation(&err) {
            Self::Constraint {
                message: err.to_string(),
                source: err,
            }
        } else {
            Self::Db(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_not_singular(&self) -> bool {
        matches!(self, Self::NotSingular { .. })
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Self::NotLoaded { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }
}

impl From<LumenError> for DbErr {
    fn from(err: LumenError) -> Self {
        match err {
            LumenError::Db(inner) => inner,
            LumenError::Constraint { source, .. } => source,
            other => DbErr::Custom(other.to_string()),
        }
    }
}

// Driver messages for violations that `DbErr::sql_err` does not classify.
const CONSTRAINT_MESSAGES: &[&str] = &[
    "constraint failed",          // sqlite
    "violates foreign key",       // postgres
    "violates unique constraint", // postgres
    "violates not-null",          // postgres
    "violates check constraint",  // postgres
    "Error 1062",                 // mysql duplicate entry
    "Error 1451",                 // mysql parent row
    "Error 1452",                 // mysql child row
    "Duplicate entry",
    "foreign key constraint fails",
];

/// Reports whether the driver error is a constraint violation
pub fn is_constraint_violation(err: &DbErr) -> bool {
    if err.sql_err().is_some() {
        return true;
    }
    let message = err.to_string();
    CONSTRAINT_MESSAGES.iter().any(|m| message.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_driver_messages() {
        let err = DbErr::Custom("FOREIGN KEY constraint failed".to_string());
        assert!(is_constraint_violation(&err));
        assert!(LumenError::from_driver(err).is_constraint());

        let err = DbErr::Custom("connection reset".to_string());
        assert!(!is_constraint_violation(&err));
        assert!(matches!(LumenError::from_driver(err), LumenError::Db(_)));
    }

    #[test]
    fn constraint_keeps_original_message() {
        let err = LumenError::from_driver(DbErr::Custom(
            "UNIQUE constraint failed: users.name".to_string(),
        ));
        assert!(err.to_string().contains("UNIQUE constraint failed: users.name"));
        let back: DbErr = err.into();
        assert!(back.to_string().contains("users.name"));
    }

    #[test]
    fn converts_into_db_err() {
        let err: DbErr = LumenError::NotFound { label: "User" }.into();
        assert!(matches!(err, DbErr::Custom(ref m) if m == "lumen: User not found"));
    }
}
