//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`TallyError`]
//! via `#[from]`.

/// Top-level error for every fallible operation of the engine.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("invalid recurrence configuration")]
    Config(#[from] ConfigError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("transport error")]
    Transport(#[from] TransportError),
}

/// User-facing validation failures. Save is blocked until they are fixed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("date is required")]
    DateRequired,

    #[error("a valid amount is required")]
    AmountRequired,

    #[error("there is already a schedule named {0:?}")]
    DuplicateName(String),

    #[error("operator {op:?} is not valid for field {field:?}")]
    InvalidCondition { field: String, op: String },

    #[error("unknown condition field {0:?}")]
    UnknownField(String),

    #[error("invalid value for {field:?}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Malformed recurrence rule. Never silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("interval must be at least 1")]
    ZeroInterval,

    #[error("day patterns are only supported with a monthly frequency")]
    PatternsRequireMonthly,

    #[error("pattern value {value} is out of range for {kind}")]
    InvalidPattern { kind: String, value: i32 },

    #[error("end date {end} is before start date {start}")]
    EndBeforeStart {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("occurrence count must be at least 1")]
    ZeroOccurrences,

    #[error("an end date is required when the rule ends on a date")]
    MissingEndDate,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A call to the batch-update or query transport failed.
///
/// Not retried automatically. Partial application across a multi-step save
/// is possible and is not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl TallyError {
    /// Wrap any storage-layer error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    /// One-line message suitable for showing next to a form.
    ///
    /// Validation errors name the offending field; every other failure
    /// collapses into a generic save-failure message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Config(err) => err.to_string(),
            Self::NotFound(_) | Self::Storage(_) | Self::Transport(_) => {
                "An error occurred while saving. Please contact support if the problem persists."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_tally_error() {
        let err: TallyError = ValidationError::DateRequired.into();
        assert!(matches!(
            err,
            TallyError::Validation(ValidationError::DateRequired)
        ));
    }

    #[test]
    fn should_show_validation_reason_as_user_message() {
        let err: TallyError = ValidationError::DuplicateName("Rent".to_string()).into();
        assert_eq!(err.user_message(), "there is already a schedule named \"Rent\"");
    }

    #[test]
    fn should_hide_transport_details_from_user_message() {
        let err: TallyError = TransportError::Unavailable("socket closed".to_string()).into();
        let message = err.user_message();
        assert!(!message.contains("socket"));
        assert!(message.contains("support"));
    }

    #[test]
    fn should_format_not_found_error() {
        let err = NotFoundError {
            entity: "Schedule",
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Schedule abc not found");
    }
}
