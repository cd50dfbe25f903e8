/// Result alias that carries the custom [`TimelineError`] type.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Free-form message for failures that do not deserve their own variant.
    #[error("{0}")]
    Message(String),
    /// No formation carries the requested id.
    #[error("unknown formation `{0}`")]
    UnknownFormation(String),
    /// No dancer carries the requested id in any formation.
    #[error("unknown marker `{0}`")]
    UnknownMarker(String),
    /// The operation needs at least one formation.
    #[error("timeline has no formations")]
    EmptyTimeline,
    /// A persisted project document could not be accepted.
    #[error("invalid project: {0}")]
    InvalidProject(String),
    /// The audio collaborator refused an operation.
    #[error("audio error: {0}")]
    Audio(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl TimelineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_project<T: Into<String>>(reason: T) -> Self {
        Self::InvalidProject(reason.into())
    }

    pub fn audio<T: Into<String>>(reason: T) -> Self {
        Self::Audio(reason.into())
    }
}

impl From<&str> for TimelineError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TimelineError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_id() {
        let err = TimelineError::UnknownFormation("f9".to_string());
        assert_eq!(err.to_string(), "unknown formation `f9`");
        assert!(TimelineError::invalid_project("no formations")
            .to_string()
            .contains("no formations"));
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TimelineError = parse.into();
        assert!(matches!(err, TimelineError::Json(_)));
    }
}
