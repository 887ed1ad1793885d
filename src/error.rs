use crate::host::HostError;
use crate::lesson::ResolveError;
use thiserror::Error;

/// Failure of a roster-level lesson operation. Every variant carries the
/// message shown to the user as-is.
#[derive(Debug, Error)]
pub enum LessonError {
    /// No usable selection, blank name, or blank lesson text.
    #[error("{0}")]
    InputMissing(String),

    /// Student, sheet or folder could not be found.
    #[error("{0}")]
    LookupFailed(String),

    #[error("{message}")]
    Parse { raw: String, message: String },

    /// The library has no folder for the next lesson.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Collaborator(HostError),
}

impl LessonError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputMissing(_) => "input_missing",
            Self::LookupFailed(_) => "lookup_failed",
            Self::Parse { .. } => "parse_error",
            Self::NotFound(_) => "not_found",
            Self::Collaborator(_) => "collaborator_failure",
        }
    }

    /// Maps a resolver failure; `what` names the field for the blank case.
    pub fn from_resolve(e: ResolveError, what: &str) -> Self {
        match e {
            ResolveError::Empty => Self::InputMissing(format!("no {} given", what)),
            ResolveError::Unparseable { ref raw, .. } => Self::Parse {
                raw: raw.clone(),
                message: e.to_string(),
            },
        }
    }
}

impl From<HostError> for LessonError {
    fn from(e: HostError) -> Self {
        if e.is_lookup() {
            Self::LookupFailed(e.to_string())
        } else {
            Self::Collaborator(e)
        }
    }
}
