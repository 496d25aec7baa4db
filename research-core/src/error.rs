use quick_xml::events::attributes::AttrError;
use thiserror::Error;

use crate::models::ProjectId;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("Duplicate: {0}")]
    Duplicate(String),
    #[error("Index {index} is out of range for a list of {len} (expected 1..={max})", max = .len + 1)]
    OutOfRange { index: usize, len: usize },
    #[error("Cycle detected in research tree at {0:?}")]
    CycleDetected(String),
    #[error("Invalid research XML: {0}")]
    Parse(String),
    #[error("Persistence failure: {0}")]
    Persist(String),
    #[error("Unknown research project {0}")]
    UnknownProject(ProjectId),
    #[error("No research project named {0:?}")]
    NotFound(String),
    #[error("Listener failed: {0}")]
    Listener(String),
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl From<quick_xml::Error> for PlannerError {
    fn from(src: quick_xml::Error) -> PlannerError {
        PlannerError::Parse(src.to_string())
    }
}

impl From<AttrError> for PlannerError {
    fn from(src: AttrError) -> PlannerError {
        PlannerError::Parse(format!("malformed attribute: {src}"))
    }
}

/// Holds on to the first failure of a multi-step mutation so the remaining
/// steps still run and the session stays consistent.
#[derive(Debug, Default)]
pub(crate) struct Deferred(Option<PlannerError>);

impl Deferred {
    pub(crate) fn keep<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.0.is_none() {
                    self.0 = Some(err);
                }
                None
            }
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
