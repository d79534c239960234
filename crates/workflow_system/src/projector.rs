//! Result projection between workflow steps

use std::fmt;
use std::sync::Arc;

use task_core::ProjectionError;

use crate::types::StepOutput;

type ProjectFn<I, O> = dyn Fn(&O) -> Option<I> + Send + Sync;

/// Pure mapping from one step's success payload to the next step's input.
///
/// The projector declares the result shape it accepts so the workflow builder
/// can reject mismatched definitions before anything runs.
pub struct ResultProjector<I, O> {
    accepts: &'static str,
    map: Arc<ProjectFn<I, O>>,
}

impl<I, O> ResultProjector<I, O> {
    pub fn new<F>(accepts: &'static str, map: F) -> Self
    where
        F: Fn(&O) -> Option<I> + Send + Sync + 'static,
    {
        Self {
            accepts,
            map: Arc::new(map),
        }
    }

    /// Result shape this projector maps from.
    pub fn accepts(&self) -> &'static str {
        self.accepts
    }
}

impl<I, O: StepOutput> ResultProjector<I, O> {
    /// Maps `result` into the input of `step`.
    pub fn project(&self, step: &str, result: &O) -> Result<I, ProjectionError> {
        let shape = result.shape();
        if shape != self.accepts {
            return Err(ProjectionError::ShapeMismatch {
                step: step.to_string(),
                expected: self.accepts.to_string(),
                found: shape.to_string(),
            });
        }
        (self.map)(result).ok_or_else(|| ProjectionError::Unmappable {
            step: step.to_string(),
            shape: shape.to_string(),
        })
    }
}

impl<I, O> Clone for ResultProjector<I, O> {
    fn clone(&self) -> Self {
        Self {
            accepts: self.accepts,
            map: Arc::clone(&self.map),
        }
    }
}

impl<I, O> fmt::Debug for ResultProjector<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultProjector")
            .field("accepts", &self.accepts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Clone, PartialEq)]
    enum Output {
        Transcript(String),
        Summary(String),
    }

    impl StepOutput for Output {
        fn shape(&self) -> &'static str {
            match self {
                Self::Transcript(_) => "transcript",
                Self::Summary(_) => "summary",
            }
        }

        fn decode(shape: &str, raw: Value) -> Result<Self, serde_json::Error> {
            let text: String = serde_json::from_value(raw)?;
            Ok(match shape {
                "summary" => Self::Summary(text),
                _ => Self::Transcript(text),
            })
        }
    }

    fn transcript_projector() -> ResultProjector<String, Output> {
        ResultProjector::new("transcript", |result: &Output| match result {
            Output::Transcript(text) if !text.is_empty() => Some(text.to_uppercase()),
            _ => None,
        })
    }

    #[test]
    fn projects_matching_shape() {
        let projector = transcript_projector();
        let input = projector
            .project("clean", &Output::Transcript("abc".to_string()))
            .unwrap();
        assert_eq!(input, "ABC");
    }

    #[test]
    fn rejects_other_shapes() {
        let projector = transcript_projector();
        let err = projector
            .project("clean", &Output::Summary("abc".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::ShapeMismatch {
                step: "clean".to_string(),
                expected: "transcript".to_string(),
                found: "summary".to_string(),
            }
        );
    }

    #[test]
    fn unmappable_value_is_reported() {
        let projector = transcript_projector();
        let err = projector
            .project("clean", &Output::Transcript(String::new()))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::Unmappable { .. }));
    }
}
