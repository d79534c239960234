//! Step-related type definitions

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::projector::ResultProjector;

/// Submission payload of a workflow step.
///
/// Each workflow declares one enum covering every step's payload, usually
/// `#[serde(untagged)]` so the POST body is just the variant's fields.
pub trait StepInput: Serialize + Clone + Debug + Send + Sync + 'static {}

impl<T> StepInput for T where T: Serialize + Clone + Debug + Send + Sync + 'static {}

/// Terminal success payload of a workflow step.
///
/// A closed set of variants, one per result shape the workflow declares.
pub trait StepOutput: Sized + Clone + Debug + Send + Sync + 'static {
    /// Tag of the variant this value holds.
    fn shape(&self) -> &'static str;

    /// Decodes a raw task result into the variant named by `shape`.
    fn decode(shape: &str, raw: Value) -> Result<Self, serde_json::Error>;
}

/// Decodes `raw` as the `shape` variant of an adjacently tagged enum
/// (`#[serde(tag = "shape", content = "data")]`).
pub fn decode_tagged<T: DeserializeOwned>(shape: &str, raw: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::json!({ "shape": shape, "data": raw }))
}

/// The static definition of one step.
#[derive(Debug, Clone)]
pub struct StepDefinition<I, O> {
    /// Unique name of the step within its workflow.
    pub name: String,
    /// Submission endpoint, e.g. `/api/video/extract-transcript`.
    pub endpoint: String,
    /// Shape of the result the step's task produces.
    pub produces: &'static str,
    /// Mapping from the previous step's result. `None` for the first step.
    pub projector: Option<ResultProjector<I, O>>,
}

impl<I, O> StepDefinition<I, O> {
    /// A step fed by the workflow's initial input.
    pub fn initial(name: impl Into<String>, endpoint: impl Into<String>, produces: &'static str) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            produces,
            projector: None,
        }
    }

    /// A step fed by the previous step's result.
    pub fn projected(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        produces: &'static str,
        projector: ResultProjector<I, O>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            produces,
            projector: Some(projector),
        }
    }
}
