//! Shahid narrative workflow
//!
//! `architectural-analysis → generate-narrative → build-scenes`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_core::ProjectionError;

use crate::projector::ResultProjector;
use crate::types::{decode_tagged, StepDefinition, StepOutput, WorkflowDefinition};

pub const WORKFLOW_NAME: &str = "shahid";

pub const ARCHITECTURAL_ANALYSIS: &str = "architectural-analysis";
pub const GENERATE_NARRATIVE: &str = "generate-narrative";
pub const BUILD_SCENES: &str = "build-scenes";

pub const SHAPE_ANALYSIS: &str = "analysis";
pub const SHAPE_NARRATIVE: &str = "narrative";
pub const SHAPE_SCENES: &str = "scenes";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShahidInput {
    Analyze {
        idea: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        genre: Option<String>,
    },
    Narrate {
        structure: String,
        characters: Vec<String>,
        themes: Vec<String>,
    },
    BuildScenes {
        narrative: String,
        outline: Vec<String>,
    },
}

impl ShahidInput {
    pub fn from_idea(idea: impl Into<String>) -> Self {
        Self::Analyze {
            idea: idea.into(),
            genre: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum ShahidOutput {
    Analysis {
        structure: String,
        #[serde(default)]
        characters: Vec<String>,
        #[serde(default)]
        themes: Vec<String>,
    },
    Narrative {
        narrative: String,
        #[serde(default)]
        outline: Vec<String>,
    },
    Scenes {
        scenes: Vec<Scene>,
    },
}

impl StepOutput for ShahidOutput {
    fn shape(&self) -> &'static str {
        match self {
            Self::Analysis { .. } => SHAPE_ANALYSIS,
            Self::Narrative { .. } => SHAPE_NARRATIVE,
            Self::Scenes { .. } => SHAPE_SCENES,
        }
    }

    fn decode(shape: &str, raw: Value) -> Result<Self, serde_json::Error> {
        decode_tagged(shape, raw)
    }
}

pub fn definition() -> Result<WorkflowDefinition<ShahidInput, ShahidOutput>, ProjectionError> {
    WorkflowDefinition::builder(WORKFLOW_NAME)
        .step(StepDefinition::initial(
            ARCHITECTURAL_ANALYSIS,
            "/api/shahid/architectural-analysis",
            SHAPE_ANALYSIS,
        ))
        .step(StepDefinition::projected(
            GENERATE_NARRATIVE,
            "/api/shahid/generate-narrative",
            SHAPE_NARRATIVE,
            ResultProjector::new(SHAPE_ANALYSIS, |result: &ShahidOutput| match result {
                ShahidOutput::Analysis {
                    structure,
                    characters,
                    themes,
                } => Some(ShahidInput::Narrate {
                    structure: structure.clone(),
                    characters: characters.clone(),
                    themes: themes.clone(),
                }),
                _ => None,
            }),
        ))
        .step(StepDefinition::projected(
            BUILD_SCENES,
            "/api/shahid/build-scenes",
            SHAPE_SCENES,
            ResultProjector::new(SHAPE_NARRATIVE, |result: &ShahidOutput| match result {
                ShahidOutput::Narrative { narrative, outline } => Some(ShahidInput::BuildScenes {
                    narrative: narrative.clone(),
                    outline: outline.clone(),
                }),
                _ => None,
            }),
        ))
        .build()
}
