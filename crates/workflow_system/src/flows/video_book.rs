//! Video-to-book workflow
//!
//! `extract-transcript → clean-transcript → generate-book`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use task_core::ProjectionError;

use crate::projector::ResultProjector;
use crate::types::{decode_tagged, StepDefinition, StepOutput, WorkflowDefinition};

pub const WORKFLOW_NAME: &str = "video-book";

pub const EXTRACT_TRANSCRIPT: &str = "extract-transcript";
pub const CLEAN_TRANSCRIPT: &str = "clean-transcript";
pub const GENERATE_BOOK: &str = "generate-book";

pub const SHAPE_TRANSCRIPT: &str = "transcript";
pub const SHAPE_CLEANED_TRANSCRIPT: &str = "cleaned_transcript";
pub const SHAPE_BOOK: &str = "book";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VideoBookInput {
    ExtractTranscript {
        video_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    CleanTranscript {
        transcript: String,
    },
    GenerateBook {
        cleaned_transcript: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl VideoBookInput {
    pub fn from_video(video_url: impl Into<String>) -> Self {
        Self::ExtractTranscript {
            video_url: video_url.into(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum VideoBookOutput {
    Transcript {
        transcript: String,
        #[serde(default)]
        language: Option<String>,
    },
    CleanedTranscript {
        cleaned_transcript: String,
        #[serde(default)]
        title: Option<String>,
    },
    Book {
        title: String,
        #[serde(default)]
        chapters: Vec<Chapter>,
    },
}

impl StepOutput for VideoBookOutput {
    fn shape(&self) -> &'static str {
        match self {
            Self::Transcript { .. } => SHAPE_TRANSCRIPT,
            Self::CleanedTranscript { .. } => SHAPE_CLEANED_TRANSCRIPT,
            Self::Book { .. } => SHAPE_BOOK,
        }
    }

    fn decode(shape: &str, raw: Value) -> Result<Self, serde_json::Error> {
        decode_tagged(shape, raw)
    }
}

pub fn definition() -> Result<WorkflowDefinition<VideoBookInput, VideoBookOutput>, ProjectionError>
{
    WorkflowDefinition::builder(WORKFLOW_NAME)
        .step(StepDefinition::initial(
            EXTRACT_TRANSCRIPT,
            "/api/video/extract-transcript",
            SHAPE_TRANSCRIPT,
        ))
        .step(StepDefinition::projected(
            CLEAN_TRANSCRIPT,
            "/api/video/clean-transcript",
            SHAPE_CLEANED_TRANSCRIPT,
            ResultProjector::new(SHAPE_TRANSCRIPT, |result: &VideoBookOutput| match result {
                VideoBookOutput::Transcript { transcript, .. } => {
                    Some(VideoBookInput::CleanTranscript {
                        transcript: transcript.clone(),
                    })
                }
                _ => None,
            }),
        ))
        .step(StepDefinition::projected(
            GENERATE_BOOK,
            "/api/video/generate-book",
            SHAPE_BOOK,
            ResultProjector::new(
                SHAPE_CLEANED_TRANSCRIPT,
                |result: &VideoBookOutput| match result {
                    VideoBookOutput::CleanedTranscript {
                        cleaned_transcript,
                        title,
                    } => Some(VideoBookInput::GenerateBook {
                        cleaned_transcript: cleaned_transcript.clone(),
                        title: title.clone(),
                    }),
                    _ => None,
                },
            ),
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_is_valid() {
        let definition = definition().unwrap();
        let names: Vec<_> = definition.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, [EXTRACT_TRANSCRIPT, CLEAN_TRANSCRIPT, GENERATE_BOOK]);
    }

    #[test]
    fn input_serializes_without_tag() {
        let body = serde_json::to_value(VideoBookInput::from_video("https://x/y")).unwrap();
        assert_eq!(body, json!({"video_url": "https://x/y"}));
    }

    #[test]
    fn transcript_result_projects_into_clean_step() {
        let definition = definition().unwrap();
        let output =
            VideoBookOutput::decode(SHAPE_TRANSCRIPT, json!({"transcript": "..."})).unwrap();
        let projector = definition.steps()[1].projector.as_ref().unwrap();
        let input = projector.project(CLEAN_TRANSCRIPT, &output).unwrap();
        assert_eq!(
            serde_json::to_value(input).unwrap(),
            json!({"transcript": "..."})
        );
    }

    #[test]
    fn book_result_decodes_chapters() {
        let output = VideoBookOutput::decode(
            SHAPE_BOOK,
            json!({"title": "رحلة", "chapters": [{"title": "الفصل الأول", "content": "..."}]}),
        )
        .unwrap();
        match output {
            VideoBookOutput::Book { title, chapters } => {
                assert_eq!(title, "رحلة");
                assert_eq!(chapters.len(), 1);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }
}
