pub mod step;
pub mod workflow;

pub use step::{decode_tagged, StepDefinition, StepInput, StepOutput};
pub use workflow::{WorkflowBuilder, WorkflowDefinition, WorkflowError};
