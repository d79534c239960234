pub mod api;
pub mod http;
pub mod simulated;

pub use api::TaskApi;
pub use http::HttpTaskClient;
pub use simulated::{ApiCall, SimulatedTaskApi, TaskScript};
pub use task_core::TaskflowConfig;
