pub mod config;
pub mod error;
pub mod event;
pub mod rows;
pub mod task;
pub mod transcript;
pub mod workbook;

pub use config::{CaseforgeConfig, GenerationConfig, ModelConfig};
pub use error::{CaseError, Result};
pub use event::ChatEvent;
pub use rows::extract_rows;
pub use task::{CategoryWeights, TaskSpec};
pub use transcript::{
    AccumulateOptions, GenerationRun, SentinelMatch, DEFAULT_SENTINEL, TASK_RESULT_PREFIX,
};
pub use workbook::{project, Projection, MARKDOWN_MIME, SEPARATOR_MARKER, WORKBOOK_MIME};
