pub mod inference;
pub mod metrics;
pub mod prompts;

pub use inference::{InferenceServiceError, InferenceServiceImpl, InferenceServiceTrait};
pub use metrics::{MetricsServiceTrait, OtlpMetricsService};
pub use prompts::StaticPromptProvider;
