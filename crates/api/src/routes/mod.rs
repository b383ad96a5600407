pub mod health;
pub mod inference;

pub use health::health_check;
pub use inference::llm_inference_stream;
