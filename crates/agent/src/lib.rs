//! Assistant brain: prompt templates, model clients, and the per-turn
//! pipeline.
//!
//! The model is strictly a formatter. Which branch a message takes, which
//! board items are fetched and which document chunks are retrieved are all
//! deterministic decisions made before the prompt is built; the model only
//! turns the gathered data into a Danish reply.

pub mod gemini;
pub mod generator;
pub mod llm;
pub mod prompts;
pub mod runtime;

pub use gemini::GeminiClient;
pub use generator::{GenerateError, ResponseGenerator};
pub use llm::{complete_with_retry, LlmClient, LlmError};
pub use prompts::{PromptError, PromptLibrary};
pub use runtime::AssistantRuntime;
