//! OpenAI-compatible AI backend.
//!
//! Works with any endpoint exposing `/chat/completions` (JSON mode) and
//! `/audio/transcriptions`: OpenAI, Azure OpenAI, vLLM, LocalAI, or a
//! gateway in front of another provider.
//!
//! # Example
//!
//! ```rust,no_run
//! use conspectium_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use conspectium_inference::{AiBackend, NoteVariant};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::new(OpenAIConfig {
//!         base_url: "http://localhost:8000/v1".to_string(),
//!         ..OpenAIConfig::default()
//!     })
//!     .unwrap();
//!
//!     let draft = backend
//!         .generate_note_variant("Лекция о фотосинтезе.", NoteVariant::Brief)
//!         .await
//!         .unwrap();
//!     println!("{}", draft.markdown);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{classify_transport, to_ai_error, OpenAIErrorCode};
pub use types::*;
