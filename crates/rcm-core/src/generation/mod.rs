//! Structured-generation boundary.
//!
//! Stages never talk to a model directly. They build a
//! [`GenerationRequest`] (prompt, JSON Schema, optional image, optional
//! tools) and hand it to a [`StructuredGenerator`]. The
//! [`ClaudeCliGenerator`] is the production adapter.
//!
//! # Architecture
//!
//! ```text
//! stage fn
//!     |
//!     v
//! generate_structured::<T>(&dyn StructuredGenerator, request)
//!     |
//!     +--> generate(request) ----------------> serde_json::Value
//!     |        |                                   |
//!     |        +--> ToolRegistry::invoke(name)     |
//!     |             (zero or more times)           v
//!     +------------------------------------- T (or GenerationError::Schema)
//! ```

pub mod claude_cli;
pub mod registry;
pub mod trait_def;
pub mod types;

pub use claude_cli::{ClaudeCliConfig, ClaudeCliGenerator};
pub use registry::{Tool, ToolError, ToolRegistry, ToolSpec};
pub use trait_def::{StructuredGenerator, generate_structured};
pub use types::{GenerationError, GenerationRequest, ImageAttachment, PromptKey};
