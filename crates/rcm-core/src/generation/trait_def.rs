//! The `StructuredGenerator` trait -- the seam between the pipeline and
//! the language model.
//!
//! Each stage hands the generator a prompt plus a JSON Schema and receives
//! a JSON value back. Adapters (the `claude` CLI, scripted test doubles)
//! implement this trait and are held as `Arc<dyn StructuredGenerator>`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{GenerationError, GenerationRequest};

/// A model that returns JSON conforming to a requested schema.
///
/// # Object Safety
///
/// This trait is object-safe so one generator can be shared by every
/// stage and by concurrent pipeline runs.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Human-readable name for this generator (e.g. "claude-cli").
    fn name(&self) -> &str;

    /// Run a single generation call.
    ///
    /// When `request.tools` is set the generator may invoke the registered
    /// tools before answering. Errors are returned as-is; no retries.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value, GenerationError>;
}

// Compile-time assertion: StructuredGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn StructuredGenerator) {}
};

/// Run `request` and deserialize the result into `T`.
///
/// A value that does not fit `T` is reported as [`GenerationError::Schema`].
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn StructuredGenerator,
    request: GenerationRequest<'_>,
) -> Result<T, GenerationError> {
    let key = request.key;
    let value = generator.generate(request).await?;
    serde_json::from_value(value).map_err(|source| GenerationError::Schema { key, source })
}
