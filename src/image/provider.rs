//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationOptions, GenerationRequest};
use async_trait::async_trait;

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Returns the model identifier a request with these options would use.
    fn model_for(&self, options: &GenerationOptions) -> &str;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
