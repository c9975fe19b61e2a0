#![warn(missing_docs)]
//! Lumina Studio - text-to-image generation sessions on Gemini image models.
//!
//! A [`Studio`] wraps one [`ImageProvider`] with the state of an image
//! generation session: the prompt being edited, the selected options, the
//! image on display, the last error and a newest-first history of
//! everything generated. Only one request is ever in flight.
//!
//! # Quick Start
//!
//! ```no_run
//! use lumina::{AspectRatio, GeminiProvider, Studio};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lumina::Result<()> {
//!     let provider = GeminiProvider::builder().build()?;
//!     let studio = Studio::new(Arc::new(provider));
//!     studio.set_aspect_ratio(AspectRatio::Cinematic);
//!
//!     let entry = studio.generate_prompt("A lighthouse at dusk").await?;
//!     entry.save_to(".")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `lumina` command-line interface

pub mod config;
pub mod credentials;
mod error;
pub mod image;
pub mod studio;

pub use error::{LuminaError, Result, FALLBACK_ERROR_MESSAGE};

pub use config::LuminaConfig;
pub use credentials::ApiKeyStore;
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};
pub use image::{
    AspectRatio, GeneratedImage, GenerationOptions, GenerationRequest, ImageFormat, ImageProvider,
    ImageSize,
};
pub use studio::{History, HistoryEntry, Studio};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{LuminaError, Result};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{GenerationOptions, GenerationRequest, ImageProvider};
    pub use crate::studio::{HistoryEntry, Studio};
}
