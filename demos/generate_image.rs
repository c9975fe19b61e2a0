//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Requires `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) environment variable.

use lumina::{AspectRatio, GeminiProvider, GenerationRequest, ImageProvider};

#[tokio::main]
async fn main() -> lumina::Result<()> {
    let provider = GeminiProvider::builder().build()?;

    let request = GenerationRequest::new("A golden retriever puppy playing in snow")
        .with_aspect_ratio(AspectRatio::Cinematic);
    let image = provider.generate(&request).await?;

    let path = format!("output.{}", image.format.extension());
    image.save(&path)?;
    println!(
        "Generated image: {} ({} bytes) via {}",
        path,
        image.size(),
        image.model
    );

    Ok(())
}
