//! Drives a studio session: two prompts, then revisits and saves the first.
//!
//! Run with: `cargo run --example studio_session`
//!
//! Requires `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) environment variable.

use lumina::{AspectRatio, GeminiProvider, ImageSize, Studio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> lumina::Result<()> {
    let studio = Studio::new(Arc::new(GeminiProvider::builder().build()?));

    studio.set_aspect_ratio(AspectRatio::Portrait);
    studio.generate_prompt("A cyberpunk city in the rain, neon glow").await?;

    studio.set_high_quality(true);
    studio.set_image_size(ImageSize::TwoK);
    println!("Switching to {}", studio.active_model());
    studio
        .generate_prompt("An oil painting of a lighthouse at golden hour")
        .await?;

    for (i, entry) in studio.history().iter().enumerate() {
        println!("{}. \"{}\" ({})", i + 1, entry.prompt, entry.model_badge());
    }

    // Show the older image again and save it
    studio.select_index(1)?;
    let path = studio.download(None, ".")?;
    println!("Saved {}", path.display());

    Ok(())
}
