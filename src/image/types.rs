//! Core types for image generation.

use crate::error::{LuminaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type reported by the API to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratios offered by the studio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 4:3 standard landscape.
    #[serde(rename = "4:3")]
    Standard,
    /// 16:9 cinematic widescreen.
    #[serde(rename = "16:9")]
    Cinematic,
    /// 3:4 portrait.
    #[serde(rename = "3:4")]
    Portrait,
    /// 9:16 tall mobile screen.
    #[serde(rename = "9:16")]
    Mobile,
}

impl AspectRatio {
    /// Every ratio, in menu order.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Standard,
        Self::Cinematic,
        Self::Portrait,
        Self::Mobile,
    ];

    /// Returns the aspect ratio as sent to the API (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Standard => "4:3",
            Self::Cinematic => "16:9",
            Self::Portrait => "3:4",
            Self::Mobile => "9:16",
        }
    }

    /// Human-readable menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Square => "Square (1:1)",
            Self::Standard => "Standard (4:3)",
            Self::Cinematic => "Cinematic (16:9)",
            Self::Portrait => "Portrait (3:4)",
            Self::Mobile => "Mobile (9:16)",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = LuminaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| {
                LuminaError::InvalidRequest(format!(
                    "unsupported aspect ratio '{s}' (expected one of 1:1, 4:3, 16:9, 3:4, 9:16)"
                ))
            })
    }
}

/// Output resolution for the Pro model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// About 1024px on the long edge.
    #[default]
    #[serde(rename = "1K")]
    OneK,
    /// About 2048px on the long edge.
    #[serde(rename = "2K")]
    TwoK,
    /// About 4096px on the long edge.
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    /// Every size, smallest first.
    pub const ALL: [ImageSize; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    /// Returns the size as sent to the API (e.g., "2K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }

    /// Human-readable menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneK => "High (1K)",
            Self::TwoK => "Ultra (2K)",
            Self::FourK => "Master (4K)",
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = LuminaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == wanted)
            .ok_or_else(|| {
                LuminaError::InvalidRequest(format!(
                    "unsupported image size '{s}' (expected one of 1K, 2K, 4K)"
                ))
            })
    }
}

/// User-selected generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Aspect ratio of the output image.
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Use the Pro engine (enables 2K/4K output).
    #[serde(default)]
    pub high_quality: bool,
    /// Resolution; only honored when `high_quality` is on.
    #[serde(default)]
    pub image_size: ImageSize,
}

impl GenerationOptions {
    /// Returns the size to request, or `None` when the Pro engine is off.
    pub fn effective_image_size(&self) -> Option<ImageSize> {
        self.high_quality.then_some(self.image_size)
    }
}

/// A request to generate an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Generation settings.
    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and default options.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: GenerationOptions::default(),
        }
    }

    /// Replaces all generation options.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.options.aspect_ratio = ratio;
        self
    }

    /// Turns the Pro engine on or off.
    pub fn with_high_quality(mut self, enabled: bool) -> Self {
        self.options.high_quality = enabled;
        self
    }

    /// Sets the Pro engine resolution.
    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.options.image_size = size;
        self
    }
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Model identifier that produced the image.
    pub model: String,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, model: impl Into<String>) -> Self {
        Self {
            data,
            format,
            model: model.into(),
            duration_ms: None,
        }
    }

    /// Creates a new generated image, detecting format from magic bytes.
    pub fn from_bytes(data: Vec<u8>, model: impl Into<String>) -> Result<Self> {
        let format = ImageFormat::from_magic_bytes(&data)
            .ok_or_else(|| LuminaError::Decode("Unknown image format".into()))?;
        Ok(Self::new(data, format, model))
    }

    /// Records how long the generation took.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/jpeg"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Cinematic);
        assert_eq!(" 3:4 ".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("21:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_menu_order() {
        let order: Vec<&str> = AspectRatio::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(order, vec!["1:1", "4:3", "16:9", "3:4", "9:16"]);
        assert_eq!(AspectRatio::default(), AspectRatio::Square);
        assert_eq!(AspectRatio::Mobile.label(), "Mobile (9:16)");
    }

    #[test]
    fn test_image_size_parse_is_case_insensitive() {
        assert_eq!("2k".parse::<ImageSize>().unwrap(), ImageSize::TwoK);
        assert_eq!("4K".parse::<ImageSize>().unwrap(), ImageSize::FourK);
        assert!("8K".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_effective_image_size_requires_high_quality() {
        let mut options = GenerationOptions {
            image_size: ImageSize::FourK,
            ..Default::default()
        };
        assert_eq!(options.effective_image_size(), None);

        options.high_quality = true;
        assert_eq!(options.effective_image_size(), Some(ImageSize::FourK));
    }

    #[test]
    fn test_options_serde_uses_wire_strings() {
        let options = GenerationOptions {
            aspect_ratio: AspectRatio::Mobile,
            high_quality: true,
            image_size: ImageSize::TwoK,
        };
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["aspect_ratio"], "9:16");
        assert_eq!(json["image_size"], "2K");
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new("A lighthouse")
            .with_aspect_ratio(AspectRatio::Cinematic)
            .with_high_quality(true)
            .with_image_size(ImageSize::TwoK);
        assert_eq!(req.prompt, "A lighthouse");
        assert_eq!(req.options.effective_image_size(), Some(ImageSize::TwoK));
    }

    #[test]
    fn test_data_url() {
        let image = GeneratedImage::from_bytes(PNG_MAGIC.to_vec(), "gemini-2.5-flash-image").unwrap();
        assert!(image.to_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(image.size(), 12);
    }

    #[test]
    fn test_from_bytes_rejects_unknown() {
        assert!(GeneratedImage::from_bytes(vec![0u8; 16], "m").is_err());
    }
}
