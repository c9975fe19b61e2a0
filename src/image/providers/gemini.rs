//! Gemini (Google) image generation provider.

use crate::credentials::ApiKeyStore;
use crate::error::{parse_retry_after, sanitize_error_message, LuminaError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationOptions, GenerationRequest, ImageFormat};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default per-request timeout. Pro renders at 4K can take a while.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    Flash,
    /// Gemini 3 Pro Image (2K/4K high fidelity).
    Pro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }

    /// Picks the model for the given options: Pro when high quality is on.
    pub fn for_options(options: &GenerationOptions) -> Self {
        if options.high_quality {
            Self::Pro
        } else {
            Self::Flash
        }
    }

    /// Returns true if this model accepts an `imageSize`.
    pub fn supports_image_size(&self) -> bool {
        matches!(self, Self::Pro)
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    keys: Option<ApiKeyStore>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.keys = Some(ApiKeyStore::with_key(key));
        self
    }

    /// Reads the API key from a shared store on every request.
    /// Falls back to the environment when unset.
    pub fn key_store(mut self, keys: ApiKeyStore) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Overrides the API endpoint (without trailing slash).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the provider.
    ///
    /// A missing key is not an error here: the key may be selected later,
    /// and requests fail with [`LuminaError::Auth`] until it is.
    pub fn build(self) -> Result<GeminiProvider> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiProvider {
            client,
            keys: self.keys.unwrap_or_else(ApiKeyStore::from_env),
            base_url,
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    keys: ApiKeyStore,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the key store this provider reads from.
    pub fn key_store(&self) -> &ApiKeyStore {
        &self.keys
    }

    fn api_key(&self) -> Result<String> {
        self.keys.get().ok_or_else(|| {
            LuminaError::Auth(
                "no API key selected; set GEMINI_API_KEY or select a key with /key".into(),
            )
        })
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let api_key = self.api_key()?;
        let model = GeminiModel::for_options(&request.options);
        let start = Instant::now();

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            model.as_str(),
        );

        let body = GeminiRequest::from_generation_request(request, model);

        tracing::debug!(
            model = model.as_str(),
            aspect_ratio = %request.options.aspect_ratio,
            "submitting Gemini image generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        // Prompt blocks come back as HTTP 200
        if let Some(ref feedback) = gemini_response.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(LuminaError::ContentBlocked(msg));
            }
        }

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| {
                LuminaError::UnexpectedResponse("No candidates in Gemini response".into())
            })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(LuminaError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                "IMAGE_OTHER" | "NO_IMAGE" => {
                    return Err(LuminaError::UnexpectedResponse(format!(
                        "Generation failed: {}. Try a different prompt.",
                        finish_reason
                    )));
                }
                _ => {}
            }
        }

        let content = candidate.content.ok_or_else(|| {
            LuminaError::UnexpectedResponse("No content in Gemini candidate".into())
        })?;

        let inline_data = content
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| {
                LuminaError::UnexpectedResponse("No image data in Gemini response".into())
            })?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline_data.data)
            .map_err(|e| LuminaError::Decode(e.to_string()))?;

        let format = ImageFormat::from_mime_type(&inline_data.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            model = model.as_str(),
            bytes = data.len(),
            duration_ms,
            "Gemini image generation complete"
        );

        Ok(GeneratedImage::new(data, format, model.as_str()).with_duration_ms(duration_ms))
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> LuminaError {
    let text = sanitize_error_message(text);
    if status == 402 {
        return LuminaError::Billing(
            "Gemini billing issue: see https://ai.google.dev/gemini-api/docs/billing".into(),
        );
    }
    if status == 404 {
        return LuminaError::InvalidRequest(
            "Model not found. The Pro engine needs a key from a paid project; select one with /key."
                .into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return LuminaError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return LuminaError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return LuminaError::ContentBlocked(text);
    }
    LuminaError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_impl(request).await
    }

    fn model_for(&self, options: &GenerationOptions) -> &str {
        GeminiModel::for_options(options).as_str()
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/v1beta/models/{}",
            self.base_url,
            GeminiModel::Flash.as_str(),
        );

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(LuminaError::Auth("Invalid API key".into())),
            404 => Err(LuminaError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(LuminaError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<&'static str>,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest, model: GeminiModel) -> Self {
        let image_size = req
            .options
            .effective_image_size()
            .filter(|_| model.supports_image_size())
            .map(|size| size.as_str());

        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart {
                    text: req.prompt.clone(),
                }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: req.options.aspect_ratio.as_str(),
                    image_size,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{AspectRatio, ImageSize};
    use reqwest::header::HeaderMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // base64 of a 12-byte PNG header
    const PNG_B64: &str = "iVBORw0KGgoAAAAA";

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::Flash.as_str(), "gemini-2.5-flash-image");
        assert_eq!(GeminiModel::Pro.as_str(), "gemini-3-pro-image-preview");
    }

    #[test]
    fn test_model_follows_high_quality() {
        let mut options = GenerationOptions::default();
        assert_eq!(GeminiModel::for_options(&options), GeminiModel::Flash);
        options.high_quality = true;
        assert_eq!(GeminiModel::for_options(&options), GeminiModel::Pro);
    }

    #[test]
    fn test_request_construction_flash_omits_image_size() {
        let req = GenerationRequest::new("A puppy")
            .with_aspect_ratio(AspectRatio::Cinematic)
            .with_image_size(ImageSize::FourK);
        let gemini_req = GeminiRequest::from_generation_request(&req, GeminiModel::Flash);
        let json = serde_json::to_value(&gemini_req).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "A puppy");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert!(json["generationConfig"]["imageConfig"].get("imageSize").is_none());
    }

    #[test]
    fn test_request_construction_pro_sends_image_size() {
        let req = GenerationRequest::new("A puppy")
            .with_high_quality(true)
            .with_image_size(ImageSize::TwoK);
        let gemini_req = GeminiRequest::from_generation_request(&req, GeminiModel::Pro);
        let json = serde_json::to_value(&gemini_req).unwrap();

        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "here you go"}, {
                        "inlineData": {
                            "mimeType": "image/png",
                            "data": "iVBORw0KGgo="
                        }
                    }]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.candidates.len(), 1);
        assert_eq!(resp.candidates[0].finish_reason.as_deref(), Some("STOP"));

        let content = resp.candidates[0].content.as_ref().unwrap();
        assert!(content.parts[0].inline_data.is_none());
        let inline = content.parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let feedback = resp.prompt_feedback.unwrap();
        assert_eq!(feedback.block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_parse_error_mapping() {
        let headers = HeaderMap::new();
        assert!(matches!(parse_error(401, "nope", &headers), LuminaError::Auth(_)));
        assert!(matches!(parse_error(402, "", &headers), LuminaError::Billing(_)));
        assert!(matches!(
            parse_error(404, "", &headers),
            LuminaError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            LuminaError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_error(400, "Request blocked by safety settings", &headers),
            LuminaError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "boom", &headers),
            LuminaError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let provider = GeminiProvider::builder()
            .key_store(ApiKeyStore::new())
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let err = provider
            .generate(&GenerationRequest::new("A puppy"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::Auth(_)));
    }

    #[tokio::test]
    async fn test_generate_against_local_endpoint() {
        let body = format!(
            r#"{{"candidates":[{{"content":{{"parts":[{{"inlineData":{{"mimeType":"image/png","data":"{PNG_B64}"}}}}]}},"finishReason":"STOP"}}]}}"#
        );
        let (base_url, server) = serve_once("200 OK", body).await;

        let provider = GeminiProvider::builder()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap();
        let request = GenerationRequest::new("A lighthouse at dusk")
            .with_aspect_ratio(AspectRatio::Portrait)
            .with_high_quality(true)
            .with_image_size(ImageSize::FourK);

        let image = provider.generate(&request).await.unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.model, "gemini-3-pro-image-preview");
        assert_eq!(image.size(), 12);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-3-pro-image-preview:generateContent"));
        assert!(raw.to_lowercase().contains("x-goog-api-key: test-key"));
        assert!(raw.contains(r#""aspectRatio":"3:4""#));
        assert!(raw.contains(r#""imageSize":"4K""#));
    }

    #[tokio::test]
    async fn test_generate_maps_safety_finish_reason() {
        let body = r#"{"candidates":[{"finishReason":"IMAGE_SAFETY"}]}"#.to_string();
        let (base_url, server) = serve_once("200 OK", body).await;

        let provider = GeminiProvider::builder()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap();
        let err = provider
            .generate(&GenerationRequest::new("something"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::ContentBlocked(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_maps_http_error() {
        let body = r#"{"error":{"message":"API key not valid"}}"#.to_string();
        let (base_url, server) = serve_once("403 Forbidden", body).await;

        let provider = GeminiProvider::builder()
            .api_key("test-key")
            .base_url(base_url)
            .build()
            .unwrap();
        let err = provider
            .generate(&GenerationRequest::new("something"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::Auth(ref m) if m.contains("API key not valid")));
        server.await.unwrap();
    }
}
