use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageBuffer, Rgba};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::gemini::{GeminiClient, PredictRequest};
use crate::prompts::ASPECT_RATIO;
use crate::synth::SynthesizedPrompt;

pub const REMEDIATION_HINT: &str = "The prompt above is ready to use: paste it into an external image tool (Midjourney, Nano Banana, ...) to render the campaign photo. Direct rendering needs a credential with image-generation (Imagen) access.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub count: u32,
    pub aspect_ratio: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub model: String,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, req: &RenderRequest) -> Result<ImageResult, ProviderError>;
    fn name(&self) -> &'static str;
}

pub struct ImagenProvider {
    client: Arc<GeminiClient>,
    model: String,
}

impl ImagenProvider {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }
}

#[async_trait]
impl ImageProvider for ImagenProvider {
    async fn generate(&self, req: &RenderRequest) -> Result<ImageResult, ProviderError> {
        let body = PredictRequest::new(&req.prompt, req.count, req.aspect_ratio);
        let image = self
            .client
            .predict_images(&self.model, &body)
            .await?
            .into_iter()
            .next()
            .ok_or(ProviderError::Empty)?;
        Ok(ImageResult {
            bytes: image.bytes,
            mime_type: image.mime_type,
            model: self.model.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "imagen"
    }
}

pub struct MockProvider;

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, req: &RenderRequest) -> Result<ImageResult, ProviderError> {
        // 4:5 test pattern; small enough to draw inline.
        let w = 256u32;
        let h = 320u32;
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let v = ((x ^ y) & 0xFF) as u8;
            *p = Rgba([v, 255 - v, (req.prompt.len() % 255) as u8, 255]);
        }
        let mut png_bytes: Vec<u8> = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| ProviderError::Malformed(format!("encode error: {e}")))?;

        Ok(ImageResult { bytes: png_bytes, mime_type: "image/png".into(), model: "mock".into() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub model: String,
    pub aspect_ratio: &'static str,
}

/// Rendering either succeeds or is unavailable; both are normal outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(RenderedImage),
    Unavailable { cause: String },
}

pub struct ImageRenderer {
    provider: Arc<dyn ImageProvider>,
}

impl ImageRenderer {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    /// Single attempt, one 4:5 image.
    pub async fn render(&self, prompt: &SynthesizedPrompt) -> RenderOutcome {
        let req =
            RenderRequest { prompt: prompt.text.clone(), count: 1, aspect_ratio: ASPECT_RATIO };
        match self.provider.generate(&req).await {
            Ok(res) if res.bytes.is_empty() => {
                warn!(provider = self.provider.name(), "image provider returned an empty image");
                RenderOutcome::Unavailable { cause: ProviderError::Empty.to_string() }
            }
            Ok(res) => {
                info!(provider = self.provider.name(), bytes = res.bytes.len(), "image rendered");
                RenderOutcome::Rendered(RenderedImage {
                    bytes: res.bytes,
                    mime_type: res.mime_type,
                    model: res.model,
                    aspect_ratio: ASPECT_RATIO,
                })
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "image rendering unavailable");
                RenderOutcome::Unavailable { cause: e.to_string() }
            }
        }
    }
}
