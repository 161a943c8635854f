use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{CampaignError, ProviderError};
use crate::gemini::{GeminiClient, GenerateContentRequest};
use crate::garment::GarmentImage;
use crate::orchestrator::CampaignRequest;
use crate::prompts::{CampaignParams, StyleTemplate};

/// Final image-generation prompt, English, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedPrompt {
    pub text: String,
}

/// What the prompt writer receives: both directives plus the garment photo.
pub struct WriterRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub garment: &'a GarmentImage,
}

#[async_trait]
pub trait PromptWriter: Send + Sync {
    async fn write(&self, req: &WriterRequest<'_>) -> Result<String, ProviderError>;
    fn name(&self) -> &'static str;
}

pub struct GeminiPromptWriter {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiPromptWriter {
    pub fn new(client: Arc<GeminiClient>, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }
}

#[async_trait]
impl PromptWriter for GeminiPromptWriter {
    async fn write(&self, req: &WriterRequest<'_>) -> Result<String, ProviderError> {
        let body = GenerateContentRequest::multimodal(
            req.system,
            req.user,
            &req.garment.mime_type,
            &req.garment.bytes,
        );
        self.client.generate_content(&self.model, &body).await
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Offline writer: echoes the scenario and subject back as a prompt, no network.
pub struct MockPromptWriter;

#[async_trait]
impl PromptWriter for MockPromptWriter {
    async fn write(&self, req: &WriterRequest<'_>) -> Result<String, ProviderError> {
        let scene = req.system.lines().find(|l| l.starts_with("SCENARIO")).unwrap_or("");
        let subject = req.system.lines().find(|l| l.starts_with("SUBJECT")).unwrap_or("");
        Ok(format!(
            "Analog 35mm Kodak Portra 400 fashion photo in Bahía Blanca, 4:5 vertical, framed from the nose down. {scene} {subject} Garment: {}x{} {} upload.",
            req.garment.width, req.garment.height, req.garment.mime_type,
        ))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

const WRITER_ROLE: &str = "You are the creative director and prompt writer for a fashion campaign. \
Your output is a prompt for an image-generation model.";

const WRITER_RULES: &str = "OUTPUT RULES:\n\
- Honor every rule above verbatim; none of them may be relaxed or reinterpreted.\n\
- Describe the garment in the attached image in extreme detail: fabric, color, cut, fit, texture, stitching, trims and any print.\n\
- Write a single paragraph in English.\n\
- Output ONLY the prompt text. No preamble, no explanation, no headings, no quotes.";

/// Builds both directives and turns the writer's answer into a [`SynthesizedPrompt`].
pub struct PromptSynthesizer {
    template: StyleTemplate,
    writer: Arc<dyn PromptWriter>,
}

impl PromptSynthesizer {
    pub fn new(template: StyleTemplate, writer: Arc<dyn PromptWriter>) -> Self {
        Self { template, writer }
    }

    pub fn system_directive(&self, params: CampaignParams) -> String {
        format!("{WRITER_ROLE}\n\n{}\n\n{WRITER_RULES}", self.template.describe(params))
    }

    pub fn user_directive(params: CampaignParams) -> String {
        format!(
            "Create a fashion campaign photo. MODEL: {}. MOMENT: {}. VIBE: {}. The garment is shown in the attached image.",
            params.model_variant, params.moment, params.vibe
        )
    }

    /// One attempt; writer errors and blank output both become `SynthesisFailure`.
    pub async fn synthesize(
        &self,
        req: &CampaignRequest,
    ) -> Result<SynthesizedPrompt, CampaignError> {
        let system = self.system_directive(req.params);
        let user = Self::user_directive(req.params);
        let wreq = WriterRequest { system: &system, user: &user, garment: &req.garment };

        let text = self.writer.write(&wreq).await.map_err(|e| {
            warn!(writer = self.writer.name(), error = %e, "prompt writer failed");
            CampaignError::SynthesisFailure(e.to_string())
        })?;

        let text = text.trim();
        if text.is_empty() {
            warn!(writer = self.writer.name(), "prompt writer returned blank text");
            return Err(CampaignError::SynthesisFailure(ProviderError::Empty.to_string()));
        }
        info!(writer = self.writer.name(), chars = text.chars().count(), "prompt synthesized");
        Ok(SynthesizedPrompt { text: text.to_string() })
    }
}
