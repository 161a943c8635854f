use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, BackendKind};
use crate::error::CampaignError;
use crate::garment::GarmentImage;
use crate::gemini::GeminiClient;
use crate::prompts::{CampaignParams, StyleTemplate};
use crate::providers::{
    ImageProvider, ImageRenderer, ImagenProvider, MockProvider, RenderOutcome, RenderedImage,
    REMEDIATION_HINT,
};
use crate::synth::{
    GeminiPromptWriter, MockPromptWriter, PromptSynthesizer, PromptWriter, SynthesizedPrompt,
};

pub const PROMPT_ONLY_HINT: &str =
    "Rendering was not requested; paste the prompt into your image tool of choice.";

/// Raw selections as the UI hands them over; nothing is trusted yet.
#[derive(Debug, Clone, Default)]
pub struct CampaignForm {
    pub garment: Option<Vec<u8>>,
    pub model_variant: String,
    pub moment: String,
    pub vibe: String,
}

impl CampaignForm {
    /// Checks run in order: image present, labels known, image decodes.
    pub fn validate(self, max_garment_edge: u32) -> Result<CampaignRequest, CampaignError> {
        let bytes = self.garment.ok_or_else(|| {
            CampaignError::invalid("missing garment image: upload a photo of the garment first")
        })?;
        let params = CampaignParams::parse(&self.model_variant, &self.moment, &self.vibe)?;
        let garment = GarmentImage::decode(bytes)?.fit_within(max_garment_edge)?;
        Ok(CampaignRequest { garment, params })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRequest {
    pub garment: GarmentImage,
    pub params: CampaignParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Complete,
    PromptOnly,
    Failed,
}

/// Serialized as-is by the CLI's `--json` output; image bytes are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignResult {
    pub status: CampaignStatus,
    pub prompt: Option<SynthesizedPrompt>,
    pub image: Option<RenderedImage>,
    /// Failure cause for `Failed`, remediation hint for `PromptOnly`.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Synthesize then render.
    Full,
    /// Stop after synthesis.
    PromptOnly,
}

/// One linear pass per request: Synthesizing, then Rendering, then a terminal status.
pub struct Orchestrator {
    synth: PromptSynthesizer,
    renderer: ImageRenderer,
    max_garment_edge: u32,
}

impl Orchestrator {
    pub fn new(synth: PromptSynthesizer, renderer: ImageRenderer) -> Self {
        Self { synth, renderer, max_garment_edge: 0 }
    }

    pub fn with_max_garment_edge(mut self, edge: u32) -> Self {
        self.max_garment_edge = edge;
        self
    }

    /// Refuses to build without a credential, whatever the backend.
    pub fn from_config(cfg: &AppConfig, template: StyleTemplate) -> anyhow::Result<Self> {
        cfg.credential()?;
        let writer: Arc<dyn PromptWriter>;
        let provider: Arc<dyn ImageProvider>;
        match cfg.backend {
            BackendKind::Gemini => {
                let client = Arc::new(GeminiClient::new(cfg)?);
                writer = Arc::new(GeminiPromptWriter::new(client.clone(), cfg.text_model.clone()));
                provider = Arc::new(ImagenProvider::new(client, cfg.image_model.clone()));
            }
            BackendKind::Mock => {
                writer = Arc::new(MockPromptWriter);
                provider = Arc::new(MockProvider);
            }
        }
        info!(
            backend = ?cfg.backend,
            writer = writer.name(),
            renderer = provider.name(),
            "orchestrator ready"
        );
        Ok(Self::new(PromptSynthesizer::new(template, writer), ImageRenderer::new(provider))
            .with_max_garment_edge(cfg.max_garment_edge))
    }

    /// Validates the form; invalid input returns before any external call.
    pub async fn generate(
        &self,
        form: CampaignForm,
        mode: RunMode,
    ) -> Result<CampaignResult, CampaignError> {
        let req = form.validate(self.max_garment_edge).map_err(|e| {
            warn!(error = %e, "campaign input rejected");
            e
        })?;
        Ok(self.run(&req, mode).await)
    }

    pub async fn run(&self, req: &CampaignRequest, mode: RunMode) -> CampaignResult {
        let span = info_span!("campaign", request_id = %Uuid::new_v4(), params = ?req.params);
        async move {
            info!("synthesizing");
            let prompt = match self.synth.synthesize(req).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "campaign failed");
                    return CampaignResult {
                        status: CampaignStatus::Failed,
                        prompt: None,
                        image: None,
                        message: Some(e.to_string()),
                    };
                }
            };

            if mode == RunMode::PromptOnly {
                info!("prompt only, rendering skipped");
                return CampaignResult {
                    status: CampaignStatus::PromptOnly,
                    prompt: Some(prompt),
                    image: None,
                    message: Some(PROMPT_ONLY_HINT.into()),
                };
            }

            info!("rendering");
            match self.renderer.render(&prompt).await {
                RenderOutcome::Rendered(image) => {
                    info!("campaign complete");
                    CampaignResult {
                        status: CampaignStatus::Complete,
                        prompt: Some(prompt),
                        image: Some(image),
                        message: None,
                    }
                }
                RenderOutcome::Unavailable { cause } => {
                    info!(%cause, "campaign prompt only");
                    let unavailable = CampaignError::RenderUnavailable(cause);
                    CampaignResult {
                        status: CampaignStatus::PromptOnly,
                        prompt: Some(prompt),
                        image: None,
                        message: Some(format!("{unavailable}. {REMEDIATION_HINT}")),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garment::sample_png;
    use crate::prompts::{ModelVariant, Moment, Vibe, LISA_STYLE};

    fn form(garment: Option<Vec<u8>>) -> CampaignForm {
        CampaignForm {
            garment,
            model_variant: "Joven".into(),
            moment: "Día".into(),
            vibe: "Urbano".into(),
        }
    }

    fn mock_config() -> AppConfig {
        AppConfig {
            backend: BackendKind::Mock,
            api_key: Some("dry-run".into()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn validate_checks_image_first() {
        let bad = CampaignForm { model_variant: "nope".into(), ..form(None) };
        let err = bad.validate(0).unwrap_err();
        assert!(
            matches!(err, CampaignError::InvalidInput(ref m) if m.contains("missing garment image"))
        );
    }

    #[test]
    fn validate_builds_typed_request() {
        let req = form(Some(sample_png(30, 30))).validate(0).unwrap();
        assert_eq!(req.params, CampaignParams::new(ModelVariant::Joven, Moment::Day, Vibe::Urban));
        assert_eq!(req.garment.mime_type, "image/png");
    }

    #[test]
    fn validate_rejects_undecodable_upload() {
        let res = form(Some(vec![0xFF, 0xD8, 0xFF, 0x00])).validate(0);
        assert!(matches!(res, Err(CampaignError::InvalidInput(_))));
    }

    #[test]
    fn from_config_requires_credential() {
        let cfg = AppConfig { backend: BackendKind::Mock, ..AppConfig::default() };
        let err = Orchestrator::from_config(&cfg, LISA_STYLE).err().expect("must fail");
        assert_eq!(err.downcast_ref::<CampaignError>(), Some(&CampaignError::MissingCredential));
    }

    #[tokio::test]
    async fn mock_backend_runs_end_to_end() {
        let orch = Orchestrator::from_config(&mock_config(), LISA_STYLE).unwrap();
        let res = orch.generate(form(Some(sample_png(30, 30))), RunMode::Full).await.unwrap();
        assert_eq!(res.status, CampaignStatus::Complete);
        assert!(res.prompt.unwrap().text.contains("bus stop"));
    }

    #[tokio::test]
    async fn prompt_only_mode_skips_rendering() {
        let orch = Orchestrator::from_config(&mock_config(), LISA_STYLE).unwrap();
        let res = orch.generate(form(Some(sample_png(30, 30))), RunMode::PromptOnly).await.unwrap();
        assert_eq!(res.status, CampaignStatus::PromptOnly);
        assert!(res.image.is_none());
        assert_eq!(res.message.as_deref(), Some(PROMPT_ONLY_HINT));
    }

    #[tokio::test]
    async fn result_serializes_without_image_bytes() {
        let orch = Orchestrator::from_config(&mock_config(), LISA_STYLE).unwrap();
        let res = orch.generate(form(Some(sample_png(30, 30))), RunMode::Full).await.unwrap();

        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["status"], "complete");
        assert_eq!(v["prompt"]["text"], res.prompt.as_ref().unwrap().text.as_str());
        assert_eq!(v["image"]["aspect_ratio"], "4:5");
        assert_eq!(v["image"]["mime_type"], "image/png");
        assert!(v["image"].get("bytes").is_none());
    }
}
