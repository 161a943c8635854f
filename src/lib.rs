//! Fashion campaign generator: a garment photo plus model, moment and vibe go
//! in; an image-generation prompt (and, when the credential allows it, the
//! rendered 4:5 campaign photo) comes out.

pub mod config;
pub mod error;
pub mod garment;
pub mod gemini;
pub mod io;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod synth;

pub use config::{AppConfig, BackendKind};
pub use error::{CampaignError, ProviderError};
pub use garment::GarmentImage;
pub use orchestrator::{
    CampaignForm, CampaignRequest, CampaignResult, CampaignStatus, Orchestrator, RunMode,
};
pub use prompts::{CampaignParams, ModelVariant, Moment, StyleTemplate, Vibe, LISA_STYLE};
pub use providers::{ImageProvider, ImageRenderer, RenderOutcome, RenderedImage};
pub use synth::{PromptSynthesizer, PromptWriter, SynthesizedPrompt};
