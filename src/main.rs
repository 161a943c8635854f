use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use campaigngen::{
    io::save_output, prompts::ParameterPicker, AppConfig, CampaignError, CampaignForm,
    CampaignParams, CampaignResult, CampaignStatus, Orchestrator, RunMode, LISA_STYLE,
};

#[derive(Parser)]
#[command(
    name = "campaigngen",
    version,
    about = "Garment photo in, campaign prompt (and photo) out"
)]
struct Cli {
    /// Optional YAML config; environment variables override it.
    #[arg(long, env = "CAMPAIGNGEN_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Print the run result as JSON on stdout instead of the bare prompt.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the style brief for a parameter combination (no network).
    Brief(Selection),
    /// Write the image-generation prompt only.
    Prompt(RunArgs),
    /// Write the prompt, then try to render the campaign photo.
    Generate {
        #[command(flatten)]
        run: RunArgs,
        /// Directory for the rendered photo and its JSON sidecar.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Selection {
    /// Joven | Madura | Plus Size
    #[arg(long = "model")]
    model_variant: Option<String>,
    /// Day | Night (Día | Noche)
    #[arg(long)]
    moment: Option<String>,
    /// Urban | Social | Work | Relax
    #[arg(long)]
    vibe: Option<String>,
    /// Pick model, moment and vibe at random (explicit flags still win).
    #[arg(long)]
    surprise: bool,
    /// Seed for --surprise; fresh every run when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct RunArgs {
    /// Garment photo (jpg, png or webp).
    #[arg(long)]
    image: Option<PathBuf>,
    #[command(flatten)]
    selection: Selection,
}

impl Selection {
    fn labels(&self) -> Result<(String, String, String), CampaignError> {
        let picked = if self.surprise {
            let seed = self.seed.unwrap_or_else(rand::random);
            ParameterPicker::new_random(seed).next()
        } else {
            None
        };
        let pick = |given: &Option<String>, flag: &str, fallback: Option<String>| {
            given
                .clone()
                .or(fallback)
                .ok_or_else(|| CampaignError::invalid(format!("missing --{flag}")))
        };
        Ok((
            pick(&self.model_variant, "model", picked.map(|p| p.model_variant.to_string()))?,
            pick(&self.moment, "moment", picked.map(|p| p.moment.to_string()))?,
            pick(&self.vibe, "vibe", picked.map(|p| p.vibe.to_string()))?,
        ))
    }
}

async fn read_form(args: &RunArgs, labels: &(String, String, String)) -> Result<CampaignForm> {
    let (model_variant, moment, vibe) = labels.clone();
    let garment = match &args.image {
        Some(p) => Some(
            tokio::fs::read(p)
                .await
                .context(format!("Failed to read garment image: {}", p.display()))?,
        ),
        None => None,
    };
    Ok(CampaignForm { garment, model_variant, moment, vibe })
}

fn print_result(res: &CampaignResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(res)?);
    } else if let Some(p) = &res.prompt {
        println!("{}", p.text);
    }
    match res.status {
        CampaignStatus::Complete => eprintln!("✅ campaign photo rendered"),
        CampaignStatus::PromptOnly => {
            eprintln!("⚠️  {}", res.message.as_deref().unwrap_or_default())
        }
        CampaignStatus::Failed => {
            eprintln!("❌ {}", res.message.as_deref().unwrap_or("campaign failed"))
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("campaigngen=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (run, out, mode) = match cli.cmd {
        Cmd::Brief(sel) => {
            let (m, t, v) = sel.labels()?;
            println!("{}", LISA_STYLE.describe(CampaignParams::parse(&m, &t, &v)?));
            return Ok(());
        }
        Cmd::Prompt(run) => (run, None, RunMode::PromptOnly),
        Cmd::Generate { run, out } => (run, out, RunMode::Full),
    };

    let cfg = AppConfig::load(cli.config.as_deref())?;
    let orchestrator = Orchestrator::from_config(&cfg, LISA_STYLE)?;
    let labels = run.selection.labels()?;
    let form = read_form(&run, &labels).await?;
    let res = orchestrator.generate(form, mode).await?;
    print_result(&res, cli.json)?;

    if let (Some(dir), Some(prompt), Some(image)) = (out, &res.prompt, &res.image) {
        let params = CampaignParams::parse(&labels.0, &labels.1, &labels.2)?;
        let stem = format!("campaign-{}", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = save_output(&dir, &stem, &params, &cfg.text_model, prompt, image).await?;
        eprintln!("saved {}", path.display());
    }

    if res.status == CampaignStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
