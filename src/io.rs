use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

use crate::prompts::CampaignParams;
use crate::providers::RenderedImage;
use crate::synth::SynthesizedPrompt;

#[derive(Serialize)]
struct Sidecar<'a> {
    params: &'a CampaignParams,
    prompt: &'a str,
    text_model: &'a str,
    image_model: &'a str,
    mime_type: &'a str,
    aspect_ratio: &'a str,
    created_at: String,
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Writes the rendered photo plus a JSON sidecar under `out_dir`; returns the image path.
pub async fn save_output(
    out_dir: &Path,
    stem: &str,
    params: &CampaignParams,
    text_model: &str,
    prompt: &SynthesizedPrompt,
    image: &RenderedImage,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir).await?;

    let img_path = out_dir.join(format!("{stem}.{}", extension_for_mime(&image.mime_type)));
    write_atomic(&img_path, &image.bytes).await?;

    let sidecar = Sidecar {
        params,
        prompt: &prompt.text,
        text_model,
        image_model: &image.model,
        mime_type: &image.mime_type,
        aspect_ratio: image.aspect_ratio,
        created_at: Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_vec_pretty(&sidecar)?;
    write_atomic(&out_dir.join(format!("{stem}.json")), &json).await?;
    Ok(img_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{ModelVariant, Moment, Vibe};

    #[tokio::test]
    async fn writes_image_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let params = CampaignParams::new(ModelVariant::PlusSize, Moment::Night, Vibe::Work);
        let prompt = SynthesizedPrompt { text: "denim jacket".into() };
        let image = RenderedImage {
            bytes: vec![9, 9, 9],
            mime_type: "image/jpeg".into(),
            model: "imagen-3.0-generate-002".into(),
            aspect_ratio: "4:5",
        };

        let path = save_output(dir.path(), "campaign-1", &params, "gemini-1.5-pro", &prompt, &image)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("campaign-1.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 9, 9]);

        let raw = std::fs::read(dir.path().join("campaign-1.json")).unwrap();
        let sidecar: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(sidecar["prompt"], "denim jacket");
        assert_eq!(sidecar["text_model"], "gemini-1.5-pro");
        assert_eq!(sidecar["image_model"], "imagen-3.0-generate-002");
        assert!(sidecar["created_at"].as_str().is_some());
        assert_eq!(sidecar["params"]["model_variant"], "plus_size");
        assert_eq!(sidecar["aspect_ratio"], "4:5");
        assert!(!dir.path().join("campaign-1.jpg.tmp").exists());
    }
}
