//! HTTP transport for the two hosted calls: Gemini `generateContent` (prompt
//! writing from text + garment image) and Imagen `predict` (image rendering).

use std::time::{Duration, Instant};

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::ProviderError;

/// Imagen safety level: only block content rated high severity.
pub const SAFETY_BLOCK_ONLY_HIGH: &str = "block_only_high";

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let api_key = cfg.credential()?.to_string();
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, model, method)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (message, summary) = summarize_error_body(&body);
            warn!(%status, body = %summary, "gemini api error");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: message.unwrap_or(summary),
            });
        }
        Ok(resp.json::<R>().await?)
    }

    pub async fn generate_content(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<String, ProviderError> {
        debug!(target: "campaigngen::gemini", model, request = %req.summary(), "generateContent");
        let started = Instant::now();
        let resp: GenerateContentResponse =
            self.post(&self.endpoint(model, "generateContent"), req).await?;
        info!(model, elapsed_ms = started.elapsed().as_millis() as u64, "generateContent done");
        resp.text().ok_or(ProviderError::Empty)
    }

    pub async fn predict_images(
        &self,
        model: &str,
        req: &PredictRequest,
    ) -> Result<Vec<PredictedImage>, ProviderError> {
        debug!(
            target: "campaigngen::gemini",
            model,
            sample_count = req.parameters.sample_count,
            aspect_ratio = %req.parameters.aspect_ratio,
            "predict"
        );
        let started = Instant::now();
        let resp: PredictResponse = self.post(&self.endpoint(model, "predict"), req).await?;
        info!(model, elapsed_ms = started.elapsed().as_millis() as u64, "predict done");
        resp.into_images()
    }
}

// ---- generateContent wire types ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// Part kinds this client never sends (thoughts, function calls, ...).
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub candidate_count: u32,
}

impl GenerateContentRequest {
    /// System directive, then one user turn: the text directive followed by the inline image.
    pub fn multimodal(system: &str, user: &str, mime_type: &str, image: &[u8]) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text { text: system.to_string() }],
            },
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![
                    Part::Text { text: user.to_string() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: general_purpose::STANDARD.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { candidate_count: 1 },
        }
    }

    /// Log-safe view: text previews and image sizes, never the base64 body.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .map(|p| match p {
                Part::Text { text } => format!("text({})", truncate_for_log(text, 80)),
                Part::InlineData { inline_data } => {
                    format!("{}[{}b64]", inline_data.mime_type, inline_data.data.len())
                }
                Part::Other(_) => "other".to_string(),
            })
            .collect();
        parts.join(", ")
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate that has any, concatenated as sent.
    /// `None` when the result is blank.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .find(|c| c.parts.iter().any(|p| matches!(p, Part::Text { .. })))?
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ---- Imagen predict wire types ----

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictInstance {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub sample_count: u32,
    pub aspect_ratio: String,
    pub safety_setting: String,
}

impl PredictRequest {
    pub fn new(prompt: &str, sample_count: u32, aspect_ratio: &str) -> Self {
        Self {
            instances: vec![PredictInstance { prompt: prompt.to_string() }],
            parameters: PredictParameters {
                sample_count,
                aspect_ratio: aspect_ratio.to_string(),
                safety_setting: SAFETY_BLOCK_ONLY_HIGH.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
    pub rai_filtered_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl PredictResponse {
    pub fn into_images(self) -> Result<Vec<PredictedImage>, ProviderError> {
        let mut images = Vec::new();
        let mut filtered = None;
        for p in self.predictions {
            match p.bytes_base64_encoded {
                Some(data) => {
                    let bytes = general_purpose::STANDARD
                        .decode(data.as_bytes())
                        .map_err(|e| {
                            ProviderError::Malformed(format!("image payload is not base64: {e}"))
                        })?;
                    let mime_type = p.mime_type.unwrap_or_else(|| "image/png".into());
                    images.push(PredictedImage { bytes, mime_type });
                }
                None => filtered = filtered.or(p.rai_filtered_reason),
            }
        }
        match (images.is_empty(), filtered) {
            (false, _) => Ok(images),
            (true, Some(reason)) => Err(ProviderError::Filtered(reason)),
            (true, None) => Err(ProviderError::Empty),
        }
    }
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls `error.message` out of a Google API error body when there is one.
/// Returns (message, bounded summary of the raw body).
pub fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        return (message, truncate_for_log(&value.to_string(), 2000));
    }
    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single HTTP request with `status` and a JSON `body`; the task
    /// yields the raw request head (request line plus headers).
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = sock.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            head
        });
        (base, handle)
    }

    fn local_client(api_base: String) -> GeminiClient {
        GeminiClient {
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            api_base,
            api_key: "secret-key".into(),
        }
    }

    #[test]
    fn multimodal_payload_shape() {
        let req = GenerateContentRequest::multimodal("SYS", "USER", "image/png", &[1, 2, 3]);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, json!({
            "systemInstruction": { "parts": [{ "text": "SYS" }] },
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": "USER" },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                ]
            }],
            "generationConfig": { "candidateCount": 1 }
        }));
    }

    #[test]
    fn summary_hides_image_body() {
        let req = GenerateContentRequest::multimodal("SYS", "describe", "image/jpeg", &[0u8; 300]);
        let s = req.summary();
        assert!(s.contains("text(describe)"));
        assert!(s.contains("image/jpeg[400b64]"));
        assert!(!s.contains("AAAA"));
    }

    #[test]
    fn predict_payload_shape() {
        let v = serde_json::to_value(PredictRequest::new("a coat", 1, "4:5")).unwrap();
        assert_eq!(v, json!({
            "instances": [{ "prompt": "a coat" }],
            "parameters": { "sampleCount": 1, "aspectRatio": "4:5", "safetySetting": "block_only_high" }
        }));
    }

    #[test]
    fn response_text_concatenates_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "first" }, { "text": "  " }, { "text": "second" }]
                }
            }]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("first  second"));
    }

    #[test]
    fn split_sentence_stays_one_paragraph() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "A linen" }, { "text": " " }, { "text": "dress" }] }
            }]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("A linen dress"));

        let blank: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": " " }, { "text": "\n" }] } }]
        }))
        .unwrap();
        assert_eq!(blank.text(), None);
    }

    #[test]
    fn response_without_text_is_none() {
        let resp: GenerateContentResponse =
            serde_json::from_value(json!({ "candidates": [{ "finishReason": "SAFETY" }] })).unwrap();
        assert_eq!(resp.text(), None);
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn predictions_decode_to_images() {
        let resp: PredictResponse = serde_json::from_value(json!({
            "predictions": [{ "bytesBase64Encoded": "AQID", "mimeType": "image/png" }]
        }))
        .unwrap();
        let images = resp.into_images().unwrap();
        let expected = PredictedImage { bytes: vec![1, 2, 3], mime_type: "image/png".into() };
        assert_eq!(images, vec![expected]);
    }

    #[test]
    fn filtered_or_empty_predictions_are_errors() {
        let resp: PredictResponse = serde_json::from_value(json!({
            "predictions": [{ "raiFilteredReason": "person generation blocked" }]
        }))
        .unwrap();
        let filtered = ProviderError::Filtered("person generation blocked".into());
        assert_eq!(resp.into_images(), Err(filtered));

        let resp: PredictResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(resp.into_images(), Err(ProviderError::Empty));

        let resp: PredictResponse =
            serde_json::from_value(json!({ "predictions": [{ "bytesBase64Encoded": "%%%" }] })).unwrap();
        assert!(matches!(resp.into_images(), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn error_status_carries_api_message_and_key_stays_in_header() {
        let body = r#"{"error":{"code":403,"message":"Imagen API is only accessible to billed users","status":"PERMISSION_DENIED"}}"#;
        let (base, seen) = serve_once("403 Forbidden", body).await;
        let client = local_client(base);

        let err = client
            .predict_images("imagen-test", &PredictRequest::new("a coat", 1, "4:5"))
            .await
            .unwrap_err();
        let expected = ProviderError::Status {
            status: 403,
            message: "Imagen API is only accessible to billed users".into(),
        };
        assert_eq!(err, expected);

        let head = seen.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert_eq!(request_line, "POST /models/imagen-test:predict HTTP/1.1");
        assert!(!request_line.contains("secret-key"));
        assert!(head.lines().any(|l| l.eq_ignore_ascii_case("x-goog-api-key: secret-key")));
    }

    #[tokio::test]
    async fn generate_content_returns_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"A linen"},{"text":" dress."}]}}]}"#;
        let (base, seen) = serve_once("200 OK", body).await;
        let client = local_client(base);

        let req = GenerateContentRequest::multimodal("SYS", "USER", "image/png", &[1, 2, 3]);
        let text = client.generate_content("gemini-test", &req).await.unwrap();
        assert_eq!(text, "A linen dress.");
        assert!(seen.await.unwrap().starts_with("POST /models/gemini-test:generateContent HTTP/1.1"));
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error":{"code":403,"message":"Imagen API is only accessible to billed users","status":"PERMISSION_DENIED"}}"#;
        let (message, summary) = summarize_error_body(body);
        assert_eq!(message.as_deref(), Some("Imagen API is only accessible to billed users"));
        assert!(summary.contains("PERMISSION_DENIED"));

        assert_eq!(summarize_error_body("  "), (None, "empty response body".to_string()));
        assert_eq!(summarize_error_body("<html>bad gateway</html>").0, None);
    }
}
