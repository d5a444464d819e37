use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::enrichment::EnrichmentKind;
use crate::error::{ScholarError, ScholarResult};
use crate::logging::PerformanceTimer;
use crate::pagination::ExtractionResult;

/// Shown when the enrichment endpoint answers without a `response` field
pub const NO_RESPONSE: &str = "No response received";

/// Shown when the chat endpoint reports success with an empty reply
pub const EMPTY_REPLY: &str = "[empty]";

/// Extensions accepted for upload
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "webp", "docx"];

/// A single document picked by the user
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> ScholarResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ScholarError::file_io(path.to_string_lossy().to_string(), e))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// "12.3 KB"
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size() as f64 / 1024.0)
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn validate_format(&self) -> ScholarResult<()> {
        match self.extension() {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            Some(ext) => Err(ScholarError::InvalidFormat { format: ext }),
            None => Err(ScholarError::InvalidFormat {
                format: "unknown".to_string(),
            }),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            _ => "application/octet-stream",
        }
    }
}

/// Remote OCR / AI service. Every call is a single attempt; retries are new user actions.
#[async_trait]
pub trait ScholarBackend: Send + Sync {
    /// Send the document for OCR and get its text per page
    async fn extract(&self, file: UploadFile) -> ScholarResult<ExtractionResult>;

    /// Explain or summarize `text` in the language identified by `language_code`
    async fn enrich(
        &self,
        kind: EnrichmentKind,
        text: &str,
        language_code: &str,
    ) -> ScholarResult<String>;

    /// One conversational turn
    async fn chat(&self, message: &str) -> ScholarResult<String>;

    /// Like [`chat`](Self::chat) but never fails: errors become the reply text,
    /// so a failed turn still shows up as an assistant message.
    async fn chat_reply(&self, message: &str) -> String {
        match self.chat(message).await {
            Ok(reply) => reply,
            Err(e) => {
                crate::log_error!(e, "chat");
                e.chat_text()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ExplainRequest<'a> {
    message: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExplainResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// HTTP implementation of [`ScholarBackend`]
pub struct HttpBackend {
    client: Client,
    api: ApiConfig,
}

impl HttpBackend {
    pub fn new(api: ApiConfig, timeout: Duration) -> ScholarResult<Self> {
        // Fail now rather than on the first request
        api.base_url()?;

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api })
    }
}

#[async_trait]
impl ScholarBackend for HttpBackend {
    async fn extract(&self, file: UploadFile) -> ScholarResult<ExtractionResult> {
        let url = self.api.endpoint("ocr")?;
        let _timer = PerformanceTimer::start(format!("ocr {}", file.name));
        info!(file = %file.name, size_bytes = file.size(), "Uploading document for OCR");

        let mime = file.mime_type();
        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(mime)
            .map_err(|e| ScholarError::extraction(format!("failed to build upload: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "OCR request rejected");
            return Err(ScholarError::extraction(status_text(status)));
        }

        let body = response.text().await?;
        let pages: BTreeMap<String, String> = serde_json::from_str(&body)
            .map_err(|e| ScholarError::extraction(format!("malformed OCR response: {}", e)))?;

        let result = ExtractionResult::from_pages(pages)?;
        info!(pages = result.len(), "OCR finished");
        Ok(result)
    }

    async fn enrich(
        &self,
        kind: EnrichmentKind,
        text: &str,
        language_code: &str,
    ) -> ScholarResult<String> {
        let url = self.api.endpoint("explain")?;
        let _timer = PerformanceTimer::start(format!("{} ({})", kind.label(), language_code));

        let message = kind.compose_message(text);
        let request = ExplainRequest {
            message: &message,
            language: language_code,
        };

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), action = kind.label(), "Enrichment request rejected");
            return Err(ScholarError::enrichment(status.as_u16(), body));
        }

        debug!(bytes = body.len(), "Enrichment response received");
        let parsed: ExplainResponse = serde_json::from_str(&body)
            .map_err(|e| ScholarError::response_format(e.to_string()))?;

        Ok(parsed
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string()))
    }

    async fn chat(&self, message: &str) -> ScholarResult<String> {
        let url = self.api.endpoint("chat")?;
        let _timer = PerformanceTimer::start("chat");

        let response = self
            .client
            .post(url)
            .json(&ChatRequest { message })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) if status.is_success() && parsed.success => Ok(parsed
                .response
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| EMPTY_REPLY.to_string())),
            Ok(ChatResponse { error: Some(error), .. }) => Err(ScholarError::chat(error)),
            Ok(_) => Err(ScholarError::chat(status_text(status))),
            Err(_) if !status.is_success() => Err(ScholarError::chat(status_text(status))),
            Err(e) => Err(ScholarError::response_format(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_format_validation() {
        assert!(UploadFile::new("scan.PDF", vec![1]).validate_format().is_ok());
        assert!(UploadFile::new("photo.webp", vec![]).validate_format().is_ok());

        let err = UploadFile::new("notes.txt", vec![]).validate_format().unwrap_err();
        assert!(matches!(err, ScholarError::InvalidFormat { ref format } if format == "txt"));
        assert!(UploadFile::new("README", vec![]).validate_format().is_err());
    }

    #[test]
    fn test_upload_metadata() {
        let file = UploadFile::new("page.jpeg", vec![0; 2048]);
        assert_eq!(file.size_label(), "2.0 KB");
        assert_eq!(file.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_from_path_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "lecture.pdf");
        assert_eq!(file.size(), 8);

        let err = UploadFile::from_path(&dir.path().join("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, ScholarError::FileIO { .. }));
    }

    #[test]
    fn test_backend_rejects_bad_base_url() {
        let result = HttpBackend::new(ApiConfig::new("not a url"), Duration::from_secs(1));
        assert!(matches!(result, Err(ScholarError::Configuration { .. })));
    }
}
