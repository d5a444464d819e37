use thiserror::Error;

/// Main error type for the Scholarly workflow engine
#[derive(Error, Debug)]
pub enum ScholarError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("OCR failed: {message}")]
    Extraction { message: String },

    #[error("Enrichment failed ({status}): {detail}")]
    Enrichment { status: u16, detail: String },

    #[error("Failed to parse response from server: {message}")]
    ResponseFormat { message: String },

    #[error("Chat request failed: {message}")]
    Chat { message: String },

    #[error("Unsupported document format: {format}")]
    InvalidFormat { format: String },

    #[error("Sign in required for {action}")]
    Unauthenticated { action: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl ScholarError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    /// Create an enrichment error from a non-success response
    pub fn enrichment(status: u16, detail: impl Into<String>) -> Self {
        Self::Enrichment {
            status,
            detail: detail.into(),
        }
    }

    pub fn response_format(message: impl Into<String>) -> Self {
        Self::ResponseFormat {
            message: message.into(),
        }
    }

    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Check if error is recoverable (the user can simply try again)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScholarError::Configuration { .. } => false,
            ScholarError::Unauthenticated { .. } => false,
            _ => true,
        }
    }

    /// Get user-facing error message, shown inline next to the control that failed
    pub fn user_message(&self) -> String {
        match self {
            ScholarError::Configuration { .. } => {
                "API URL not loaded. Please check the API configuration and restart.".to_string()
            }
            ScholarError::Extraction { .. } => self.to_string(),
            ScholarError::Enrichment { status, detail } => {
                format!("Request failed ({}): {}", status, detail)
            }
            ScholarError::ResponseFormat { .. } => {
                "Failed to parse response from server".to_string()
            }
            ScholarError::InvalidFormat { format } => {
                format!(
                    "Unsupported format: {}. Supported formats: PDF, JPG, PNG, WEBP, DOCX",
                    format
                )
            }
            ScholarError::Unauthenticated { action } => {
                format!("Please log in to use {}.", action)
            }
            ScholarError::FileIO { path, .. } => format!("Could not read file: {}", path),
            other => other.to_string(),
        }
    }

    /// Text substituted for an assistant reply when a chat call fails
    pub fn chat_text(&self) -> String {
        match self {
            ScholarError::Chat { message } => format!("Error: {}", message),
            other => format!("Server error: {}", other),
        }
    }
}

/// Result type alias for convenience
pub type ScholarResult<T> = Result<T, ScholarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrichment_message_carries_status_and_detail() {
        let err = ScholarError::enrichment(502, "upstream timeout");
        assert_eq!(err.to_string(), "Enrichment failed (502): upstream timeout");
        assert!(err.user_message().contains("502"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_configuration_is_not_recoverable() {
        let err = ScholarError::configuration("missing localapi");
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("API URL not loaded"));
    }

    #[test]
    fn test_chat_text_is_never_empty() {
        assert_eq!(
            ScholarError::chat("model offline").chat_text(),
            "Error: model offline"
        );
        let general = ScholarError::General(anyhow::anyhow!("connection reset"));
        assert!(general.chat_text().starts_with("Server error:"));
    }
}
