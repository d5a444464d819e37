use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::language::Language;
use crate::pagination::Pagination;

/// What the user asked the backend to do with the extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentKind {
    /// Explain the page currently on screen
    Explain,
    /// Summarize every page of the document
    Summarize,
}

impl EnrichmentKind {
    /// Instruction placed in front of the source text
    pub fn instruction(&self) -> &'static str {
        match self {
            EnrichmentKind::Explain => "Explain the file data below",
            EnrichmentKind::Summarize => "summarize the full data below and explain in short",
        }
    }

    /// Text the request is about: the current page for explain, the whole document for summarize
    pub fn source_text(&self, pagination: &Pagination) -> Option<String> {
        if !pagination.has_pages() {
            return None;
        }

        match self {
            EnrichmentKind::Explain => pagination.current_page().map(str::to_string),
            EnrichmentKind::Summarize => Some(pagination.result().all_text()),
        }
    }

    pub fn compose_message(&self, source_text: &str) -> String {
        format!("{}\n\n{}", self.instruction(), source_text)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnrichmentKind::Explain => "Explain",
            EnrichmentKind::Summarize => "Summarize",
        }
    }

    /// Label for the busy state of the triggering control
    pub fn progress_label(&self) -> &'static str {
        match self {
            EnrichmentKind::Explain => "Explaining...",
            EnrichmentKind::Summarize => "Summarizing...",
        }
    }
}

/// A confirmed explain/summarize request, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRequest {
    pub kind: EnrichmentKind,
    pub language: Language,
    pub source_text: String,
}

impl EnrichmentRequest {
    pub fn language_code(&self) -> &'static str {
        self.language.code()
    }

    /// Full message body sent to the backend
    pub fn message(&self) -> String {
        self.kind.compose_message(&self.source_text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateRejection {
    #[error("no explain or summarize action is pending")]
    NoPendingAction,

    #[error("a {} request is already in progress", .0.label())]
    InFlight(EnrichmentKind),

    #[error("there is no extracted text to send")]
    NoSource,
}

/// Language prompt and single in-flight slot for explain/summarize
#[derive(Debug, Clone, Default)]
pub struct EnrichmentGate {
    pending: Option<EnrichmentKind>,
    prompt_open: bool,
    selection: Language,
    in_flight: Option<EnrichmentKind>,
}

impl EnrichmentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the action and open the language prompt. Nothing is sent yet.
    pub fn request_action(&mut self, kind: EnrichmentKind) {
        debug!(action = kind.label(), "Opening language prompt");
        self.pending = Some(kind);
        self.prompt_open = true;
    }

    /// Change the highlighted language while the prompt is open
    pub fn select_language(&mut self, language: Language) {
        self.selection = language;
    }

    /// Close the prompt and produce the request to send.
    ///
    /// Rejected without any state change while another request is in flight.
    pub fn confirm(
        &mut self,
        language: Language,
        pagination: &Pagination,
    ) -> Result<EnrichmentRequest, GateRejection> {
        if let Some(kind) = self.in_flight {
            debug!(in_flight = kind.label(), "Ignoring confirm while a request is outstanding");
            return Err(GateRejection::InFlight(kind));
        }

        let kind = self.pending.ok_or(GateRejection::NoPendingAction)?;
        let source_text = kind.source_text(pagination).ok_or(GateRejection::NoSource)?;

        self.selection = language;
        self.pending = None;
        self.prompt_open = false;
        self.in_flight = Some(kind);

        info!(
            action = kind.label(),
            language = language.name(),
            code = language.code(),
            source_chars = source_text.chars().count(),
            "Dispatching enrichment request"
        );

        Ok(EnrichmentRequest {
            kind,
            language,
            source_text,
        })
    }

    /// Close the prompt without sending anything
    pub fn cancel(&mut self) -> Option<EnrichmentKind> {
        self.prompt_open = false;
        self.pending.take()
    }

    /// Release the in-flight slot once the outstanding call has returned
    pub fn complete(&mut self) -> Option<EnrichmentKind> {
        self.in_flight.take()
    }

    /// Forget any pending action. The in-flight slot stays taken until its call returns.
    pub fn reset(&mut self) {
        self.pending = None;
        self.prompt_open = false;
    }

    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open
    }

    pub fn pending(&self) -> Option<EnrichmentKind> {
        self.pending
    }

    pub fn in_flight(&self) -> Option<EnrichmentKind> {
        self.in_flight
    }

    pub fn selection(&self) -> Language {
        self.selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::ExtractionResult;

    fn pages(raw: &[(&str, &str)]) -> Pagination {
        let mut pagination = Pagination::new();
        pagination.set_result(ExtractionResult::from_pages(raw.iter().copied()).unwrap());
        pagination
    }

    fn hindi() -> Language {
        Language::from_name("Hindi").unwrap()
    }

    #[test]
    fn test_summarize_uses_all_pages() {
        let pagination = pages(&[("1", "A"), ("2", "B")]);
        let mut gate = EnrichmentGate::new();

        gate.request_action(EnrichmentKind::Summarize);
        assert!(gate.is_prompt_open());

        let request = gate.confirm(hindi(), &pagination).unwrap();
        assert_eq!(request.source_text, "A\n\nB");
        assert_eq!(request.language_code(), "hi");
        assert_eq!(
            request.message(),
            "summarize the full data below and explain in short\n\nA\n\nB"
        );
        assert!(!gate.is_prompt_open());
        assert_eq!(gate.in_flight(), Some(EnrichmentKind::Summarize));
    }

    #[test]
    fn test_explain_uses_current_page() {
        let mut pagination = pages(&[("1", "first"), ("2", "second")]);
        pagination.next();
        let mut gate = EnrichmentGate::new();

        gate.request_action(EnrichmentKind::Explain);
        let tamil = Language::from_name("Tamil").unwrap();
        let request = gate.confirm(tamil, &pagination).unwrap();

        assert_eq!(request.source_text, "second");
        assert_eq!(request.message(), "Explain the file data below\n\nsecond");
        assert_eq!(gate.selection(), tamil);
    }

    #[test]
    fn test_confirm_rejected_while_in_flight() {
        let pagination = pages(&[("1", "A")]);
        let mut gate = EnrichmentGate::new();

        gate.request_action(EnrichmentKind::Explain);
        gate.confirm(hindi(), &pagination).unwrap();

        gate.request_action(EnrichmentKind::Summarize);
        let urdu = Language::from_name("Urdu").unwrap();
        let rejected = gate.confirm(urdu, &pagination);

        assert_eq!(rejected, Err(GateRejection::InFlight(EnrichmentKind::Explain)));
        // Nothing moved: prompt still open, action still pending, old language kept
        assert!(gate.is_prompt_open());
        assert_eq!(gate.pending(), Some(EnrichmentKind::Summarize));
        assert_eq!(gate.selection(), hindi());

        assert_eq!(gate.complete(), Some(EnrichmentKind::Explain));
        let request = gate.confirm(urdu, &pagination).unwrap();
        assert_eq!(request.kind, EnrichmentKind::Summarize);
    }

    #[test]
    fn test_cancel_discards_pending_action() {
        let pagination = pages(&[("1", "A")]);
        let mut gate = EnrichmentGate::new();

        gate.request_action(EnrichmentKind::Explain);
        assert_eq!(gate.cancel(), Some(EnrichmentKind::Explain));
        assert!(!gate.is_prompt_open());
        assert_eq!(
            gate.confirm(hindi(), &pagination),
            Err(GateRejection::NoPendingAction)
        );
        assert!(gate.in_flight().is_none());
    }

    #[test]
    fn test_selection_persists_between_actions() {
        let pagination = pages(&[("1", "A")]);
        let mut gate = EnrichmentGate::new();
        let bengali = Language::from_name("Bengali").unwrap();

        gate.request_action(EnrichmentKind::Explain);
        gate.select_language(bengali);
        gate.confirm(gate.selection(), &pagination).unwrap();
        gate.complete();

        gate.request_action(EnrichmentKind::Summarize);
        assert_eq!(gate.selection(), bengali);
    }

    #[test]
    fn test_no_source_without_pages() {
        let mut gate = EnrichmentGate::new();
        gate.request_action(EnrichmentKind::Summarize);
        assert_eq!(
            gate.confirm(hindi(), &Pagination::new()),
            Err(GateRejection::NoSource)
        );
        assert!(gate.in_flight().is_none());
    }
}
