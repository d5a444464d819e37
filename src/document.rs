// Document workflow: upload -> extract -> (explain | summarize) -> typed response.
//
// Every transition goes through DocumentSession. Background work is requested by
// returning an Effect; its completion comes back stamped with the epoch that was
// current when it started, and anything from an older epoch is ignored.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{Effect, PageDirection};
use crate::client::UploadFile;
use crate::enrichment::{EnrichmentGate, EnrichmentKind, GateRejection};
use crate::error::ScholarResult;
use crate::language::Language;
use crate::pagination::{ExtractionResult, Pagination};
use crate::typewriter::{SurfaceId, TickOutcome, Typewriter, TypingToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPhase {
    Idle,
    Uploading,
    Extracted,
    AwaitingLanguage,
    Enriching,
    Presenting,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentRejection {
    #[error("not allowed while {0:?}")]
    WrongPhase(DocumentPhase),

    #[error("no file selected")]
    NoFile,

    #[error(transparent)]
    Gate(#[from] GateRejection),
}

/// Response panel contents
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub kind: EnrichmentKind,
    pub content: String,
    pub displayed: String,
}

#[derive(Debug)]
pub struct DocumentSession {
    phase: DocumentPhase,
    file: Option<UploadFile>,
    pagination: Pagination,
    gate: EnrichmentGate,
    typewriter: Typewriter,
    popup: Option<Popup>,
    epoch: u64,
    error: Option<String>,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSession {
    pub fn new() -> Self {
        Self {
            phase: DocumentPhase::Idle,
            file: None,
            pagination: Pagination::new(),
            gate: EnrichmentGate::new(),
            typewriter: Typewriter::new(),
            popup: None,
            epoch: 0,
            error: None,
        }
    }

    /// Pick the document to work on. Anything from the previous document is discarded,
    /// even when the new file is rejected, so the returned effects must always be run.
    pub fn select_file(&mut self, file: UploadFile) -> Vec<Effect> {
        if self.phase == DocumentPhase::Uploading {
            debug!("Ignoring file selection during extraction");
            return Vec::new();
        }

        let effects = self.clear_files();
        match file.validate_format() {
            Ok(()) => {
                info!(file = %file.name, size = %file.size_label(), "Document selected");
                self.file = Some(file);
            }
            Err(e) => {
                debug!(file = %file.name, error = %e, "File rejected");
                self.error = Some(e.user_message());
            }
        }
        effects
    }

    /// Send the selected file for OCR
    pub fn start_extraction(&mut self) -> Result<Effect, DocumentRejection> {
        if self.phase != DocumentPhase::Idle {
            return Err(DocumentRejection::WrongPhase(self.phase));
        }
        let file = self.file.clone().ok_or(DocumentRejection::NoFile)?;

        self.epoch += 1;
        self.phase = DocumentPhase::Uploading;
        self.error = None;
        self.pagination.clear();

        Ok(Effect::Extract {
            epoch: self.epoch,
            file,
        })
    }

    /// Select a file and immediately extract it. A rejected file only clears.
    pub fn upload(&mut self, file: UploadFile) -> Vec<Effect> {
        let mut effects = self.select_file(file);
        match self.start_extraction() {
            Ok(extract) => effects.push(extract),
            Err(rejection) => debug!(%rejection, "Upload did not start extraction"),
        }
        effects
    }

    pub fn on_extraction_finished(&mut self, epoch: u64, result: ScholarResult<ExtractionResult>) {
        if epoch != self.epoch || self.phase != DocumentPhase::Uploading {
            debug!(epoch, current = self.epoch, "Dropping stale extraction result");
            return;
        }

        match result {
            Ok(result) if result.is_empty() => {
                self.phase = DocumentPhase::Idle;
                self.error = Some("No text could be extracted from this document".to_string());
            }
            Ok(result) => {
                info!(pages = result.len(), "Extraction installed");
                self.pagination.set_result(result);
                self.phase = DocumentPhase::Extracted;
            }
            Err(e) => {
                crate::log_error!(e, "extraction");
                self.pagination.clear();
                self.phase = DocumentPhase::Idle;
                self.error = Some(e.user_message());
            }
        }
    }

    pub fn navigate(&mut self, direction: &PageDirection) -> bool {
        if self.phase == DocumentPhase::Uploading {
            return false;
        }

        match direction {
            PageDirection::Next => self.pagination.next(),
            PageDirection::Previous => self.pagination.previous(),
            PageDirection::Jump(key) => self.pagination.jump_to(key),
        }
    }

    /// Open the language prompt for explain/summarize
    pub fn request_action(&mut self, kind: EnrichmentKind) -> Result<(), DocumentRejection> {
        if self.phase != DocumentPhase::Extracted {
            return Err(DocumentRejection::WrongPhase(self.phase));
        }

        self.gate.request_action(kind);
        self.phase = DocumentPhase::AwaitingLanguage;
        Ok(())
    }

    pub fn select_language(&mut self, language: Language) {
        self.gate.select_language(language);
    }

    /// Confirm the highlighted language
    pub fn confirm_language(&mut self) -> Result<Effect, DocumentRejection> {
        self.confirm(self.gate.selection())
    }

    /// Confirm `language` and dispatch the pending action.
    ///
    /// While an earlier request is still outstanding this is rejected and nothing changes.
    pub fn confirm(&mut self, language: Language) -> Result<Effect, DocumentRejection> {
        if self.phase != DocumentPhase::AwaitingLanguage {
            return Err(DocumentRejection::WrongPhase(self.phase));
        }

        let request = self.gate.confirm(language, &self.pagination)?;
        self.phase = DocumentPhase::Enriching;
        self.error = None;

        Ok(Effect::Enrich {
            epoch: self.epoch,
            request,
        })
    }

    pub fn cancel_language(&mut self) {
        if self.phase == DocumentPhase::AwaitingLanguage {
            self.gate.cancel();
            self.phase = DocumentPhase::Extracted;
        }
    }

    pub fn on_enrichment_finished(&mut self, epoch: u64, result: ScholarResult<String>) -> Vec<Effect> {
        // The call has returned either way, so the slot is free again
        let kind = self.gate.complete();

        let kind = match kind {
            Some(kind) if epoch == self.epoch && self.phase == DocumentPhase::Enriching => kind,
            _ => {
                debug!(epoch, current = self.epoch, "Dropping stale enrichment result");
                return Vec::new();
            }
        };

        match result {
            Ok(text) => {
                let token = self.typewriter.start(SurfaceId::Popup, text.clone());
                let ticks = self.typewriter.remaining_ticks(SurfaceId::Popup);
                self.popup = Some(Popup {
                    kind,
                    content: text,
                    displayed: String::new(),
                });
                self.phase = DocumentPhase::Presenting;
                vec![Effect::StartTyping { token, ticks }]
            }
            Err(e) => {
                crate::log_error!(e, kind.label());
                self.error = Some(e.user_message());
                self.phase = DocumentPhase::Extracted;
                Vec::new()
            }
        }
    }

    pub fn apply_tick(&mut self, token: TypingToken) -> TickOutcome {
        if token.surface != SurfaceId::Popup {
            return TickOutcome::Stale;
        }

        let outcome = self.typewriter.tick(token);
        if let (TickOutcome::Advanced { visible } | TickOutcome::Completed { visible }, Some(popup)) =
            (&outcome, self.popup.as_mut())
        {
            popup.displayed = visible.clone();
        }
        outcome
    }

    pub fn close_popup(&mut self) -> Vec<Effect> {
        if self.phase != DocumentPhase::Presenting {
            return Vec::new();
        }

        self.typewriter.cancel(SurfaceId::Popup);
        self.popup = None;
        self.phase = DocumentPhase::Extracted;
        vec![Effect::StopTyping(SurfaceId::Popup)]
    }

    /// Back to the start. Results still on their way are dropped when they land.
    pub fn clear_files(&mut self) -> Vec<Effect> {
        if self.phase != DocumentPhase::Idle || self.file.is_some() {
            info!(phase = ?self.phase, "Clearing document state");
        }
        if self.gate.in_flight().is_some() {
            warn!("Clearing while an enrichment request is outstanding; its result will be discarded");
        }

        self.epoch += 1;
        self.phase = DocumentPhase::Idle;
        self.file = None;
        self.pagination.clear();
        self.gate.reset();
        self.typewriter.cancel_all();
        self.popup = None;
        self.error = None;

        vec![Effect::StopTyping(SurfaceId::Popup)]
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn phase(&self) -> DocumentPhase {
        self.phase
    }

    pub fn file(&self) -> Option<&UploadFile> {
        self.file.as_ref()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn gate(&self) -> &EnrichmentGate {
        &self.gate
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_typing(&self) -> bool {
        self.typewriter.is_active(SurfaceId::Popup)
    }

    /// Waiting on the network, including a result that will be discarded
    pub fn is_busy(&self) -> bool {
        self.phase == DocumentPhase::Uploading || self.gate.in_flight().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentRequest;
    use crate::error::ScholarError;

    fn pdf() -> UploadFile {
        UploadFile::new("notes.pdf", b"%PDF".to_vec())
    }

    fn extracted(pages: &[(&str, &str)]) -> DocumentSession {
        let mut session = DocumentSession::new();
        let effects = session.upload(pdf());
        let epoch = match effects.last() {
            Some(Effect::Extract { epoch, .. }) => *epoch,
            other => panic!("expected extraction effect, got {:?}", other),
        };
        assert_eq!(session.phase(), DocumentPhase::Uploading);

        session.on_extraction_finished(epoch, ExtractionResult::from_pages(pages.iter().copied()));
        session
    }

    fn enrich_effect(effect: Effect) -> (u64, EnrichmentRequest) {
        match effect {
            Effect::Enrich { epoch, request } => (epoch, request),
            other => panic!("expected enrichment effect, got {:?}", other),
        }
    }

    fn start_typing(effects: &[Effect]) -> TypingToken {
        match effects {
            [Effect::StartTyping { token, .. }] => *token,
            other => panic!("expected typing to start, got {:?}", other),
        }
    }

    #[test]
    fn test_extraction_scenario() {
        let mut session = extracted(&[("1", "Hello"), ("2", "World")]);
        assert_eq!(session.phase(), DocumentPhase::Extracted);
        assert_eq!(session.pagination().cursor().unwrap().key, "1");
        assert_eq!(session.pagination().current_text(), "Hello");

        assert!(session.navigate(&PageDirection::Next));
        assert_eq!(session.pagination().current_text(), "World");
        assert!(!session.navigate(&PageDirection::Next));
        assert_eq!(session.pagination().current_text(), "World");
    }

    #[test]
    fn test_extraction_failure_returns_to_idle() {
        let mut session = DocumentSession::new();
        let effects = session.upload(pdf());
        let epoch = session.epoch();
        assert!(matches!(effects.last(), Some(Effect::Extract { .. })));

        session.on_extraction_finished(epoch, Err(ScholarError::extraction("Bad Gateway")));
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert!(!session.pagination().has_pages());
        assert_eq!(session.error(), Some("OCR failed: Bad Gateway"));
        // The file stays selected so the user can retry
        assert!(session.file().is_some());
    }

    #[test]
    fn test_unsupported_file_is_rejected() {
        let mut session = DocumentSession::new();
        let effects = session.select_file(UploadFile::new("notes.txt", vec![]));
        assert_eq!(effects, vec![Effect::StopTyping(SurfaceId::Popup)]);
        assert!(session.file().is_none());
        assert!(session.error().unwrap().starts_with("Unsupported format: txt"));
        assert_eq!(session.start_extraction(), Err(DocumentRejection::NoFile));
    }

    #[test]
    fn test_unsupported_file_still_stops_popup_typing() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        let (epoch, _) = enrich_effect(session.confirm_language().unwrap());
        let token = start_typing(&session.on_enrichment_finished(epoch, Ok("answer".into())));
        session.apply_tick(token);

        let effects = session.upload(UploadFile::new("notes.txt", vec![]));
        assert_eq!(effects, vec![Effect::StopTyping(SurfaceId::Popup)]);
        assert!(!session.is_typing());
        assert!(session.popup().is_none());
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert_eq!(session.apply_tick(token), TickOutcome::Stale);
    }

    #[test]
    fn test_summarize_scenario() {
        let mut session = extracted(&[("1", "A"), ("2", "B")]);

        session.request_action(EnrichmentKind::Summarize).unwrap();
        assert_eq!(session.phase(), DocumentPhase::AwaitingLanguage);

        let effect = session.confirm(Language::from_name("Hindi").unwrap()).unwrap();
        let (_, request) = enrich_effect(effect);
        assert_eq!(request.kind, EnrichmentKind::Summarize);
        assert_eq!(request.source_text, "A\n\nB");
        assert_eq!(request.language_code(), "hi");
        assert_eq!(session.phase(), DocumentPhase::Enriching);
    }

    #[test]
    fn test_enrichment_success_types_into_popup() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        let (epoch, _) = enrich_effect(session.confirm_language().unwrap());

        let effects = session.on_enrichment_finished(epoch, Ok("Done".to_string()));
        let token = start_typing(&effects);
        assert_eq!(session.phase(), DocumentPhase::Presenting);
        assert_eq!(session.popup().unwrap().displayed, "");

        while let TickOutcome::Advanced { .. } = session.apply_tick(token) {}
        let popup = session.popup().unwrap();
        assert_eq!(popup.displayed, "Done");
        assert_eq!(popup.kind, EnrichmentKind::Explain);
        assert!(!session.is_typing());

        session.close_popup();
        assert_eq!(session.phase(), DocumentPhase::Extracted);
        assert!(session.popup().is_none());
    }

    #[test]
    fn test_enrichment_failure_returns_to_extracted() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        let (epoch, _) = enrich_effect(session.confirm_language().unwrap());

        let effects =
            session.on_enrichment_finished(epoch, Err(ScholarError::enrichment(500, "boom")));
        assert!(effects.is_empty());
        assert_eq!(session.phase(), DocumentPhase::Extracted);
        assert!(!session.gate().is_prompt_open());
        assert!(session.error().unwrap().contains("500"));
        assert!(session.popup().is_none());
    }

    #[test]
    fn test_cancel_language_dispatches_nothing() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        session.cancel_language();
        assert_eq!(session.phase(), DocumentPhase::Extracted);
        assert!(session.gate().pending().is_none());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_clear_during_enrichment_drops_result() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Summarize).unwrap();
        let (epoch, _) = enrich_effect(session.confirm_language().unwrap());

        session.clear_files();
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert!(session.is_busy());

        let effects = session.on_enrichment_finished(epoch, Ok("late".to_string()));
        assert!(effects.is_empty());
        assert!(session.popup().is_none());
        assert!(!session.is_typing());
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_confirm_while_stale_request_outstanding_is_ignored() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        let (old_epoch, _) = enrich_effect(session.confirm_language().unwrap());

        // New document while the old call is still running
        session.clear_files();
        let effects = session.upload(pdf());
        let Some(Effect::Extract { epoch, .. }) = effects.last() else {
            panic!("expected extraction");
        };
        session.on_extraction_finished(*epoch, ExtractionResult::from_pages([("1", "B")]));
        session.request_action(EnrichmentKind::Explain).unwrap();

        let rejected = session.confirm_language();
        assert_eq!(
            rejected,
            Err(DocumentRejection::Gate(GateRejection::InFlight(EnrichmentKind::Explain)))
        );
        assert_eq!(session.phase(), DocumentPhase::AwaitingLanguage);
        assert!(session.gate().is_prompt_open());

        // Once the old call lands (and is dropped), confirming works
        session.on_enrichment_finished(old_epoch, Ok("stale".to_string()));
        assert!(session.popup().is_none());
        let (_, request) = enrich_effect(session.confirm_language().unwrap());
        assert_eq!(request.source_text, "B");
    }

    #[test]
    fn test_stale_extraction_is_dropped() {
        let mut session = DocumentSession::new();
        session.upload(pdf());
        let old_epoch = session.epoch();

        session.clear_files();
        session.on_extraction_finished(old_epoch, ExtractionResult::from_pages([("1", "old")]));
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert!(!session.pagination().has_pages());
    }

    #[test]
    fn test_close_popup_cancels_typing() {
        let mut session = extracted(&[("1", "A")]);
        session.request_action(EnrichmentKind::Explain).unwrap();
        let (epoch, _) = enrich_effect(session.confirm_language().unwrap());
        let token = start_typing(&session.on_enrichment_finished(epoch, Ok("long answer".into())));
        session.apply_tick(token);

        let effects = session.close_popup();
        assert_eq!(effects, vec![Effect::StopTyping(SurfaceId::Popup)]);
        assert_eq!(session.apply_tick(token), TickOutcome::Stale);
        assert!(session.popup().is_none());
    }

    #[test]
    fn test_actions_require_extracted_state() {
        let mut session = DocumentSession::new();
        assert_eq!(
            session.request_action(EnrichmentKind::Explain),
            Err(DocumentRejection::WrongPhase(DocumentPhase::Idle))
        );
        assert_eq!(
            session.confirm_language(),
            Err(DocumentRejection::WrongPhase(DocumentPhase::Idle))
        );
    }

    #[test]
    fn test_empty_extraction_reports_no_text() {
        let mut session = extracted(&[]);
        assert_eq!(session.phase(), DocumentPhase::Idle);
        assert!(session.error().is_some());
    }
}
