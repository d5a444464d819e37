use crate::chat::ChatTicket;
use crate::client::UploadFile;
use crate::enrichment::{EnrichmentKind, EnrichmentRequest};
use crate::error::ScholarResult;
use crate::language::Language;
use crate::pagination::ExtractionResult;
use crate::typewriter::{SurfaceId, TypingToken};

/// All possible state mutations in the application.
///
/// User input and completions of background work both arrive as actions and are
/// applied one at a time by the runtime, which is the only owner of session state.
#[derive(Debug)]
pub enum Action {
    // Document actions
    SelectFile(UploadFile),
    Extract,
    ExtractionFinished {
        epoch: u64,
        result: ScholarResult<ExtractionResult>,
    },
    NavigatePage(PageDirection),
    RequestEnrichment(EnrichmentKind),
    SelectLanguage(Language),
    ConfirmLanguage,
    CancelLanguage,
    EnrichmentFinished {
        epoch: u64,
        result: ScholarResult<String>,
    },
    ClosePopup,
    ClearFiles,

    // Chat actions
    UpdateComposer(String),
    UseExamplePrompt(usize),
    SubmitChat,
    ChatReplyArrived {
        ticket: ChatTicket,
        reply: String,
    },
    ClearChat,

    // Rendering
    Tick(TypingToken),

    // System
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageDirection {
    Next,
    Previous,
    Jump(String),
}

/// Background work requested by a state transition, carried out by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Extract {
        epoch: u64,
        file: UploadFile,
    },
    Enrich {
        epoch: u64,
        request: EnrichmentRequest,
    },
    SendChat {
        ticket: ChatTicket,
        message: String,
    },
    StartTyping {
        token: TypingToken,
        ticks: usize,
    },
    StopTyping(SurfaceId),
}
