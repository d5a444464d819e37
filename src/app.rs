//! Application runtime.
//!
//! [`App`] is the single owner of document and chat state. User input and the
//! completions of background work arrive as [`Action`]s on one channel and are
//! applied strictly one at a time. Transitions hand back [`Effect`]s, which the
//! runtime turns into spawned tasks that report back through the same channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::access::{AccessContext, UserIdentity};
use crate::actions::{Action, Effect};
use crate::chat::{ChatSession, MAX_PROMPT_LENGTH};
use crate::client::ScholarBackend;
use crate::document::DocumentSession;
use crate::error::{ScholarError, ScholarResult};
use crate::typewriter::{spawn_ticker, SurfaceId, TickOutcome, TypingToken};

pub struct App {
    document: DocumentSession,
    chat: ChatSession,
    backend: Option<Arc<dyn ScholarBackend>>,
    access: AccessContext,
    tick_interval: Duration,
    tx: UnboundedSender<Action>,
    rx: UnboundedReceiver<Action>,
    tickers: HashMap<SurfaceId, (TypingToken, JoinHandle<()>)>,
    should_quit: bool,
}

impl App {
    /// Build the runtime. A backend that failed to load leaves the app usable,
    /// but every network action reports the configuration problem.
    pub fn new(
        backend: ScholarResult<Arc<dyn ScholarBackend>>,
        tick_interval: Duration,
        user: Option<UserIdentity>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut access = AccessContext::new(user);

        let backend = match backend {
            Ok(backend) => Some(backend),
            Err(e) => {
                crate::log_error!(e, "backend setup");
                access.disable_network(e.to_string());
                None
            }
        };

        Self {
            document: DocumentSession::new(),
            chat: ChatSession::new(),
            backend,
            access,
            tick_interval,
            tx,
            rx,
            tickers: HashMap::new(),
            should_quit: false,
        }
    }

    /// Handle for feeding actions from outside the runtime
    pub fn sender(&self) -> UnboundedSender<Action> {
        self.tx.clone()
    }

    pub fn dispatch(&mut self, action: Action) {
        let effects = match action {
            Action::SelectFile(file) => self.document.select_file(file),
            Action::Extract => match self.access.require_network() {
                Err(e) => {
                    self.document.report_error(e.user_message());
                    Vec::new()
                }
                Ok(()) => match self.document.start_extraction() {
                    Ok(effect) => vec![effect],
                    Err(rejection) => {
                        debug!(%rejection, "Extraction not started");
                        Vec::new()
                    }
                },
            },
            Action::ExtractionFinished { epoch, result } => {
                self.document.on_extraction_finished(epoch, result);
                Vec::new()
            }
            Action::NavigatePage(direction) => {
                self.document.navigate(&direction);
                Vec::new()
            }
            Action::RequestEnrichment(kind) => match self.access.require_user(kind.label()) {
                Err(e) => {
                    self.document.report_error(e.user_message());
                    Vec::new()
                }
                Ok(_) => {
                    if let Err(rejection) = self.document.request_action(kind) {
                        debug!(%rejection, "Enrichment not requested");
                    }
                    Vec::new()
                }
            },
            Action::SelectLanguage(language) => {
                self.document.select_language(language);
                Vec::new()
            }
            Action::ConfirmLanguage => match self.document.confirm_language() {
                Ok(effect) => vec![effect],
                Err(rejection) => {
                    debug!(%rejection, "Language confirmation ignored");
                    Vec::new()
                }
            },
            Action::CancelLanguage => {
                self.document.cancel_language();
                Vec::new()
            }
            Action::EnrichmentFinished { epoch, result } => {
                self.document.on_enrichment_finished(epoch, result)
            }
            Action::ClosePopup => self.document.close_popup(),
            Action::ClearFiles => self.document.clear_files(),

            Action::UpdateComposer(text) => {
                if !self.chat.update_composer(text) {
                    self.chat.report_notice(format!(
                        "Messages are limited to {} characters",
                        MAX_PROMPT_LENGTH
                    ));
                }
                Vec::new()
            }
            Action::UseExamplePrompt(index) => {
                if let Err(rejection) = self.chat.use_example(index) {
                    self.chat.report_notice(rejection.to_string());
                }
                Vec::new()
            }
            Action::SubmitChat => match self.access.require_user("chat") {
                Err(e) => {
                    self.chat.report_notice(e.user_message());
                    Vec::new()
                }
                Ok(_) => match self.chat.submit() {
                    Ok(effect) => vec![effect],
                    Err(rejection) => {
                        self.chat.report_notice(rejection.to_string());
                        Vec::new()
                    }
                },
            },
            Action::ChatReplyArrived { ticket, reply } => self.chat.receive_reply(ticket, reply),
            Action::ClearChat => self.chat.clear(),

            Action::Tick(token) => {
                let outcome = match token.surface {
                    SurfaceId::Popup => self.document.apply_tick(token),
                    SurfaceId::Transcript(_) => self.chat.apply_tick(token),
                };
                match outcome {
                    TickOutcome::Completed { .. } => self.forget_ticker(token),
                    TickOutcome::Stale => trace!(?token, "Stale tick"),
                    TickOutcome::Advanced { .. } => {}
                }
                Vec::new()
            }
            Action::Quit => {
                info!("Shutting down");
                self.should_quit = true;
                self.stop_all_tickers();
                Vec::new()
            }
        };

        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Extract { epoch, file } => {
                let tx = self.tx.clone();
                match self.backend.clone() {
                    Some(backend) => {
                        tokio::spawn(async move {
                            let result = backend.extract(file).await;
                            let _ = tx.send(Action::ExtractionFinished { epoch, result });
                        });
                    }
                    None => {
                        let _ = tx.send(Action::ExtractionFinished {
                            epoch,
                            result: Err(self.missing_backend()),
                        });
                    }
                }
            }
            Effect::Enrich { epoch, request } => {
                let tx = self.tx.clone();
                match self.backend.clone() {
                    Some(backend) => {
                        tokio::spawn(async move {
                            let result = backend
                                .enrich(request.kind, &request.source_text, request.language_code())
                                .await;
                            let _ = tx.send(Action::EnrichmentFinished { epoch, result });
                        });
                    }
                    None => {
                        let _ = tx.send(Action::EnrichmentFinished {
                            epoch,
                            result: Err(self.missing_backend()),
                        });
                    }
                }
            }
            Effect::SendChat { ticket, message } => {
                let tx = self.tx.clone();
                match self.backend.clone() {
                    Some(backend) => {
                        tokio::spawn(async move {
                            let reply = backend.chat_reply(&message).await;
                            let _ = tx.send(Action::ChatReplyArrived { ticket, reply });
                        });
                    }
                    None => {
                        let reply = self.missing_backend().chat_text();
                        let _ = tx.send(Action::ChatReplyArrived { ticket, reply });
                    }
                }
                self.chat.request_sent(ticket);
            }
            Effect::StartTyping { token, ticks } => {
                self.stop_ticker(token.surface);
                let handle = spawn_ticker(token, ticks, self.tick_interval, self.tx.clone(), Action::Tick);
                self.tickers.insert(token.surface, (token, handle));
            }
            Effect::StopTyping(surface) => self.stop_ticker(surface),
        }
    }

    fn missing_backend(&self) -> ScholarError {
        ScholarError::configuration("no API configuration loaded")
    }

    fn stop_ticker(&mut self, surface: SurfaceId) {
        if let Some((_, handle)) = self.tickers.remove(&surface) {
            handle.abort();
        }
    }

    // The ticker for a completed session has already sent its last tick
    fn forget_ticker(&mut self, token: TypingToken) {
        if matches!(self.tickers.get(&token.surface), Some((current, _)) if *current == token) {
            self.tickers.remove(&token.surface);
        }
    }

    fn stop_all_tickers(&mut self) {
        for (_, (_, handle)) in self.tickers.drain() {
            handle.abort();
        }
    }

    /// Wait for the next action and apply it. Returns false once the app should stop.
    pub async fn step(&mut self) -> bool {
        if self.should_quit {
            return false;
        }
        match self.rx.recv().await {
            Some(action) => {
                self.dispatch(action);
                !self.should_quit
            }
            None => false,
        }
    }

    /// Nothing outstanding: no network call, no reply awaited, nothing typing
    pub fn is_settled(&self) -> bool {
        !self.document.is_busy()
            && !self.document.is_typing()
            && !self.chat.is_waiting()
            && !self.chat.is_typing()
    }

    /// Apply queued actions, then keep running until the app is settled
    pub async fn run_until_settled(&mut self) {
        loop {
            while let Ok(action) = self.rx.try_recv() {
                self.dispatch(action);
            }
            if self.should_quit || self.is_settled() {
                return;
            }
            if !self.step().await {
                return;
            }
        }
    }

    pub fn document(&self) -> &DocumentSession {
        &self.document
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn access(&self) -> &AccessContext {
        &self.access
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop_all_tickers();
    }
}
