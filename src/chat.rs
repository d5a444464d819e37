// Chat workflow: optimistic user turns, typed assistant replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::actions::Effect;
use crate::markdown::{self, InlineSpan};
use crate::typewriter::{SurfaceId, TickOutcome, Typewriter, TypingToken};

/// Longest prompt the composer accepts, in characters
pub const MAX_PROMPT_LENGTH: usize = 2000;

pub const EXAMPLE_PROMPTS: &[&str] = &[
    "What are the latest programming trends?",
    "Help me understand AI and machine learning",
    "How do I optimize my code for performance?",
];

/// Stable identity of a transcript message, assigned when it is appended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// Identifies one outstanding chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Content split into styled runs for display
    pub fn spans(&self) -> Vec<InlineSpan> {
        markdown::inline_spans(&self.content)
    }
}

/// Append-only list of messages
#[derive(Debug, Clone, Default)]
pub struct ChatTranscript {
    messages: Vec<Message>,
    next_id: u64,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its identity
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    /// Replace the content of one message, located by identity rather than position
    fn set_content(&mut self, id: MessageId, content: String) -> bool {
        match self.messages.iter_mut().rev().find(|m| m.id == id) {
            Some(message) => {
                message.content = content;
                true
            }
            None => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    fn clear(&mut self) {
        // Ids keep counting up so an id is never reused within a session
        self.messages.clear();
    }
}

/// Prompt input with the length limit applied
#[derive(Debug, Clone, Default)]
pub struct Composer {
    input: String,
}

impl Composer {
    /// Replace the input. Edits past [`MAX_PROMPT_LENGTH`] are refused.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.chars().count() > MAX_PROMPT_LENGTH {
            return false;
        }
        self.input = text;
        true
    }

    pub fn text(&self) -> &str {
        &self.input
    }

    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty()
    }

    /// "12 / 2000"
    pub fn counter(&self) -> String {
        format!("{} / {}", self.input.chars().count(), MAX_PROMPT_LENGTH)
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Sending,
    AwaitingReply,
    Rendering,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatRejection {
    #[error("type a message first")]
    EmptyPrompt,

    #[error("still waiting for the previous reply")]
    ReplyPending,

    #[error("no example prompt #{0}")]
    UnknownExample(usize),
}

#[derive(Debug)]
pub struct ChatSession {
    transcript: ChatTranscript,
    composer: Composer,
    phase: ChatPhase,
    typewriter: Typewriter,
    pending: Option<ChatTicket>,
    next_ticket: u64,
    typing_slot: Option<MessageId>,
    notice: Option<String>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: ChatTranscript::new(),
            composer: Composer::default(),
            phase: ChatPhase::Idle,
            typewriter: Typewriter::new(),
            pending: None,
            next_ticket: 0,
            typing_slot: None,
            notice: None,
        }
    }

    /// Replace the composer text. Over-length edits are refused and leave it unchanged.
    pub fn update_composer(&mut self, text: impl Into<String>) -> bool {
        let accepted = self.composer.set(text);
        if accepted {
            self.notice = None;
        }
        accepted
    }

    pub fn use_example(&mut self, index: usize) -> Result<(), ChatRejection> {
        let prompt = EXAMPLE_PROMPTS
            .get(index)
            .ok_or(ChatRejection::UnknownExample(index))?;
        self.composer.set(*prompt);
        self.notice = None;
        Ok(())
    }

    /// Append the user's message, clear the composer and hand back the request to send.
    ///
    /// Submissions are serialized: only one reply may be outstanding.
    pub fn submit(&mut self) -> Result<Effect, ChatRejection> {
        if matches!(self.phase, ChatPhase::Sending | ChatPhase::AwaitingReply) {
            return Err(ChatRejection::ReplyPending);
        }
        if !self.composer.can_submit() {
            return Err(ChatRejection::EmptyPrompt);
        }

        let message = self.composer.take();
        let id = self.transcript.append(Role::User, message.clone());

        self.next_ticket += 1;
        let ticket = ChatTicket(self.next_ticket);
        self.pending = Some(ticket);
        self.phase = ChatPhase::Sending;
        self.notice = None;

        info!(message_id = id.0, ticket = ticket.0, chars = message.chars().count(), "Chat message submitted");
        Ok(Effect::SendChat { ticket, message })
    }

    /// The request for `ticket` has left; wait for its reply
    pub fn request_sent(&mut self, ticket: ChatTicket) {
        if self.pending == Some(ticket) && self.phase == ChatPhase::Sending {
            self.phase = ChatPhase::AwaitingReply;
        }
    }

    /// A reply (or error text) arrived: append an empty assistant message and type into it.
    pub fn receive_reply(&mut self, ticket: ChatTicket, reply: String) -> Vec<Effect> {
        if self.pending != Some(ticket) {
            debug!(ticket = ticket.0, "Dropping reply for a request that is no longer pending");
            return Vec::new();
        }
        self.pending = None;

        let mut effects = Vec::new();

        // Only the newest assistant message may be typing
        if let Some(previous) = self.typing_slot.take() {
            let surface = SurfaceId::Transcript(previous);
            if let Some(full) = self.typewriter.finish(surface) {
                self.transcript.set_content(previous, full);
            }
            effects.push(Effect::StopTyping(surface));
        }

        let slot = self.transcript.append(Role::Assistant, String::new());
        let surface = SurfaceId::Transcript(slot);
        let token = self.typewriter.start(surface, reply);
        let ticks = self.typewriter.remaining_ticks(surface);

        self.typing_slot = Some(slot);
        self.phase = ChatPhase::Rendering;

        effects.push(Effect::StartTyping { token, ticks });
        effects
    }

    /// Apply one typing tick to the transcript slot the token targets
    pub fn apply_tick(&mut self, token: TypingToken) -> TickOutcome {
        let SurfaceId::Transcript(slot) = token.surface else {
            return TickOutcome::Stale;
        };

        let outcome = self.typewriter.tick(token);
        match &outcome {
            TickOutcome::Advanced { visible } => {
                self.transcript.set_content(slot, visible.clone());
            }
            TickOutcome::Completed { visible } => {
                self.transcript.set_content(slot, visible.clone());
                if self.typing_slot == Some(slot) {
                    self.typing_slot = None;
                }
                if self.phase == ChatPhase::Rendering {
                    self.phase = ChatPhase::Idle;
                }
            }
            TickOutcome::Stale => {}
        }
        outcome
    }

    /// Drop the conversation. A reply still on its way is discarded when it lands.
    pub fn clear(&mut self) -> Vec<Effect> {
        let effects = self
            .typing_slot
            .take()
            .map(|slot| vec![Effect::StopTyping(SurfaceId::Transcript(slot))])
            .unwrap_or_default();

        self.typewriter.cancel_all();
        self.transcript.clear();
        self.pending = None;
        self.phase = ChatPhase::Idle;
        self.notice = None;
        effects
    }

    pub fn report_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn typing_slot(&self) -> Option<MessageId> {
        self.typing_slot
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_typing(&self) -> bool {
        self.typing_slot.is_some()
    }
}
