//! Incremental rendering of finished text, one character per tick.
//!
//! [`Typewriter`] is plain state: it never sleeps. A separate ticker task
//! ([`spawn_ticker`]) produces [`TypingToken`]s on a fixed cadence and the owner
//! feeds them back through [`Typewriter::tick`]. Every session on a surface gets a
//! fresh generation stamp, so ticks from a superseded or cancelled session are
//! recognised and ignored no matter when they arrive.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::chat::MessageId;

/// A display target that hosts at most one typing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    /// Response panel of the document workflow
    Popup,
    /// One assistant message in the chat transcript
    Transcript(MessageId),
}

/// Identifies one typing session on one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingToken {
    pub surface: SurfaceId,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Token belongs to a superseded, cancelled or finished session
    Stale,
    /// One more character is visible
    Advanced { visible: String },
    /// The full text is visible; reported once per session
    Completed { visible: String },
}

#[derive(Debug)]
struct TypingSession {
    generation: u64,
    text: String,
    // byte offset after each character, so a cursor maps to a slice without rescanning
    boundaries: Vec<usize>,
    cursor: usize,
}

impl TypingSession {
    fn new(generation: u64, text: String) -> Self {
        let boundaries = text
            .char_indices()
            .map(|(offset, c)| offset + c.len_utf8())
            .collect();

        Self {
            generation,
            text,
            boundaries,
            cursor: 0,
        }
    }

    fn visible(&self) -> &str {
        match self.cursor {
            0 => "",
            n => &self.text[..self.boundaries[n - 1]],
        }
    }

    fn total_chars(&self) -> usize {
        self.boundaries.len()
    }
}

#[derive(Debug, Default)]
pub struct Typewriter {
    next_generation: u64,
    sessions: HashMap<SurfaceId, TypingSession>,
}

impl Typewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing `text` on `surface`, superseding whatever was typing there.
    ///
    /// The surface's visible buffer starts empty.
    pub fn start(&mut self, surface: SurfaceId, text: impl Into<String>) -> TypingToken {
        self.next_generation += 1;
        let generation = self.next_generation;
        let session = TypingSession::new(generation, text.into());

        debug!(
            ?surface,
            generation,
            chars = session.total_chars(),
            "Typing session started"
        );

        if let Some(previous) = self.sessions.insert(surface, session) {
            debug!(?surface, superseded = previous.generation, "Superseded typing session");
        }

        TypingToken {
            surface,
            generation,
        }
    }

    /// Apply one tick. Only the current session of the token's surface advances.
    pub fn tick(&mut self, token: TypingToken) -> TickOutcome {
        let Some(session) = self.sessions.get_mut(&token.surface) else {
            return TickOutcome::Stale;
        };

        if session.generation != token.generation {
            trace!(?token, current = session.generation, "Dropping stale tick");
            return TickOutcome::Stale;
        }

        if session.cursor < session.total_chars() {
            session.cursor += 1;
        }

        let visible = session.visible().to_string();
        if session.cursor == session.total_chars() {
            self.sessions.remove(&token.surface);
            debug!(?token, "Typing session completed");
            TickOutcome::Completed { visible }
        } else {
            TickOutcome::Advanced { visible }
        }
    }

    /// Stop typing on `surface`, returning what was visible at that moment
    pub fn cancel(&mut self, surface: SurfaceId) -> Option<String> {
        self.sessions.remove(&surface).map(|session| {
            debug!(?surface, generation = session.generation, "Typing session cancelled");
            session.visible().to_string()
        })
    }

    /// Stop typing on `surface` and return the full text, as if it had completed
    pub fn finish(&mut self, surface: SurfaceId) -> Option<String> {
        self.sessions.remove(&surface).map(|session| session.text)
    }

    /// Stop every session
    pub fn cancel_all(&mut self) {
        self.sessions.clear();
    }

    pub fn is_active(&self, surface: SurfaceId) -> bool {
        self.sessions.contains_key(&surface)
    }

    pub fn visible(&self, surface: SurfaceId) -> Option<&str> {
        self.sessions.get(&surface).map(TypingSession::visible)
    }

    /// Ticks needed to complete the current session of `surface`.
    /// An empty text still needs one tick to report completion.
    pub fn remaining_ticks(&self, surface: SurfaceId) -> usize {
        self.sessions
            .get(&surface)
            .map(|session| (session.total_chars() - session.cursor).max(1))
            .unwrap_or(0)
    }
}

/// Drive a typing session: send `ticks` tick actions, one per `period`.
///
/// The task ends early if the receiving side is gone. Staleness is decided by the
/// receiver, so an aborted or late ticker can never corrupt a newer session.
pub fn spawn_ticker<A>(
    token: TypingToken,
    ticks: usize,
    period: Duration,
    tx: UnboundedSender<A>,
    wrap: fn(TypingToken) -> A,
) -> JoinHandle<()>
where
    A: Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick so the first character lands one period later
        timer.tick().await;

        for _ in 0..ticks {
            timer.tick().await;
            if tx.send(wrap(token)).is_err() {
                break;
            }
        }
    })
}
