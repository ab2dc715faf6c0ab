pub mod cli;
pub mod decoder;
pub mod error;
pub mod store;
pub mod sync;
pub mod transport;

use colored::*;
use reqwest::Client;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use decoder::{StreamDecoder, StreamEvent};
pub use error::ChatError;
pub use store::{PlaceholderKind, PlaceholderStore};
pub use sync::{Composer, PreviewItem};
pub use transport::{ErrorDetail, GenerateRequest};

// ---------------------------------------------------------------------------
// Session state machine
// ---------------------------------------------------------------------------

/// Lifecycle of one exchange. `Failed` still accepts the next submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

/// One rendered message in the transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

/// Events the excluded UI layer consumes. Sent over the session's channel
/// when one is attached; otherwise the session prints to the terminal.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A user message was accepted for sending.
    UserMessage(String),
    /// A streamed content fragment was appended to the bot message.
    BotDelta(String),
    /// The image-reference mapping was replaced (reserved metadata).
    Mapping(serde_json::Map<String, serde_json::Value>),
    /// The exchange failed; the text is already in the transcript.
    BotError(String),
    /// The exchange is over, composer state has been reset.
    ExchangeComplete,
}

/// Outcome of a submit attempt. `Busy` is the re-entrancy guard: a second
/// submit while an exchange is in flight makes zero transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Accepted(GenerateRequest),
    Busy,
}

// ---------------------------------------------------------------------------
// ChatSession: one send/receive exchange at a time
// ---------------------------------------------------------------------------

/// Orchestrates message submission, stream consumption, error surfacing, and
/// the unconditional post-exchange reset of the composer. Single-actor: the
/// re-entrancy guard is the only concurrency control needed.
pub struct ChatSession {
    client: Client,
    endpoint: String,
    state: SessionState,
    pub composer: Composer,
    transcript: Vec<TranscriptEntry>,
    image_mapping: serde_json::Map<String, serde_json::Value>,
    cancel: CancellationToken,
    /// When set, UI events are sent here instead of printed to stdout.
    pub ui_tx: Option<mpsc::UnboundedSender<UiEvent>>,
}

impl ChatSession {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ChatSession {
            client: Client::new(),
            endpoint: endpoint.into(),
            state: SessionState::Idle,
            composer: Composer::new(),
            transcript: Vec::new(),
            image_mapping: serde_json::Map::new(),
            cancel: CancellationToken::new(),
            ui_tx: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// The last `mapping` event of the current/previous exchange,
    /// last-write-wins. Forwarded metadata; nothing in the core renders it.
    pub fn image_mapping(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.image_mapping
    }

    /// Handle for cancelling the in-flight exchange from outside. A fresh
    /// token is issued after every exchange, so grab it per send.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Sending | SessionState::Streaming)
    }

    fn emit(&self, event: UiEvent) {
        if let Some(tx) = &self.ui_tx {
            let _ = tx.send(event);
        }
    }

    // -----------------------------------------------------------------------
    // FSM transitions (UI-free, unit-testable without a network)
    // -----------------------------------------------------------------------

    /// Validate and accept a submit action. Whitespace-only text is rejected
    /// with [`ChatError::EmptyMessage`] and no state change; a submit while
    /// an exchange is in flight returns [`Submission::Busy`]. On acceptance
    /// the user entry lands in the transcript, the input is cleared, and the
    /// request body is returned with the placeholder tokens sent literally.
    pub fn begin_exchange(&mut self) -> Result<Submission, ChatError> {
        if self.is_busy() {
            tracing::debug!("submit ignored, exchange already in flight");
            return Ok(Submission::Busy);
        }

        let message = self.composer.text().trim().to_string();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.transcript.push(TranscriptEntry {
            role: Role::User,
            text: message.clone(),
        });
        self.emit(UiEvent::UserMessage(message.clone()));
        self.composer.set_text(String::new());
        self.image_mapping.clear();
        self.state = SessionState::Sending;
        Ok(Submission::Accepted(GenerateRequest { steps: message }))
    }

    /// Response headers arrived: open the in-progress bot message.
    pub fn mark_streaming(&mut self) {
        self.state = SessionState::Streaming;
        self.transcript.push(TranscriptEntry {
            role: Role::Bot,
            text: String::new(),
        });
    }

    /// Apply one decoded event to the live transcript. `content` appends to
    /// the in-progress bot message; `mapping` replaces the held mapping
    /// wholesale; `error` aborts the stream (partial content is kept).
    pub fn apply_event(&mut self, event: StreamEvent) -> Result<(), ChatError> {
        if let Some(mapping) = event.mapping {
            self.emit(UiEvent::Mapping(mapping.clone()));
            self.image_mapping = mapping;
        }
        if let Some(content) = event.content {
            match self.transcript.last_mut() {
                Some(entry) if entry.role == Role::Bot => entry.text.push_str(&content),
                _ => self.transcript.push(TranscriptEntry {
                    role: Role::Bot,
                    text: content.clone(),
                }),
            }
            if self.ui_tx.is_some() {
                self.emit(UiEvent::BotDelta(content));
            } else {
                print!("{}", content);
                let _ = io::stdout().flush();
            }
        }
        if let Some(error) = event.error {
            return Err(ChatError::Stream(error));
        }
        Ok(())
    }

    /// Terminal per-exchange step: convert any failure into a single
    /// transcript error entry, re-enable submission, and unconditionally
    /// reset the composer (map, counters, buffer) whatever the outcome.
    pub fn finish_exchange(&mut self, outcome: Result<(), ChatError>) {
        match outcome {
            Ok(()) => self.state = SessionState::Idle,
            Err(err) => {
                let message = err.transcript_message();
                self.transcript.push(TranscriptEntry {
                    role: Role::Bot,
                    text: message.clone(),
                });
                if self.ui_tx.is_some() {
                    self.emit(UiEvent::BotError(message));
                } else {
                    eprintln!("{}", message.bright_red());
                }
                self.state = SessionState::Failed;
            }
        }
        self.composer.reset();
        self.cancel = CancellationToken::new();
        self.emit(UiEvent::ExchangeComplete);
    }

    // -----------------------------------------------------------------------
    // Async driver
    // -----------------------------------------------------------------------

    /// Run one full exchange against the server. Exchange failures are
    /// caught here and rendered into the transcript; only the local
    /// validation error propagates to the caller.
    pub async fn send(&mut self) -> Result<(), ChatError> {
        let request = match self.begin_exchange()? {
            Submission::Accepted(request) => request,
            Submission::Busy => return Ok(()),
        };
        let outcome = self.run_exchange(&request).await;
        self.finish_exchange(outcome);
        Ok(())
    }

    async fn run_exchange(&mut self, request: &GenerateRequest) -> Result<(), ChatError> {
        let exchange_id = Uuid::new_v4();
        tracing::info!(%exchange_id, endpoint = %self.endpoint, "submitting message");

        let cancel = self.cancel.clone();
        let response = tokio::select! {
            response = self.client.post(&self.endpoint).json(request).send() => response?,
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
        };

        if !response.status().is_success() {
            let status = response.status();
            let detail: ErrorDetail = response.json().await.unwrap_or_default();
            tracing::warn!(%exchange_id, %status, "transport failure");
            return Err(ChatError::Transport(detail.message()));
        }

        self.mark_streaming();
        let mut decoder = StreamDecoder::new();
        let mut stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            };
            let Some(chunk) = chunk else { break };
            let (events, status) = decoder.feed(&chunk?);
            // Well-formed frames render even when a later frame in the same
            // chunk is fatal.
            for event in events {
                self.apply_event(event)?;
            }
            status?;
        }

        let discarded = decoder.finish();
        if discarded > 0 {
            tracing::debug!(%exchange_id, discarded, "stream ended inside a frame");
        }
        tracing::info!(%exchange_id, "exchange complete");
        Ok(())
    }
}
