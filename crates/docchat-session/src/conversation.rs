//! Chat turns and the transcript.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use docchat_core::{defaults, ChatRequest, KnowledgeApi, Message, Prompt};

use crate::render::{render_html, render_plain, CitationFallback};
use crate::state::SessionState;

/// Result of [`Conversation::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// Another send is still in flight.
    Busy,
    /// The assistant answered.
    Replied(Message),
    /// The request failed; the message carries the error text.
    Failed(Message),
}

/// Clears the busy flag when the send finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The chat transcript and the single in-flight request guard.
pub struct Conversation {
    api: Arc<dyn KnowledgeApi>,
    state: Arc<SessionState>,
    busy: AtomicBool,
    fallback: CitationFallback,
    reseed_on_clear: bool,
}

impl Conversation {
    pub fn new(api: Arc<dyn KnowledgeApi>, state: Arc<SessionState>) -> Self {
        Self {
            api,
            state,
            busy: AtomicBool::new(false),
            fallback: CitationFallback::default(),
            reseed_on_clear: false,
        }
    }

    pub fn with_citation_fallback(mut self, fallback: CitationFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append a short assistant note after every clear.
    pub fn with_reseed_on_clear(mut self, reseed: bool) -> Self {
        self.reseed_on_clear = reseed;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Send one user turn.
    ///
    /// `model` defaults to the session's selected model. A blank
    /// `system_instruction` is not sent.
    pub async fn send_message(
        &self,
        text: &str,
        model: Option<&str>,
        system_instruction: Option<&str>,
    ) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return SendOutcome::Busy;
        }
        let _in_flight = InFlight(&self.busy);

        self.state.push_message(Message::user(text)).await;
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;
        self.state.push_message(placeholder).await;

        let model = match model {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ => self.state.selected_model().await,
        };
        let request = ChatRequest {
            message: text.to_string(),
            model,
            system_instruction: system_instruction
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };

        let start = Instant::now();
        debug!(
            subsystem = "conversation",
            model = %request.model,
            message_len = request.message.len(),
            "Sending message"
        );
        let result = self.api.chat(&request).await;
        self.state.remove_message(placeholder_id).await;

        match result {
            Ok(answer) => {
                info!(
                    subsystem = "conversation",
                    result_count = answer.citations.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Reply received"
                );
                let reply = Message::ai(answer.text).with_citations(answer.citations);
                self.state.push_message(reply.clone()).await;
                SendOutcome::Replied(reply)
            }
            Err(e) => {
                warn!(subsystem = "conversation", error = %e, "Chat request failed");
                let text = if e.is_transport() {
                    defaults::NETWORK_ERROR_MESSAGE.to_string()
                } else {
                    format!("Error: {}", e)
                };
                let reply = Message::ai(text);
                self.state.push_message(reply.clone()).await;
                SendOutcome::Failed(reply)
            }
        }
    }

    /// Empty the transcript after the user confirms.
    pub async fn clear(&self, prompt: &dyn Prompt) -> bool {
        if !prompt.confirm("Clear the conversation?") {
            return false;
        }
        self.state.clear_transcript().await;
        if self.reseed_on_clear {
            self.state
                .push_message(Message::ai(defaults::CHAT_CLEARED_MESSAGE))
                .await;
        }
        true
    }

    /// Greet after a batch upload, if nothing has been said yet.
    pub async fn welcome_after_batch(&self, uploaded: usize) -> Option<Message> {
        if uploaded == 0 {
            return None;
        }
        let message = Message::ai(format!(
            "Analysis complete! I've processed {} documents. You can select a suggested question below or ask me anything.",
            uploaded
        ));
        self.state
            .push_if_empty(message.clone())
            .await
            .then_some(message)
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.messages().await
    }

    /// Render one message as HTML against the current File Map.
    pub async fn render_html(&self, message: &Message) -> String {
        let files = self.state.file_map().await;
        render_html(message, &files, self.fallback)
    }

    /// Render one message for the terminal against the current File Map.
    pub async fn render_plain(&self, message: &Message) -> String {
        let files = self.state.file_map().await;
        render_plain(message, &files, self.fallback)
    }
}
