//! Session lifecycle and message dispatch.
//!
//! One logical conversation at a time, gated behind an explicit start/stop
//! lifecycle. Stopping is the sole data-erasure guarantee: it throws away
//! the transcript and replaces the thread id with a fresh one.

use crate::llm::{ChatCompletion, ChatMessage, LlmError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Replies longer than this many characters are delivered as a document
/// attachment instead of inline text.
pub const INLINE_REPLY_LIMIT: usize = 4000;

/// File name under which oversized replies are attached.
pub const REPLY_FILE_NAME: &str = "response.txt";

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session running; messages are rejected.
    #[default]
    Idle,
    /// Session running; messages go to the completion call.
    Active,
}

/// One logical conversation: a thread id, a state and the in-memory
/// transcript. No persistence across restarts.
#[derive(Debug, Clone)]
pub struct Session {
    thread_id: String,
    state: SessionState,
    transcript: Vec<ChatMessage>,
}

impl Session {
    /// Fresh idle session with a random thread id and empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_id: Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            transcript: Vec::new(),
        }
    }

    /// Opaque token correlating the conversation on the provider side.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The role-tagged messages accumulated so far.
    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Transitioned `Idle -> Active`.
    Started,
    /// The session was already running; nothing changed.
    AlreadyActive,
}

/// How a successful reply should reach the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Short reply, sent as one inline message.
    Inline(String),
    /// Oversized reply, sent as a file attachment.
    Document {
        /// Attachment file name.
        file_name: String,
        /// Full reply text, byte-for-byte.
        contents: String,
    },
}

/// Why a message was not answered. Converted to user-facing text at the
/// transport boundary only.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Message arrived while the session was idle.
    #[error("session is not active")]
    NotActive,
    /// The external completion call failed. Non-fatal: the session stays
    /// active and no retry is attempted.
    #[error(transparent)]
    Completion(#[from] LlmError),
}

/// Owns the single session and routes accepted messages to the completion
/// call.
pub struct SessionManager {
    completion: Arc<dyn ChatCompletion>,
    system_prompt: String,
    session: Session,
}

impl SessionManager {
    /// Manager around a fresh idle session.
    pub fn new(completion: Arc<dyn ChatCompletion>, system_prompt: String) -> Self {
        Self {
            completion,
            system_prompt,
            session: Session::new(),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Thread id of the current session.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        self.session.thread_id()
    }

    /// Transcript of the current session.
    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        self.session.transcript()
    }

    /// Activate the session, seeding the transcript with the system prompt.
    ///
    /// Calling this while already active changes nothing: the transcript is
    /// not re-seeded and the thread id is kept.
    pub fn start(&mut self) -> StartOutcome {
        if self.session.state == SessionState::Active {
            return StartOutcome::AlreadyActive;
        }
        self.session.state = SessionState::Active;
        self.session
            .transcript
            .push(ChatMessage::system(self.system_prompt.clone()));
        StartOutcome::Started
    }

    /// End the session: drop the transcript and regenerate the thread id.
    ///
    /// Safe to call from `Idle` too; the thread id is regenerated either
    /// way, matching the original bot.
    pub fn stop(&mut self) {
        self.session = Session::new();
    }

    /// Forward one user message to the completion call.
    ///
    /// On success the user and assistant messages are appended to the
    /// transcript and the reply is classified as inline or document by the
    /// [`INLINE_REPLY_LIMIT`] character threshold.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotActive`] when called from `Idle`;
    /// [`SessionError::Completion`] when the external call fails. A failed
    /// call leaves the session active and the transcript untouched.
    pub async fn handle_message(&mut self, text: &str) -> Result<Delivery, SessionError> {
        if self.session.state != SessionState::Active {
            return Err(SessionError::NotActive);
        }

        let reply = self
            .completion
            .complete(self.session.thread_id(), self.session.transcript(), text)
            .await?;

        self.session.transcript.push(ChatMessage::user(text));
        self.session
            .transcript
            .push(ChatMessage::assistant(reply.clone()));

        if reply.chars().count() > INLINE_REPLY_LIMIT {
            Ok(Delivery::Document {
                file_name: REPLY_FILE_NAME.to_string(),
                contents: reply,
            })
        } else {
            Ok(Delivery::Inline(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::testing::{completion_failing, completion_ok, completion_unreachable};

    fn manager(completion: crate::llm::MockChatCompletion) -> SessionManager {
        SessionManager::new(Arc::new(completion), "prompt".to_string())
    }

    #[test]
    fn starts_idle_with_empty_transcript() {
        let mgr = manager(completion_unreachable());
        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(mgr.transcript().is_empty());
        assert!(!mgr.thread_id().is_empty());
    }

    #[test]
    fn repeated_start_does_not_duplicate_transcript() {
        let mut mgr = manager(completion_unreachable());
        assert_eq!(mgr.start(), StartOutcome::Started);
        let thread_id = mgr.thread_id().to_string();

        for _ in 0..5 {
            assert_eq!(mgr.start(), StartOutcome::AlreadyActive);
        }

        assert_eq!(mgr.state(), SessionState::Active);
        assert_eq!(mgr.transcript().len(), 1);
        assert_eq!(mgr.transcript()[0].role, Role::System);
        assert_eq!(mgr.thread_id(), thread_id);
    }

    #[test]
    fn stop_regenerates_thread_id_and_clears_transcript() {
        let mut mgr = manager(completion_unreachable());
        mgr.start();
        let before = mgr.thread_id().to_string();

        mgr.stop();
        assert_eq!(mgr.state(), SessionState::Idle);
        assert!(mgr.transcript().is_empty());
        assert_ne!(mgr.thread_id(), before);

        mgr.start();
        assert_ne!(mgr.thread_id(), before);
    }

    #[test]
    fn stop_from_idle_still_rotates_thread_id() {
        let mut mgr = manager(completion_unreachable());
        let before = mgr.thread_id().to_string();
        mgr.stop();
        assert_ne!(mgr.thread_id(), before);
        assert_eq!(mgr.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn rejects_message_while_idle() {
        let mut mgr = manager(completion_unreachable());
        let err = mgr
            .handle_message("hello")
            .await
            .expect_err("idle session must reject");
        assert!(matches!(err, SessionError::NotActive));
        assert!(mgr.transcript().is_empty());
    }

    #[tokio::test]
    async fn short_reply_is_delivered_inline_unmodified() {
        let mut mgr = manager(completion_ok("hi"));
        mgr.start();

        let delivery = mgr.handle_message("hello").await.expect("reply");
        assert_eq!(delivery, Delivery::Inline("hi".to_string()));

        // system + user + assistant
        assert_eq!(mgr.transcript().len(), 3);
        assert_eq!(mgr.transcript()[1].content, "hello");
        assert_eq!(mgr.transcript()[2].content, "hi");
    }

    #[tokio::test]
    async fn reply_at_limit_stays_inline() {
        let reply: &'static str = Box::leak("x".repeat(INLINE_REPLY_LIMIT).into_boxed_str());
        let mut mgr = manager(completion_ok(reply));
        mgr.start();

        let delivery = mgr.handle_message("q").await.expect("reply");
        assert_eq!(delivery, Delivery::Inline(reply.to_string()));
    }

    #[tokio::test]
    async fn oversized_reply_becomes_document_with_exact_contents() {
        let reply: &'static str = Box::leak("y".repeat(5000).into_boxed_str());
        let mut mgr = manager(completion_ok(reply));
        mgr.start();

        let delivery = mgr.handle_message("q").await.expect("reply");
        match delivery {
            Delivery::Document {
                file_name,
                contents,
            } => {
                assert_eq!(file_name, REPLY_FILE_NAME);
                assert_eq!(contents.len(), 5000);
                assert_eq!(contents, reply);
            }
            Delivery::Inline(_) => panic!("oversized reply must not be inline"),
        }
    }

    #[tokio::test]
    async fn threshold_counts_characters_not_bytes() {
        // 4000 cyrillic characters are 8000 bytes but still fit inline.
        let reply: &'static str = Box::leak("ф".repeat(INLINE_REPLY_LIMIT).into_boxed_str());
        let mut mgr = manager(completion_ok(reply));
        mgr.start();

        let delivery = mgr.handle_message("q").await.expect("reply");
        assert!(matches!(delivery, Delivery::Inline(_)));
    }

    #[tokio::test]
    async fn failure_is_non_fatal_and_leaves_transcript_untouched() {
        let mut mgr = manager(completion_failing());
        mgr.start();
        let thread_id = mgr.thread_id().to_string();

        let err = mgr
            .handle_message("hello")
            .await
            .expect_err("stub must fail");
        assert!(matches!(err, SessionError::Completion(_)));

        assert_eq!(mgr.state(), SessionState::Active);
        assert_eq!(mgr.thread_id(), thread_id);
        assert_eq!(mgr.transcript().len(), 1);
    }
}
