//! Mock helpers for the completion trait, shared by unit and integration
//! tests.

use crate::llm::{LlmError, MockChatCompletion};
use mockall::predicate::always;

/// Mock completion that answers every call with `reply`.
#[must_use]
pub fn completion_ok(reply: &'static str) -> MockChatCompletion {
    let mut mock = MockChatCompletion::new();
    mock.expect_complete()
        .with(always(), always(), always())
        .returning(move |_, _, _| Ok(reply.to_string()));
    mock
}

/// Mock completion that fails every call with an API error.
#[must_use]
pub fn completion_failing() -> MockChatCompletion {
    let mut mock = MockChatCompletion::new();
    mock.expect_complete()
        .with(always(), always(), always())
        .returning(|_, _, _| Err(LlmError::Api("stubbed failure".to_string())));
    mock
}

/// Mock completion that panics the test when called. Used where the session
/// must reject the message before reaching the external call.
#[must_use]
pub fn completion_unreachable() -> MockChatCompletion {
    let mut mock = MockChatCompletion::new();
    mock.expect_complete().never();
    mock
}
