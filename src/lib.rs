//! GigaAnalyzer - a requirements and code review Telegram bot.
//!
//! Gates the analysis conversation behind an explicit start/stop session
//! lifecycle and forwards each accepted message to the GigaChat
//! chat-completion API. Long answers are delivered as a document attachment.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// GigaChat client and the completion trait
pub mod llm;
/// Session lifecycle and message dispatch
pub mod session;
/// Mock helpers shared by unit and integration tests
pub mod testing;
pub mod utils;
