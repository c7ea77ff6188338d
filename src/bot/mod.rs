//! Telegram transport: commands, keyboards and message handlers.

/// Command, callback and message handlers
pub mod handlers;
