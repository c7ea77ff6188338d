//! Handlers for commands, the start/stop inline keyboard and session
//! messages.

use crate::session::{Delivery, SessionError, SessionManager};
use crate::utils::{format_text, truncate_str};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
    utils::command::BotCommands,
};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Callback tag of the "begin session" button.
pub const CALLBACK_START_SESSION: &str = "start_session";
/// Callback tag of the "end session" button.
pub const CALLBACK_STOP_SESSION: &str = "stop_session";

/// Generic notice shown for any completion failure. All failure kinds map
/// to this one message.
pub const FAILURE_NOTICE: &str =
    "⚠️ An error occurred while processing the request. Try again or end the session with /stop";

/// Notice shown when a message arrives outside an active session. The
/// original bot dropped such messages silently; rejecting with a hint is a
/// deliberate deviation.
pub const NOT_ACTIVE_NOTICE: &str =
    "Session is not active. Press \"🚀 Start analysis\" or send /start to begin.";

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message and the session keyboard
    #[command(description = "Start the bot.")]
    Start,
    /// End the current session and erase its data
    #[command(description = "End the current session.")]
    Stop,
    /// Show capability help
    #[command(description = "Show help.")]
    Help,
    /// Check bot health
    #[command(description = "Check bot health.")]
    Healthcheck,
}

/// Keyboard shown with the welcome message.
#[must_use]
pub fn get_main_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🚀 Start analysis",
            CALLBACK_START_SESSION,
        )],
        vec![InlineKeyboardButton::callback(
            "🛑 Stop",
            CALLBACK_STOP_SESSION,
        )],
    ])
}

/// Keyboard shown while a session is running.
#[must_use]
pub fn get_session_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🛑 End session",
        CALLBACK_STOP_SESSION,
    )]])
}

fn welcome_text() -> String {
    "🤖 <b>Welcome to the requirements and code analyzer!</b>\n\n\
     I can help you with:\n\
     ✅ Analyzing business requirements\n\
     ✅ Reviewing source code\n\
     ✅ Checking code against requirements\n\n\
     To begin, press the button below 👇"
        .to_string()
}

fn help_text() -> String {
    "📚 <b>How to work with the bot</b>\n\n\
     What I can do:\n\
     1. Analyze business requirements: logical errors, ambiguous wording, contradictions\n\
     2. Check code against requirements\n\
     3. Review code quality\n\
     4. Generate reports\n\n\
     <b>Commands:</b>\n\
     /start - Begin\n\
     /stop - End the current session\n\
     /help - This help\n\n\
     To start an analysis, just send the requirements and code as text."
        .to_string()
}

fn session_started_text() -> String {
    "🔍 <b>Analysis session started!</b>\n\n\
     You can now:\n\
     1. Send requirements and code as text\n\
     2. Ask questions about the analysis\n\n\
     Example request:\n\
     \"Analyze these requirements: &lt;text&gt;\"\n\
     \"Check this code against the requirements: &lt;code&gt;\""
        .to_string()
}

/// `/start`, `/stop`, `/help` and `/healthcheck`.
///
/// # Errors
///
/// Returns an error when a Telegram send fails.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    manager: Arc<Mutex<SessionManager>>,
) -> Result<()> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, welcome_text())
                .parse_mode(ParseMode::Html)
                .reply_markup(get_main_keyboard())
                .await?;
        }
        Command::Stop => {
            stop_session(&bot, msg.chat.id, &manager).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, help_text())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Healthcheck => {
            bot.send_message(msg.chat.id, "OK").await?;
        }
    }
    Ok(())
}

/// Inline keyboard callbacks: begin and end session.
///
/// # Errors
///
/// Returns an error when a Telegram send fails.
pub async fn handle_callback(
    bot: Bot,
    query: CallbackQuery,
    manager: Arc<Mutex<SessionManager>>,
) -> Result<()> {
    let chat_id = query.message.as_ref().map(|m| m.chat().id);

    if let Some(chat_id) = chat_id {
        match query.data.as_deref() {
            Some(CALLBACK_START_SESSION) => {
                {
                    let mut manager = manager.lock().await;
                    let outcome = manager.start();
                    info!(
                        thread_id = manager.thread_id(),
                        "Session start requested: {outcome:?}"
                    );
                }
                // Re-sending the instructions on AlreadyActive is harmless:
                // start() left the transcript and thread id alone.
                bot.send_message(chat_id, session_started_text())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(get_session_keyboard())
                    .await?;
            }
            Some(CALLBACK_STOP_SESSION) => {
                stop_session(&bot, chat_id, &manager).await?;
            }
            _ => {}
        }
    }

    bot.answer_callback_query(query.id).await?;
    Ok(())
}

async fn stop_session(
    bot: &Bot,
    chat_id: ChatId,
    manager: &Arc<Mutex<SessionManager>>,
) -> Result<()> {
    {
        let mut manager = manager.lock().await;
        manager.stop();
        info!(
            thread_id = manager.thread_id(),
            "Session stopped, transcript erased"
        );
    }
    bot.send_message(
        chat_id,
        "🛑 <b>Session ended.</b> Data erased.\n\nFor a new analysis send /start",
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

/// Free-text messages: forwarded through the session manager.
///
/// # Errors
///
/// Returns an error when a Telegram send fails.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    manager: Arc<Mutex<SessionManager>>,
) -> Result<()> {
    let text = msg.text().unwrap_or("").to_string();
    info!("Handling message: '{}'", truncate_str(&text, 100));

    bot.send_chat_action(msg.chat.id, teloxide::types::ChatAction::Typing)
        .await?;

    let result = {
        let mut manager = manager.lock().await;
        manager.handle_message(&text).await
    };

    match result {
        Ok(Delivery::Inline(reply)) => {
            bot.send_message(
                msg.chat.id,
                format!("📋 <b>Analysis results:</b>\n\n{}", format_text(&reply)),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Ok(Delivery::Document {
            file_name,
            contents,
        }) => {
            let document = InputFile::memory(contents.into_bytes()).file_name(file_name);
            bot.send_document(msg.chat.id, document)
                .caption("📄 Here are the analysis results:")
                .await?;
        }
        Err(SessionError::NotActive) => {
            bot.send_message(msg.chat.id, NOT_ACTIVE_NOTICE)
                .reply_markup(get_main_keyboard())
                .await?;
        }
        Err(SessionError::Completion(e)) => {
            error!("Error processing message: {e}");
            bot.send_message(msg.chat.id, FAILURE_NOTICE).await?;
        }
    }

    Ok(())
}
