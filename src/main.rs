//! Binary entry point: logging, settings, client wiring and the teloxide
//! dispatcher.

use dotenvy::dotenv;
use giga_analyzer::bot::handlers::{self, Command};
use giga_analyzer::config::Settings;
use giga_analyzer::llm::{ChatCompletion, GigaChatClient};
use giga_analyzer::session::SessionManager;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

lazy_static! {
    static ref RE_TG_TOKEN: Regex =
        Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}").expect("valid regex");
    static ref RE_TG_TOKEN_PATH: Regex =
        Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+").expect("valid regex");
    static ref RE_GIGA_CREDENTIALS: Regex =
        Regex::new(r"GIGACHAT_CREDENTIALS=[^\s&]+").expect("valid regex");
    static ref RE_BASIC_AUTH: Regex =
        Regex::new(r"Basic [A-Za-z0-9+/=]{16,}").expect("valid regex");
}

fn redact(input: &str) -> String {
    let mut output = input.to_string();
    output = RE_TG_TOKEN.replace_all(&output, "[TELEGRAM_TOKEN]").to_string();
    output = RE_TG_TOKEN_PATH
        .replace_all(&output, "$1[TELEGRAM_TOKEN]")
        .to_string();
    output = RE_GIGA_CREDENTIALS
        .replace_all(&output, "GIGACHAT_CREDENTIALS=[MASKED]")
        .to_string();
    output = RE_BASIC_AUTH.replace_all(&output, "Basic [MASKED]").to_string();
    output
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // Report the original length even if redaction changed it.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter {
            make_inner: io::stderr,
        }))
        .init();

    info!("Starting requirements analyzer bot...");

    let settings = match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let completion: Arc<dyn ChatCompletion> = match GigaChatClient::new(&settings) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to initialize GigaChat client: {e}");
            std::process::exit(1);
        }
    };
    info!("GigaChat client initialized.");

    let manager = Arc::new(Mutex::new(SessionManager::new(
        completion,
        settings.system_prompt(),
    )));

    let bot = Bot::new(settings.telegram_token.clone());

    let allowed_users = settings.allowed_users();
    let message_auth = {
        let allowed = allowed_users.clone();
        move |msg: Message| {
            allowed.is_empty()
                || msg
                    .from
                    .as_ref()
                    .is_some_and(|u| allowed.contains(&u.id.0.cast_signed()))
        }
    };
    let callback_auth = {
        let allowed = allowed_users.clone();
        move |query: CallbackQuery| {
            allowed.is_empty() || allowed.contains(&query.from.id.0.cast_signed())
        }
    };

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(message_auth)
                .branch(
                    dptree::entry().filter_command::<Command>().endpoint(
                        |bot: Bot,
                         msg: Message,
                         cmd: Command,
                         manager: Arc<Mutex<SessionManager>>| async move {
                            if let Err(e) =
                                handlers::handle_command(bot, msg, cmd, manager).await
                            {
                                error!("Command handler error: {e}");
                            }
                            respond(())
                        },
                    ),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(
                            |bot: Bot, msg: Message, manager: Arc<Mutex<SessionManager>>| async move {
                                if let Err(e) = handlers::handle_text(bot, msg, manager).await {
                                    error!("Text handler error: {e}");
                                }
                                respond(())
                            },
                        ),
                ),
        )
        .branch(
            Update::filter_callback_query().filter(callback_auth).endpoint(
                |bot: Bot, query: CallbackQuery, manager: Arc<Mutex<SessionManager>>| async move {
                    if let Err(e) = handlers::handle_callback(bot, query, manager).await {
                        error!("Callback handler error: {e}");
                    }
                    respond(())
                },
            ),
        );

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![manager])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
