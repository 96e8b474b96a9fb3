use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use subgate_bot::bot::gate::{self, CallbackAction};
use subgate_bot::bot::handlers::{deep_link_token, Command};
use subgate_bot::bot::{ChannelGateApi, FollowUpScheduler, GateContext, TelegramGate};
use subgate_bot::config::Settings;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Masks bot-token shapes in log output before it reaches stderr.
struct TokenRedactor {
    rules: Vec<(Regex, &'static str)>,
}

impl TokenRedactor {
    /// Compile the redaction rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is invalid.
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: vec![
                (
                    Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/?)")?,
                    "$1[TELEGRAM_TOKEN]$3",
                ),
                (
                    Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
                    "[TELEGRAM_TOKEN]",
                ),
                (
                    Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
                    "$1[TELEGRAM_TOKEN]",
                ),
            ],
        })
    }

    fn redact(&self, input: &str) -> String {
        self.rules.iter().fold(input.to_string(), |text, (re, sub)| {
            re.replace_all(&text, *sub).to_string()
        })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Arc<TokenRedactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.redactor.redact(&s).as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    redactor: Arc<TokenRedactor>,
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
            redactor: self.redactor.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let redactor = Arc::new(TokenRedactor::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);

    init_logging(redactor);

    info!("Starting Subscription Gate bot...");

    let settings = init_settings();
    let ctx = init_context(&settings);

    let bot = Bot::new(settings.telegram_token.clone());
    let api: Arc<dyn ChannelGateApi> = Arc::new(TelegramGate::new(bot.clone()));
    let scheduler = Arc::new(FollowUpScheduler::new());

    // Long-polling only; drop anything that queued up while the bot was down.
    bot.delete_webhook().drop_pending_updates(true).await?;

    info!("Bot is running...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![ctx, api, Arc::clone(&scheduler)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Pending follow-ups cannot be persisted, cancel them cleanly.
    scheduler.shutdown().await;

    Ok(())
}

fn init_logging(redactor: Arc<TokenRedactor>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        redactor,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_context(settings: &Settings) -> Arc<GateContext> {
    match GateContext::from_settings(settings) {
        Ok(ctx) => {
            info!(
                "Gate context ready (owners: {}, follow-up delay: {}s)",
                ctx.owners.len(),
                ctx.followup_delay.as_secs()
            );
            Arc::new(ctx)
        }
        Err(e) => {
            error!("Failed to build gate context: {}", e);
            std::process::exit(1);
        }
    }
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        // Anything that is not a command is ignored on purpose.
        .branch(Update::filter_message().endpoint(handle_other))
}

async fn handle_other(msg: Message) -> Result<(), teloxide::RequestError> {
    tracing::debug!("Ignoring non-command message in chat {}", msg.chat.id);
    respond(())
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    ctx: Arc<GateContext>,
    api: Arc<dyn ChannelGateApi>,
    scheduler: Arc<FollowUpScheduler>,
) -> Result<(), teloxide::RequestError> {
    let Some(user) = msg.from.as_ref().map(|u| u.id) else {
        return respond(());
    };
    let chat = msg.chat.id;

    let res = match cmd {
        Command::Start(param) => {
            gate::handle_start(&ctx, &api, &scheduler, chat, user, deep_link_token(&param)).await
        }
        Command::Post => gate::handle_publish(&ctx, api.as_ref(), chat, user).await,
        Command::Healthcheck => gate::handle_healthcheck(api.as_ref(), chat).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    q: CallbackQuery,
    ctx: Arc<GateContext>,
    api: Arc<dyn ChannelGateApi>,
) -> Result<(), teloxide::RequestError> {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        return respond(());
    };

    let origin = q.message.as_ref().map(|m| (m.chat().id, m.id()));
    let res = match action {
        CallbackAction::RecheckSubscription => {
            gate::handle_recheck(&ctx, api.as_ref(), q.id.clone(), q.from.id, origin).await
        }
    };
    if let Err(e) = res {
        error!("Callback error: {}", e);
    }
    respond(())
}
