use std::{sync::Arc, time::Duration};

use {
    intake_core::IntakeController,
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{Error, Result, handlers};

#[derive(Debug, Clone, Copy)]
pub struct PollingOptions {
    /// Long-poll timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,
    /// Pause after a failed `getUpdates` call.
    pub error_backoff: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 30,
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Build a bot whose HTTP client outlives the long-poll timeout.
pub fn connect(token: &Secret<String>, api_url: Option<&str>) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(45))
        .build()
        .map_err(|e| Error::message(format!("building Telegram HTTP client: {e}")))?;
    let bot = Bot::with_client(token.expose_secret(), client);

    match api_url {
        Some(raw) => {
            let url = reqwest::Url::parse(raw)
                .map_err(|e| Error::message(format!("invalid Telegram API URL {raw}: {e}")))?;
            Ok(bot.set_api_url(url))
        },
        None => Ok(bot),
    }
}

/// Poll for updates and feed messages to `controller` until `cancel` fires
/// or another instance takes over the token.
///
/// Startup checks (`getMe`, webhook removal) fail fast; transient polling
/// errors are retried after `options.error_backoff`.
pub async fn run_polling(
    bot: Bot,
    controller: Arc<IntakeController>,
    options: PollingOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let me = bot.get_me().await?;

    // Long polling only works without a webhook.
    bot.delete_webhook().await?;

    let commands = vec![BotCommand::new("start", "Show how to send files")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let mut offset: i32 = 0;
    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(options.poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            () = cancel.cancelled() => {
                info!("telegram polling stopped");
                return Ok(());
            }
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                if !updates.is_empty() {
                    debug!(count = updates.len(), "got telegram updates");
                }
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => {
                            let chat_id = msg.chat.id.0;
                            if let Err(e) = handlers::handle_message(msg, &bot, &controller).await
                            {
                                error!(chat_id, error = %e, "error handling telegram message");
                            }
                        },
                        other => debug!("ignoring non-message update: {other:?}"),
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is already running with this token");
                return Ok(());
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("telegram polling stopped");
                        return Ok(());
                    }
                    () = tokio::time::sleep(options.error_backoff) => {}
                }
            },
        }
    }
}
