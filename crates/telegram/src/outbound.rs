use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    intake_core::{ChatTransport, ReplyTarget},
    teloxide::{
        RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatId, MessageId, ReplyParameters},
    },
    tracing::{debug, warn},
};

use crate::{Error, Result};

const RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Replies and attachment downloads over the Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
        }
    }

    /// Download URL for a `getFile` path, relative to the bot's API root.
    fn file_url(&self, file_path: &str) -> String {
        let api_url = self.bot.api_url();
        format!(
            "{}/file/bot{}/{}",
            api_url.as_str().trim_end_matches('/'),
            self.bot.token(),
            file_path
        )
    }

    /// Resolve a file id with `getFile` and download its bytes.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(file_id).await?;
        let response = self.http.get(self.file_url(&file.path)).send().await?;
        if !response.status().is_success() {
            return Err(Error::message(format!(
                "failed to download file: HTTP {}",
                response.status()
            )));
        }
        let data = response.bytes().await?.to_vec();
        debug!(file_id, size = data.len(), "telegram file downloaded");
        Ok(data)
    }

    /// Send `text` to the chat, quoting the originating message when known.
    pub async fn send_reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        let chat_id = ChatId(
            target
                .chat_id
                .parse::<i64>()
                .map_err(|_| Error::message(format!("invalid chat id: {}", target.chat_id)))?,
        );
        let reply_params = parse_reply_params(target.message_id.as_deref());

        run_with_retry(&target.chat_id, || {
            let mut req = self.bot.send_message(chat_id, text);
            if let Some(rp) = &reply_params {
                req = req.reply_parameters(rp.clone());
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn fetch_file(&self, file_id: &str) -> intake_core::Result<Vec<u8>> {
        self.download(file_id)
            .await
            .map_err(|e| intake_core::Error::uplink(format!("downloading file {file_id}"), e))
    }

    async fn reply(&self, target: &ReplyTarget, text: &str) -> intake_core::Result<()> {
        self.send_reply(target, text).await.map_err(|e| {
            intake_core::Error::transport(format!("replying in chat {}", target.chat_id), e)
        })
    }
}

/// Run a request, honouring `RetryAfter` rate-limit responses a few times.
async fn run_with_retry<T, F, Fut>(
    chat_id: &str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };
                if retries >= RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }
                retries += 1;
                warn!(
                    chat_id,
                    retries,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

/// Telegram message ids are i32; anything else is sent without a quote.
fn parse_reply_params(reply_to: Option<&str>) -> Option<ReplyParameters> {
    reply_to
        .and_then(|id| id.parse::<i32>().ok())
        .map(|id| ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::mock_api::MockApi};

    #[test]
    fn reply_params_need_numeric_id() {
        assert!(parse_reply_params(Some("17")).is_some());
        assert!(parse_reply_params(Some("abc")).is_none());
        assert!(parse_reply_params(None).is_none());
    }

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[tokio::test]
    async fn reply_quotes_original_message() {
        let api = MockApi::start().await;
        let transport = TelegramTransport::new(api.bot());

        transport
            .reply(
                &ReplyTarget {
                    chat_id: "42".into(),
                    message_id: Some("7".into()),
                },
                "✅ File uploaded",
            )
            .await
            .unwrap();

        let sent = api.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["chat_id"], 42);
        assert_eq!(sent[0]["text"], "✅ File uploaded");
        assert_eq!(sent[0]["reply_parameters"]["message_id"], 7);
        api.stop().await;
    }

    #[tokio::test]
    async fn invalid_chat_id_is_a_transport_error() {
        let api = MockApi::start().await;
        let transport = TelegramTransport::new(api.bot());
        let err = transport
            .reply(
                &ReplyTarget {
                    chat_id: "not-a-chat".into(),
                    message_id: None,
                },
                "hi",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, intake_core::Error::Transport { .. }));
        assert!(api.sent_messages().is_empty());
        api.stop().await;
    }

    #[tokio::test]
    async fn fetch_file_resolves_path_then_downloads() {
        let api = MockApi::start().await;
        let transport = TelegramTransport::new(api.bot());

        let bytes = transport.fetch_file("doc-1").await.unwrap();
        assert_eq!(bytes, b"bytes-of:documents/doc-1.bin");
        api.stop().await;
    }

    #[tokio::test]
    async fn failed_download_is_an_uplink_error() {
        let api = MockApi::start().await;
        let transport = TelegramTransport::new(api.bot());

        let err = transport.fetch_file("missing").await.unwrap_err();
        assert!(err.is_uplink());
        assert!(err.to_string().contains("404"));
        api.stop().await;
    }
}
