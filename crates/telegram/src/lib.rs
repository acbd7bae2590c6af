//! Telegram chat transport: long polling, message mapping, replies and
//! attachment downloads.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

#[cfg(test)]
pub(crate) mod mock_api;

pub use {
    bot::{PollingOptions, connect, run_polling},
    error::{Error, Result},
    handlers::{START_BANNER, to_pending_message},
    outbound::TelegramTransport,
};
