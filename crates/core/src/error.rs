use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A backend call failed: credential refresh, folder lookup or creation,
    /// upload, ledger append or attachment download.
    #[error("uplink failure ({context}): {source}")]
    Uplink {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Sending a reply back through the chat transport failed.
    #[error("transport failure ({context}): {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn uplink(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Uplink {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_uplink(&self) -> bool {
        matches!(self, Self::Uplink { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
