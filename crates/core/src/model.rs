use {
    chrono::NaiveDateTime,
    serde::{Deserialize, Serialize},
};

/// Timestamp layout used for ledger rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a reply to the sender goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    /// Chat/peer ID to send the reply to.
    pub chat_id: String,
    /// Message being replied to, if any.
    pub message_id: Option<String>,
}

/// The file carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Document {
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    /// Highest-resolution variant of a photo.
    Photo { file_id: String },
    /// Anything else (text, voice, video, stickers...). Carries a short
    /// description of the media kind for logging.
    Unsupported { kind: String },
}

impl Attachment {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Document { .. } => "document",
            Self::Photo { .. } => "photo",
            Self::Unsupported { kind } => kind,
        }
    }
}

/// One inbound file-bearing message waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub reply_to: ReplyTarget,
    /// Group identifier shared by messages sent together, assigned by the
    /// transport. `None` for stand-alone messages.
    pub group_id: Option<String>,
    pub caption: Option<String>,
    pub attachment: Attachment,
}

/// Client identifier and display name parsed from a caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// `ID` followed by at least three digits.
    pub client_id: String,
    pub name: String,
}

/// One ledger row. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub client_id: String,
    pub name: String,
    pub file_name: String,
    pub timestamp: NaiveDateTime,
    pub link: String,
}

impl UploadRecord {
    pub fn new(
        client: &ClientIdentity,
        file_name: impl Into<String>,
        link: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            client_id: client.client_id.clone(),
            name: client.name.clone(),
            file_name: file_name.into(),
            timestamp,
            link: link.into(),
        }
    }

    /// Cell values in ledger column order.
    pub fn row(&self) -> [String; 5] {
        [
            self.client_id.clone(),
            self.name.clone(),
            self.file_name.clone(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.link.clone(),
        ]
    }
}
