//! Seams to the external collaborators the core depends on.
//!
//! The concrete implementations live in their own crates (Telegram for the
//! chat transport, Google Drive and Sheets for storage and the ledger); the
//! core only sees these traits.

use async_trait::async_trait;

use crate::{
    Result,
    model::{ReplyTarget, UploadRecord},
};

/// Chat transport: delivers replies and attachment bytes.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Download an attachment fully into memory.
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Send a plain-text reply.
    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: String,
    /// Shareable link to the uploaded object.
    pub link: String,
}

/// A file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Hierarchical storage backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Non-trashed folders named exactly `name` directly under `parent_id`,
    /// in backend order.
    async fn find_folders(&self, parent_id: &str, name: &str) -> Result<Vec<FolderEntry>>;

    /// Create a folder under `parent_id` and return its identifier.
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String>;

    /// Upload a binary object as a new entry in `folder_id`.
    async fn upload(&self, folder_id: &str, file: FilePayload) -> Result<StoredObject>;
}

/// Append-only tabular record of uploads.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, record: &UploadRecord) -> Result<()>;
}
