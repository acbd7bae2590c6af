//! In-memory fakes of the backend traits for unit tests.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    backend::{ChatTransport, FilePayload, FolderEntry, Ledger, StorageBackend, StoredObject},
    model::{Attachment, PendingMessage, ReplyTarget, UploadRecord},
};

#[derive(Debug)]
struct FakeFailure(String);

impl std::fmt::Display for FakeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FakeFailure {}

pub(crate) fn fake_uplink(context: &str) -> Error {
    Error::uplink(context, FakeFailure("simulated outage".into()))
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub replies: Mutex<Vec<(ReplyTarget, String)>>,
    pub fetches: Mutex<Vec<String>>,
    /// File ids whose download fails.
    pub broken_files: Vec<String>,
}

impl RecordingTransport {
    pub fn replies(&self) -> Vec<(ReplyTarget, String)> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(file_id.to_string());
        if self.broken_files.iter().any(|f| f == file_id) {
            return Err(fake_uplink("download"));
        }
        Ok(format!("bytes of {file_id}").into_bytes())
    }

    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.clone(), text.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredFile {
    pub folder_id: String,
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Folder tree plus uploaded files. `find_folders` yields once before
/// answering so concurrent resolves interleave like real network calls.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    pub folders: Mutex<Vec<(String, FolderEntry)>>,
    pub files: Mutex<Vec<StoredFile>>,
    pub lookups: AtomicUsize,
    pub creates: AtomicUsize,
    pub fail_lookups: bool,
    /// Upload names that fail.
    pub broken_uploads: Vec<String>,
}

impl MemoryStorage {
    pub fn folders_named(&self, parent_id: &str, name: &str) -> usize {
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(p, f)| p == parent_id && f.name == name)
            .count()
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn find_folders(&self, parent_id: &str, name: &str) -> Result<Vec<FolderEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_lookups {
            return Err(fake_uplink("files.list"));
        }
        Ok(self
            .folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(p, f)| p == parent_id && f.name == name)
            .map(|(_, f)| f.clone())
            .collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("folder-{n}");
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((parent_id.to_string(), FolderEntry {
                id: id.clone(),
                name: name.to_string(),
            }));
        Ok(id)
    }

    async fn upload(&self, folder_id: &str, file: FilePayload) -> Result<StoredObject> {
        if self.broken_uploads.iter().any(|n| *n == file.name) {
            return Err(fake_uplink("upload"));
        }
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.push(StoredFile {
            folder_id: folder_id.to_string(),
            name: file.name,
            mime_type: file.mime_type,
            data: file.data,
        });
        let id = format!("file-{}", files.len());
        Ok(StoredObject {
            link: format!("https://storage.test/{id}"),
            id,
        })
    }
}

#[derive(Default)]
pub(crate) struct MemoryLedger {
    pub rows: Mutex<Vec<UploadRecord>>,
    pub fail: bool,
}

impl MemoryLedger {
    pub fn rows(&self) -> Vec<UploadRecord> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, record: &UploadRecord) -> Result<()> {
        if self.fail {
            return Err(fake_uplink("values.append"));
        }
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

pub(crate) fn document(
    message_id: u32,
    group_id: Option<&str>,
    caption: Option<&str>,
    file_name: Option<&str>,
) -> PendingMessage {
    PendingMessage {
        reply_to: ReplyTarget {
            chat_id: "42".into(),
            message_id: Some(message_id.to_string()),
        },
        group_id: group_id.map(str::to_string),
        caption: caption.map(str::to_string),
        attachment: Attachment::Document {
            file_id: format!("doc-{message_id}"),
            file_name: file_name.map(str::to_string),
            mime_type: Some("application/pdf".into()),
        },
    }
}

pub(crate) fn photo(message_id: u32, group_id: Option<&str>, caption: Option<&str>) -> PendingMessage {
    PendingMessage {
        reply_to: ReplyTarget {
            chat_id: "42".into(),
            message_id: Some(message_id.to_string()),
        },
        group_id: group_id.map(str::to_string),
        caption: caption.map(str::to_string),
        attachment: Attachment::Photo {
            file_id: format!("photo-{message_id}"),
        },
    }
}

pub(crate) fn unsupported(
    message_id: u32,
    group_id: Option<&str>,
    caption: Option<&str>,
) -> PendingMessage {
    PendingMessage {
        reply_to: ReplyTarget {
            chat_id: "42".into(),
            message_id: Some(message_id.to_string()),
        },
        group_id: group_id.map(str::to_string),
        caption: caption.map(str::to_string),
        attachment: Attachment::Unsupported {
            kind: "voice".into(),
        },
    }
}

pub(crate) fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
