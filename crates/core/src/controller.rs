use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use {
    chrono::Utc,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    backend::{ChatTransport, FilePayload, Ledger, StorageBackend},
    batch::{Admission, BatchAccumulator, IntakeBatch},
    caption::parse_caption,
    folder::FolderResolver,
    ledger::UploadLogger,
    model::{Attachment, ClientIdentity, PendingMessage},
    report::{
        BATCH_CAPTION_PROMPT, BatchReport, FileOutcome, SINGLE_CAPTION_PROMPT, UNSUPPORTED_PROMPT,
    },
};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
const PHOTO_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Default)]
pub struct ControllerSettings {
    /// Folder under which per-client folders are created.
    pub parent_folder_id: String,
    /// Minimum silence before a group is flushed. Zero flushes every open
    /// group on each tick.
    pub quiet_period: Duration,
}

/// Routes inbound messages and drives folder resolution, upload and ledger
/// logging for every batch.
pub struct IntakeController {
    settings: ControllerSettings,
    transport: Arc<dyn ChatTransport>,
    storage: Arc<dyn StorageBackend>,
    folders: FolderResolver,
    logger: UploadLogger,
    /// Only ever locked for map operations, never across an await.
    accumulator: Mutex<BatchAccumulator>,
}

impl IntakeController {
    pub fn new(
        settings: ControllerSettings,
        transport: Arc<dyn ChatTransport>,
        storage: Arc<dyn StorageBackend>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            settings,
            transport,
            folders: FolderResolver::new(Arc::clone(&storage)),
            storage,
            logger: UploadLogger::new(ledger),
            accumulator: Mutex::new(BatchAccumulator::new()),
        }
    }

    /// Accept one inbound message. Grouped messages are buffered until the
    /// next flush and yield `Ok(None)`; stand-alone messages are processed
    /// right away.
    pub async fn handle(&self, message: PendingMessage) -> Result<Option<BatchReport>> {
        let admission = self
            .accumulator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .admit(message);

        match admission {
            Admission::Buffered { group_id, pending } => {
                debug!(group_id, pending, "buffered grouped message");
                Ok(None)
            },
            Admission::Immediate(batch) => self.process_batch(batch).await,
        }
    }

    /// Drain the groups that are due and process each one, oldest first.
    pub async fn flush(&self) -> Vec<BatchReport> {
        let due = self
            .accumulator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain_settled(Instant::now(), self.settings.quiet_period);
        self.process_all(due).await
    }

    /// Drain and process every open group regardless of the quiet period.
    pub async fn flush_all(&self) -> Vec<BatchReport> {
        let due = self
            .accumulator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain();
        self.process_all(due).await
    }

    /// Number of groups waiting for a flush.
    pub fn open_batches(&self) -> usize {
        self.accumulator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    async fn process_all(&self, batches: Vec<IntakeBatch>) -> Vec<BatchReport> {
        if !batches.is_empty() {
            debug!(count = batches.len(), "flushing batches");
        }
        let mut reports = Vec::with_capacity(batches.len());
        for batch in batches {
            let group_id = batch.group_id.clone();
            match self.process_batch(batch).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {},
                Err(e) => warn!(group_id = ?group_id, error = %e, "batch processing failed"),
            }
        }
        reports
    }

    /// Process one batch: parse the first caption, resolve the folder once,
    /// then upload and log each file in arrival order and reply with a
    /// summary.
    ///
    /// Returns `Ok(None)` when the batch was abandoned because the caption
    /// did not parse (the sender gets a corrective prompt) or a stand-alone
    /// message carried nothing to upload.
    pub async fn process_batch(&self, batch: IntakeBatch) -> Result<Option<BatchReport>> {
        let Some(target) = batch.reply_target().cloned() else {
            return Ok(None);
        };

        let Some(client) = parse_caption(batch.caption()) else {
            info!(
                group_id = ?batch.group_id,
                chat_id = %target.chat_id,
                "caption missing or malformed, batch abandoned"
            );
            let prompt = if batch.is_grouped() {
                BATCH_CAPTION_PROMPT
            } else {
                SINGLE_CAPTION_PROMPT
            };
            self.transport.reply(&target, prompt).await?;
            return Ok(None);
        };

        if !batch.is_grouped() && !batch.messages.iter().any(|m| m.attachment.is_supported()) {
            self.transport.reply(&target, UNSUPPORTED_PROMPT).await?;
            return Ok(None);
        }

        let folder_id = match self
            .folders
            .resolve(&self.settings.parent_folder_id, &client)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(client_id = %client.client_id, error = %e, "destination folder unavailable");
                let notice = format!(
                    "❌ Could not prepare the folder for {} ({}). Nothing was uploaded.",
                    client.name, client.client_id
                );
                if let Err(reply_err) = self.transport.reply(&target, &notice).await {
                    warn!(error = %reply_err, "failed to send folder failure notice");
                }
                return Err(e);
            },
        };

        let mut outcomes = Vec::with_capacity(batch.len());
        for message in &batch.messages {
            outcomes.push(self.process_file(&client, &folder_id, message).await);
        }

        let report = BatchReport {
            client,
            grouped: batch.is_grouped(),
            folder_id,
            outcomes,
        };
        info!(
            client_id = %report.client.client_id,
            group_id = ?batch.group_id,
            uploaded = report.uploaded_count(),
            failed = report.failed().count(),
            "batch processed"
        );
        self.transport.reply(&target, &report.render()).await?;
        Ok(Some(report))
    }

    async fn process_file(
        &self,
        client: &ClientIdentity,
        folder_id: &str,
        message: &PendingMessage,
    ) -> FileOutcome {
        let Some(source) = FileSource::from_attachment(client, &message.attachment) else {
            debug!(kind = message.attachment.kind(), "skipping unsupported attachment");
            return FileOutcome::Skipped {
                kind: message.attachment.kind().to_string(),
            };
        };

        let data = match self.transport.fetch_file(&source.file_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(file_name = %source.file_name, error = %e, "attachment download failed");
                return FileOutcome::Failed {
                    file_name: source.file_name,
                    error: e.to_string(),
                };
            },
        };

        let payload = FilePayload {
            name: source.file_name.clone(),
            mime_type: source.mime_type,
            data,
        };
        let stored = match self.storage.upload(folder_id, payload).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(file_name = %source.file_name, error = %e, "upload failed");
                return FileOutcome::Failed {
                    file_name: source.file_name,
                    error: e.to_string(),
                };
            },
        };
        info!(
            client_id = %client.client_id,
            file_name = %source.file_name,
            file_id = %stored.id,
            "file uploaded"
        );

        match self
            .logger
            .log(client, &source.file_name, &stored.link)
            .await
        {
            Ok(_) => FileOutcome::Uploaded {
                file_name: source.file_name,
                link: stored.link,
            },
            Err(e) => {
                warn!(file_name = %source.file_name, error = %e, "ledger append failed");
                FileOutcome::Unlogged {
                    file_name: source.file_name,
                    link: stored.link,
                    error: e.to_string(),
                }
            },
        }
    }
}

/// Download handle plus the name and type the file is stored under.
#[derive(Debug, PartialEq, Eq)]
struct FileSource {
    file_id: String,
    file_name: String,
    mime_type: String,
}

impl FileSource {
    fn from_attachment(client: &ClientIdentity, attachment: &Attachment) -> Option<Self> {
        Self::from_attachment_at(client, attachment, Utc::now().timestamp())
    }

    fn from_attachment_at(
        client: &ClientIdentity,
        attachment: &Attachment,
        unix_ts: i64,
    ) -> Option<Self> {
        match attachment {
            Attachment::Document {
                file_id,
                file_name,
                mime_type,
            } => Some(Self {
                file_id: file_id.clone(),
                file_name: file_name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| generated_file_name(&client.client_id, unix_ts, false)),
                mime_type: mime_type
                    .clone()
                    .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
            }),
            Attachment::Photo { file_id } => Some(Self {
                file_id: file_id.clone(),
                file_name: generated_file_name(&client.client_id, unix_ts, true),
                mime_type: PHOTO_MIME_TYPE.to_string(),
            }),
            Attachment::Unsupported { .. } => None,
        }
    }
}

/// `{client_id}_{unix_ts}`, with `.jpg` for photos.
fn generated_file_name(client_id: &str, unix_ts: i64, photo: bool) -> String {
    if photo {
        format!("{client_id}_{unix_ts}.jpg")
    } else {
        format!("{client_id}_{unix_ts}")
    }
}
