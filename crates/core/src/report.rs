use std::fmt::Write;

use crate::model::ClientIdentity;

/// Prompt sent when a stand-alone message has no usable caption.
pub const SINGLE_CAPTION_PROMPT: &str = "❗ Please add caption like: ID001 John Smith";

/// Prompt sent when the first message of a group has no usable caption.
pub const BATCH_CAPTION_PROMPT: &str = "❗ Please provide caption like: ID001 John Smith";

/// Reply to a captioned stand-alone message that carries no document or photo.
pub const UNSUPPORTED_PROMPT: &str = "⚠️ Please send a document or photo.";

/// What happened to one message of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Uploaded and recorded in the ledger.
    Uploaded { file_name: String, link: String },
    /// Uploaded, but the ledger append failed.
    Unlogged {
        file_name: String,
        link: String,
        error: String,
    },
    /// Not a document or photo. Never reported to the sender.
    Skipped { kind: String },
    /// Download or upload failed; nothing was stored.
    Failed { file_name: String, error: String },
}

impl FileOutcome {
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Uploaded { link, .. } | Self::Unlogged { link, .. } => Some(link),
            Self::Skipped { .. } | Self::Failed { .. } => None,
        }
    }
}

/// Per-file results of one processed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub client: ClientIdentity,
    pub grouped: bool,
    pub folder_id: String,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// Links of every stored file, in arrival order.
    pub fn links(&self) -> Vec<&str> {
        self.outcomes.iter().filter_map(FileOutcome::link).collect()
    }

    pub fn uploaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.link().is_some()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Failed { file_name, error } => Some((file_name.as_str(), error.as_str())),
            _ => None,
        })
    }

    pub fn unlogged(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Unlogged {
                file_name, error, ..
            } => Some((file_name.as_str(), error.as_str())),
            _ => None,
        })
    }

    /// Reply text for the sender.
    pub fn render(&self) -> String {
        let ClientIdentity { client_id, name } = &self.client;
        let mut out = String::new();

        if !self.grouped {
            match self.outcomes.first() {
                Some(FileOutcome::Uploaded { link, .. }) => {
                    let _ = write!(out, "✅ File uploaded for {name} ({client_id})\n🔗 {link}");
                },
                Some(FileOutcome::Unlogged { link, error, .. }) => {
                    let _ = write!(
                        out,
                        "✅ File uploaded for {name} ({client_id})\n🔗 {link}\n⚠️ Not recorded in the ledger: {error}"
                    );
                },
                Some(FileOutcome::Failed { file_name, error }) => {
                    let _ = write!(
                        out,
                        "❌ Upload failed for {name} ({client_id}): {file_name}: {error}"
                    );
                },
                Some(FileOutcome::Skipped { .. }) | None => out.push_str(UNSUPPORTED_PROMPT),
            }
            return out;
        }

        let _ = write!(
            out,
            "✅ {} files uploaded for {name} ({client_id})",
            self.uploaded_count()
        );
        for link in self.links() {
            let _ = write!(out, "\n🔗 {link}");
        }

        let unlogged: Vec<_> = self.unlogged().collect();
        if !unlogged.is_empty() {
            let _ = write!(
                out,
                "\n⚠️ {} uploaded but not recorded in the ledger:",
                unlogged.len()
            );
            for (file_name, error) in unlogged {
                let _ = write!(out, "\n• {file_name}: {error}");
            }
        }

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            let noun = if failed.len() == 1 { "file" } else { "files" };
            let _ = write!(out, "\n❌ {} {noun} failed:", failed.len());
            for (file_name, error) in failed {
                let _ = write!(out, "\n• {file_name}: {error}");
            }
        }
        out
    }
}
