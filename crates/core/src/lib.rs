//! Core of the intake pipeline.
//!
//! Files arrive through a chat transport, grouped sends are buffered by the
//! [`BatchAccumulator`] until the flush timer fires, and the
//! [`IntakeController`] uploads every file of a batch into the client's
//! destination folder and records one ledger row per upload.

pub mod backend;
pub mod batch;
pub mod caption;
pub mod controller;
pub mod error;
pub mod flush;
pub mod folder;
pub mod ledger;
pub mod model;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    backend::{ChatTransport, FilePayload, FolderEntry, Ledger, StorageBackend, StoredObject},
    batch::{Admission, BatchAccumulator, IntakeBatch},
    caption::parse_caption,
    controller::{ControllerSettings, IntakeController},
    error::{Error, Result},
    flush::{FlushSchedule, spawn_flush_loop},
    folder::{FolderResolver, composed_folder_name},
    ledger::UploadLogger,
    model::{Attachment, ClientIdentity, PendingMessage, ReplyTarget, UploadRecord},
    report::{BatchReport, FileOutcome},
};
