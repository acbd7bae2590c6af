//! REST clients for the storage (Drive v3) and ledger (Sheets v4) backends.

pub mod api;
pub mod drive;
pub mod error;
pub mod sheets;

pub use {
    api::GoogleApi,
    drive::DriveClient,
    error::{Error, Result},
    sheets::SheetsLedger,
};
