use std::sync::Arc;

use {chrono::Local, tracing::debug};

use crate::{
    Result,
    backend::Ledger,
    model::{ClientIdentity, UploadRecord},
};

/// Appends one audit row per uploaded file.
pub struct UploadLogger {
    ledger: Arc<dyn Ledger>,
}

impl UploadLogger {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Build the record for an uploaded file, stamped with the local time,
    /// and append it.
    pub async fn log(
        &self,
        client: &ClientIdentity,
        file_name: &str,
        link: &str,
    ) -> Result<UploadRecord> {
        let record = UploadRecord::new(client, file_name, link, Local::now().naive_local());
        self.ledger.append(&record).await?;
        debug!(
            client_id = %record.client_id,
            file_name,
            "upload recorded in ledger"
        );
        Ok(record)
    }
}
