//! Sheets v4 ledger: one appended row per uploaded file.

use {
    async_trait::async_trait,
    intake_core::{Ledger, UploadRecord},
    serde_json::json,
    tracing::debug,
    url::Url,
};

use crate::{
    Result,
    api::{GoogleApi, base_url, push_segments},
};

pub struct SheetsLedger {
    api: GoogleApi,
    base: Url,
    spreadsheet_id: String,
    range: String,
    value_input_option: String,
}

impl SheetsLedger {
    pub fn new(
        api: GoogleApi,
        base_url_raw: &str,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api,
            base: base_url(base_url_raw)?,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            value_input_option: "USER_ENTERED".into(),
        })
    }

    #[must_use]
    pub fn with_value_input_option(mut self, option: impl Into<String>) -> Self {
        self.value_input_option = option.into();
        self
    }

    fn append_url(&self) -> Result<Url> {
        let append = format!("{}:append", self.range);
        push_segments(self.base.clone(), &[
            "v4",
            "spreadsheets",
            &self.spreadsheet_id,
            "values",
            &append,
        ])
    }

    pub async fn append_row(&self, record: &UploadRecord) -> Result<()> {
        let req = self
            .api
            .http()
            .post(self.append_url()?)
            .query(&[("valueInputOption", self.value_input_option.as_str())])
            .json(&json!({ "values": [record.row()] }));
        self.api.send(req).await?;
        debug!(
            client_id = %record.client_id,
            file_name = %record.file_name,
            "ledger row appended"
        );
        Ok(())
    }
}

#[async_trait]
impl Ledger for SheetsLedger {
    async fn append(&self, record: &UploadRecord) -> intake_core::Result<()> {
        self.append_row(record).await.map_err(|e| {
            intake_core::Error::uplink(format!("appending ledger row for {}", record.file_name), e)
        })
    }
}
