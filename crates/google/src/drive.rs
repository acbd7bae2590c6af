//! Drive v3: folder lookup/creation and multipart uploads.

use {
    async_trait::async_trait,
    intake_core::{FilePayload, FolderEntry, StorageBackend, StoredObject},
    reqwest::header::CONTENT_TYPE,
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    Result,
    api::{GoogleApi, base_url},
};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

pub struct DriveClient {
    api: GoogleApi,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl DriveClient {
    /// `base_url` is the API root, e.g. `https://www.googleapis.com/`.
    pub fn new(api: GoogleApi, base_url_raw: &str) -> Result<Self> {
        Ok(Self {
            api,
            base: base_url(base_url_raw)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| crate::Error::message(format!("invalid Drive endpoint {path}: {e}")))
    }

    pub async fn list_folders(&self, parent_id: &str, name: &str) -> Result<Vec<FolderEntry>> {
        let query = folder_query(parent_id, name);
        let req = self.api.http().get(self.endpoint("drive/v3/files")?).query(&[
            ("q", query.as_str()),
            ("spaces", "drive"),
            ("fields", "files(id,name)"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
        ]);
        let list: FileList = self.api.send_json(req).await?;
        debug!(parent_id, name, found = list.files.len(), "drive folder lookup");
        Ok(list
            .files
            .into_iter()
            .map(|f| FolderEntry {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    pub async fn make_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let req = self
            .api
            .http()
            .post(self.endpoint("drive/v3/files")?)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }));
        let created: DriveFile = self.api.send_json(req).await?;
        info!(parent_id, name, folder_id = %created.id, "drive folder created");
        Ok(created.id)
    }

    pub async fn upload_file(&self, folder_id: &str, file: FilePayload) -> Result<StoredObject> {
        let boundary = format!("intake-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": file.name,
            "parents": [folder_id],
        });
        let size = file.data.len();
        let body = multipart_related(&boundary, &metadata, &file.mime_type, &file.data);

        let req = self
            .api
            .http()
            .post(self.endpoint("upload/drive/v3/files")?)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body);
        let uploaded: DriveFile = self.api.send_json(req).await?;
        info!(folder_id, file_name = %file.name, size, file_id = %uploaded.id, "drive upload complete");

        Ok(StoredObject {
            id: uploaded.id,
            link: uploaded.web_view_link.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl StorageBackend for DriveClient {
    async fn find_folders(
        &self,
        parent_id: &str,
        name: &str,
    ) -> intake_core::Result<Vec<FolderEntry>> {
        self.list_folders(parent_id, name)
            .await
            .map_err(|e| intake_core::Error::uplink(format!("looking up folder {name}"), e))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> intake_core::Result<String> {
        self.make_folder(parent_id, name)
            .await
            .map_err(|e| intake_core::Error::uplink(format!("creating folder {name}"), e))
    }

    async fn upload(
        &self,
        folder_id: &str,
        file: FilePayload,
    ) -> intake_core::Result<StoredObject> {
        let name = file.name.clone();
        self.upload_file(folder_id, file)
            .await
            .map_err(|e| intake_core::Error::uplink(format!("uploading {name}"), e))
    }
}

/// Drive search expression for a non-trashed folder named `name` directly
/// under `parent_id`.
pub fn folder_query(parent_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name = '{}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false",
        escape_query(parent_id),
        escape_query(name)
    )
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
