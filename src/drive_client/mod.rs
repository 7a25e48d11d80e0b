use anyhow::Context;
use reqwest::{StatusCode, multipart};
use serde::{Deserialize, Serialize};

use crate::domain::models::ProgressMap;

const EPUB_QUERY: &str = "mimeType='application/epub+zip' and trashed=false";
const FOLDER_QUERY: &str = "mimeType='application/vnd.google-apps.folder' and trashed=false";
const PROGRESS_FILE_NAME: &str = "progress.json";
const APP_DATA_FOLDER: &str = "appDataFolder";

#[derive(Clone, Debug)]
pub struct DriveClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl DriveClient {
    /// Create a new client for the given API base (e.g. "https://www.googleapis.com").
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating DriveClient");
        Ok(DriveClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            access_token: None,
            client,
        })
    }

    /// Return a client with the provided OAuth access token set (Bearer)
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send and fail on non-2xx with the response body as the error message.
    async fn send(req: reqwest::RequestBuilder) -> anyhow::Result<reqwest::Response> {
        Self::check(req.send().await?).await
    }

    async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Drive returned {status}: {body}")
    }

    /// GET /drive/v3/files with the given query
    async fn list_files<T>(&self, query: &[(&str, &str)]) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.url("/drive/v3/files");
        let req = self.authorized(self.client.get(&url)).query(query);
        let body = Self::send(req).await?.text().await?;
        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                let snippet_len = body.len().min(2000);
                let snippet = body.get(..snippet_len).unwrap_or_default();
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse Drive file list");
                Err(e.into())
            }
        }
    }

    /// All non-trashed EPUBs, most recently modified first
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_epubs(&self) -> anyhow::Result<Vec<DriveFile>> {
        let list: DriveFileList = self
            .list_files(&[
                ("q", EPUB_QUERY),
                ("fields", "files(id,name,modifiedTime,parents,size,iconLink)"),
                ("pageSize", "1000"),
                ("orderBy", "modifiedTime desc"),
            ])
            .await
            .context("Failed to list EPUB files")?;
        tracing::debug!(count = list.files.len(), "received epub list");
        Ok(list.files)
    }

    /// All non-trashed folders, used to resolve EPUB paths
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list_folders(&self) -> anyhow::Result<Vec<DriveFolder>> {
        let list: DriveFolderList = self
            .list_files(&[
                ("q", FOLDER_QUERY),
                ("fields", "files(id,name,parents)"),
                ("pageSize", "1000"),
            ])
            .await
            .context("Failed to list folders")?;
        tracing::debug!(count = list.files.len(), "received folder list");
        Ok(list.files)
    }

    /// GET /drive/v3/files/{id}?alt=media
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn download(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.url(&format!("/drive/v3/files/{}", file_id));
        let req = self
            .authorized(self.client.get(&url))
            .query(&[("alt", "media")]);
        let bytes = Self::send(req)
            .await
            .with_context(|| format!("Failed to download file {}", file_id))?
            .bytes()
            .await?;
        tracing::debug!(%file_id, size = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }

    /// Id of `progress.json` in the application data folder, if it exists
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn find_progress_file(&self) -> anyhow::Result<Option<String>> {
        let list: AppDataFileList = self
            .list_files(&[("spaces", APP_DATA_FOLDER), ("fields", "files(id,name)")])
            .await
            .context("Failed to list application data folder")?;
        Ok(list
            .files
            .into_iter()
            .find(|f| f.name == PROGRESS_FILE_NAME)
            .map(|f| f.id))
    }

    /// Read the whole remote progress document. `None` means it was never created.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load_progress(&self) -> anyhow::Result<Option<ProgressMap>> {
        let Some(file_id) = self.find_progress_file().await? else {
            return Ok(None);
        };
        let url = self.url(&format!("/drive/v3/files/{}", file_id));
        let resp = self
            .authorized(self.client.get(&url))
            .query(&[("alt", "media")])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::check(resp)
            .await
            .context("Failed to download remote progress")?
            .text()
            .await?;
        let map = ProgressMap::from_json_lenient(&body).context("Remote progress is malformed")?;
        tracing::debug!(entries = map.len(), "loaded remote progress");
        Ok(Some(map))
    }

    /// Replace the whole remote progress document, creating it on first upload.
    #[tracing::instrument(level = "debug", skip(self, progress), fields(entries = progress.len()))]
    pub async fn save_progress(&self, progress: &ProgressMap) -> anyhow::Result<()> {
        let file_id = self.find_progress_file().await?;
        let metadata = UploadMetadata {
            name: PROGRESS_FILE_NAME,
            mime_type: "application/json",
            parents: match file_id {
                Some(_) => None,
                None => Some(vec![APP_DATA_FOLDER]),
            },
        };
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(serde_json::to_string(&metadata)?)
                    .mime_str("application/json")?,
            )
            .part(
                "file",
                multipart::Part::text(progress.to_json()?).mime_str("application/json")?,
            );

        let req = match &file_id {
            Some(id) => self.client.patch(self.url(&format!("/upload/drive/v3/files/{}", id))),
            None => self.client.post(self.url("/upload/drive/v3/files")),
        };
        let req = self
            .authorized(req)
            .query(&[("uploadType", "multipart")])
            .multipart(form);
        Self::send(req).await.context("Failed to upload progress")?;
        tracing::debug!(created = file_id.is_none(), "saved remote progress");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<&'a str>>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub modified_time: Option<String>,
    pub parents: Option<Vec<String>>,
    /// Decimal string, as Drive reports it
    pub size: Option<String>,
    pub icon_link: Option<String>,
}

impl DriveFile {
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.as_ref()?.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct DriveFolderList {
    #[serde(default)]
    pub files: Vec<DriveFolder>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
    pub parents: Option<Vec<String>>,
}

impl DriveFolder {
    pub fn first_parent(&self) -> Option<&str> {
        self.parents.as_ref()?.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct AppDataFileList {
    #[serde(default)]
    files: Vec<AppDataFile>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct AppDataFile {
    id: String,
    name: String,
}
