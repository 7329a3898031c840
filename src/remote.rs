use std::{
    fs::File,
    io::{Read as _, Write as _},
    path::Path,
    time::Duration,
};

use crate::error::{MotionvizError, MotionvizResult};

const CONNECT_TIMEOUT_MS: u64 = 30_000;
const DOWNLOAD_CHUNK: usize = 1 << 20;

/// One object in the remote listing. Immutable; owned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteItem {
    /// Hierarchical object name, e.g. `uncompressed/scenario/training/xyz`.
    pub name: String,
    pub size: u64,
}

impl RemoteItem {
    /// Filesystem-safe name; doubles as the key correlating an item to its
    /// final artifact.
    pub fn local_name(&self) -> String {
        self.name.replace('/', "_")
    }
}

/// Progress callback: `(bytes_so_far, bytes_total)`.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, u64);

/// Boundary to the object store. Listing failures are fatal to a run;
/// download failures are isolated per item by the pipeline.
pub trait RemoteStore {
    fn list(&self) -> MotionvizResult<Vec<RemoteItem>>;

    fn download(
        &self,
        item: &RemoteItem,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> MotionvizResult<()>;
}

/// Google Cloud Storage over the public JSON API (no gcloud credentials
/// needed for a public bucket).
pub struct GcsStore {
    agent: ureq::Agent,
    bucket: String,
    prefix: String,
}

#[derive(Debug, serde::Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ObjectMeta {
    name: String,
    // The JSON API reports object size as a decimal string.
    #[serde(default)]
    size: Option<String>,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .build();
        Self {
            agent,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    fn list_url(&self, page_token: Option<&str>) -> String {
        let mut url = format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o?prefix={}&fields=items(name,size),nextPageToken",
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&self.prefix),
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn media_url(&self, name: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}?alt=media",
            urlencoding::encode(&self.bucket),
            urlencoding::encode(name),
        )
    }
}

impl RemoteStore for GcsStore {
    #[tracing::instrument(skip(self), fields(bucket = %self.bucket, prefix = %self.prefix))]
    fn list(&self) -> MotionvizResult<Vec<RemoteItem>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(page_token.as_deref());
            let resp = match self.agent.get(&url).call() {
                Ok(resp) => resp,
                Err(ureq::Error::Status(code, resp)) => {
                    let text = resp.into_string().unwrap_or_default();
                    return Err(MotionvizError::remote(format!(
                        "list objects failed with status {code}: {}",
                        text.trim()
                    )));
                }
                Err(err) => {
                    return Err(MotionvizError::remote(format!("list request failed: {err}")));
                }
            };

            let page: ListResponse = resp
                .into_json()
                .map_err(|e| MotionvizError::remote(format!("parse listing response: {e}")))?;

            for meta in page.items {
                // Directory placeholders end with '/'.
                if meta.name.ends_with('/') {
                    continue;
                }
                let size = meta
                    .size
                    .as_deref()
                    .map(|s| {
                        s.parse::<u64>().map_err(|_| {
                            MotionvizError::remote(format!(
                                "object '{}' has non-numeric size '{s}'",
                                meta.name
                            ))
                        })
                    })
                    .transpose()?
                    .unwrap_or(0);
                out.push(RemoteItem {
                    name: meta.name,
                    size,
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(count = out.len(), "listed remote objects");
        Ok(out)
    }

    fn download(
        &self,
        item: &RemoteItem,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> MotionvizResult<()> {
        tracing::info!(name = %item.name, size = item.size, "downloading object");

        let url = self.media_url(&item.name);
        let resp = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                return Err(MotionvizError::remote(format!(
                    "download '{}' failed with status {code}: {}",
                    item.name,
                    text.trim()
                )));
            }
            Err(err) => {
                return Err(MotionvizError::remote(format!(
                    "download '{}' request failed: {err}",
                    item.name
                )));
            }
        };

        let mut reader = resp.into_reader();
        let mut file = File::create(dest)
            .map_err(|e| MotionvizError::remote(format!("create '{}': {e}", dest.display())))?;

        let mut buf = vec![0u8; DOWNLOAD_CHUNK];
        let mut written: u64 = 0;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| MotionvizError::remote(format!("read '{}': {e}", item.name)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .map_err(|e| MotionvizError::remote(format!("write '{}': {e}", dest.display())))?;
            written += n as u64;
            progress(written, item.size);
        }

        file.flush()
            .map_err(|e| MotionvizError::remote(format!("flush '{}': {e}", dest.display())))?;
        Ok(())
    }
}
