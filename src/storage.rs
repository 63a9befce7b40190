use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, error};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::entity::now_millis;
use crate::error::ValidationError;

/// Largest accepted upload, 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// URL prefix the uploads directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

static MODEL_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(glb|gltf)$").expect("valid regex"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.-]").expect("valid regex"));
static STORED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+?)_(.+)$").expect("valid regex"));

/// A stored model file as exposed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub name: String,
    pub url: String,
    pub display_name: String,
}

impl StoredUpload {
    /// Describe an already stored file, deriving the display name from its `{millis}_` prefix.
    pub fn from_stored_name(name: &str) -> Self {
        let display_name = STORED_NAME
            .captures(name)
            .and_then(|c| c.get(2))
            .map_or(name, |m| m.as_str())
            .to_string();
        Self {
            name: name.to_string(),
            url: public_url(name),
            display_name,
        }
    }
}

pub fn public_url(name: &str) -> String {
    format!("{PUBLIC_PREFIX}/{name}")
}

pub fn is_model_file(name: &str) -> bool {
    MODEL_EXT.is_match(name)
}

/// Replace everything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

pub fn stored_name_for(original: &str, stamp_millis: i64) -> String {
    format!("{}_{}", stamp_millis, sanitize_file_name(original))
}

/// Flat directory of uploaded 3D models.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Validate the original name and open a temporary file for it.
    async fn begin(&self, original_name: &str) -> Result<PendingUpload>;

    /// Every stored `.glb`/`.gltf`, ordered by stored name.
    async fn list(&self) -> Result<Vec<StoredUpload>>;
}

#[derive(Clone, Debug)]
pub struct StorageImpl {
    root: PathBuf,
}

impl StorageImpl {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ensure_segment(segment: &str) -> Result<()> {
        if segment.is_empty() {
            bail!("file name must not be empty");
        }
        if segment.contains('/') || segment.contains('\\') {
            bail!("file name must be a single path segment: {}", segment);
        }
        if segment == "." || segment == ".." {
            bail!("file name must not be '.' or '..'");
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for StorageImpl {
    async fn begin(&self, original_name: &str) -> Result<PendingUpload> {
        if !is_model_file(original_name) {
            return Err(ValidationError::new("Only .glb or .gltf files are allowed").into());
        }
        let stored_name = stored_name_for(original_name, now_millis());
        Self::ensure_segment(&stored_name)?;
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create_dir_all {:?}", self.root))?;

        let final_path = self.root.join(&stored_name);
        let tmp_path = self
            .root
            .join(format!(".{}.{}.part", stored_name, Uuid::new_v4()));
        let file = File::create(&tmp_path)
            .await
            .with_context(|| format!("create temp file {:?}", tmp_path))?;
        Ok(PendingUpload {
            original_name: original_name.to_string(),
            stored_name,
            tmp_path,
            final_path,
            file: Some(file),
            written: 0,
        })
    }

    async fn list(&self) -> Result<Vec<StoredUpload>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("read_dir {:?}", self.root))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_model_file(&name) && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names
            .iter()
            .map(|n| StoredUpload::from_stored_name(n))
            .collect())
    }
}

/// An upload being streamed to disk; becomes visible only after [`PendingUpload::commit`].
#[derive(Debug)]
pub struct PendingUpload {
    original_name: String,
    stored_name: String,
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl PendingUpload {
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk. Exceeding [`MAX_UPLOAD_BYTES`] is a [`ValidationError`];
    /// the caller is expected to [`abort`](Self::abort) afterwards.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.written += chunk.len() as u64;
        if self.written > MAX_UPLOAD_BYTES {
            return Err(ValidationError::new("File too large (max 50 MiB)").into());
        }
        let Some(file) = self.file.as_mut() else {
            bail!("upload {} already closed", self.stored_name);
        };
        file.write_all(chunk)
            .await
            .with_context(|| format!("write {:?}", self.tmp_path))?;
        Ok(())
    }

    /// Flush, sync and move the temp file to its final name.
    /// On failure the temp file is removed and nothing becomes visible.
    pub async fn commit(mut self) -> Result<StoredUpload> {
        if let Err(e) = self.finish().await {
            self.discard().await;
            return Err(e);
        }
        debug!("wrote {} bytes to {:?}", self.written, self.final_path);
        Ok(StoredUpload {
            url: public_url(&self.stored_name),
            name: self.stored_name,
            display_name: self.original_name,
        })
    }

    /// Drop the partial file; missing files are fine.
    pub async fn abort(mut self) {
        self.discard().await;
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            // deferred write errors of tokio::fs::File surface here
            file.flush()
                .await
                .with_context(|| format!("flush {:?}", self.tmp_path))?;
            file.sync_all()
                .await
                .with_context(|| format!("sync {:?}", self.tmp_path))?;
        }
        fs::rename(&self.tmp_path, &self.final_path)
            .await
            .with_context(|| format!("rename {:?} -> {:?}", self.tmp_path, self.final_path))?;
        Ok(())
    }

    async fn discard(&mut self) {
        drop(self.file.take());
        match fs::remove_file(&self.tmp_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("remove_file {:?} error: {}", self.tmp_path, e),
        }
    }
}
