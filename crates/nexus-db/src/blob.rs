//! Filesystem blob store for generated artifacts.
//!
//! Objects live at `{root}/{path}`; content type, metadata and the published
//! flag are kept in a sidecar `{root}/{path}.meta.json`. Public URLs are
//! `{public_base_url}/{path}`; whatever serves them must go through
//! [`FilesystemBlobStore::read_public`] so unpublished objects stay hidden.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use nexus_core::{BlobMetadata, BlobStore, Error, ObjectRef, Result};

const SIDECAR_SUFFIX: &str = ".meta.json";
const TEMP_SUFFIX: &str = ".tmp";

/// Metadata persisted next to each object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobSidecar {
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub public: bool,
}

/// A published object ready to be served.
#[derive(Debug, Clone)]
pub struct PublicObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// [`BlobStore`] writing under a root directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a relative object path, rejecting anything that escapes the root.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let clean = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::InvalidInput(format!("Invalid blob path: {}", path)));
        }
        Ok(self.root.join(rel))
    }

    fn sidecar_path(full_path: &Path) -> PathBuf {
        let mut name = full_path.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Read an object's bytes.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.full_path(path)?).await?)
    }

    /// Read an object's sidecar metadata.
    pub async fn sidecar(&self, path: &str) -> Result<BlobSidecar> {
        let raw = fs::read(Self::sidecar_path(&self.full_path(path)?)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Read an object that has been made public.
    ///
    /// Unpublished objects, sidecars, staging files and invalid paths are all
    /// reported as [`Error::NotFound`].
    pub async fn read_public(&self, path: &str) -> Result<PublicObject> {
        let not_found = || Error::NotFound(format!("Blob {}", path));
        if path.ends_with(SIDECAR_SUFFIX) || path.ends_with(TEMP_SUFFIX) {
            return Err(not_found());
        }
        let full_path = self.full_path(path).map_err(|_| not_found())?;

        let sidecar = self.sidecar(path).await.map_err(|_| not_found())?;
        if !sidecar.public {
            debug!(
                subsystem = "db",
                component = "blob_store",
                storage_path = %path,
                "Refusing to serve unpublished blob"
            );
            return Err(not_found());
        }

        let data = fs::read(&full_path).await.map_err(|_| not_found())?;
        Ok(PublicObject {
            content_type: sidecar.content_type,
            data,
        })
    }

    async fn write_atomic(full_path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob_store: create_dir_all failed");
                e
            })?;
        }

        // temp file + rename so readers never see a partial object
        let mut temp_name = full_path.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "blob_store: rename failed");
            e
        })?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn write(&self, path: &str, data: &[u8], metadata: BlobMetadata) -> Result<ObjectRef> {
        let full_path = self.full_path(path)?;
        debug!(
            subsystem = "db",
            component = "blob_store",
            op = "write",
            storage_path = %path,
            size = data.len(),
            "Writing blob"
        );

        Self::write_atomic(&full_path, data).await?;

        let sidecar = BlobSidecar {
            content_type: metadata.content_type,
            metadata: metadata.metadata,
            public: false,
        };
        Self::write_atomic(&Self::sidecar_path(&full_path), &serde_json::to_vec(&sidecar)?)
            .await?;

        Ok(ObjectRef {
            path: path.to_string(),
            size_bytes: data.len() as u64,
        })
    }

    async fn make_public(&self, object: &ObjectRef) -> Result<String> {
        let full_path = self.full_path(&object.path)?;
        if !fs::try_exists(&full_path).await? {
            return Err(Error::NotFound(format!("Blob {}", object.path)));
        }

        let mut sidecar = self.sidecar(&object.path).await?;
        if !sidecar.public {
            sidecar.public = true;
            Self::write_atomic(&Self::sidecar_path(&full_path), &serde_json::to_vec(&sidecar)?)
                .await?;
        }

        Ok(format!("{}/{}", self.public_base_url, object.path))
    }
}
