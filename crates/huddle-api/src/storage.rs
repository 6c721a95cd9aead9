use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// A blob written to disk and the public URL it is served under.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub stored_name: String,
    pub url: String,
}

/// Local directory blob store. Files are written under generated names and
/// served statically under `url_prefix`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> anyhow::Result<StoredBlob> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating upload directory {}", self.root.display()))?;

        let stored_name = stored_name_for(original_name);
        let path = self.root.join(&stored_name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        file.flush().await?;

        debug!("Stored {} bytes as {}", bytes.len(), stored_name);
        Ok(StoredBlob {
            url: format!("{}/{}", self.url_prefix, stored_name),
            stored_name,
        })
    }

    /// Best-effort removal of a blob whose metadata never made it to the store.
    pub async fn remove(&self, stored_name: &str) {
        let path = self.root.join(stored_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove orphaned blob {}: {}", path.display(), e);
        }
    }
}

/// `<uuid>.<ext>`, keeping a short alphanumeric extension from the client's
/// file name and nothing else of it.
fn stored_name_for(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_a_safe_extension() {
        assert!(stored_name_for("Photo.JPG").ends_with(".jpg"));
        assert!(!stored_name_for("../../etc/passwd").contains('/'));
        assert!(!stored_name_for("evil.sh;rm -rf").contains(';'));
        assert!(!stored_name_for("noext").contains('.'));
    }

    #[tokio::test]
    async fn saves_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), "/uploads/chat/");

        let blob = store.save("report.pdf", b"%PDF").await.unwrap();
        assert!(blob.url.starts_with("/uploads/chat/"));
        assert!(blob.url.ends_with(".pdf"));
        assert_eq!(std::fs::read(dir.path().join(&blob.stored_name)).unwrap(), b"%PDF");

        store.remove(&blob.stored_name).await;
        assert!(!dir.path().join(&blob.stored_name).exists());
    }
}
