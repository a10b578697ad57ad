//! Durable cache collaborator: scoped read/write of opaque JSON blobs
//! under issuer/key-derived filesystem-safe paths, with an out-of-band
//! "last saved at" marker per blob and a bundled read-only seed tier.

pub mod error;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

pub use error::{StorageError, StorageResult};

/// Suffix of the sidecar file recording when a blob was last written.
const MARKER_SUFFIX: &str = ".saved_at";

/// Interface for persisting and loading cached trust documents.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Reads a blob from the durable cache. `Ok(None)` means not present.
    async fn read(&self, group: &str, file: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes a blob, creating the group directory as needed, and stamps
    /// the blob's saved-at marker.
    async fn write(&self, group: &str, file: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Removes a blob and its marker. Missing files are not an error.
    async fn remove(&self, group: &str, file: &str) -> StorageResult<()>;

    async fn exists(&self, group: &str, file: &str) -> bool;

    /// Blob file names in a group, markers excluded.
    async fn list(&self, group: &str) -> StorageResult<Vec<String>>;

    /// Immediate subdirectory names of a group.
    async fn list_groups(&self, group: &str) -> StorageResult<Vec<String>>;

    /// Reads from the bundled read-only seed copy.
    async fn read_seed(&self, group: &str, file: &str) -> StorageResult<Option<Vec<u8>>>;

    /// When the blob was last written, if a marker exists and parses.
    async fn read_marker(&self, group: &str, file: &str) -> Option<DateTime<Utc>>;

    async fn write_marker(
        &self,
        group: &str,
        file: &str,
        saved_at: DateTime<Utc>,
    ) -> StorageResult<()>;
}

/// File-backed cache repository. Blobs live at `<root>/<group>/<file>`;
/// markers are `<file>.saved_at` sidecars holding an RFC 3339 timestamp.
#[derive(Debug, Clone)]
pub struct FileCacheRepository {
    root: PathBuf,
    seed_root: Option<PathBuf>,
}

impl FileCacheRepository {
    pub fn new(root: PathBuf, seed_root: Option<PathBuf>) -> Self {
        Self { root, seed_root }
    }

    fn blob_path(&self, group: &str, file: &str) -> PathBuf {
        self.root.join(group).join(file)
    }

    fn marker_path(&self, group: &str, file: &str) -> PathBuf {
        self.root.join(group).join(format!("{file}{MARKER_SUFFIX}"))
    }

    async fn read_at(path: &Path) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl CacheRepository for FileCacheRepository {
    async fn read(&self, group: &str, file: &str) -> StorageResult<Option<Vec<u8>>> {
        Self::read_at(&self.blob_path(group, file)).await
    }

    async fn write(&self, group: &str, file: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(group, file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "cached blob written");
        self.write_marker(group, file, Utc::now()).await
    }

    async fn remove(&self, group: &str, file: &str) -> StorageResult<()> {
        for path in [self.blob_path(group, file), self.marker_path(group, file)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn exists(&self, group: &str, file: &str) -> bool {
        fs::try_exists(self.blob_path(group, file))
            .await
            .unwrap_or(false)
    }

    async fn list(&self, group: &str) -> StorageResult<Vec<String>> {
        let dir = self.root.join(group);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_file() && !name.ends_with(MARKER_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn list_groups(&self, group: &str) -> StorageResult<Vec<String>> {
        let dir = self.root.join(group);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_seed(&self, group: &str, file: &str) -> StorageResult<Option<Vec<u8>>> {
        let Some(seed_root) = &self.seed_root else {
            return Ok(None);
        };
        Self::read_at(&seed_root.join(group).join(file)).await
    }

    async fn read_marker(&self, group: &str, file: &str) -> Option<DateTime<Utc>> {
        let path = self.marker_path(group, file);
        let raw = fs::read_to_string(&path).await.ok()?;
        match raw.trim().parse::<DateTime<Utc>>() {
            Ok(saved_at) => Some(saved_at),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable saved-at marker ignored");
                None
            }
        }
    }

    async fn write_marker(
        &self,
        group: &str,
        file: &str,
        saved_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let path = self.marker_path(group, file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, saved_at.to_rfc3339()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(dir: &tempfile::TempDir) -> FileCacheRepository {
        FileCacheRepository::new(dir.path().to_path_buf(), None)
    }

    #[tokio::test]
    async fn blob_round_trip_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        assert!(repo.read("rules", "rules.json").await.unwrap().is_none());
        assert!(repo.read_marker("rules", "rules.json").await.is_none());

        repo.write("rules", "rules.json", b"{\"ok\":true}")
            .await
            .unwrap();

        assert_eq!(
            repo.read("rules", "rules.json").await.unwrap().unwrap(),
            b"{\"ok\":true}"
        );
        assert!(repo.exists("rules", "rules.json").await);
        let marker = repo.read_marker("rules", "rules.json").await.unwrap();
        assert!(Utc::now().signed_duration_since(marker).num_seconds() < 5);
    }

    #[tokio::test]
    async fn listing_skips_markers_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        repo.write("crl/issuer-a", "key-1.json", b"{}").await.unwrap();
        repo.write("crl/issuer-a", "key-2.json", b"{}").await.unwrap();
        repo.write("crl/issuer-b", "key-9.json", b"{}").await.unwrap();

        assert_eq!(
            repo.list("crl/issuer-a").await.unwrap(),
            vec!["key-1.json", "key-2.json"]
        );
        assert_eq!(
            repo.list_groups("crl").await.unwrap(),
            vec!["issuer-a", "issuer-b"]
        );
        assert!(repo.list("crl/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_blob_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir);

        repo.write("crl/issuer-a", "key-1.json", b"{}").await.unwrap();
        repo.remove("crl/issuer-a", "key-1.json").await.unwrap();

        assert!(!repo.exists("crl/issuer-a", "key-1.json").await);
        assert!(repo.read_marker("crl/issuer-a", "key-1.json").await.is_none());
        // Removing again stays quiet.
        repo.remove("crl/issuer-a", "key-1.json").await.unwrap();
    }

    #[tokio::test]
    async fn seed_tier_is_read_only_fallback() {
        let seed = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(seed.path().join("rules")).unwrap();
        std::fs::write(seed.path().join("rules/rules.json"), b"seeded").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let repo = FileCacheRepository::new(
            dir.path().to_path_buf(),
            Some(seed.path().to_path_buf()),
        );

        assert_eq!(
            repo.read_seed("rules", "rules.json").await.unwrap().unwrap(),
            b"seeded"
        );
        assert!(repo.read("rules", "rules.json").await.unwrap().is_none());
    }
}
