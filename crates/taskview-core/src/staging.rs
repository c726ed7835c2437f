//! Client-side staging of files before upload

use crate::backend::TaskBackend;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use taskview_api::UploadFile;

/// Where a staged file's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Read from disk at commit time
    Path(PathBuf),
    Memory(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub source: FileSource,
}

impl StagedFile {
    /// Stage a file on disk under its file name
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    async fn load(&self) -> Result<UploadFile> {
        let bytes = match &self.source {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| Error::ReadFile {
                        name: self.name.clone(),
                        source,
                    })?
            }
        };
        Ok(UploadFile::new(self.name.clone(), bytes))
    }
}

/// Files waiting to be uploaded, keyed by name
#[derive(Debug, Clone, Default)]
pub struct UploadStaging {
    files: Vec<StagedFile>,
}

impl UploadStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage files; a name already present is replaced in place
    pub fn add(&mut self, files: impl IntoIterator<Item = StagedFile>) {
        for file in files {
            match self.files.iter_mut().find(|f| f.name == file.name) {
                Some(existing) => *existing = file,
                None => self.files.push(file),
            }
        }
    }

    /// Unstage by name. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        self.files.len() != before
    }

    /// Drop everything without uploading
    pub fn cancel(&mut self) {
        self.files.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Upload every staged file in one request.
    ///
    /// On success the file names are appended to `prompt` and staging is
    /// cleared. On failure nothing changes. An empty set sends nothing and
    /// returns `Ok(None)`.
    pub async fn commit(
        &mut self,
        backend: &dyn TaskBackend,
        prompt: &mut String,
    ) -> Result<Option<serde_json::Value>> {
        if self.files.is_empty() {
            return Ok(None);
        }

        let mut payload = Vec::with_capacity(self.files.len());
        for file in &self.files {
            payload.push(file.load().await?);
        }

        let response = backend.upload(payload).await?;
        tracing::info!("uploaded {} files", self.files.len());

        prompt.push_str("\n\nUploaded files: ");
        prompt.push_str(&self.names().join(", "));
        self.files.clear();
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBackend};

    #[test]
    fn test_add_last_write_wins() {
        let mut staging = UploadStaging::new();
        staging.add([
            StagedFile::in_memory("a.txt", "one"),
            StagedFile::in_memory("b.txt", "two"),
        ]);
        staging.add([StagedFile::in_memory("a.txt", "three")]);

        assert_eq!(staging.names(), ["a.txt", "b.txt"]);
        assert_eq!(
            staging.files()[0].source,
            FileSource::Memory(b"three".to_vec())
        );
    }

    #[test]
    fn test_remove() {
        let mut staging = UploadStaging::new();
        assert!(!staging.remove("missing"));
        assert!(staging.is_empty());

        staging.add([StagedFile::in_memory("a", "x")]);
        assert!(!staging.remove("b"));
        assert!(staging.remove("a"));
        assert!(staging.is_empty());
    }

    #[test]
    fn test_from_path_uses_file_name() {
        let file = StagedFile::from_path("/tmp/some/dir/report.csv");
        assert_eq!(file.name, "report.csv");
    }

    #[tokio::test]
    async fn test_commit_single_request() {
        let backend = MockBackend::new();
        let mut staging = UploadStaging::new();
        staging.add([
            StagedFile::in_memory("a", "1"),
            StagedFile::in_memory("b", "2"),
        ]);
        staging.add([StagedFile::in_memory("a", "3")]);

        let mut prompt = "Summarize".to_string();
        let response = staging.commit(&backend, &mut prompt).await.unwrap();

        assert!(response.is_some());
        assert_eq!(prompt, "Summarize\n\nUploaded files: a, b");
        assert!(staging.is_empty());
        assert_eq!(
            backend.calls(),
            vec![Call::Upload(vec![
                UploadFile::new("a", "3"),
                UploadFile::new("b", "2"),
            ])]
        );
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_staging() {
        let backend = MockBackend::new();
        backend.fail_upload("disk full");
        let mut staging = UploadStaging::new();
        staging.add([StagedFile::in_memory("a", "1")]);

        let mut prompt = "p".to_string();
        let err = staging.commit(&backend, &mut prompt).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(prompt, "p");
        assert_eq!(staging.names(), ["a"]);
    }

    #[tokio::test]
    async fn test_commit_missing_file_sends_nothing() {
        let backend = MockBackend::new();
        let mut staging = UploadStaging::new();
        staging.add([StagedFile::from_path("/definitely/not/here.bin")]);

        let mut prompt = String::new();
        let err = staging.commit(&backend, &mut prompt).await.unwrap_err();
        assert!(matches!(err, Error::ReadFile { ref name, .. } if name == "here.bin"));
        assert!(backend.calls().is_empty());
        assert_eq!(staging.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_empty_is_noop() {
        let backend = MockBackend::new();
        let mut staging = UploadStaging::new();
        let mut prompt = "p".to_string();
        assert!(staging.commit(&backend, &mut prompt).await.unwrap().is_none());
        assert!(backend.calls().is_empty());
        assert_eq!(prompt, "p");
    }
}
