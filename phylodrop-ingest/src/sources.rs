//! Dropped-file handles
//!
//! A dropped file is a raw name plus a lazily-read body. Reads are async
//! and independent per file: a stalled read blocks only that file's
//! consumer, never the rest of a batch.

use std::path::PathBuf;
use std::sync::Arc;

/// External decompression transform applied to file content flagged as
/// compressed during classification. The pipeline itself never inflates
/// anything; callers inject whatever stream transform their platform
/// provides.
pub type Decompressor = Arc<dyn Fn(Vec<u8>) -> std::io::Result<Vec<u8>> + Send + Sync>;

/// Content source of a dropped file.
#[derive(Debug, Clone)]
pub enum FileBody {
    /// Content already in memory (e.g. handed over by the browser drop)
    Memory(Vec<u8>),
    /// Content on local disk, read on demand
    Disk(PathBuf),
}

/// A user-dropped file: raw name plus content source.
#[derive(Debug, Clone)]
pub struct DroppedFile {
    name: String,
    body: FileBody,
}

impl DroppedFile {
    pub fn from_memory(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: FileBody::Memory(content.into()),
        }
    }

    pub fn from_disk(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            body: FileBody::Disk(path.into()),
        }
    }

    /// The raw name the file was dropped with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the file content. Suspends until the content is available or
    /// the read fails.
    pub async fn bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.body {
            FileBody::Memory(bytes) => Ok(bytes.clone()),
            FileBody::Disk(path) => tokio::fs::read(path).await,
        }
    }
}
