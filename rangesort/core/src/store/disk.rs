use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, error, warn};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_stream::wrappers::LinesStream;

use crate::error::{RangeSortError, Result};
use crate::row::Row;

use super::{RowStream, RowWriter, SendableRowWriter, Store, WriteStats};

const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Store backed by a directory tree on the local filesystem.
///
/// Store paths are resolved relative to `root`; a leading `/` is ignored and
/// `..` is rejected. Containers are directories and fragments are the files
/// inside them.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(RangeSortError::General(format!(
                "Invalid store path {path:?}"
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn create_writer(&self, path: &str, target: PathBuf) -> Result<SendableRowWriter> {
        let parent = target.parent().ok_or_else(|| {
            RangeSortError::Internal(format!("Store path {path:?} has no parent"))
        })?;
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RangeSortError::General(format!("Invalid store path {path:?}")))?;
        let staging = parent.join(format!(".{file_name}.{}.inprogress", uuid::Uuid::new_v4()));

        let file = File::create(&staging).await.map_err(|e| {
            error!("Failed to create staging file for {}: {:?}", path, e);
            RangeSortError::store_io(path, e)
        })?;

        Ok(Box::new(LocalRowWriter {
            path: path.to_owned(),
            staging,
            target,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            stats: WriteStats::default(),
        }))
    }
}

/// Writes to a hidden staging file next to the target and renames it into
/// place on finish.
struct LocalRowWriter {
    path: String,
    staging: PathBuf,
    target: PathBuf,
    writer: Option<BufWriter<File>>,
    stats: WriteStats,
}

impl LocalRowWriter {
    fn closed_error(&self) -> RangeSortError {
        RangeSortError::Internal(format!("Writer for {} is already closed", self.path))
    }
}

async fn commit(mut writer: BufWriter<File>, staging: &Path, target: &Path) -> io::Result<()> {
    writer.flush().await?;
    writer.get_mut().sync_all().await?;
    drop(writer);
    fs::rename(staging, target).await
}

#[async_trait]
impl RowWriter for LocalRowWriter {
    async fn write_row(&mut self, row: &Row) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed_error());
        };
        writer
            .write_all(row.as_str().as_bytes())
            .await
            .map_err(|e| RangeSortError::store_io(&self.path, e))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| RangeSortError::store_io(&self.path, e))?;
        self.stats.record(row);
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<WriteStats> {
        let Some(writer) = self.writer.take() else {
            return Err(self.closed_error());
        };
        if let Err(e) = commit(writer, &self.staging, &self.target).await {
            error!("Failed to commit {}: {:?}", self.path, e);
            let _ = fs::remove_file(&self.staging).await;
            return Err(RangeSortError::store_io(&self.path, e));
        }
        debug!("Committed {} ({})", self.path, self.stats);
        Ok(self.stats)
    }

    async fn abort(mut self: Box<Self>) {
        drop(self.writer.take());
        if let Err(e) = fs::remove_file(&self.staging).await {
            warn!("Failed to discard staging file for {}: {:?}", self.path, e);
        }
    }
}

impl Drop for LocalRowWriter {
    fn drop(&mut self) {
        // neither finished nor aborted
        if self.writer.take().is_some() {
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}

/// Opens one file as a stream of rows.
async fn open_lines(full_path: PathBuf, path: String) -> Result<RowStream> {
    let file = File::open(&full_path)
        .await
        .map_err(|e| RangeSortError::store_io(&path, e))?;
    let lines = LinesStream::new(BufReader::new(file).lines()).map(move |line| {
        line.map(Row::from)
            .map_err(|e| RangeSortError::store_io(&path, e))
    });
    Ok(Box::pin(lines))
}

fn is_staging_file(name: &str) -> bool {
    name.starts_with('.')
}

#[async_trait]
impl Store for LocalFsStore {
    async fn create_file(&self, path: &str) -> Result<SendableRowWriter> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RangeSortError::store_io(path, e))?;
        }
        self.create_writer(path, target).await
    }

    async fn open_file(&self, path: &str) -> Result<RowStream> {
        open_lines(self.resolve(path)?, path.to_owned()).await
    }

    async fn create_container(&self, path: &str) -> Result<()> {
        let dir = self.resolve(path)?;
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RangeSortError::store_io(path, e))?;
        }
        fs::create_dir(&dir)
            .await
            .map_err(|e| RangeSortError::store_io(path, e))
    }

    async fn create_fragment(
        &self,
        container: &str,
        name: &str,
    ) -> Result<SendableRowWriter> {
        let dir = self.resolve(container)?;
        let path = format!("{}/{name}", container.trim_end_matches('/'));
        if !fs::metadata(&dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(RangeSortError::store_io(
                container,
                io::Error::new(io::ErrorKind::NotFound, "container does not exist"),
            ));
        }
        let target = self.resolve(&path)?;
        self.create_writer(&path, target).await
    }

    async fn list_fragments(&self, container: &str) -> Result<Vec<String>> {
        let dir = self.resolve(container)?;
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| RangeSortError::store_io(container, e))?;

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RangeSortError::store_io(container, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                warn!("Skipping non UTF-8 entry in {container}");
                continue;
            };
            if !is_staging_file(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open_container(&self, container: &str) -> Result<RowStream> {
        let dir = self.resolve(container)?;
        let container = container.trim_end_matches('/').to_owned();
        let fragments = self.list_fragments(&container).await?;

        let stream = stream::iter(fragments)
            .then(move |name| {
                let full_path = dir.join(&name);
                let path = format!("{container}/{name}");
                open_lines(full_path, path)
            })
            .try_flatten();
        Ok(Box::pin(stream))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve(path)?;
        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|e| RangeSortError::store_io(path, e))?;
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        };
        removed.map_err(|e| {
            error!("Failed to delete {}: {:?}", path, e);
            RangeSortError::store_io(path, e)
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        fs::try_exists(self.resolve(path)?)
            .await
            .map_err(|e| RangeSortError::store_io(path, e))
    }

    async fn file_size(&self, path: &str) -> Result<u64> {
        let metadata = fs::metadata(self.resolve(path)?)
            .await
            .map_err(|e| RangeSortError::store_io(path, e))?;
        Ok(metadata.len())
    }
}
