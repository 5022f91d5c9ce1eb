use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;

use crate::error::{RangeSortError, Result};
use crate::row::Row;

use super::{RowStream, RowWriter, SendableRowWriter, Store, WriteStats};

#[derive(Debug, Clone)]
enum Entry {
    File(Arc<Vec<Row>>),
    Container,
}

/// Store keeping every object in process memory. Cloning shares the contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(path: &str) -> String {
    path.trim_end_matches('/').to_owned()
}

fn not_found(path: &str, what: &str) -> RangeSortError {
    RangeSortError::store_io(
        path,
        io::Error::new(io::ErrorKind::NotFound, format!("{what} does not exist")),
    )
}

/// Buffers rows and inserts them into the map on finish.
struct MemoryRowWriter {
    path: String,
    rows: Vec<Row>,
    stats: WriteStats,
    entries: Arc<DashMap<String, Entry>>,
}

#[async_trait]
impl RowWriter for MemoryRowWriter {
    async fn write_row(&mut self, row: &Row) -> Result<()> {
        self.stats.record(row);
        self.rows.push(row.clone());
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<WriteStats> {
        let MemoryRowWriter {
            path,
            rows,
            stats,
            entries,
        } = *self;
        entries.insert(path, Entry::File(Arc::new(rows)));
        Ok(stats)
    }

    async fn abort(self: Box<Self>) {}
}

impl InMemoryStore {
    fn writer(&self, path: String) -> SendableRowWriter {
        Box::new(MemoryRowWriter {
            path,
            rows: vec![],
            stats: WriteStats::default(),
            entries: self.entries.clone(),
        })
    }

    fn file(&self, path: &str) -> Result<Arc<Vec<Row>>> {
        match self.entries.get(&normalize(path)).as_deref() {
            Some(Entry::File(rows)) => Ok(rows.clone()),
            _ => Err(not_found(path, "file")),
        }
    }

    fn is_container(&self, path: &str) -> bool {
        matches!(
            self.entries.get(&normalize(path)).as_deref(),
            Some(Entry::Container)
        )
    }
}

fn row_stream(rows: Arc<Vec<Row>>) -> RowStream {
    let len = rows.len();
    Box::pin(stream::iter((0..len).map(move |i| Ok(rows[i].clone()))))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_file(&self, path: &str) -> Result<SendableRowWriter> {
        Ok(self.writer(normalize(path)))
    }

    async fn open_file(&self, path: &str) -> Result<RowStream> {
        Ok(row_stream(self.file(path)?))
    }

    async fn create_container(&self, path: &str) -> Result<()> {
        use dashmap::mapref::entry::Entry as MapEntry;

        match self.entries.entry(normalize(path)) {
            MapEntry::Occupied(_) => Err(RangeSortError::store_io(
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path already exists"),
            )),
            MapEntry::Vacant(entry) => {
                entry.insert(Entry::Container);
                Ok(())
            }
        }
    }

    async fn create_fragment(
        &self,
        container: &str,
        name: &str,
    ) -> Result<SendableRowWriter> {
        if !self.is_container(container) {
            return Err(not_found(container, "container"));
        }
        Ok(self.writer(format!("{}/{name}", normalize(container))))
    }

    async fn list_fragments(&self, container: &str) -> Result<Vec<String>> {
        if !self.is_container(container) {
            return Err(not_found(container, "container"));
        }
        let prefix = format!("{}/", normalize(container));
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let name = entry.key().strip_prefix(&prefix)?;
                (!name.contains('/') && matches!(entry.value(), Entry::File(_)))
                    .then(|| name.to_owned())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    async fn open_container(&self, container: &str) -> Result<RowStream> {
        let container = normalize(container);
        let mut rows = vec![];
        for name in self.list_fragments(&container).await? {
            rows.extend(self.file(&format!("{container}/{name}"))?.iter().cloned());
        }
        Ok(row_stream(Arc::new(rows)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        if self.entries.remove(&path).is_none() {
            return Err(not_found(&path, "path"));
        }
        let prefix = format!("{path}/");
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.entries.contains_key(&normalize(path)))
    }

    async fn file_size(&self, path: &str) -> Result<u64> {
        Ok(self
            .file(path)?
            .iter()
            .map(|row| row.encoded_len() as u64)
            .sum())
    }
}
