use std::io::Cursor;

use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::job::JobId;
use crate::report_store::{ReportStore, StoreError};

/// Fixed name of the merged archive, regardless of which source archive(s)
/// contributed.
pub const MERGED_REPORT_NAME: &str = "ReportsDC.zip";

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read archive {path}: {source}")]
    ZipRead {
        path: String,
        source: zip::result::ZipError,
    },
    #[error("failed to build merged archive: {0}")]
    ZipWrite(#[from] zip::result::ZipError),
    #[error("io error while merging: {0}")]
    Io(#[from] std::io::Error),
}

/// Replace the last `/`-segment of a source path with the merged-archive
/// name; a bare file name maps to just the merged-archive name.
pub fn canonical_report_name(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => format!("{}{}", &path[..=pos], MERGED_REPORT_NAME),
        None => MERGED_REPORT_NAME.to_string(),
    }
}

/// Combines a job's report archives into one archive under the canonical
/// name. Knows nothing about queues or job state.
#[derive(Debug, Default)]
pub struct ArchiveMerger;

impl ArchiveMerger {
    /// Either input may be absent. With both present, entries from the
    /// first archive precede entries from the second, names and bytes
    /// unmodified; duplicate names are written as-is. The destination is
    /// written exactly once, at the end, or not at all.
    pub async fn merge(
        &self,
        job_id: JobId,
        zip1: Option<&str>,
        zip2: Option<&str>,
        store: &dyn ReportStore,
        cancel: &CancellationToken,
    ) -> Result<(), MergeError> {
        match (non_empty(zip1), non_empty(zip2)) {
            (None, None) => {
                warn!(job_id, "cross loading can't find any reports for job");
                Ok(())
            }
            (Some(only), None) | (None, Some(only)) => {
                self.copy(job_id, only, store, cancel).await
            }
            (Some(first), Some(second)) => {
                self.union(job_id, first, second, store, cancel).await
            }
        }
    }

    /// Byte-for-byte copy of a lone report to the canonical name.
    async fn copy(
        &self,
        job_id: JobId,
        source: &str,
        store: &dyn ReportStore,
        cancel: &CancellationToken,
    ) -> Result<(), MergeError> {
        let destination = canonical_report_name(source);
        debug!(job_id, source, destination, "copying single report archive");
        let data = store.get(source, cancel).await?;
        store.put(&destination, data, cancel).await?;
        Ok(())
    }

    async fn union(
        &self,
        job_id: JobId,
        first: &str,
        second: &str,
        store: &dyn ReportStore,
        cancel: &CancellationToken,
    ) -> Result<(), MergeError> {
        let destination = canonical_report_name(first);
        debug!(job_id, first, second, destination, "merging report archives");

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        // One source archive buffered at a time; it is dropped before the
        // next fetch.
        for source in [first, second] {
            let data = store.get(source, cancel).await?;
            append_entries(&mut writer, source, data, options)?;
        }

        let cursor = writer.finish()?;
        store
            .put(&destination, Bytes::from(cursor.into_inner()), cancel)
            .await?;
        Ok(())
    }
}

fn append_entries(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    source: &str,
    data: Bytes,
    options: FileOptions,
) -> Result<(), MergeError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| MergeError::ZipRead {
        path: source.to_string(),
        source: e,
    })?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| MergeError::ZipRead {
            path: source.to_string(),
            source: e,
        })?;
        writer.start_file(entry.name().to_string(), options)?;
        std::io::copy(&mut entry, writer)?;
    }
    Ok(())
}

fn non_empty(path: Option<&str>) -> Option<&str> {
    path.filter(|p| !p.is_empty())
}
