//! Archive naming and the zip container holding a batch's documents.

use std::{
    collections::BTreeSet,
    io::{Cursor, Write as _},
};

use chrono::NaiveDateTime;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    foundation::error::{CertError, CertResult},
    model::{CertificateKind, PrizeRank},
};

/// `{name}_{kind}[_{rank}]_certificate.pdf`, lower case.
///
/// Whitespace runs in the name collapse to one `_`; path separators become `_`
/// as well so an entry never lands in a subdirectory.
pub fn certificate_file_name(
    recipient: &str,
    kind: CertificateKind,
    rank: Option<PrizeRank>,
) -> String {
    let stem = recipient
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
        .to_lowercase();
    match rank {
        Some(rank) => format!("{stem}_{}_{}_certificate.pdf", kind.slug(), rank.slug()),
        None => format!("{stem}_{}_certificate.pdf", kind.slug()),
    }
}

/// Insert `_{row}` before the `_certificate.pdf` tail.
pub fn suffixed_file_name(file_name: &str, row: usize) -> String {
    match file_name.strip_suffix("_certificate.pdf") {
        Some(stem) => format!("{stem}_{row}_certificate.pdf"),
        None => format!("{file_name}_{row}"),
    }
}

pub fn archive_file_name(created_at: NaiveDateTime) -> String {
    format!("certificates_{}.zip", created_at.format("%Y%m%d_%H%M%S"))
}

/// A finished archive: its download name and the zip bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Entry names in insertion order.
    pub entries: Vec<String>,
}

/// Single-writer zip builder. Entry times are pinned so equal input gives equal bytes.
pub struct ArchiveWriter {
    file_name: String,
    zip: ZipWriter<Cursor<Vec<u8>>>,
    names: BTreeSet<String>,
    entries: Vec<String>,
}

impl ArchiveWriter {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            names: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one entry. A name already present is an archive error; nothing is overwritten.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> CertResult<()> {
        if self.names.contains(name) {
            return Err(CertError::archive(format!("duplicate entry '{name}'")));
        }
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        self.zip
            .start_file(name, options)
            .map_err(|e| CertError::archive(format!("start entry '{name}': {e}")))?;
        self.zip
            .write_all(bytes)
            .map_err(|e| CertError::archive(format!("write entry '{name}': {e}")))?;
        self.names.insert(name.to_string());
        self.entries.push(name.to_string());
        Ok(())
    }

    pub fn finish(self) -> CertResult<CertificateArchive> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| CertError::archive(format!("finalize archive: {e}")))?;
        Ok(CertificateArchive {
            file_name: self.file_name,
            bytes: cursor.into_inner(),
            entries: self.entries,
        })
    }
}
