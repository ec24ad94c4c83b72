//! On-disk collections of descriptor records keyed by id.
//!
//! Two layouts are supported:
//! - single file: every record blob appended to `descriptor.bin`, located by
//!   the side index `descriptor.pos` (`count` line, then
//!   `<id>\t<offset>\t<size>` per line, `#` lines ignored);
//! - one file per id: `<id>.bin`.
//!
//! A blob is the concatenation of the records written for one id (e.g. one per
//! keyframe of a video) and must be consumed exactly when read back.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec;
use crate::descriptors::LocalDescriptorSet;
use crate::error::{StoreError, StoreResult};

pub const SINGLE_FILE_DATA: &str = "descriptor.bin";
pub const SINGLE_FILE_INDEX: &str = "descriptor.pos";
const INDEX_HEADER: &str = "#localmatch descriptor index v1";
const PER_ID_EXTENSION: &str = "bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLayout {
    SingleFile,
    PerId,
}

/// Location of one blob inside `descriptor.bin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub offset: u64,
    pub size: u64,
}

/// Writes record blobs in either layout.
pub struct DescriptorWriter {
    dir: PathBuf,
    layout: StoreLayout,
    data: Option<BufWriter<File>>,
    entries: Vec<IndexEntry>,
    total_bytes: u64,
}

impl DescriptorWriter {
    pub fn create(dir: impl AsRef<Path>, layout: StoreLayout) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let data = match layout {
            StoreLayout::SingleFile => Some(BufWriter::new(File::create(
                dir.join(SINGLE_FILE_DATA),
            )?)),
            StoreLayout::PerId => None,
        };
        Ok(Self {
            dir,
            layout,
            data,
            entries: Vec::new(),
            total_bytes: 0,
        })
    }

    /// Write every set of `sets` as one blob under `id`; returns the blob size.
    pub fn write(&mut self, id: &str, sets: &[LocalDescriptorSet]) -> StoreResult<u64> {
        let mut blob = Vec::with_capacity(sets.iter().map(codec::size_of).sum());
        for set in sets {
            codec::serialize(set, &mut blob);
        }
        let size = blob.len() as u64;
        match &mut self.data {
            Some(out) => {
                out.write_all(&blob)?;
                self.entries.push(IndexEntry {
                    id: id.to_string(),
                    offset: self.total_bytes,
                    size,
                });
            }
            None => {
                let path = self.dir.join(format!("{id}.{PER_ID_EXTENSION}"));
                fs::write(path, &blob)?;
            }
        }
        self.total_bytes += size;
        debug!(id, records = sets.len(), bytes = size, "wrote descriptor blob");
        Ok(size)
    }

    /// Flush data and, for the single-file layout, write the side index.
    pub fn finish(mut self) -> StoreResult<()> {
        if let Some(mut out) = self.data.take() {
            out.flush()?;
            let mut index = BufWriter::new(File::create(self.dir.join(SINGLE_FILE_INDEX))?);
            writeln!(index, "{INDEX_HEADER}")?;
            writeln!(index, "{}", self.entries.len())?;
            for entry in &self.entries {
                writeln!(index, "{}\t{}\t{}", entry.id, entry.offset, entry.size)?;
            }
            index.flush()?;
        }
        debug!(
            layout = ?self.layout,
            bytes = self.total_bytes,
            "descriptor store closed"
        );
        Ok(())
    }
}

/// Parse a side index. Entries come back sorted by id.
pub fn parse_index(text: &str) -> StoreResult<Vec<IndexEntry>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (count_line, count_text) = lines.next().ok_or(StoreError::IndexFormat {
        line: 0,
        message: "missing entry count".to_string(),
    })?;
    let count: usize = count_text.trim().parse().map_err(|_| StoreError::IndexFormat {
        line: count_line,
        message: format!("invalid entry count {count_text:?}"),
    })?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let (line, text) = lines.next().ok_or(StoreError::IndexFormat {
            line: count_line,
            message: format!("expected {count} entries, found {}", entries.len()),
        })?;
        let malformed = |message: String| StoreError::IndexFormat { line, message };
        let mut fields = text.split('\t');
        let (Some(id), Some(offset), Some(size), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed(format!("expected 3 tab-separated fields in {text:?}")));
        };
        let offset = offset
            .parse()
            .map_err(|_| malformed(format!("invalid offset {offset:?}")))?;
        let size = size
            .parse()
            .map_err(|_| malformed(format!("invalid size {size:?}")))?;
        entries.push(IndexEntry {
            id: id.to_string(),
            offset,
            size,
        });
    }
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(entries)
}

/// Read access to a directory written by [`DescriptorWriter`].
#[derive(Debug)]
pub struct DescriptorStore {
    dir: PathBuf,
    layout: StoreLayout,
    entries: Vec<IndexEntry>,
}

impl DescriptorStore {
    /// Open `dir`, choosing the single-file layout when `descriptor.pos` exists.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let index_path = dir.join(SINGLE_FILE_INDEX);
        let (layout, entries) = if index_path.is_file() {
            let entries = parse_index(&fs::read_to_string(&index_path)?)?;
            (StoreLayout::SingleFile, entries)
        } else {
            if !dir.is_dir() {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("descriptor directory {} not found", dir.display()),
                )));
            }
            (StoreLayout::PerId, Vec::new())
        };
        debug!(dir = %dir.display(), ?layout, entries = entries.len(), "opened descriptor store");
        Ok(Self {
            dir,
            layout,
            entries,
        })
    }

    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Ids available in the store, sorted.
    pub fn ids(&self) -> StoreResult<Vec<String>> {
        match self.layout {
            StoreLayout::SingleFile => Ok(self.entries.iter().map(|e| e.id.clone()).collect()),
            StoreLayout::PerId => {
                let mut ids = Vec::new();
                for entry in fs::read_dir(&self.dir)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(PER_ID_EXTENSION) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
                ids.sort();
                Ok(ids)
            }
        }
    }

    fn read_blob(&self, id: &str) -> StoreResult<Vec<u8>> {
        match self.layout {
            StoreLayout::SingleFile => {
                let pos = self
                    .entries
                    .binary_search_by(|e| e.id.as_str().cmp(id))
                    .map_err(|_| StoreError::UnknownId(id.to_string()))?;
                let entry = &self.entries[pos];
                let mut file = File::open(self.dir.join(SINGLE_FILE_DATA))?;
                file.seek(SeekFrom::Start(entry.offset))?;
                let mut blob = vec![0u8; entry.size as usize];
                file.read_exact(&mut blob)?;
                Ok(blob)
            }
            StoreLayout::PerId => {
                let path = self.dir.join(format!("{id}.{PER_ID_EXTENSION}"));
                if !path.is_file() {
                    return Err(StoreError::UnknownId(id.to_string()));
                }
                Ok(fs::read(path)?)
            }
        }
    }

    /// Every record stored under `id`, in write order.
    pub fn load(&self, id: &str) -> StoreResult<Vec<LocalDescriptorSet>> {
        let blob = self.read_blob(id)?;
        codec::decode_all(&blob).map_err(|source| StoreError::Decode {
            id: id.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_parsing_skips_comments_and_sorts() {
        let text = "#header\n2\nvideo_b\t40\t8\n# note\nvideo_a\t0\t40\n";
        let entries = parse_index(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "video_a");
        assert_eq!(entries[1].offset, 40);
    }

    #[test]
    fn index_parsing_reports_bad_lines() {
        assert!(matches!(
            parse_index("1\nvideo\t0\n"),
            Err(StoreError::IndexFormat { line: 2, .. })
        ));
        assert!(matches!(
            parse_index("3\nvideo\t0\t8\n"),
            Err(StoreError::IndexFormat { .. })
        ));
        assert!(matches!(
            parse_index("x\n"),
            Err(StoreError::IndexFormat { line: 1, .. })
        ));
    }
}
