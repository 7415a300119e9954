//! Deterministic zip archives of call signatures
//!
//! Archive bytes depend only on logical content. Every entry is written with
//! the same synthetic timestamp (1980-01-01T00:00:00), the same Deflate level
//! and the same permissions, so two hosts archiving the same call produce
//! identical bytes and therefore identical fingerprints.

use crate::args::Call;
use crate::{Error, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Entry holding the computation's identifier text
pub const IDENTITY_ENTRY: &str = "function_code.txt";

/// Entry holding the encoded result; present only after a miss is resolved
pub const RESULT_ENTRY: &str = "result";

const DEFLATE_LEVEL: i64 = 6;
const ENTRY_PERMISSIONS: u32 = 0o644;

/// Name of the entry for the positional argument at `index`
#[must_use]
pub fn positional_entry(index: usize) -> String {
    format!("arg_{index}.txt")
}

/// Name of the entry for the named argument `name`
#[must_use]
pub fn named_entry(name: &str) -> String {
    format!("kwarg_{name}.txt")
}

/// Fixed per-entry metadata
fn entry_options() -> Result<SimpleFileOptions> {
    let epoch = DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).map_err(|e| {
        Error::serialization(format!("Invalid archive timestamp: {e}"))
    })?;
    Ok(SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(DEFLATE_LEVEL))
        .last_modified_time(epoch)
        .unix_permissions(ENTRY_PERMISSIONS)
        .large_file(false))
}

fn write_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    content: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| Error::archive(format!("starting entry {name}"), &e))?;
    zip.write_all(content)
        .map_err(|e| Error::io(e, format!("write entry {name}")))
}

/// An in-memory zip archive built with fixed entry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicArchive {
    buffer: Vec<u8>,
}

impl DeterministicArchive {
    /// Archive a call signature.
    ///
    /// Entry order: identifier, positional arguments in call order, named
    /// arguments sorted by name. All argument text is rendered before the
    /// first byte is written, so an unrepresentable argument fails without
    /// producing a partial archive.
    pub fn build(call: &Call) -> Result<Self> {
        let mut entries: Vec<(String, Vec<u8>)> =
            Vec::with_capacity(1 + call.args.positional().len() + call.args.named().len());
        entries.push((
            IDENTITY_ENTRY.to_string(),
            call.function.as_str().as_bytes().to_vec(),
        ));
        for (index, value) in call.args.positional().iter().enumerate() {
            entries.push((positional_entry(index), value.render()?.into_bytes()));
        }
        for (name, value) in call.args.named() {
            entries.push((named_entry(name), value.render()?.into_bytes()));
        }
        let count = entries.len();
        let archive = Self::from_entries(entries)?;
        tracing::trace!(
            function = call.function.as_str(),
            entries = count,
            bytes = archive.len(),
            "Built call archive"
        );
        Ok(archive)
    }

    /// Write arbitrary entries, in the given order, with fixed metadata
    pub fn from_entries<N, C, I>(entries: I) -> Result<Self>
    where
        N: AsRef<str>,
        C: AsRef<[u8]>,
        I: IntoIterator<Item = (N, C)>,
    {
        let options = entry_options()?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            write_entry(&mut zip, name.as_ref(), content.as_ref(), options)?;
        }
        let cursor = zip
            .finish()
            .map_err(|e| Error::archive("finishing archive", &e))?;
        Ok(Self {
            buffer: cursor.into_inner(),
        })
    }

    /// Wrap bytes fetched from a store
    #[must_use]
    pub fn from_bytes(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    /// Reopen the archive in append mode and add the `result` entry.
    ///
    /// Existing entries are left byte-for-byte untouched; only the new entry
    /// and a rewritten central directory follow them.
    pub fn append_result(&mut self, encoded: &[u8]) -> Result<()> {
        if self.has_result()? {
            return Err(Error::ResultAlreadyPresent);
        }
        let options = entry_options()?;
        let cursor = Cursor::new(std::mem::take(&mut self.buffer));
        let mut zip = ZipWriter::new_append(cursor)
            .map_err(|e| Error::archive("reopening archive for append", &e))?;
        write_entry(&mut zip, RESULT_ENTRY, encoded, options)?;
        let cursor = zip
            .finish()
            .map_err(|e| Error::archive("finishing appended archive", &e))?;
        self.buffer = cursor.into_inner();
        tracing::trace!(
            result_bytes = encoded.len(),
            bytes = self.buffer.len(),
            "Appended result entry"
        );
        Ok(())
    }

    /// Whether a `result` entry is present
    pub fn has_result(&self) -> Result<bool> {
        Ok(entry_names(&self.buffer)?
            .iter()
            .any(|name| name == RESULT_ENTRY))
    }

    /// Read one entry of this archive
    pub fn entry(&self, name: &str) -> Result<Vec<u8>> {
        read_entry(&self.buffer, name)
    }

    /// Archive bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the archive, returning its bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Size of the archive in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True for a zero-length buffer
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::archive("opening archive", &e))
}

/// Read the content of a named entry from archive bytes
pub fn read_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = open(bytes)?;
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Err(Error::entry_not_found(name)),
        Err(e) => return Err(Error::archive(format!("reading entry {name}"), &e)),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::io(e, format!("read entry {name}")))?;
    Ok(content)
}

/// Entry names of archive bytes, in storage order
pub fn entry_names(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = open(bytes)?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .map_err(|e| Error::archive(format!("reading entry #{index}"), &e))?;
        names.push(file.name().to_string());
    }
    Ok(names)
}
