//! Index blob format
//!
//! Binary layout of a serialized resource index:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ magic        8 bytes         │  b"VELARES\0"
//! │ version      u8              │
//! │ runtime tag  u32 len + bytes │
//! │ checksum     u32             │  crc32 of everything after this field
//! ├──────────────────────────────┤
//! │ entry count  u32             │
//! │ per entry:                   │
//! │   kind       u8              │
//! │   origin     u8              │
//! │   flags      u8              │  bit 0 = is_package
//! │   name       u32 len + bytes │
//! │   payload    u32 len + bytes │  inline data, or UTF-8 relative path
//! └──────────────────────────────┘
//! ```
//!
//! Entry order equals collector insertion order, so the same inputs always
//! produce a byte-identical blob.

use thiserror::Error;

use crate::codec::{DecodeError, ResourceReader, ResourceWriter};
use crate::index::ResourceIndex;
use crate::resource::{Origin, Resource, ResourceKind};

/// Magic bytes identifying a packed resource index.
pub const MAGIC: [u8; 8] = *b"VELARES\0";

/// Current index format version.
pub const FORMAT_VERSION: u8 = 1;

/// Flag bit: entry is a package.
const FLAG_IS_PACKAGE: u8 = 1 << 0;

/// Errors from encoding or decoding an index blob.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Low-level decode error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Magic bytes do not match
    #[error("invalid magic number: expected VELARES, got {0:?}")]
    InvalidMagic([u8; 8]),

    /// Version is not supported by this crate
    #[error("unsupported index version: {0} (current: {FORMAT_VERSION})")]
    UnsupportedVersion(u8),

    /// Stored checksum does not match the entry region
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Entry kind tag not known to this version
    #[error("unknown resource kind tag {tag:#04x} at offset {offset}")]
    UnknownKind { tag: u8, offset: usize },

    /// Entry origin tag not known to this version
    #[error("unknown origin tag {tag:#04x} at offset {offset}")]
    UnknownOrigin { tag: u8, offset: usize },
}

/// Decode behavior knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Skip entries with an unrecognized kind or origin tag instead of
    /// failing. Off by default: an unknown tag is fatal.
    pub skip_unknown: bool,
}

impl ResourceIndex {
    /// Encode the index to its binary blob form.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ResourceWriter::with_capacity(64 + self.len() * 32);

        writer.emit_raw(&MAGIC);
        writer.emit_u8(self.format_version());
        writer.emit_str(self.runtime_tag());
        let checksum_slot = writer.offset();
        writer.emit_u32(0);

        let body_start = writer.offset();
        writer.emit_u32(self.len() as u32);
        for entry in self.iter() {
            encode_entry(&mut writer, entry);
        }

        let checksum = crc32fast::hash(&writer.buffer[body_start..]);
        writer.patch_u32(checksum_slot, checksum);

        writer.into_bytes()
    }

    /// Decode a blob, failing on any unrecognized entry tag.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        Self::decode_with(data, DecodeOptions::default())
    }

    /// Decode a blob with explicit options.
    pub fn decode_with(data: &[u8], options: DecodeOptions) -> Result<Self, FormatError> {
        let mut reader = ResourceReader::new(data);

        let magic = reader.read_exact(MAGIC.len())?;
        if magic != MAGIC.as_slice() {
            let mut got = [0u8; 8];
            got.copy_from_slice(magic);
            return Err(FormatError::InvalidMagic(got));
        }

        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let runtime_tag = reader.read_string()?;

        let expected = reader.read_u32()?;
        let actual = crc32fast::hash(reader.tail());
        if expected != actual {
            return Err(FormatError::ChecksumMismatch { expected, actual });
        }

        let count = reader.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if let Some(entry) = decode_entry(&mut reader, options)? {
                entries.push(entry);
            }
        }

        Ok(ResourceIndex::with_version(version, runtime_tag, entries))
    }
}

fn encode_entry(writer: &mut ResourceWriter, entry: &Resource) {
    writer.emit_u8(entry.kind().to_u8());
    writer.emit_u8(entry.origin().to_u8());
    let mut flags = 0u8;
    if entry.is_package() {
        flags |= FLAG_IS_PACKAGE;
    }
    writer.emit_u8(flags);
    writer.emit_str(entry.name());
    match entry.origin() {
        Origin::InMemory => {
            // inline_data is always present for an in-memory entry
            writer.emit_bytes(entry.inline_data().unwrap_or(&[]));
        }
        Origin::FilesystemRelative => {
            writer.emit_str(entry.relative_path().unwrap_or(""));
        }
    }
}

/// Decode one entry frame. Returns `None` when the entry carries an unknown
/// tag and `skip_unknown` is set; the frame is consumed either way.
fn decode_entry(
    reader: &mut ResourceReader<'_>,
    options: DecodeOptions,
) -> Result<Option<Resource>, FormatError> {
    let entry_offset = reader.offset();

    let kind_tag = reader.read_u8()?;
    let origin_tag = reader.read_u8()?;
    let flags = reader.read_u8()?;
    let name = reader.read_string()?;
    let payload_offset = reader.offset();
    let payload = reader.read_bytes()?;

    let kind = match ResourceKind::from_u8(kind_tag) {
        Some(kind) => kind,
        None if options.skip_unknown => return Ok(None),
        None => {
            return Err(FormatError::UnknownKind {
                tag: kind_tag,
                offset: entry_offset,
            })
        }
    };
    let origin = match Origin::from_u8(origin_tag) {
        Some(origin) => origin,
        None if options.skip_unknown => return Ok(None),
        None => {
            return Err(FormatError::UnknownOrigin {
                tag: origin_tag,
                offset: entry_offset,
            })
        }
    };

    let is_package = flags & FLAG_IS_PACKAGE != 0;
    let entry = match origin {
        Origin::InMemory => Resource::in_memory(kind, name, is_package, payload.to_vec()),
        Origin::FilesystemRelative => {
            let path = std::str::from_utf8(payload)
                .map_err(|_| DecodeError::InvalidUtf8(payload_offset))?;
            Resource::filesystem_relative(kind, name, is_package, path)
        }
    };
    Ok(Some(entry))
}
