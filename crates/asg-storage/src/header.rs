//! Key/value header at the start of every graph stream.
//!
//! Layout (little-endian):
//!
//! ```text
//! "ASGB"            magic (4 bytes)
//! u32               entry count
//! entry*            u32 key length, key bytes, u32 value length, value bytes
//! ```
//!
//! Three entries are always written: `FileType` (schema name), `APIVersion`
//! (schema version) and `BinaryVersion` (codec version). Entries are kept in
//! key order so equal headers encode to equal bytes.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use asg_core::Schema;

use crate::error::StorageError;

pub const MAGIC: &[u8; 4] = b"ASGB";

/// Version of the node-record encoding.
pub const BINARY_VERSION: u32 = 1;

pub const FILE_TYPE: &str = "FileType";
pub const API_VERSION: &str = "APIVersion";
pub const BINARY_VERSION_KEY: &str = "BinaryVersion";

const MAX_ENTRIES: u32 = 1024;
const MAX_TEXT: u32 = 64 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Header {
    entries: BTreeMap<String, String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header describing a graph built on `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        let mut header = Header::new();
        header.set(FILE_TYPE, schema.name());
        header.set(API_VERSION, schema.version().to_string());
        header.set(BINARY_VERSION_KEY, BINARY_VERSION.to_string());
        header
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn file_type(&self) -> Option<&str> {
        self.get(FILE_TYPE)
    }

    pub fn api_version(&self) -> Option<u32> {
        self.get(API_VERSION)?.parse().ok()
    }

    pub fn binary_version(&self) -> Option<u32> {
        self.get(BINARY_VERSION_KEY)?.parse().ok()
    }

    /// Verifies that a stream with this header can be loaded with `schema`.
    pub fn check(&self, schema: &Schema) -> Result<(), StorageError> {
        let binary = self.binary_version().ok_or_else(|| StorageError::BadHeader {
            reason: format!("missing or malformed {BINARY_VERSION_KEY}"),
        })?;
        if binary != BINARY_VERSION {
            return Err(StorageError::VersionMismatch {
                expected: BINARY_VERSION,
                found: binary,
            });
        }
        let file_type = self.file_type().unwrap_or("");
        let api = self.api_version();
        if file_type != schema.name() || api != Some(schema.version()) {
            return Err(StorageError::SchemaMismatch {
                expected: format!("{} v{}", schema.name(), schema.version()),
                found: match api {
                    Some(v) => format!("{file_type} v{v}"),
                    None => format!("{file_type} v?"),
                },
            });
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        for (key, value) in &self.entries {
            write_text(w, key)?;
            write_text(w, value)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, StorageError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(bad_header)?;
        if &magic != MAGIC {
            return Err(StorageError::BadHeader {
                reason: "not an ASG graph stream".into(),
            });
        }
        let count = r.read_u32::<LittleEndian>().map_err(bad_header)?;
        if count > MAX_ENTRIES {
            return Err(StorageError::BadHeader {
                reason: format!("{count} header entries"),
            });
        }
        let mut header = Header::new();
        for _ in 0..count {
            let key = read_text(r)?;
            let value = read_text(r)?;
            header.entries.insert(key, value);
        }
        Ok(header)
    }
}

fn bad_header(err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        StorageError::BadHeader {
            reason: "truncated header".into(),
        }
    } else {
        StorageError::Io(err)
    }
}

fn write_text<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    w.write_u32::<LittleEndian>(text.len() as u32)?;
    w.write_all(text.as_bytes())
}

fn read_text<R: Read>(r: &mut R) -> Result<String, StorageError> {
    let len = r.read_u32::<LittleEndian>().map_err(bad_header)?;
    if len > MAX_TEXT {
        return Err(StorageError::BadHeader {
            reason: format!("header entry of {len} bytes"),
        });
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes).map_err(bad_header)?;
    String::from_utf8(bytes).map_err(|_| StorageError::BadHeader {
        reason: "header entry is not UTF-8".into(),
    })
}
