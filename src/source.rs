//! Metadata of the file a document was loaded from.
//!
//! The creator never parses PDF syntax itself. Everything it needs to know
//! about the original file (cross-reference entries, raw object bytes,
//! trailer, security) comes through [`ParsedSource`]. [`MemorySource`] is an
//! in-memory implementation that builds a small but complete PDF file from
//! objects, for hosts that already hold their objects in memory and for
//! tests.

use crate::encryption::{CryptoHandler, SecurityHandler};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::writer::ObjectSerializer;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

/// Cross-reference entry kind of an object in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Free entry or unknown number
    Free,
    /// Stored as `N G obj ... endobj` at a file offset
    Normal,
    /// Stored inside an object stream
    Compressed,
    /// Present in the table but resolves to `null`
    Null,
}

/// Parser side collaborator of the creator.
pub trait ParsedSource {
    /// Highest object number in the cross-reference table.
    fn last_obj_num(&self) -> u32;

    /// Cross-reference entry kind of `obj_num`.
    fn object_type(&self, obj_num: u32) -> ObjectType;

    /// Whether `obj_num` is free or a null object.
    fn is_free_or_null(&self, obj_num: u32) -> bool {
        matches!(self.object_type(obj_num), ObjectType::Free | ObjectType::Null)
    }

    /// Generation number of `obj_num`.
    fn generation(&self, obj_num: u32) -> u16;

    /// File offset of a normal object.
    fn object_position(&self, obj_num: u32) -> Option<u64>;

    /// Raw bytes of `obj_num` as stored: the full `N G obj ... endobj` block
    /// for normal objects, the bare object body for compressed ones.
    fn raw_object(&self, obj_num: u32) -> Option<Bytes>;

    /// Parse `obj_num` into an object, decrypted.
    fn parse_object(&self, obj_num: u32) -> Option<Object>;

    /// Offset of the last cross-reference section; 0 when the table had to
    /// be reconstructed.
    fn last_xref_offset(&self) -> u64;

    /// Whether the last cross-reference section is a stream.
    fn is_xref_stream(&self) -> bool;

    /// Version as two digits (17 = PDF 1.7).
    fn file_version(&self) -> u8;

    /// Whether the document must be written with a different header version.
    fn is_version_updated(&self) -> bool {
        false
    }

    /// Last trailer dictionary.
    fn trailer(&self) -> Option<&Dictionary>;

    /// `/Encrypt` dictionary.
    fn encrypt_dict(&self) -> Option<&Dictionary>;

    /// Object number of the encrypt dictionary, 0 when it is inline.
    fn encrypt_obj_num(&self) -> u32;

    /// Trailer `/ID` array.
    fn id_array(&self) -> Option<&[Object]> {
        self.trailer()
            .and_then(|t| t.get("ID"))
            .and_then(|id| id.as_array())
            .map(|arr| arr.as_slice())
    }

    /// Password the file was opened with.
    fn password(&self) -> &[u8];

    /// Handler the file was decrypted with.
    fn crypto_handler(&self) -> Option<Arc<dyn CryptoHandler>>;

    /// Size of the original file in bytes.
    fn file_size(&self) -> u64;

    /// Read original bytes at `offset` into `buf`, returning the count read.
    fn read_block(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

#[derive(Debug, Clone)]
struct SourceEntry {
    kind: ObjectType,
    gen: u16,
    position: Option<u64>,
    object: Option<Object>,
    raw: Bytes,
}

/// A parsed file held entirely in memory.
///
/// ```
/// use pdf_creator::object::Object;
/// use pdf_creator::source::{MemorySource, ParsedSource};
///
/// let source = MemorySource::builder()
///     .object(1, Object::dict(vec![("Type", Object::name("Catalog"))]))
///     .root(1)
///     .build()
///     .unwrap();
/// assert_eq!(source.last_obj_num(), 1);
/// assert!(source.raw_object(1).unwrap().starts_with(b"1 0 obj"));
/// ```
pub struct MemorySource {
    data: Bytes,
    entries: BTreeMap<u32, SourceEntry>,
    last_xref_offset: u64,
    xref_stream: bool,
    version: u8,
    version_updated: bool,
    trailer: Dictionary,
    encrypt: Option<Dictionary>,
    password: Vec<u8>,
    crypto: Option<Arc<dyn CryptoHandler>>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("size", &self.data.len())
            .field("objects", &self.entries.len())
            .field("version", &self.version)
            .field("encrypted", &self.encrypt.is_some())
            .finish()
    }
}

impl MemorySource {
    /// Start building a source file.
    pub fn builder() -> MemorySourceBuilder {
        MemorySourceBuilder::default()
    }

    /// The complete original file.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl ParsedSource for MemorySource {
    fn last_obj_num(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    fn object_type(&self, obj_num: u32) -> ObjectType {
        self.entries
            .get(&obj_num)
            .map(|e| e.kind)
            .unwrap_or(ObjectType::Free)
    }

    fn generation(&self, obj_num: u32) -> u16 {
        self.entries.get(&obj_num).map(|e| e.gen).unwrap_or(0)
    }

    fn object_position(&self, obj_num: u32) -> Option<u64> {
        self.entries.get(&obj_num).and_then(|e| e.position)
    }

    fn raw_object(&self, obj_num: u32) -> Option<Bytes> {
        self.entries
            .get(&obj_num)
            .filter(|e| matches!(e.kind, ObjectType::Normal | ObjectType::Compressed))
            .map(|e| e.raw.clone())
    }

    fn parse_object(&self, obj_num: u32) -> Option<Object> {
        self.entries.get(&obj_num).and_then(|e| e.object.clone())
    }

    fn last_xref_offset(&self) -> u64 {
        self.last_xref_offset
    }

    fn is_xref_stream(&self) -> bool {
        self.xref_stream
    }

    fn file_version(&self) -> u8 {
        self.version
    }

    fn is_version_updated(&self) -> bool {
        self.version_updated
    }

    fn trailer(&self) -> Option<&Dictionary> {
        Some(&self.trailer)
    }

    fn encrypt_dict(&self) -> Option<&Dictionary> {
        self.encrypt.as_ref()
    }

    fn encrypt_obj_num(&self) -> u32 {
        0
    }

    fn password(&self) -> &[u8] {
        &self.password
    }

    fn crypto_handler(&self) -> Option<Arc<dyn CryptoHandler>> {
        self.crypto.clone()
    }

    fn file_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_block(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&s| s <= self.data.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "Read at {} past end of source ({} bytes)",
                    offset,
                    self.data.len()
                ))
            })?;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

#[derive(Debug, Clone)]
enum PendingEntry {
    Object { gen: u16, object: Object },
    Compressed(Object),
    Null,
}

/// Builder for [`MemorySource`].
#[derive(Debug, Default)]
pub struct MemorySourceBuilder {
    entries: BTreeMap<u32, PendingEntry>,
    version: Option<u8>,
    version_updated: bool,
    xref_stream: bool,
    reconstructed: bool,
    trailer: Dictionary,
    encrypt: Option<(Dictionary, Vec<u8>)>,
}

impl MemorySourceBuilder {
    /// Header version as two digits (default 17).
    pub fn version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    /// Report the version as changed since loading.
    pub fn version_updated(mut self, updated: bool) -> Self {
        self.version_updated = updated;
        self
    }

    /// Add a normal object with generation 0.
    pub fn object(self, obj_num: u32, object: Object) -> Self {
        self.object_with_generation(obj_num, 0, object)
    }

    /// Add a normal object with an explicit generation.
    pub fn object_with_generation(mut self, obj_num: u32, gen: u16, object: Object) -> Self {
        self.entries
            .insert(obj_num, PendingEntry::Object { gen, object });
        self
    }

    /// Add an object stored inside an object stream.
    pub fn compressed_object(mut self, obj_num: u32, object: Object) -> Self {
        self.entries
            .insert(obj_num, PendingEntry::Compressed(object));
        self
    }

    /// Add a table entry that resolves to `null`.
    pub fn null_object(mut self, obj_num: u32) -> Self {
        self.entries.insert(obj_num, PendingEntry::Null);
        self
    }

    /// Set `/Root` in the trailer.
    pub fn root(self, obj_num: u32) -> Self {
        self.trailer_entry("Root", Object::reference(obj_num))
    }

    /// Set `/Info` in the trailer.
    pub fn info(self, obj_num: u32) -> Self {
        self.trailer_entry("Info", Object::reference(obj_num))
    }

    /// Set `/ID` in the trailer.
    pub fn id(self, permanent: Vec<u8>, changing: Vec<u8>) -> Self {
        self.trailer_entry(
            "ID",
            Object::Array(vec![Object::hex_string(permanent), Object::hex_string(changing)]),
        )
    }

    /// Add an arbitrary trailer entry.
    pub fn trailer_entry(mut self, key: &str, value: Object) -> Self {
        self.trailer.insert(key.to_string(), value);
        self
    }

    /// Report the last cross-reference section as a stream.
    pub fn xref_stream(mut self, xref_stream: bool) -> Self {
        self.xref_stream = xref_stream;
        self
    }

    /// Report the cross-reference table as reconstructed (offset 0).
    pub fn reconstructed(mut self, reconstructed: bool) -> Self {
        self.reconstructed = reconstructed;
        self
    }

    /// Encrypt the file with an inline standard `/Encrypt` dictionary,
    /// opened with `password`. Needs a trailer `/ID`.
    pub fn encrypt(mut self, dict: Dictionary, password: &[u8]) -> Self {
        self.encrypt = Some((dict, password.to_vec()));
        self
    }

    /// Lay out the file and index it.
    pub fn build(self) -> Result<MemorySource> {
        let version = self.version.unwrap_or(17);
        crate::config::validate_version(version)?;

        let crypto: Option<Arc<dyn CryptoHandler>> = match &self.encrypt {
            Some((dict, password)) => {
                let file_id = self
                    .trailer
                    .get("ID")
                    .and_then(|id| id.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|first| first.as_string())
                    .unwrap_or_default();
                Some(Arc::new(SecurityHandler::open(dict, password, file_id)?))
            },
            None => None,
        };

        let mut data = Vec::new();
        write!(data, "%PDF-1.{}\r\n", version % 10)?;
        data.extend_from_slice(b"%\xE2\xE3\xCF\xD3\r\n");
        let mut entries = BTreeMap::new();
        for (obj_num, pending) in self.entries {
            let entry = match pending {
                PendingEntry::Object { gen, object } => {
                    let position = data.len() as u64;
                    let mut raw = Vec::new();
                    write!(raw, "{} {} obj\r\n", obj_num, gen)?;
                    ObjectSerializer::new(obj_num)
                        .with_crypto(crypto.as_deref())
                        .write_object(&mut raw, &object)?;
                    raw.extend_from_slice(b"\r\nendobj\r\n");
                    data.extend_from_slice(&raw);
                    SourceEntry {
                        kind: ObjectType::Normal,
                        gen,
                        position: Some(position),
                        object: Some(object),
                        raw: Bytes::from(raw),
                    }
                },
                PendingEntry::Compressed(object) => SourceEntry {
                    kind: ObjectType::Compressed,
                    gen: 0,
                    position: None,
                    raw: Bytes::from(ObjectSerializer::new(obj_num).serialize(&object)?),
                    object: Some(object),
                },
                PendingEntry::Null => SourceEntry {
                    kind: ObjectType::Null,
                    gen: 0,
                    position: None,
                    object: None,
                    raw: Bytes::new(),
                },
            };
            entries.insert(obj_num, entry);
        }

        let last = entries.keys().next_back().copied().unwrap_or(0);
        let xref_offset = data.len() as u64;
        write!(data, "xref\r\n0 {}\r\n0000000000 65535 f\r\n", last as u64 + 1)?;
        for n in 1..=last {
            match entries.get(&n) {
                Some(SourceEntry {
                    kind: ObjectType::Normal,
                    gen,
                    position: Some(pos),
                    ..
                }) => write!(data, "{:010} {:05} n\r\n", pos, gen)?,
                _ => write!(data, "0000000000 00001 f\r\n")?,
            }
        }

        let mut trailer = self.trailer;
        trailer.insert("Size".to_string(), Object::Integer(last as i64 + 1));
        if let Some((dict, _)) = &self.encrypt {
            trailer.insert("Encrypt".to_string(), Object::Dictionary(dict.clone()));
        }
        data.extend_from_slice(b"trailer\r\n");
        ObjectSerializer::new(0).write_object(&mut data, &Object::Dictionary(trailer.clone()))?;
        write!(data, "\r\nstartxref\r\n{}\r\n%%EOF\r\n", xref_offset)?;

        let (encrypt, password) = match self.encrypt {
            Some((dict, password)) => (Some(dict), password),
            None => (None, Vec::new()),
        };

        Ok(MemorySource {
            data: Bytes::from(data),
            entries,
            last_xref_offset: if self.reconstructed { 0 } else { xref_offset },
            xref_stream: self.xref_stream,
            version,
            version_updated: self.version_updated,
            trailer,
            encrypt,
            password,
            crypto,
        })
    }
}
