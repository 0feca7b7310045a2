//! Resumable PDF file creation.
//!
//! [`Creator`] turns a [`Document`] into bytes on a [`ByteSink`]. The write is
//! a state machine: every call to [`Creator::continue_write`] performs a
//! bounded number of units of work (one object, one block of the original
//! file, one cross-reference run) and reports the [`Stage`] it stopped at, so
//! a host can interleave writing with other work. Without
//! [`CreateFlags::PROGRESSIVE`], [`Creator::create`] drives the machine to
//! completion itself.
//!
//! ```text
//! Init -> Preamble -> CopyOriginal (incremental) -> NewObjects
//!                  -> OldObjects (full rewrite)  -> NewObjects
//! NewObjects -> EncryptDict -> XRef -> ClassicTable | IncrementalTable -> Trailer -> Done
//! ```
//!
//! Any error is fatal: the creator moves to [`Stage::Failed`] and the bytes
//! already handed to the sink must be discarded.

use super::file_id::{seed_pair, FileId};
use super::object_serializer::ObjectSerializer;
use super::output::{ObjectLocation, ObjectOffsets, Output};
use super::xref_stream::XRefStreamBuilder;
use crate::config::{
    validate_version, CreateFlags, SaveOptions, DEFAULT_OBJECT_STREAM_MAX_LENGTH,
    DEFAULT_OBJECT_STREAM_SIZE,
};
use crate::document::Document;
use crate::encryption::{EncryptDict, SecurityHandler};
use crate::error::{Error, Result};
use crate::object::{is_signature_dict, Dictionary, Object};
use crate::sink::ByteSink;
use crate::source::ObjectType;
use std::io::Write;
use std::sync::Arc;

/// Size of the blocks the original file is copied in.
const COPY_BLOCK_SIZE: u64 = 4096;

/// Version written when neither the caller nor the source chose one.
const DEFAULT_VERSION: u8 = 17;

/// Largest offset a classic table row can hold in its ten digits.
const MAX_TABLE_OFFSET: u64 = 9_999_999_999;

/// Source trailer keys that describe the old cross-reference section and are
/// never carried over.
const TRAILER_SKIP_KEYS: &[&str] = &[
    "Encrypt", "Size", "Filter", "Index", "Length", "Prev", "W", "XRefStm", "ID", "Type",
    "DecodeParms",
];

/// Position of the creator in the write pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Mode decisions (incremental, object streams, metadata stream)
    Init,
    /// File header, or the start of the original bytes
    Preamble,
    /// Copying the original file block by block
    CopyOriginal,
    /// Rewriting the source's objects one number at a time
    OldObjects,
    /// Writing objects that only exist in memory
    NewObjects,
    /// Writing an inline encryption dictionary as a new object
    EncryptDict,
    /// Finalizing the cross-reference stream or opening the `xref` table
    XRef,
    /// Subsections of a complete classic table
    ClassicTable,
    /// Subsections of an incremental classic table
    IncrementalTable,
    /// Trailer, `startxref` and `%%EOF`
    Trailer,
    /// Everything written and flushed
    Done,
    /// A step failed; the output is unusable
    Failed,
}

/// Outcome of a call that advances the creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More work remains; the creator stopped before this stage's next unit
    Pending(Stage),
    /// The file is complete
    Done,
}

/// Where an indirect object goes when object streams are in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Packed into the open object stream
    Compressed,
    /// Written as a normal indirect object
    Direct,
    /// Not written at all
    Skipped,
}

/// Decide how an object is written in object-stream mode.
///
/// `pinned` lists object numbers that must stay directly addressable
/// (the catalog and the encryption dictionary).
pub fn classify(obj_num: u32, obj: &Object, generation: u16, pinned: &[u32]) -> Placement {
    if let Object::Stream(stream) = obj {
        // cross-reference streams of the source are replaced, never copied
        if stream.dict.get("Type").and_then(|t| t.as_name()) == Some("XRef") {
            return Placement::Skipped;
        }
        return Placement::Direct;
    }
    if generation > 0 || obj.is_number() || pinned.contains(&obj_num) {
        return Placement::Direct;
    }
    if let Object::Dictionary(dict) = obj {
        if is_signature_dict(dict) || dict.get("Type").and_then(|t| t.as_name()) == Some("Page") {
            return Placement::Direct;
        }
    }
    Placement::Compressed
}

/// Contiguous runs of an ascending list of object numbers, as `(first, count)`.
pub fn runs_of(numbers: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &n in numbers {
        match runs.last_mut() {
            Some((start, count)) if start.checked_add(*count) == Some(n) => *count += 1,
            _ => runs.push((n, 1)),
        }
    }
    runs
}

/// Append one in-use row of a classic table.
fn write_table_row(buf: &mut Vec<u8>, offset: u64) -> Result<()> {
    if offset > MAX_TABLE_OFFSET {
        return Err(Error::OffsetOverflow { offset, increment: 0 });
    }
    write!(buf, "{:010} 00000 n\r\n", offset)?;
    Ok(())
}

/// Write `obj` as `N 0 obj ... endobj` and record its offset.
fn write_indirect<S: ByteSink>(
    out: &mut Output<S>,
    obj_num: u32,
    obj: &Object,
    metadata: bool,
    in_clear: bool,
) -> Result<()> {
    let crypto = if in_clear { None } else { out.crypto_handle() };
    let mut serializer = ObjectSerializer::new(obj_num).with_crypto(crypto.as_deref());
    if metadata {
        serializer = serializer.for_metadata();
    }
    let bytes = serializer.serialize_indirect(obj)?;
    let offset = out.offset();
    out.write(&bytes)?;
    out.offsets_mut().set_offset(obj_num, offset);
    log::trace!("Wrote object {} at offset {} ({} bytes)", obj_num, offset, bytes.len());
    Ok(())
}

/// Resumable writer of one document to one sink.
///
/// # Example
///
/// ```
/// use pdf_creator::config::SaveOptions;
/// use pdf_creator::document::Document;
/// use pdf_creator::object::Object;
/// use pdf_creator::writer::{Creator, Progress};
///
/// let mut doc = Document::new();
/// let root = doc.add_object(Object::dict(vec![("Type", Object::name("Catalog"))]));
/// doc.set_root(root);
///
/// let mut creator = Creator::new(&mut doc, Vec::new());
/// let progress = creator.create(&SaveOptions::full_rewrite().with_id_seed(1))?;
/// assert_eq!(progress, Progress::Done);
/// let bytes = creator.into_sink();
/// assert!(bytes.starts_with(b"%PDF-1.7\r\n"));
/// assert!(bytes.ends_with(b"%%EOF\r\n"));
/// # Ok::<(), pdf_creator::Error>(())
/// ```
pub struct Creator<'a, S: ByteSink> {
    doc: &'a mut Document,
    out: Output<S>,
    flags: CreateFlags,
    object_stream_size: usize,
    object_stream_max_length: usize,
    stage: Stage,
    started: bool,
    /// Position inside the current stage (object number or list index)
    cursor: usize,
    /// Bytes of the original file copied so far
    copied: u64,
    table_runs: Vec<(u32, u32)>,
    xref: Option<XRefStreamBuilder>,
    new_obj_nums: Vec<u32>,
    metadata_obj_num: Option<u32>,
    encrypt_dict: Option<Dictionary>,
    encrypt_obj_num: u32,
    security_changed: bool,
    file_version: Option<u8>,
    id: Option<FileId>,
    xref_start: u64,
}

impl<S: ByteSink> std::fmt::Debug for Creator<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creator")
            .field("stage", &self.stage)
            .field("flags", &self.flags)
            .field("offset", &self.out.offset())
            .field("encrypted", &self.encrypt_dict.is_some())
            .field("security_changed", &self.security_changed)
            .finish()
    }
}

impl<'a, S: ByteSink> Creator<'a, S> {
    /// Prepare to write `doc` into `sink`. The source's security settings
    /// are kept unless changed before [`Creator::create`].
    pub fn new(doc: &'a mut Document, sink: S) -> Self {
        let mut out = Output::new(sink, doc.last_obj_num());
        let (encrypt_dict, encrypt_obj_num) = match doc.source() {
            Some(source) => {
                out.set_crypto(source.crypto_handler());
                (source.encrypt_dict().cloned(), source.encrypt_obj_num())
            },
            None => (None, 0),
        };
        Self {
            doc,
            out,
            flags: CreateFlags::empty(),
            object_stream_size: DEFAULT_OBJECT_STREAM_SIZE,
            object_stream_max_length: DEFAULT_OBJECT_STREAM_MAX_LENGTH,
            stage: Stage::Init,
            started: false,
            cursor: 0,
            copied: 0,
            table_runs: Vec::new(),
            xref: None,
            new_obj_nums: Vec::new(),
            metadata_obj_num: None,
            encrypt_dict,
            encrypt_obj_num,
            security_changed: false,
            file_version: None,
            id: None,
            xref_start: 0,
        }
    }

    /// Set the header version as two digits (10..=17).
    pub fn set_file_version(&mut self, version: u8) -> Result<()> {
        validate_version(version)?;
        self.file_version = Some(version);
        Ok(())
    }

    /// Write the document without encryption.
    pub fn remove_security(&mut self) {
        if self.encrypt_dict.take().is_none() {
            return;
        }
        log::debug!("Removing document security");
        self.out.set_crypto(None);
        self.encrypt_obj_num = 0;
        self.security_changed = true;
    }

    /// Start the write.
    ///
    /// Validates the options, derives the trailer `/ID` and installs any new
    /// security handler. Returns [`Progress::Pending`] right away for a
    /// progressive write; otherwise runs every stage.
    pub fn create(&mut self, options: &SaveOptions) -> Result<Progress> {
        if self.started {
            return Err(Error::WriterFinished);
        }
        options.validate()?;
        if self.doc.root().is_none() {
            return Err(Error::MissingRoot);
        }
        if let Some(version) = options.version {
            self.file_version = Some(version);
        }
        self.flags = options.flags();
        if self.doc.source().is_none() {
            self.flags.remove(CreateFlags::INCREMENTAL);
        }
        self.object_stream_size = options.object_stream_size;
        self.object_stream_max_length = options.object_stream_max_length;

        self.init_id(options.id_seed)?;

        if let Some(config) = &options.encryption {
            let permanent = self.id.as_ref().map(|id| id.permanent.as_slice()).unwrap_or_default();
            let (dict, handler) = SecurityHandler::create(config, permanent)?;
            log::debug!("Applying {:?} security", config.algorithm);
            self.encrypt_dict = Some(dict);
            self.out.set_crypto(Some(Arc::new(handler)));
            self.encrypt_obj_num = 0;
            self.security_changed = true;
        }

        self.started = true;
        self.stage = Stage::Init;
        log::debug!("Write started with flags {:?}", self.flags);

        if self.flags.contains(CreateFlags::PROGRESSIVE) {
            return Ok(Progress::Pending(self.stage));
        }
        self.continue_write(usize::MAX)
    }

    /// Advance the write by at most `max_steps` units.
    pub fn continue_write(&mut self, max_steps: usize) -> Result<Progress> {
        if !self.started {
            return Err(Error::NotStarted);
        }
        if matches!(self.stage, Stage::Done | Stage::Failed) {
            return Err(Error::WriterFinished);
        }
        for _ in 0..max_steps {
            if self.stage == Stage::Done {
                break;
            }
            if let Err(e) = self.step() {
                log::error!("Write failed during {:?}: {}", self.stage, e);
                self.stage = Stage::Failed;
                self.xref = None;
                self.table_runs.clear();
                self.new_obj_nums.clear();
                return Err(e);
            }
        }
        Ok(match self.stage {
            Stage::Done => Progress::Done,
            stage => Progress::Pending(stage),
        })
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Trailer identifier of this write, once started.
    pub fn file_id(&self) -> Option<&FileId> {
        self.id.as_ref()
    }

    /// Locations recorded so far.
    pub fn offsets(&self) -> &ObjectOffsets {
        self.out.offsets()
    }

    /// Offset of the `startxref` target, valid once done.
    pub fn xref_offset(&self) -> u64 {
        self.xref_start
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        self.out.sink()
    }

    /// Give the sink back.
    pub fn into_sink(self) -> S {
        self.out.into_sink()
    }

    fn is_incremental(&self) -> bool {
        self.flags.contains(CreateFlags::INCREMENTAL)
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("Stage {:?} -> {:?} at offset {}", self.stage, stage, self.out.offset());
        self.stage = stage;
        self.cursor = 0;
    }

    fn step(&mut self) -> Result<()> {
        match self.stage {
            Stage::Init => self.init_modes(),
            Stage::Preamble => self.write_preamble(),
            Stage::CopyOriginal => self.copy_original_block(),
            Stage::OldObjects => self.old_objects_step(),
            Stage::NewObjects => self.new_objects_step(),
            Stage::EncryptDict => self.write_encrypt_dict(),
            Stage::XRef => self.start_xref(),
            Stage::ClassicTable | Stage::IncrementalTable => self.write_table_run(),
            Stage::Trailer => self.write_trailer(),
            Stage::Done | Stage::Failed => Err(Error::WriterFinished),
        }
    }

    fn init_id(&mut self, seed: Option<u64>) -> Result<()> {
        let old_id: Option<Vec<Object>> = self
            .doc
            .source()
            .and_then(|s| s.id_array())
            .map(|arr| arr.to_vec());
        let id = FileId::derive(
            old_id.as_deref(),
            self.is_incremental(),
            self.encrypt_dict.is_some(),
            seed_pair(seed),
        );

        if old_id.is_none() {
            if let (Some(source), Some(dict)) = (self.doc.source(), self.encrypt_dict.as_mut()) {
                let standard = EncryptDict::from_dict(dict)
                    .map(|parsed| parsed.is_standard())
                    .unwrap_or(false);
                if standard {
                    let handler = SecurityHandler::rekey(dict, source.password(), &id.permanent)?;
                    self.out.set_crypto(Some(Arc::new(handler)));
                    // the rekeyed dictionary is written as a new object
                    self.encrypt_obj_num = 0;
                    self.security_changed = true;
                }
            }
        }
        self.id = Some(id);
        Ok(())
    }

    fn init_modes(&mut self) -> Result<()> {
        if self.security_changed && !self.flags.contains(CreateFlags::NO_ORIGINAL) {
            self.flags.remove(CreateFlags::INCREMENTAL);
        }

        if let Some(root) = self.doc.root() {
            let resident = self.doc.is_resident(root);
            self.metadata_obj_num = self
                .doc
                .catalog()
                .and_then(|catalog| catalog.get("Metadata"))
                .and_then(|m| m.as_reference())
                .map(|r| r.id);
            if !resident {
                self.doc.release(root);
            }
        }

        if self.flags.contains(CreateFlags::OBJECT_STREAM) {
            let incremental = self.is_incremental();
            let prev = match self.doc.source() {
                Some(source) if incremental => source.last_xref_offset(),
                _ => 0,
            };
            self.xref = Some(XRefStreamBuilder::new(
                incremental,
                prev,
                self.object_stream_size,
                self.object_stream_max_length,
            ));
        }
        self.enter(Stage::Preamble);
        Ok(())
    }

    fn header_version(&self) -> u8 {
        self.file_version
            .or_else(|| self.doc.source().map(|s| s.file_version()))
            .unwrap_or(DEFAULT_VERSION)
    }

    fn write_preamble(&mut self) -> Result<()> {
        if self.is_incremental() {
            if self.flags.contains(CreateFlags::NO_ORIGINAL) {
                let size = self.doc.source().map_or(0, |s| s.file_size());
                self.out.set_offset(size);
            }
            self.copied = 0;
            self.enter(Stage::CopyOriginal);
            return Ok(());
        }

        let mut header = Vec::with_capacity(16);
        write!(header, "%PDF-1.{}\r\n", self.header_version() % 10)?;
        header.extend_from_slice(b"%\xA1\xB3\xC5\xD7\r\n");
        self.out.write(&header)?;

        match self.doc.source() {
            Some(source) => {
                log::debug!("Full rewrite of {} source object numbers", source.last_obj_num());
                self.enter(Stage::OldObjects);
                self.cursor = 1;
                Ok(())
            },
            None => self.enter_new_objects(),
        }
    }

    fn copy_original_block(&mut self) -> Result<()> {
        let Some(source) = self.doc.source() else {
            return self.enter_new_objects();
        };
        let size = source.file_size();
        if !self.flags.contains(CreateFlags::NO_ORIGINAL) && self.copied < size {
            let len = (size - self.copied).min(COPY_BLOCK_SIZE) as usize;
            let mut block = vec![0u8; len];
            let n = source.read_block(self.copied, &mut block)?;
            if n == 0 {
                return Err(Error::InvalidPdf(format!(
                    "Source ended at {} of {} bytes",
                    self.copied, size
                )));
            }
            self.out.write(&block[..n])?;
            self.copied += n as u64;
            return Ok(());
        }

        if !self.flags.contains(CreateFlags::NO_ORIGINAL) && source.last_xref_offset() == 0 {
            // reconstructed table: the update has to index the old objects too
            let mut recorded = 0usize;
            for obj_num in 1..=source.last_obj_num() {
                if source.object_type(obj_num) != ObjectType::Normal {
                    continue;
                }
                if let Some(position) = source.object_position(obj_num) {
                    self.out.offsets_mut().set_offset(obj_num, position);
                    if let Some(xref) = self.xref.as_mut() {
                        xref.add_object_number(obj_num);
                    }
                    recorded += 1;
                }
            }
            log::debug!("Recorded {} original object positions", recorded);
            if let Some(xref) = self.xref.as_mut() {
                xref.end_xref_stream(&mut self.out)?;
            }
        }
        self.enter_new_objects()
    }

    fn old_objects_step(&mut self) -> Result<()> {
        let last = self.doc.source().map_or(0, |s| s.last_obj_num()) as usize;
        if self.cursor == 0 || self.cursor > last {
            return self.enter_new_objects();
        }
        let obj_num = self.cursor as u32;
        self.cursor += 1;
        self.write_old_object(obj_num)
    }

    fn write_old_object(&mut self, obj_num: u32) -> Result<()> {
        let Some(source) = self.doc.source() else {
            return Ok(());
        };
        let kind = source.object_type(obj_num);
        if matches!(kind, ObjectType::Free | ObjectType::Null) {
            return Ok(());
        }
        if self.security_changed && obj_num == source.encrypt_obj_num() {
            log::debug!("Dropping old encryption dictionary {}", obj_num);
            return Ok(());
        }

        let resident = self.doc.is_resident(obj_num);
        let reserialize = source.is_version_updated()
            || self.security_changed
            || resident
            || (kind == ObjectType::Compressed && self.encrypt_dict.is_some() && self.xref.is_none());

        if reserialize {
            if self.doc.load(obj_num).is_none() {
                log::warn!("Object {} could not be parsed, treating it as free", obj_num);
                return Ok(());
            }
            self.write_object(obj_num)?;
            if !resident {
                self.doc.release(obj_num);
            }
            return Ok(());
        }

        let Some(raw) = source.raw_object(obj_num) else {
            log::warn!("Object {} has no raw bytes, treating it as free", obj_num);
            return Ok(());
        };
        match (kind, self.xref.as_mut()) {
            (ObjectType::Compressed, Some(xref)) => xref.compress_raw(obj_num, &raw, &mut self.out),
            (ObjectType::Compressed, None) => {
                let mut buf = Vec::with_capacity(raw.len() + 24);
                write!(buf, "{} 0 obj ", obj_num)?;
                buf.extend_from_slice(&raw);
                buf.extend_from_slice(b"\r\nendobj\r\n");
                let offset = self.out.offset();
                self.out.write(&buf)?;
                self.out.offsets_mut().set_offset(obj_num, offset);
                Ok(())
            },
            (_, xref) => {
                let offset = self.out.offset();
                self.out.write(&raw)?;
                self.out.offsets_mut().set_offset(obj_num, offset);
                log::trace!("Copied object {} verbatim ({} bytes)", obj_num, raw.len());
                match xref {
                    Some(xref) => xref.append_object_number(obj_num, &mut self.out),
                    None => Ok(()),
                }
            },
        }
    }

    /// Write a resident object, packing it when object streams allow.
    fn write_object(&mut self, obj_num: u32) -> Result<()> {
        let Some(obj) = self.doc.get(obj_num) else {
            log::debug!("Object {} is not resident, skipped", obj_num);
            return Ok(());
        };
        let generation = self
            .doc
            .source()
            .filter(|s| !s.is_free_or_null(obj_num))
            .map_or(0, |s| s.generation(obj_num));
        let root = self.doc.root().unwrap_or(0);

        if let Some(xref) = self.xref.as_mut() {
            match classify(obj_num, obj, generation, &[root, self.encrypt_obj_num]) {
                Placement::Skipped => {
                    log::debug!("Skipped cross-reference stream object {}", obj_num);
                    return Ok(());
                },
                Placement::Compressed => return xref.compress_object(obj_num, obj, &mut self.out),
                Placement::Direct => {},
            }
        }

        let metadata = self.metadata_obj_num == Some(obj_num);
        let in_clear = self.encrypt_obj_num != 0 && obj_num == self.encrypt_obj_num;
        write_indirect(&mut self.out, obj_num, obj, metadata, in_clear)?;
        match self.xref.as_mut() {
            Some(xref) => xref.append_object_number(obj_num, &mut self.out),
            None => Ok(()),
        }
    }

    fn enter_new_objects(&mut self) -> Result<()> {
        let incremental = self.is_incremental();
        let doc = &*self.doc;
        let source = doc.source();
        self.new_obj_nums = doc
            .object_numbers()
            .filter(|&n| {
                let fresh = source.map_or(true, |s| s.is_free_or_null(n));
                fresh || (incremental && doc.is_modified(n))
            })
            .collect();
        log::debug!("{} objects to write from memory", self.new_obj_nums.len());
        self.enter(Stage::NewObjects);
        Ok(())
    }

    fn new_objects_step(&mut self) -> Result<()> {
        match self.new_obj_nums.get(self.cursor).copied() {
            Some(obj_num) => {
                self.cursor += 1;
                self.write_object(obj_num)
            },
            None => {
                self.enter(Stage::EncryptDict);
                Ok(())
            },
        }
    }

    fn write_encrypt_dict(&mut self) -> Result<()> {
        if self.encrypt_obj_num == 0 {
            if let Some(dict) = &self.encrypt_dict {
                let obj_num = self.out.next_object_number();
                write_indirect(
                    &mut self.out,
                    obj_num,
                    &Object::Dictionary(dict.clone()),
                    false,
                    true,
                )?;
                self.encrypt_obj_num = obj_num;
                if self.flags.contains(CreateFlags::INCREMENTAL) {
                    self.new_obj_nums.push(obj_num);
                }
                if let Some(xref) = self.xref.as_mut() {
                    xref.append_object_number(obj_num, &mut self.out)?;
                }
                log::debug!("Encryption dictionary written as object {}", obj_num);
            }
        }
        self.enter(Stage::XRef);
        Ok(())
    }

    fn start_xref(&mut self) -> Result<()> {
        self.xref_start = self.out.offset();

        if self.xref.is_some() {
            let mut entries = self.trailer_entries()?;
            self.write_id_entry(&mut entries)?;
            self.write_encrypt_entry(&mut entries)?;
            if let Some(xref) = self.xref.as_mut() {
                xref.end(&mut self.out, &entries)?;
                self.xref_start = xref.prev_offset();
            }
            self.enter(Stage::Trailer);
            return Ok(());
        }

        let (last_xref, xref_stream_source) = self
            .doc
            .source()
            .map_or((0, false), |s| (s.last_xref_offset(), s.is_xref_stream()));

        if self.is_incremental() && xref_stream_source {
            self.enter(Stage::Trailer);
        } else if !self.is_incremental() || last_xref == 0 {
            let mut head = b"xref\r\n".to_vec();
            if !self.out.offsets().contains(1) {
                head.extend_from_slice(b"0 1\r\n0000000000 65535 f\r\n");
            }
            self.out.write(&head)?;
            self.table_runs = self.out.offsets().runs(1, self.out.last_object_number());
            self.enter(Stage::ClassicTable);
        } else {
            self.out.write(b"xref\r\n")?;
            self.table_runs = runs_of(&self.new_obj_nums);
            self.enter(Stage::IncrementalTable);
        }
        Ok(())
    }

    fn write_table_run(&mut self) -> Result<()> {
        let Some(&(start, count)) = self.table_runs.get(self.cursor) else {
            self.enter(Stage::Trailer);
            return Ok(());
        };
        self.cursor += 1;

        let mut buf = Vec::with_capacity((count as usize + 2) * 20);
        if start == 1 {
            write!(buf, "0 {}\r\n0000000000 65535 f\r\n", count as u64 + 1)?;
        } else {
            write!(buf, "{} {}\r\n", start, count)?;
        }
        for obj_num in start..start + count {
            let offset = self.out.offsets().file_offset(obj_num).ok_or_else(|| {
                Error::InvalidPdf(format!("Object {} has no file offset", obj_num))
            })?;
            write_table_row(&mut buf, offset)?;
        }
        self.out.write(&buf)
    }

    fn write_trailer(&mut self) -> Result<()> {
        let mut buf = Vec::new();

        if self.xref.is_none() {
            let (last_xref, xref_stream_source) = self
                .doc
                .source()
                .map_or((0, false), |s| (s.last_xref_offset(), s.is_xref_stream()));
            let incremental = self.is_incremental();
            let stream_trailer = incremental && xref_stream_source;
            let last = self.out.last_object_number();

            if stream_trailer {
                write!(buf, "{} 0 obj <</Type /XRef", last as u64 + 1)?;
            } else {
                buf.extend_from_slice(b"trailer\r\n<<");
            }
            buf.extend_from_slice(&self.trailer_entries()?);
            self.write_encrypt_entry(&mut buf)?;
            write!(buf, "/Size {}", last as u64 + if stream_trailer { 2 } else { 1 })?;
            if incremental && last_xref != 0 {
                write!(buf, "/Prev {}", last_xref)?;
            }
            self.write_id_entry(&mut buf)?;

            if stream_trailer {
                let entries: Vec<(u32, u64)> = if last_xref == 0 {
                    self.out
                        .offsets()
                        .iter()
                        .filter_map(|(n, loc)| match loc {
                            ObjectLocation::InFile(offset) => Some((n, offset)),
                            ObjectLocation::Compressed { .. } => None,
                        })
                        .collect()
                } else {
                    self.new_obj_nums
                        .iter()
                        .filter_map(|&n| self.out.offsets().file_offset(n).map(|o| (n, o)))
                        .collect()
                };
                buf.extend_from_slice(b"/W[0 4 1]/Index[");
                for (n, _) in &entries {
                    write!(buf, "{} 1 ", n)?;
                }
                write!(buf, "]/Length {}>>stream\r\n", entries.len() * 5)?;
                for &(_, offset) in &entries {
                    let field = u32::try_from(offset)
                        .map_err(|_| Error::OffsetOverflow { offset, increment: 0 })?;
                    buf.extend_from_slice(&field.to_be_bytes());
                    buf.push(0);
                }
                buf.extend_from_slice(b"\r\nendstream\r\nendobj");
            } else {
                buf.extend_from_slice(b">>");
            }
        }

        write!(buf, "\r\nstartxref\r\n{}\r\n%%EOF\r\n", self.xref_start)?;
        self.out.write(&buf)?;
        self.out.flush()?;
        log::debug!(
            "Write complete: {} bytes end at offset {}",
            buf.len(),
            self.out.offset()
        );
        self.enter(Stage::Done);
        Ok(())
    }

    /// `/Key value` pairs shared by every trailer flavour.
    fn trailer_entries(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let serializer = ObjectSerializer::new(0);
        let root = self.doc.root();
        let info = self.doc.info();

        match self.doc.source().and_then(|s| s.trailer()) {
            Some(trailer) => {
                for (key, value) in trailer {
                    if TRAILER_SKIP_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    let replacement = match key.as_str() {
                        "Root" => root.map(Object::reference),
                        "Info" => info.map(Object::reference),
                        _ => None,
                    };
                    serializer.write_object(&mut buf, &Object::Name(key.clone()))?;
                    buf.push(b' ');
                    serializer.write_object(&mut buf, replacement.as_ref().unwrap_or(value))?;
                }
                for (key, obj_num) in [("Root", root), ("Info", info)] {
                    if let Some(obj_num) = obj_num {
                        if !trailer.contains_key(key) {
                            write!(buf, "/{} {} 0 R", key, obj_num)?;
                        }
                    }
                }
            },
            None => {
                if let Some(root) = root {
                    write!(buf, "\r\n/Root {} 0 R\r\n", root)?;
                }
                if let Some(info) = info {
                    write!(buf, "/Info {} 0 R\r\n", info)?;
                }
            },
        }
        Ok(buf)
    }

    fn write_id_entry(&self, buf: &mut Vec<u8>) -> Result<()> {
        if let Some(id) = &self.id {
            buf.extend_from_slice(b"/ID");
            ObjectSerializer::new(0).write_object(buf, &id.to_object())?;
        }
        Ok(())
    }

    fn write_encrypt_entry(&self, buf: &mut Vec<u8>) -> Result<()> {
        if self.encrypt_dict.is_some() && self.encrypt_obj_num != 0 {
            write!(buf, "/Encrypt {} 0 R ", self.encrypt_obj_num)?;
        }
        Ok(())
    }
}
