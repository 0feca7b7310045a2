//! Cross-reference streams (`/Type /XRef`).
//!
//! Rows are fixed at `/W [1 4 2]`:
//!
//! | type | field 2 | field 3 |
//! |------|---------|---------|
//! | 0 | 0 | 0, or 65535 for object 0 |
//! | 1 | file offset | 0 |
//! | 2 | container number | index in container |
//!
//! In incremental mode only the object numbers recorded in the
//! [`IndexSegments`] get a row; once they reach
//! [`XREF_STREAM_MAX_SIZE`](crate::config::XREF_STREAM_MAX_SIZE) a stream is
//! emitted mid-document and the next one links back to it through `/Prev`.

use super::flate_encoder::encode_buffer;
use super::object_stream::ObjectStreamBuilder;
use super::output::{ObjectLocation, Output};
use crate::config::{MAX_OBJECT_STREAM_ITEMS, XREF_STREAM_MAX_SIZE};
use crate::error::{Error, Result};
use crate::object::Object;
use crate::sink::ByteSink;
use std::io::Write;

/// A run of consecutive object numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSegment {
    /// First object number
    pub start: u32,
    /// Number of objects
    pub count: u32,
}

/// Run-length list of object numbers, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSegments {
    segments: Vec<IndexSegment>,
}

impl IndexSegments {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `obj_num`, extending the last run when it continues it.
    pub fn add(&mut self, obj_num: u32) {
        match self.segments.last_mut() {
            Some(last) if last.start.checked_add(last.count) == Some(obj_num) => last.count += 1,
            _ => self.segments.push(IndexSegment {
                start: obj_num,
                count: 1,
            }),
        }
    }

    /// Total number of object numbers over all runs.
    pub fn total(&self) -> usize {
        self.segments.iter().map(|s| s.count as usize).sum()
    }

    /// Runs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexSegment> {
        self.segments.iter()
    }

    /// All object numbers, run by run.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().flat_map(|s| s.start..s.start + s.count)
    }

    /// Number of runs.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no number was added.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Forget every run.
    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

/// Builds the cross-reference stream(s) of a write and owns the object
/// stream compressible objects go into.
#[derive(Debug)]
pub struct XRefStreamBuilder {
    object_stream: ObjectStreamBuilder,
    segments: IndexSegments,
    prev_offset: u64,
    incremental: bool,
    object_stream_size: usize,
    object_stream_max_length: usize,
    intermediate_flushes: usize,
}

impl XRefStreamBuilder {
    /// New builder. `prev_offset` is the source's last cross-reference
    /// offset for an incremental update, 0 otherwise.
    pub fn new(
        incremental: bool,
        prev_offset: u64,
        object_stream_size: usize,
        object_stream_max_length: usize,
    ) -> Self {
        Self {
            object_stream: ObjectStreamBuilder::new(),
            segments: IndexSegments::new(),
            prev_offset,
            incremental,
            object_stream_size: object_stream_size.clamp(1, MAX_OBJECT_STREAM_ITEMS),
            object_stream_max_length: object_stream_max_length.max(1),
            intermediate_flushes: 0,
        }
    }

    /// Start a new cross-reference section. The open object stream is kept.
    pub fn start(&mut self) {
        self.segments.clear();
    }

    /// Offset of the last cross-reference stream written (or the source's).
    pub fn prev_offset(&self) -> u64 {
        self.prev_offset
    }

    /// Object numbers waiting for the next cross-reference stream.
    pub fn segments(&self) -> &IndexSegments {
        &self.segments
    }

    /// Number of streams emitted mid-document because the index grew too large.
    pub fn intermediate_flushes(&self) -> usize {
        self.intermediate_flushes
    }

    /// The open object stream.
    pub fn object_stream(&self) -> &ObjectStreamBuilder {
        &self.object_stream
    }

    /// Record an object number without flushing.
    pub fn add_object_number(&mut self, obj_num: u32) {
        self.segments.add(obj_num);
    }

    /// Whether an incremental index reached the size ceiling.
    pub fn needs_end(&self) -> bool {
        self.incremental && self.segments.total() >= XREF_STREAM_MAX_SIZE
    }

    /// Register a directly written object.
    pub fn append_object_number<S: ByteSink>(&mut self, obj_num: u32, out: &mut Output<S>) -> Result<()> {
        self.segments.add(obj_num);
        self.flush_if_full(out)
    }

    /// Pack `obj` into the open object stream.
    pub fn compress_object<S: ByteSink>(
        &mut self,
        obj_num: u32,
        obj: &Object,
        out: &mut Output<S>,
    ) -> Result<()> {
        self.segments.add(obj_num);
        self.object_stream.compress_object(obj_num, obj)?;
        self.after_compress(out)
    }

    /// Pack the serialized body of an object into the open object stream.
    pub fn compress_raw<S: ByteSink>(&mut self, obj_num: u32, raw: &[u8], out: &mut Output<S>) -> Result<()> {
        self.segments.add(obj_num);
        self.object_stream.compress_raw(obj_num, raw);
        self.after_compress(out)
    }

    fn after_compress<S: ByteSink>(&mut self, out: &mut Output<S>) -> Result<()> {
        if self.object_stream.len() >= self.object_stream_size
            || self.object_stream.raw_len() >= self.object_stream_max_length
        {
            self.end_object_stream(out)?;
        }
        self.flush_if_full(out)
    }

    /// Finalize the open object stream, if it holds anything.
    pub fn end_object_stream<S: ByteSink>(&mut self, out: &mut Output<S>) -> Result<()> {
        if let Some(container) = self.object_stream.end(out)? {
            self.segments.add(container.obj_num);
        }
        Ok(())
    }

    fn flush_if_full<S: ByteSink>(&mut self, out: &mut Output<S>) -> Result<()> {
        if !self.needs_end() {
            return Ok(());
        }
        log::debug!(
            "Cross-reference index reached {} entries, flushing",
            self.segments.total()
        );
        self.generate(out, None)?;
        self.start();
        self.intermediate_flushes += 1;
        Ok(())
    }

    /// Emit a cross-reference stream for everything recorded so far and
    /// start a new section (used after recording the objects of a source
    /// whose table had to be reconstructed).
    pub fn end_xref_stream<S: ByteSink>(&mut self, out: &mut Output<S>) -> Result<()> {
        self.generate(out, None)?;
        self.start();
        Ok(())
    }

    /// Finalize the document: write the open object stream, then the last
    /// cross-reference stream carrying `trailer_entries` (serialized
    /// `/Key value` pairs).
    pub fn end<S: ByteSink>(&mut self, out: &mut Output<S>, trailer_entries: &[u8]) -> Result<()> {
        self.end_object_stream(out)?;
        self.generate(out, Some(trailer_entries))
    }

    /// Write one cross-reference stream object.
    fn generate<S: ByteSink>(&mut self, out: &mut Output<S>, trailer_entries: Option<&[u8]>) -> Result<()> {
        // pending objects are referenced through the container's final number
        if !self.object_stream.is_empty() {
            self.object_stream.assign_number(out);
        }
        let offset = out.offset();
        let obj_num = out.next_object_number();
        out.offsets_mut().set_offset(obj_num, offset);

        let mut rows = Vec::new();
        let mut index = Vec::new();
        if self.incremental {
            self.segments.add(obj_num);
            for n in self.segments.object_numbers() {
                rows.extend_from_slice(&self.row(out, n)?);
            }
            for seg in self.segments.iter() {
                write!(index, "{} {} ", seg.start, seg.count)?;
            }
        } else {
            rows.extend_from_slice(&free_row(true));
            for n in 1..=obj_num {
                rows.extend_from_slice(&self.row(out, n)?);
            }
            write!(index, "0 {}", obj_num as u64 + 1)?;
        }
        let data = encode_buffer(&rows, true)?;

        let mut dict = Vec::new();
        write!(dict, "{} 0 obj\r\n<</Type /XRef/W[1 4 2]/Index[", obj_num)?;
        dict.extend_from_slice(&index);
        write!(dict, "]/Size {}", obj_num as u64 + 1)?;
        if self.prev_offset > 0 {
            write!(dict, "/Prev {}", self.prev_offset)?;
        }
        write!(
            dict,
            "/Filter /FlateDecode/DecodeParms<</Columns 7/Predictor 12>>/Length {}",
            data.len()
        )?;
        if let Some(entries) = trailer_entries {
            dict.extend_from_slice(entries);
        }
        dict.extend_from_slice(b">>stream\r\n");

        out.write(&dict)?;
        out.write(&data)?;
        out.write(b"\r\nendstream\r\nendobj\r\n")?;

        log::debug!(
            "Cross-reference stream {} written at offset {} ({} rows)",
            obj_num,
            offset,
            rows.len() / 7
        );
        self.prev_offset = offset;
        Ok(())
    }

    fn row<S: ByteSink>(&self, out: &Output<S>, obj_num: u32) -> Result<[u8; 7]> {
        if let (Some(index), Some(container)) = (
            self.object_stream.index_of(obj_num),
            self.object_stream.container_number(),
        ) {
            return Ok(compressed_row(container, index));
        }
        match out.offsets().get(obj_num) {
            Some(ObjectLocation::InFile(offset)) => offset_row(offset),
            Some(ObjectLocation::Compressed { stream, index }) => Ok(compressed_row(stream, index)),
            None => Ok(free_row(false)),
        }
    }
}

/// Type 0 row; the head of the free list carries generation 65535.
pub fn free_row(first: bool) -> [u8; 7] {
    let gen = if first { 0xFF } else { 0 };
    [0, 0, 0, 0, 0, gen, gen]
}

/// Type 1 row. Offsets past 4 GiB do not fit the field.
pub fn offset_row(offset: u64) -> Result<[u8; 7]> {
    let field = u32::try_from(offset).map_err(|_| Error::OffsetOverflow {
        offset,
        increment: 0,
    })?;
    let b = field.to_be_bytes();
    Ok([1, b[0], b[1], b[2], b[3], 0, 0])
}

/// Type 2 row.
pub fn compressed_row(container: u32, index: u16) -> [u8; 7] {
    let c = container.to_be_bytes();
    let i = index.to_be_bytes();
    [2, c[0], c[1], c[2], c[3], i[0], i[1]]
}
