//! Byte offset bookkeeping for the file being written.

use crate::encryption::CryptoHandler;
use crate::error::{Error, Result};
use crate::sink::ByteSink;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where an object ended up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLocation {
    /// Written as an indirect object starting at this file offset
    InFile(u64),
    /// Packed into object stream `stream` at position `index`
    Compressed {
        /// Object number of the containing object stream
        stream: u32,
        /// Position inside the container
        index: u16,
    },
}

/// Object number to location table, consumed by the cross-reference section.
#[derive(Debug, Clone, Default)]
pub struct ObjectOffsets {
    entries: BTreeMap<u32, ObjectLocation>,
}

impl ObjectOffsets {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file offset for `obj_num`.
    pub fn set_offset(&mut self, obj_num: u32, offset: u64) {
        self.entries.insert(obj_num, ObjectLocation::InFile(offset));
    }

    /// Record an object stream location for `obj_num`.
    pub fn set_compressed(&mut self, obj_num: u32, stream: u32, index: u16) {
        self.entries
            .insert(obj_num, ObjectLocation::Compressed { stream, index });
    }

    /// Forget `obj_num`.
    pub fn remove(&mut self, obj_num: u32) -> Option<ObjectLocation> {
        self.entries.remove(&obj_num)
    }

    /// Location of `obj_num`.
    pub fn get(&self, obj_num: u32) -> Option<ObjectLocation> {
        self.entries.get(&obj_num).copied()
    }

    /// File offset of `obj_num` when it was written directly.
    pub fn file_offset(&self, obj_num: u32) -> Option<u64> {
        match self.get(obj_num) {
            Some(ObjectLocation::InFile(offset)) => Some(offset),
            _ => None,
        }
    }

    /// Whether `obj_num` has an entry.
    pub fn contains(&self, obj_num: u32) -> bool {
        self.entries.contains_key(&obj_num)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in object number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, ObjectLocation)> + '_ {
        self.entries.iter().map(|(&n, &loc)| (n, loc))
    }

    /// Contiguous runs of object numbers in `from..=to` that have an entry,
    /// as `(first, count)` pairs.
    pub fn runs(&self, from: u32, to: u32) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for (&n, _) in self.entries.range(from..=to) {
            match runs.last_mut() {
                Some((start, count)) if *start + *count == n => *count += 1,
                _ => runs.push((n, 1)),
            }
        }
        runs
    }
}

/// The output side of a write: the sink, the running offset, the object
/// location table, object number allocation and the active crypto handler.
pub struct Output<S: ByteSink> {
    sink: S,
    offset: u64,
    offsets: ObjectOffsets,
    last_obj_num: u32,
    crypto: Option<Arc<dyn CryptoHandler>>,
}

impl<S: ByteSink> Output<S> {
    /// Start writing at offset 0; new object numbers follow `last_obj_num`.
    pub fn new(sink: S, last_obj_num: u32) -> Self {
        Self {
            sink,
            offset: 0,
            offsets: ObjectOffsets::new(),
            last_obj_num,
            crypto: None,
        }
    }

    /// Append bytes and advance the offset.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.append_bytes(bytes)?;
        self.advance(bytes.len() as u64)
    }

    /// Append the decimal form of `value`.
    pub fn write_decimal(&mut self, value: u64) -> Result<()> {
        self.write(value.to_string().as_bytes())
    }

    /// Advance the running offset without writing, with overflow checking.
    pub fn advance(&mut self, increment: u64) -> Result<()> {
        self.offset = self
            .offset
            .checked_add(increment)
            .ok_or(Error::OffsetOverflow {
                offset: self.offset,
                increment,
            })?;
        Ok(())
    }

    /// Reposition the running offset (bytes already present before the sink).
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Current file offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    /// Allocate the next unused object number.
    pub fn next_object_number(&mut self) -> u32 {
        self.last_obj_num += 1;
        self.last_obj_num
    }

    /// Highest object number handed out so far.
    pub fn last_object_number(&self) -> u32 {
        self.last_obj_num
    }

    /// Object location table.
    pub fn offsets(&self) -> &ObjectOffsets {
        &self.offsets
    }

    /// Mutable object location table.
    pub fn offsets_mut(&mut self) -> &mut ObjectOffsets {
        &mut self.offsets
    }

    /// Crypto handler applied to strings and streams.
    pub fn crypto(&self) -> Option<&dyn CryptoHandler> {
        self.crypto.as_deref()
    }

    /// Install or clear the crypto handler.
    pub fn set_crypto(&mut self, crypto: Option<Arc<dyn CryptoHandler>>) {
        self.crypto = crypto;
    }

    /// Shared handle to the crypto handler.
    pub fn crypto_handle(&self) -> Option<Arc<dyn CryptoHandler>> {
        self.crypto.clone()
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give the sink back.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
