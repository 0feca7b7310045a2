//! Object stream (`/Type /ObjStm`) accumulation.

use super::encryptor::encrypt_content;
use super::flate_encoder::encode_buffer;
use super::object_serializer::ObjectSerializer;
use super::output::Output;
use crate::config::MAX_OBJECT_STREAM_ITEMS;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::sink::ByteSink;
use std::io::Write;

/// An object stream that has been written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLocation {
    /// Object number of the container
    pub obj_num: u32,
    /// File offset of the container's `obj` keyword line
    pub offset: u64,
}

/// Collects compressible objects until the caller decides to finalize them
/// into one object stream.
#[derive(Debug, Default)]
pub struct ObjectStreamBuilder {
    /// `(object number, offset in buffer)` per packed object
    items: Vec<(u32, usize)>,
    buffer: Vec<u8>,
    /// Container number, assigned on first need
    obj_num: Option<u32>,
}

impl ObjectStreamBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all items and forget the container number.
    pub fn start(&mut self) {
        self.items.clear();
        self.buffer.clear();
        self.obj_num = None;
    }

    /// Serialize `obj` into the container buffer.
    ///
    /// Strings are written in clear text: the container is encrypted as a
    /// whole when it is finalized.
    pub fn compress_object(&mut self, obj_num: u32, obj: &Object) -> Result<()> {
        self.items.push((obj_num, self.buffer.len()));
        ObjectSerializer::new(obj_num).write_object(&mut self.buffer, obj)?;
        self.buffer.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Append the already serialized body of an object.
    pub fn compress_raw(&mut self, obj_num: u32, raw: &[u8]) {
        self.items.push((obj_num, self.buffer.len()));
        self.buffer.extend_from_slice(raw);
        self.buffer.extend_from_slice(b"\r\n");
    }

    /// Number of packed objects.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is packed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uncompressed size of the packed object bodies.
    pub fn raw_len(&self) -> usize {
        self.buffer.len()
    }

    /// Position of `obj_num` inside the container.
    pub fn index_of(&self, obj_num: u32) -> Option<u16> {
        self.items
            .iter()
            .position(|&(n, _)| n == obj_num)
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Container number, if one was assigned.
    pub fn container_number(&self) -> Option<u32> {
        self.obj_num
    }

    /// Assign the container its object number once.
    pub fn assign_number<S: ByteSink>(&mut self, out: &mut Output<S>) -> u32 {
        *self.obj_num.get_or_insert_with(|| out.next_object_number())
    }

    /// Write the container as an indirect object and start over.
    ///
    /// Returns `None` without writing anything when no object is packed.
    /// The offsets of the container and of every packed object are recorded
    /// in the output's location table.
    pub fn end<S: ByteSink>(&mut self, out: &mut Output<S>) -> Result<Option<ContainerLocation>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        if self.items.len() > MAX_OBJECT_STREAM_ITEMS {
            return Err(Error::InvalidPdf(format!(
                "Object stream holds {} objects, at most {} can be indexed",
                self.items.len(),
                MAX_OBJECT_STREAM_ITEMS
            )));
        }

        let offset = out.offset();
        let obj_num = self.assign_number(out);

        let mut content = Vec::with_capacity(self.buffer.len() + self.items.len() * 12);
        for &(n, item_offset) in &self.items {
            write!(content, "{} {} ", n, item_offset)?;
        }
        let first = content.len();
        content.extend_from_slice(&self.buffer);

        let compressed = encode_buffer(&content, false)?;
        let data = encrypt_content(out.crypto(), obj_num, &compressed)?.into_owned();

        let mut header = Vec::new();
        write!(
            header,
            "{} 0 obj\r\n<</Type /ObjStm /N {}/First {}/Length {}/Filter /FlateDecode>>stream\r\n",
            obj_num,
            self.items.len(),
            first,
            data.len()
        )?;
        out.write(&header)?;
        out.write(&data)?;
        out.write(b"\r\nendstream\r\nendobj\r\n")?;

        let offsets = out.offsets_mut();
        offsets.set_offset(obj_num, offset);
        for (index, &(n, _)) in (0u16..=u16::MAX).zip(self.items.iter()) {
            offsets.set_compressed(n, obj_num, index);
        }
        log::debug!(
            "Object stream {} finalized at offset {} with {} objects",
            obj_num,
            offset,
            self.items.len()
        );

        self.start();
        Ok(Some(ContainerLocation { obj_num, offset }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::flate_decode;
    use crate::writer::output::ObjectLocation;

    fn body_between(out: &[u8], start: &[u8], end: &[u8]) -> Vec<u8> {
        let s = out.windows(start.len()).position(|w| w == start).unwrap() + start.len();
        let e = out.windows(end.len()).rposition(|w| w == end).unwrap();
        out[s..e].to_vec()
    }

    #[test]
    fn test_empty_end_writes_nothing() {
        let mut out = Output::new(Vec::new(), 4);
        let mut builder = ObjectStreamBuilder::new();
        assert_eq!(builder.end(&mut out).unwrap(), None);
        assert!(out.sink().is_empty());
        assert_eq!(out.last_object_number(), 4);
    }

    #[test]
    fn test_items_located_by_first_and_offset() {
        let mut out = Output::new(Vec::new(), 10);
        let mut builder = ObjectStreamBuilder::new();
        let a = Object::dict(vec![("Type", Object::name("Font"))]);
        let b = Object::Array(vec![Object::Integer(1), Object::Integer(2)]);
        builder.compress_object(3, &a).unwrap();
        builder.compress_object(4, &b).unwrap();
        assert_eq!(builder.index_of(4), Some(1));

        let location = builder.end(&mut out).unwrap().unwrap();
        assert_eq!(location, ContainerLocation { obj_num: 11, offset: 0 });
        assert!(builder.is_empty());

        let written = out.sink().clone();
        let text = String::from_utf8_lossy(&written);
        assert!(text.starts_with("11 0 obj\r\n<</Type /ObjStm /N 2/First "));

        let inflated = flate_decode(&body_between(&written, b"stream\r\n", b"\r\nendstream")).unwrap();
        let first: usize = text
            .split("/First ")
            .nth(1)
            .and_then(|s| s.split('/').next())
            .and_then(|s| s.parse().ok())
            .unwrap();
        let header = String::from_utf8_lossy(&inflated[..first]).to_string();
        let nums: Vec<usize> = header.split_whitespace().map(|t| t.parse().unwrap()).collect();
        assert_eq!(nums[0], 3);
        assert_eq!(nums[2], 4);

        let direct = ObjectSerializer::new(4).serialize(&b).unwrap();
        let at = first + nums[3];
        assert_eq!(&inflated[at..at + direct.len()], &direct[..]);

        assert_eq!(out.offsets().get(11), Some(ObjectLocation::InFile(0)));
        assert_eq!(
            out.offsets().get(4),
            Some(ObjectLocation::Compressed { stream: 11, index: 1 })
        );
    }

    #[test]
    fn test_container_number_assigned_once() {
        let mut out = Output::new(Vec::new(), 0);
        let mut builder = ObjectStreamBuilder::new();
        builder.compress_raw(1, b"<</A 1>>");
        let n = builder.assign_number(&mut out);
        assert_eq!(builder.assign_number(&mut out), n);
        assert_eq!(builder.end(&mut out).unwrap().map(|l| l.obj_num), Some(n));
        assert_eq!(builder.container_number(), None);
    }

    #[test]
    fn test_raw_len_tracks_buffer() {
        let mut builder = ObjectStreamBuilder::new();
        builder.compress_raw(7, b"12 0 R");
        assert_eq!(builder.raw_len(), 8);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_container_index_limit() {
        let mut out = Output::new(Vec::new(), 70_000);
        let mut builder = ObjectStreamBuilder::new();
        for n in 1..=MAX_OBJECT_STREAM_ITEMS as u32 {
            builder.compress_raw(n, b"[]");
        }
        assert_eq!(builder.index_of(65_536), Some(u16::MAX));
        let container = builder.end(&mut out).unwrap().unwrap().obj_num;
        assert_eq!(
            out.offsets().get(65_536),
            Some(ObjectLocation::Compressed { stream: container, index: u16::MAX })
        );

        let mut out = Output::new(Vec::new(), 70_000);
        for n in 1..=MAX_OBJECT_STREAM_ITEMS as u32 + 1 {
            builder.compress_raw(n, b"[]");
        }
        assert_eq!(builder.index_of(65_537), None);
        assert!(matches!(builder.end(&mut out), Err(Error::InvalidPdf(_))));
        assert!(out.sink().is_empty());
    }
}
