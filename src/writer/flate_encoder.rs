//! Stream payload encoding ahead of serialization.
//!
//! A stream either passes through untouched, gets flate compressed, or (for
//! the metadata stream) gets decoded so it can be written in clear text. The
//! dictionary is borrowed from the document and only cloned when one of its
//! entries has to change.

use crate::error::Result;
use crate::filters::{decode_stream, flate_encode, png_up_encode};
use crate::object::{Dictionary, Object, Stream};
use std::borrow::Cow;

/// Row width of cross-reference stream entries (`/W [1 4 2]`).
pub const XREF_ROW_WIDTH: usize = 7;

/// Stream dictionary and payload ready for encryption.
#[derive(Debug)]
pub struct EncodedStream<'a> {
    /// Dictionary to write; owned once any entry was changed
    pub dict: Cow<'a, Dictionary>,
    /// Payload to write
    pub data: Cow<'a, [u8]>,
}

impl<'a> EncodedStream<'a> {
    /// Stream as stored, without any transform.
    pub fn passthrough(stream: &'a Stream) -> Self {
        Self {
            dict: Cow::Borrowed(&stream.dict),
            data: Cow::Borrowed(&stream.data[..]),
        }
    }

    /// Prepare `stream` for writing.
    ///
    /// With `flate` set, unfiltered payloads are compressed and tagged
    /// `/FlateDecode`, while already filtered payloads pass through. Without
    /// it, filtered payloads are decoded and their `/Filter` entry dropped.
    pub fn encode(stream: &'a Stream, flate: bool) -> Result<Self> {
        let has_filter = stream.has_filter();

        if has_filter && !flate {
            return match decode_stream(stream) {
                Ok(decoded) => {
                    let mut dict = stream.dict.clone();
                    dict.shift_remove("Filter");
                    dict.shift_remove("DecodeParms");
                    Ok(Self {
                        dict: Cow::Owned(dict),
                        data: Cow::Owned(decoded),
                    })
                },
                Err(e) => {
                    log::warn!("Writing filtered stream as stored, decode failed: {}", e);
                    Ok(Self::passthrough(stream))
                },
            };
        }

        if has_filter || !flate {
            return Ok(Self::passthrough(stream));
        }

        let compressed = flate_encode(&stream.data)?;
        let mut encoded = Self::passthrough(stream);
        let dict = encoded.dict.to_mut();
        dict.insert("Length".to_string(), Object::Integer(compressed.len() as i64));
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        dict.shift_remove("DecodeParms");
        encoded.data = Cow::Owned(compressed);
        Ok(encoded)
    }

    /// Whether the dictionary was cloned.
    pub fn dict_is_owned(&self) -> bool {
        matches!(self.dict, Cow::Owned(_))
    }

    /// Make `/Length` agree with `len`, cloning the dictionary only if needed.
    pub fn reconcile_length(&mut self, len: usize) {
        let current = self.dict.get("Length").and_then(|l| l.as_integer());
        if current != Some(len as i64) {
            self.dict
                .to_mut()
                .insert("Length".to_string(), Object::Integer(len as i64));
        }
    }
}

/// Flate compress a raw buffer. Cross-reference stream rows get the PNG Up
/// predictor first (`/Predictor 12 /Columns 7`).
pub fn encode_buffer(data: &[u8], xref_rows: bool) -> Result<Vec<u8>> {
    if xref_rows {
        flate_encode(&png_up_encode(data, XREF_ROW_WIDTH))
    } else {
        flate_encode(data)
    }
}
