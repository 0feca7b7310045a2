//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation. Strings and stream
//! payloads are encrypted with the key of the indirect object that owns them
//! when a crypto handler is attached.

use super::encryptor::encrypt_content;
use super::flate_encoder::EncodedStream;
use crate::encryption::CryptoHandler;
use crate::error::Result;
use crate::object::{is_signature_dict, Dictionary, Object, PdfString, Stream};
use std::io::Write;

/// Serializer for the objects owned by one indirect object.
///
/// Dictionary entries are written as `/Key value` with no separator between
/// entries, arrays space separated, references always with generation 0.
#[derive(Clone, Copy)]
pub struct ObjectSerializer<'a> {
    /// Indirect object whose key encrypts nested strings and stream data
    obj_num: u32,
    crypto: Option<&'a dyn CryptoHandler>,
    /// Compress unfiltered stream payloads
    flate_streams: bool,
    /// Encrypt stream payloads (strings are still encrypted when false)
    encrypt_stream_data: bool,
}

impl std::fmt::Debug for ObjectSerializer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectSerializer")
            .field("obj_num", &self.obj_num)
            .field("encrypted", &self.crypto.is_some())
            .field("flate_streams", &self.flate_streams)
            .finish()
    }
}

impl<'a> ObjectSerializer<'a> {
    /// Plain serializer for the contents of object `obj_num`.
    pub fn new(obj_num: u32) -> Self {
        Self {
            obj_num,
            crypto: None,
            flate_streams: true,
            encrypt_stream_data: true,
        }
    }

    /// Attach (or clear) the crypto handler.
    pub fn with_crypto(mut self, crypto: Option<&'a dyn CryptoHandler>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Settings for the document's XMP metadata stream: its payload is
    /// written uncompressed and unencrypted so that it stays readable.
    pub fn for_metadata(mut self) -> Self {
        self.flate_streams = false;
        self.encrypt_stream_data = false;
        self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj)?;
        Ok(buf)
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.serialize(obj)?).to_string())
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} 0 obj\r\n{object}\r\nendobj\r\n`
    pub fn serialize_indirect(&self, obj: &Object) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        write!(buf, "{} 0 obj\r\n", self.obj_num)?;
        self.write_object(&mut buf, obj)?;
        buf.extend_from_slice(b"\r\nendobj\r\n");
        Ok(buf)
    }

    /// Write an object to a buffer.
    pub fn write_object(&self, w: &mut Vec<u8>, obj: &Object) -> Result<()> {
        self.write_value(w, obj, true)
    }

    fn write_value(&self, w: &mut Vec<u8>, obj: &Object, encrypt: bool) -> Result<()> {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => write!(w, "{}", i)?,
            Object::Real(r) => write_real(w, *r)?,
            Object::String(s) => self.write_string(w, s, encrypt)?,
            Object::Name(n) => write_name(w, n),
            Object::Reference(r) => write!(w, "{} 0 R", r.id)?,
            Object::Array(arr) => {
                w.push(b'[');
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        w.push(b' ');
                    }
                    self.write_value(w, item, encrypt)?;
                }
                w.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(w, dict, encrypt)?,
            Object::Stream(stream) => self.write_stream(w, stream)?,
        }
        Ok(())
    }

    fn write_string(&self, w: &mut Vec<u8>, s: &PdfString, encrypt: bool) -> Result<()> {
        let crypto = if encrypt { self.crypto } else { None };
        let bytes = encrypt_content(crypto, self.obj_num, &s.bytes)?;
        if s.hex {
            write_hex_string(w, &bytes);
        } else {
            write_literal_string(w, &bytes);
        }
        Ok(())
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dictionary, encrypt: bool) -> Result<()> {
        let signature = self.crypto.is_some() && is_signature_dict(dict);
        w.extend_from_slice(b"<<");
        for (key, value) in dict {
            write_name(w, key);
            w.push(b' ');
            // signature placeholder bytes are hashed in clear text
            let encrypt_value = encrypt && !(signature && key == "Contents");
            self.write_value(w, value, encrypt_value)?;
        }
        w.extend_from_slice(b">>");
        Ok(())
    }

    /// `<<dict>>stream\r\n{data}\r\nendstream` with `/Length` matching the
    /// bytes actually written.
    fn write_stream(&self, w: &mut Vec<u8>, stream: &Stream) -> Result<()> {
        let mut encoded = EncodedStream::encode(stream, self.flate_streams)?;
        let crypto = if self.encrypt_stream_data { self.crypto } else { None };
        let data = encrypt_content(crypto, self.obj_num, &encoded.data)?.into_owned();
        encoded.reconcile_length(data.len());

        self.write_dictionary(w, &encoded.dict, true)?;
        w.extend_from_slice(b"stream\r\n");
        w.extend_from_slice(&data);
        w.extend_from_slice(b"\r\nendstream");
        Ok(())
    }
}

/// Write a real number with up to five decimals, trailing zeros removed.
fn write_real(w: &mut Vec<u8>, value: f64) -> std::io::Result<()> {
    if !value.is_finite() {
        return write!(w, "0");
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        write!(w, "{}", value as i64)
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        match trimmed {
            "-0" | "" => write!(w, "0"),
            t => write!(w, "{}", t),
        }
    }
}

/// `(...)` with `( ) \` and line breaks escaped.
fn write_literal_string(w: &mut Vec<u8>, data: &[u8]) {
    w.push(b'(');
    for &byte in data {
        match byte {
            b'(' => w.extend_from_slice(b"\\("),
            b')' => w.extend_from_slice(b"\\)"),
            b'\\' => w.extend_from_slice(b"\\\\"),
            b'\n' => w.extend_from_slice(b"\\n"),
            b'\r' => w.extend_from_slice(b"\\r"),
            _ => w.push(byte),
        }
    }
    w.push(b')');
}

fn write_hex_string(w: &mut Vec<u8>, data: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    w.push(b'<');
    for &byte in data {
        w.push(HEX[(byte >> 4) as usize]);
        w.push(HEX[(byte & 0x0F) as usize]);
    }
    w.push(b'>');
}

/// Names start with `/`; whitespace, delimiters, `#` and non-ASCII bytes are
/// written as `#xx`.
fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' => {
                push_escaped(w, byte)
            },
            0x21..=0x7E => w.push(byte),
            _ => push_escaped(w, byte),
        }
    }
}

fn push_escaped(w: &mut Vec<u8>, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    w.push(b'#');
    w.push(HEX[(byte >> 4) as usize]);
    w.push(HEX[(byte & 0x0F) as usize]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{Algorithm, StandardCryptoHandler};
    use crate::filters::{flate_decode, flate_encode};
    use crate::object::ObjectRef;

    fn plain(obj: &Object) -> String {
        ObjectSerializer::new(1).serialize_to_string(obj).unwrap()
    }

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(plain(&Object::Null), "null");
        assert_eq!(plain(&Object::Boolean(true)), "true");
        assert_eq!(plain(&Object::Boolean(false)), "false");
        assert_eq!(plain(&Object::Integer(-123)), "-123");
    }

    #[test]
    fn test_serialize_real() {
        assert_eq!(plain(&Object::Real(3.14258)), "3.14258");
        assert_eq!(plain(&Object::Real(1.0)), "1");
        assert_eq!(plain(&Object::Real(0.5)), "0.5");
        assert_eq!(plain(&Object::Real(-0.000001)), "0");
    }

    #[test]
    fn test_serialize_strings_keep_flavour() {
        assert_eq!(plain(&Object::string("Hello")), "(Hello)");
        assert_eq!(plain(&Object::string("Test (parens)")), "(Test \\(parens\\))");
        assert_eq!(plain(&Object::string("a\\b\r\n")), "(a\\\\b\\r\\n)");
        assert_eq!(plain(&Object::hex_string(vec![0x00, 0xFF, 0x80])), "<00FF80>");
    }

    #[test]
    fn test_serialize_name_escapes() {
        assert_eq!(plain(&Object::name("Type")), "/Type");
        assert_eq!(plain(&Object::name("Name With Space")), "/Name#20With#20Space");
        assert_eq!(plain(&Object::name("A#B")), "/A#23B");
        assert_eq!(plain(&Object::name("x<y>")), "/x#3Cy#3E");
    }

    #[test]
    fn test_serialize_array_and_reference() {
        let arr = Object::Array(vec![
            Object::Integer(1),
            Object::Reference(ObjectRef::new(10, 2)),
            Object::name("N"),
        ]);
        assert_eq!(plain(&arr), "[1 10 0 R /N]");
    }

    #[test]
    fn test_serialize_dictionary_compact() {
        let dict = Object::dict(vec![("Type", Object::name("Page")), ("Count", Object::Integer(1))]);
        assert_eq!(plain(&dict), "<</Type /Page/Count 1>>");
    }

    #[test]
    fn test_serialize_indirect() {
        let bytes = ObjectSerializer::new(1)
            .serialize_indirect(&Object::dict(vec![("Type", Object::name("Catalog"))]))
            .unwrap();
        assert_eq!(bytes, b"1 0 obj\r\n<</Type /Catalog>>\r\nendobj\r\n");
    }

    #[test]
    fn test_serialize_stream_compresses_and_sets_length() {
        let data = b"0 0 m 100 100 l S\n".repeat(10);
        let stream = Object::Stream(Stream::new(Dictionary::new(), data.clone()));
        let out = ObjectSerializer::new(5).serialize(&stream).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("<<"));
        assert!(text.contains("/Filter /FlateDecode"));
        let start = out.windows(8).position(|w| w == b"stream\r\n").unwrap() + 8;
        let end = out.len() - b"\r\nendstream".len();
        let body = &out[start..end];
        assert!(text.contains(&format!("/Length {}", body.len())));
        assert_eq!(flate_decode(body).unwrap(), data);
    }

    #[test]
    fn test_encrypted_string_not_in_clear() {
        let handler = StandardCryptoHandler::new(vec![3u8; 16], Algorithm::Rc4_128);
        let dict = Object::dict(vec![("Title", Object::string("Hello"))]);
        let out = ObjectSerializer::new(3)
            .with_crypto(Some(&handler))
            .serialize(&dict)
            .unwrap();
        assert!(!out.windows(7).any(|w| w == b"(Hello)"));
    }

    #[test]
    fn test_signature_contents_left_in_clear() {
        let handler = StandardCryptoHandler::new(vec![3u8; 16], Algorithm::Rc4_128);
        let sig = Object::dict(vec![
            ("Type", Object::name("Sig")),
            ("Contents", Object::hex_string(vec![0u8; 4])),
            ("Name", Object::string("Signer")),
        ]);
        let out = ObjectSerializer::new(8)
            .with_crypto(Some(&handler))
            .serialize(&sig)
            .unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/Contents <00000000>"));
        assert!(!text.contains("(Signer)"));
    }

    #[test]
    fn test_encrypted_stream_length_matches_ciphertext() {
        let handler = StandardCryptoHandler::new(vec![5u8; 16], Algorithm::Aes128);
        let mut dict = Dictionary::new();
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        let stream = Stream::new(dict, flate_encode(b"q Q").unwrap());
        let raw_len = stream.data.len();

        let out = ObjectSerializer::new(6)
            .with_crypto(Some(&handler))
            .serialize(&Object::Stream(stream))
            .unwrap();
        let start = out.windows(8).position(|w| w == b"stream\r\n").unwrap() + 8;
        let body_len = out.len() - b"\r\nendstream".len() - start;
        assert_ne!(body_len, raw_len);
        assert!(String::from_utf8_lossy(&out).contains(&format!("/Length {}", body_len)));
    }

    #[test]
    fn test_metadata_stream_plain_and_unencrypted() {
        let handler = StandardCryptoHandler::new(vec![5u8; 16], Algorithm::Rc4_128);
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Metadata"));
        let stream = Stream::new(dict, b"<x:xmpmeta/>".to_vec());
        let out = ObjectSerializer::new(7)
            .with_crypto(Some(&handler))
            .for_metadata()
            .serialize(&Object::Stream(stream))
            .unwrap();
        assert!(out.windows(12).any(|w| w == b"<x:xmpmeta/>"));
        assert!(!String::from_utf8_lossy(&out).contains("FlateDecode"));
    }
}
