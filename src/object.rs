//! PDF object types.
//!
//! The writer consumes documents as a tree of [`Object`] values. Dictionaries
//! keep insertion order so that serialising the same tree twice produces the
//! same bytes.

use bytes::Bytes;
use indexmap::IndexMap;

/// Insertion-ordered PDF dictionary.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String, literal `(...)` or hex `<...>`
    String(PdfString),
    /// Name (written with a leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// String payload together with the syntax it was read or built with.
///
/// The writer keeps the flavour when it re-encodes encrypted bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString {
    /// Raw string bytes
    pub bytes: Vec<u8>,
    /// Written as `<hex>` instead of `(literal)`
    pub hex: bool,
}

impl PdfString {
    /// Literal string.
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: false,
        }
    }

    /// Hex string.
    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: true,
        }
    }
}

/// Stream object: dictionary plus payload bytes.
///
/// `data` holds the bytes exactly as they should appear between `stream`
/// and `endstream` when no re-encoding happens, i.e. already filtered when
/// the dictionary names a `/Filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Stream data
    pub data: Bytes,
}

impl Stream {
    /// Create a stream; `/Length` is filled in from the payload.
    pub fn new(mut dict: Dictionary, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        Self { dict, data }
    }

    /// Whether the dictionary carries a `/Filter` entry.
    pub fn has_filter(&self) -> bool {
        self.dict.contains_key("Filter")
    }

    /// Names listed under `/Filter`, in application order.
    pub fn filter_names(&self) -> Vec<&str> {
        match self.dict.get("Filter") {
            Some(Object::Name(name)) => vec![name.as_str()],
            Some(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_name()).collect(),
            _ => Vec::new(),
        }
    }
}

impl Object {
    /// Build a name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Build a literal string object.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Object {
        Object::String(PdfString::literal(bytes))
    }

    /// Build a hex string object.
    pub fn hex_string(bytes: impl Into<Vec<u8>>) -> Object {
        Object::String(PdfString::hex(bytes))
    }

    /// Build a reference to generation 0 of `id`.
    pub fn reference(id: u32) -> Object {
        Object::Reference(ObjectRef::new(id, 0))
    }

    /// Build a dictionary object from `(key, value)` pairs, keeping their order.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number. Integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            Object::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(&s.bytes),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Check if object is a number (integer or real).
    pub fn is_number(&self) -> bool {
        matches!(self, Object::Integer(_) | Object::Real(_))
    }

    /// Value of the `/Type` name, if the object is a dictionary or stream.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()
            .and_then(|d| d.get("Type"))
            .and_then(|t| t.as_name())
    }
}

/// Whether a dictionary is a digital signature dictionary.
///
/// Matches both `/Type /Sig` and signature field dictionaries (`/FT /Sig`).
pub fn is_signature_dict(dict: &Dictionary) -> bool {
    let name_is_sig = |key: &str| dict.get(key).and_then(|v| v.as_name()) == Some("Sig");
    name_is_sig("Type") || name_is_sig("FT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_integer() {
        let obj = Object::Integer(42);
        assert_eq!(obj.as_integer(), Some(42));
        assert!(obj.as_name().is_none());
        assert!(obj.is_number());
        assert!(!obj.is_null());
    }

    #[test]
    fn test_object_string_flavours() {
        let lit = Object::string("Hello");
        let hex = Object::hex_string(vec![0x00, 0xFF]);
        assert_eq!(lit.as_string(), Some(&b"Hello"[..]));
        assert!(matches!(lit, Object::String(PdfString { hex: false, .. })));
        assert!(matches!(hex, Object::String(PdfString { hex: true, .. })));
    }

    #[test]
    fn test_dictionary_keeps_insertion_order() {
        let obj = Object::dict(vec![
            ("Type", Object::name("Page")),
            ("Parent", Object::reference(2)),
            ("Contents", Object::reference(4)),
        ]);
        let keys: Vec<&str> = obj.as_dict().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Type", "Parent", "Contents"]);
        assert_eq!(obj.dict_type(), Some("Page"));
    }

    #[test]
    fn test_stream_new_sets_length() {
        let stream = Stream::new(Dictionary::new(), b"stream data".to_vec());
        assert_eq!(stream.dict.get("Length").and_then(|l| l.as_integer()), Some(11));
        assert!(!stream.has_filter());

        let obj = Object::Stream(stream);
        assert_eq!(obj.as_dict().unwrap().get("Length").unwrap().as_integer(), Some(11));
    }

    #[test]
    fn test_stream_filter_names() {
        let mut dict = Dictionary::new();
        dict.insert(
            "Filter".to_string(),
            Object::Array(vec![Object::name("ASCII85Decode"), Object::name("FlateDecode")]),
        );
        let stream = Stream::new(dict, Bytes::new());
        assert!(stream.has_filter());
        assert_eq!(stream.filter_names(), vec!["ASCII85Decode", "FlateDecode"]);
    }

    #[test]
    fn test_object_ref_display() {
        let obj_ref = ObjectRef::new(10, 0);
        assert_eq!(format!("{}", obj_ref), "10 0 R");
        assert_eq!(Object::reference(10).as_reference(), Some(obj_ref));
    }

    #[test]
    fn test_signature_dict_detection() {
        let sig = Object::dict(vec![("Type", Object::name("Sig"))]);
        let field = Object::dict(vec![("FT", Object::name("Sig"))]);
        let page = Object::dict(vec![("Type", Object::name("Page"))]);
        assert!(is_signature_dict(sig.as_dict().unwrap()));
        assert!(is_signature_dict(field.as_dict().unwrap()));
        assert!(!is_signature_dict(page.as_dict().unwrap()));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Object::Null.type_name(), "Null");
        assert_eq!(Object::Stream(Stream::new(Dictionary::new(), Bytes::new())).type_name(), "Stream");
    }
}
