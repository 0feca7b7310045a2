//! The in-memory document a write works on.
//!
//! A [`Document`] owns the indirect objects that live in memory: objects
//! created or edited by the host, plus objects materialized from the source
//! file on demand. Everything else stays in the [`ParsedSource`] and is only
//! read when the creator needs it.

use crate::object::{Dictionary, Object};
use crate::source::ParsedSource;
use std::collections::{BTreeMap, BTreeSet};

/// Indirect object graph of a PDF document.
pub struct Document {
    objects: BTreeMap<u32, Object>,
    /// Numbers changed since loading
    modified: BTreeSet<u32>,
    /// Numbers materialized from the source only for reading
    transient: BTreeSet<u32>,
    root: Option<u32>,
    info: Option<u32>,
    last_obj_num: u32,
    source: Option<Box<dyn ParsedSource>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("resident", &self.objects.len())
            .field("modified", &self.modified.len())
            .field("root", &self.root)
            .field("last_obj_num", &self.last_obj_num)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with no source file.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            modified: BTreeSet::new(),
            transient: BTreeSet::new(),
            root: None,
            info: None,
            last_obj_num: 0,
            source: None,
        }
    }

    /// Document backed by a parsed file. `/Root` and `/Info` are taken from
    /// the source trailer.
    pub fn from_source(source: Box<dyn ParsedSource>) -> Self {
        let trailer_ref = |key: &str| {
            source
                .trailer()
                .and_then(|t| t.get(key))
                .and_then(|v| v.as_reference())
                .map(|r| r.id)
        };
        let root = trailer_ref("Root");
        let info = trailer_ref("Info");
        let last_obj_num = source.last_obj_num();
        Self {
            root,
            info,
            last_obj_num,
            source: Some(source),
            ..Self::new()
        }
    }

    /// Source file, if any.
    pub fn source(&self) -> Option<&dyn ParsedSource> {
        self.source.as_deref()
    }

    /// Highest object number in use.
    pub fn last_obj_num(&self) -> u32 {
        self.last_obj_num
    }

    /// Catalog object number.
    pub fn root(&self) -> Option<u32> {
        self.root
    }

    /// Set the catalog object number.
    pub fn set_root(&mut self, obj_num: u32) {
        self.root = Some(obj_num);
    }

    /// Document information dictionary number.
    pub fn info(&self) -> Option<u32> {
        self.info
    }

    /// Set the document information dictionary number.
    pub fn set_info(&mut self, obj_num: u32) {
        self.info = Some(obj_num);
    }

    /// Add a new indirect object and return its number.
    pub fn add_object(&mut self, object: Object) -> u32 {
        let obj_num = self.last_obj_num + 1;
        self.set_object(obj_num, object);
        obj_num
    }

    /// Store `object` under `obj_num`, replacing any previous version.
    pub fn set_object(&mut self, obj_num: u32, object: Object) {
        self.objects.insert(obj_num, object);
        self.modified.insert(obj_num);
        self.transient.remove(&obj_num);
        self.last_obj_num = self.last_obj_num.max(obj_num);
    }

    /// Resident object `obj_num`.
    pub fn get(&self, obj_num: u32) -> Option<&Object> {
        self.objects.get(&obj_num)
    }

    /// Mutable access to object `obj_num`, loading it from the source first.
    /// The object counts as modified afterwards.
    pub fn get_mut(&mut self, obj_num: u32) -> Option<&mut Object> {
        self.load(obj_num)?;
        self.modified.insert(obj_num);
        self.transient.remove(&obj_num);
        self.objects.get_mut(&obj_num)
    }

    /// Object `obj_num`, parsed from the source when not resident.
    pub fn load(&mut self, obj_num: u32) -> Option<&Object> {
        if !self.objects.contains_key(&obj_num) {
            let parsed = self.source.as_ref()?.parse_object(obj_num)?;
            log::trace!("Materialized object {} from source", obj_num);
            self.objects.insert(obj_num, parsed);
            self.transient.insert(obj_num);
        }
        self.objects.get(&obj_num)
    }

    /// Drop the in-memory copy of `obj_num` if it was only loaded for reading.
    pub fn release(&mut self, obj_num: u32) {
        if self.transient.remove(&obj_num) {
            self.objects.remove(&obj_num);
        }
    }

    /// Whether `obj_num` is held in memory.
    pub fn is_resident(&self, obj_num: u32) -> bool {
        self.objects.contains_key(&obj_num)
    }

    /// Whether `obj_num` was added or changed since loading.
    pub fn is_modified(&self, obj_num: u32) -> bool {
        self.modified.contains(&obj_num)
    }

    /// Numbers of the objects added or changed since loading.
    pub fn modified_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.modified.iter().copied()
    }

    /// Numbers of all resident objects, ascending.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.objects.keys().copied()
    }

    /// Remove `obj_num` from the document.
    pub fn remove_object(&mut self, obj_num: u32) -> Option<Object> {
        self.modified.remove(&obj_num);
        self.transient.remove(&obj_num);
        self.objects.remove(&obj_num)
    }

    /// Catalog dictionary, loading it if needed.
    pub fn catalog(&mut self) -> Option<&Dictionary> {
        let root = self.root?;
        self.load(root).and_then(|o| o.as_dict())
    }
}
