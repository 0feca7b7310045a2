//! PDF file writing.
//!
//! This module turns a [`Document`](crate::document::Document) into the bytes
//! of a PDF file, either as a complete rewrite or as an incremental update
//! appended to the original file.
//!
//! ## Architecture
//!
//! ```text
//! Document (+ ParsedSource)
//!     ↓
//! [Creator] (resumable stage machine, one unit of work per step)
//!     ↓                          ↓
//! [ObjectSerializer]        [XRefStreamBuilder] → [ObjectStreamBuilder]
//!     ↓ flate_encoder / encryptor       ↓
//! [Output] (running offset, object locations, crypto)
//!     ↓
//! ByteSink
//! ```
//!
//! ## Example
//!
//! ```
//! use pdf_creator::config::SaveOptions;
//! use pdf_creator::document::Document;
//! use pdf_creator::object::Object;
//! use pdf_creator::writer::Creator;
//!
//! let mut doc = Document::new();
//! let root = doc.add_object(Object::dict(vec![("Type", Object::name("Catalog"))]));
//! doc.set_root(root);
//!
//! let mut creator = Creator::new(&mut doc, Vec::new());
//! creator.create(&SaveOptions::full_rewrite().with_object_streams(true))?;
//! let pdf = creator.into_sink();
//! assert!(pdf.windows(10).any(|w| w == b"/Type /XRe"));
//! # Ok::<(), pdf_creator::Error>(())
//! ```

mod creator;
mod encryptor;
mod file_id;
mod flate_encoder;
mod object_serializer;
mod object_stream;
mod output;
mod xref_stream;

pub use creator::{classify, runs_of, Creator, Placement, Progress, Stage};
pub use encryptor::encrypt_content;
pub use file_id::{generate_file_id, seed_pair, FileId};
pub use flate_encoder::{encode_buffer, EncodedStream, XREF_ROW_WIDTH};
pub use object_serializer::ObjectSerializer;
pub use object_stream::{ContainerLocation, ObjectStreamBuilder};
pub use output::{ObjectLocation, ObjectOffsets, Output};
pub use xref_stream::{
    compressed_row, free_row, offset_row, IndexSegment, IndexSegments, XRefStreamBuilder,
};
