// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Creator
//!
//! Resumable PDF file writer: turns an in-memory object graph, optionally
//! backed by a previously parsed file, into the bytes of a PDF.
//!
//! ## Core Features
//!
//! - **Full rewrites**: header, every live object, classic `xref` table and trailer
//! - **Incremental updates**: original bytes copied verbatim, new and modified
//!   objects appended, `/Prev` chain kept intact
//! - **Object streams**: compressible objects packed into `/Type /ObjStm`
//!   containers indexed by flate + PNG predicted `/Type /XRef` streams
//! - **Encryption**: per-object RC4 / AES string and stream encryption through
//!   the [`encryption::CryptoHandler`] seam; new standard security or removal
//!   of existing security
//! - **Progressive writing**: the write is a stage machine that can be driven
//!   one bounded step at a time
//!
//! ## Architecture
//!
//! - [`document::Document`] owns the resident objects
//! - [`source::ParsedSource`] describes the original file (cross-reference
//!   entries, raw object bytes, trailer, security)
//! - [`sink::ByteSink`] receives the output, append only
//! - [`writer::Creator`] drives the write
//!
//! ## Quick Start
//!
//! ```
//! use pdf_creator::config::SaveOptions;
//! use pdf_creator::document::Document;
//! use pdf_creator::object::{Dictionary, Object, Stream};
//! use pdf_creator::writer::Creator;
//!
//! # fn main() -> pdf_creator::Result<()> {
//! let mut doc = Document::new();
//! let content = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), b"BT ET".to_vec())));
//! let page = doc.add_object(Object::dict(vec![
//!     ("Type", Object::name("Page")),
//!     ("Contents", Object::reference(content)),
//! ]));
//! let root = doc.add_object(Object::dict(vec![
//!     ("Type", Object::name("Catalog")),
//!     ("Pages", Object::reference(page)),
//! ]));
//! doc.set_root(root);
//!
//! let mut creator = Creator::new(&mut doc, Vec::new());
//! creator.create(&SaveOptions::full_rewrite())?;
//! let pdf: Vec<u8> = creator.into_sink();
//! assert!(pdf.starts_with(b"%PDF-1.7"));
//! # Ok(())
//! # }
//! ```

// Error handling
pub mod error;

// Object model and collaborators
pub mod document;
pub mod object;
pub mod sink;
pub mod source;

// Stream filters
pub mod filters;

// Security
pub mod encryption;

// Write configuration
pub mod config;

// Writing
pub mod writer;

// Re-exports
pub use config::{CreateFlags, SaveOptions};
pub use document::Document;
pub use error::{Error, Result};
pub use writer::{Creator, Progress, Stage};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is populated from CARGO_PKG_VERSION at compile time
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_creator");
    }
}
