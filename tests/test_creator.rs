//! Integration tests for full document writes.
//!
//! Covers:
//! - Fresh documents written from memory
//! - Classic cross-reference table integrity
//! - Stream compression and /Length reconciliation
//! - Full rewrites of a parsed source file
//! - Progressive writing and file-backed sinks

use pdf_creator::config::SaveOptions;
use pdf_creator::document::Document;
use pdf_creator::filters::{flate_decode, flate_encode};
use pdf_creator::object::{Dictionary, Object, Stream};
use pdf_creator::sink::WriteSink;
use pdf_creator::source::{MemorySource, ParsedSource};
use pdf_creator::writer::{Creator, Progress, Stage};
use pdf_creator::Error;
use std::io::{Read, Seek, SeekFrom};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offset named by the final `startxref`.
fn startxref(pdf: &[u8]) -> usize {
    let at = pdf
        .windows(9)
        .rposition(|w| w == b"startxref")
        .expect("no startxref");
    String::from_utf8_lossy(&pdf[at + 11..])
        .lines()
        .next()
        .and_then(|l| l.trim().parse().ok())
        .expect("bad startxref value")
}

/// `(object number, offset)` for every in-use entry of a classic table.
fn classic_entries(pdf: &[u8], xref_offset: usize) -> Vec<(u32, usize)> {
    let text = String::from_utf8_lossy(&pdf[xref_offset..]).to_string();
    let mut lines = text.split("\r\n");
    assert_eq!(lines.next(), Some("xref"));
    let mut entries = Vec::new();
    while let Some(header) = lines.next() {
        if header.starts_with("trailer") {
            break;
        }
        let nums: Vec<u32> = header.split(' ').map(|t| t.parse().unwrap()).collect();
        for obj_num in nums[0]..nums[0] + nums[1] {
            let line = lines.next().unwrap();
            assert_eq!(line.len(), 18, "entry line {:?}", line);
            if line.ends_with('n') {
                entries.push((obj_num, line[..10].parse().unwrap()));
            }
        }
    }
    entries
}

fn assert_offsets_point_at_objects(pdf: &[u8]) {
    for (obj_num, offset) in classic_entries(pdf, startxref(pdf)) {
        let expected = format!("{} ", obj_num);
        assert!(
            pdf[offset..].starts_with(expected.as_bytes()),
            "object {} not at offset {}",
            obj_num,
            offset
        );
    }
}

fn simple_document() -> Document {
    let mut doc = Document::new();
    let content = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"BT /F1 24 Tf 72 720 Td (Hello) Tj ET".to_vec(),
    )));
    let page = doc.add_object(Object::dict(vec![
        ("Type", Object::name("Page")),
        ("Parent", Object::reference(3)),
        ("Contents", Object::reference(content)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(612.0),
                Object::Real(792.5),
            ]),
        ),
    ]));
    doc.add_object(Object::dict(vec![
        ("Type", Object::name("Pages")),
        ("Kids", Object::Array(vec![Object::reference(page)])),
        ("Count", Object::Integer(1)),
    ]));
    let root = doc.add_object(Object::dict(vec![
        ("Type", Object::name("Catalog")),
        ("Pages", Object::reference(3)),
    ]));
    doc.set_root(root);
    doc
}

fn write(doc: &mut Document, options: &SaveOptions) -> Vec<u8> {
    let mut creator = Creator::new(doc, Vec::new());
    assert_eq!(creator.create(options).unwrap(), Progress::Done);
    creator.into_sink()
}

#[test]
fn test_fresh_document_structure() {
    init();
    let mut doc = simple_document();
    let pdf = write(&mut doc, &SaveOptions::full_rewrite().with_id_seed(11));
    let text = String::from_utf8_lossy(&pdf).to_string();

    assert!(pdf.starts_with(b"%PDF-1.7\r\n%\xA1\xB3\xC5\xD7\r\n"));
    assert!(text.contains("4 0 obj\r\n<</Type /Catalog/Pages 3 0 R>>\r\nendobj\r\n"));
    assert!(text.contains("/MediaBox [0 0 612 792.5]"));
    assert!(text.contains("xref\r\n0 5\r\n0000000000 65535 f\r\n"));
    assert!(text.contains("trailer\r\n<<\r\n/Root 4 0 R\r\n/Size 5/ID[<"));
    assert!(text.ends_with("%%EOF\r\n"));
    assert_offsets_point_at_objects(&pdf);
}

#[test]
fn test_unfiltered_stream_is_compressed_with_matching_length() {
    init();
    let mut doc = simple_document();
    let pdf = write(&mut doc, &SaveOptions::full_rewrite().with_id_seed(11));

    let start = find(&pdf, b"1 0 obj\r\n").unwrap();
    let dict_end = start + find(&pdf[start..], b">>stream\r\n").unwrap();
    let dict = String::from_utf8_lossy(&pdf[start..dict_end]).to_string();
    assert!(dict.contains("/Filter /FlateDecode"));
    let length: usize = dict
        .split("/Length ")
        .nth(1)
        .and_then(|s| s.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|s| s.parse().ok())
        .unwrap();

    let data_start = dict_end + b">>stream\r\n".len();
    assert_eq!(&pdf[data_start + length..data_start + length + 11], b"\r\nendstream");
    let inflated = flate_decode(&pdf[data_start..data_start + length]).unwrap();
    assert_eq!(inflated, b"BT /F1 24 Tf 72 720 Td (Hello) Tj ET");
}

#[test]
fn test_prefiltered_stream_passes_through() {
    init();
    let compressed = flate_encode(b"0 0 m 10 10 l S").unwrap();
    let mut dict = Dictionary::new();
    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
    let mut doc = simple_document();
    doc.set_object(1, Object::Stream(Stream::new(dict, compressed.clone())));

    let pdf = write(&mut doc, &SaveOptions::full_rewrite().with_id_seed(11));
    let expected = [
        format!("/Length {}>>stream\r\n", compressed.len()).into_bytes(),
        compressed,
        b"\r\nendstream".to_vec(),
    ]
    .concat();
    assert!(find(&pdf, &expected).is_some());
}

#[test]
fn test_same_seed_is_reproducible() {
    let mut a = simple_document();
    let mut b = simple_document();
    let options = SaveOptions::full_rewrite().with_id_seed(99);
    assert_eq!(write(&mut a, &options), write(&mut b, &options));

    let mut c = simple_document();
    assert_ne!(write(&mut c, &SaveOptions::full_rewrite().with_id_seed(100)), write(&mut a, &options));
}

#[test]
fn test_progressive_write_matches_blocking_write() {
    init();
    let options = SaveOptions::full_rewrite().with_id_seed(5);
    let mut blocking_doc = simple_document();
    let blocking = write(&mut blocking_doc, &options);

    let mut doc = simple_document();
    let mut creator = Creator::new(&mut doc, Vec::new());
    assert_eq!(
        creator.create(&options.clone().with_progressive(true)).unwrap(),
        Progress::Pending(Stage::Init)
    );
    let mut stages = vec![creator.stage()];
    loop {
        match creator.continue_write(1).unwrap() {
            Progress::Pending(stage) => {
                if stages.last() != Some(&stage) {
                    stages.push(stage);
                }
            },
            Progress::Done => break,
        }
    }
    assert_eq!(
        stages,
        vec![
            Stage::Init,
            Stage::Preamble,
            Stage::NewObjects,
            Stage::EncryptDict,
            Stage::XRef,
            Stage::ClassicTable,
            Stage::Trailer,
        ]
    );
    assert_eq!(creator.into_sink(), blocking);
}

#[test]
fn test_bounded_steps_return_pending() {
    let mut doc = simple_document();
    let mut creator = Creator::new(&mut doc, Vec::new());
    creator
        .create(&SaveOptions::full_rewrite().with_progressive(true))
        .unwrap();
    assert_eq!(creator.continue_write(0).unwrap(), Progress::Pending(Stage::Init));
    assert!(matches!(creator.continue_write(3).unwrap(), Progress::Pending(_)));
    assert_eq!(creator.continue_write(usize::MAX).unwrap(), Progress::Done);
}

#[test]
fn test_file_sink() {
    init();
    let options = SaveOptions::full_rewrite().with_id_seed(3);
    let mut doc = simple_document();
    let expected = write(&mut doc, &options);

    let mut file = tempfile::tempfile().unwrap();
    {
        let mut doc = simple_document();
        let mut creator = Creator::new(&mut doc, WriteSink::new(&mut file));
        creator.create(&options).unwrap();
        assert_eq!(creator.into_sink().bytes_written(), expected.len() as u64);
    }
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut written = Vec::new();
    file.read_to_end(&mut written).unwrap();
    assert_eq!(written, expected);
}

#[test]
fn test_invalid_versions() {
    let mut doc = simple_document();
    let mut creator = Creator::new(&mut doc, Vec::new());
    assert!(matches!(creator.set_file_version(9), Err(Error::UnsupportedVersion(9))));
    assert!(matches!(creator.set_file_version(20), Err(Error::UnsupportedVersion(20))));
    creator.set_file_version(10).unwrap();
    creator.create(&SaveOptions::full_rewrite()).unwrap();
    assert!(creator.sink().starts_with(b"%PDF-1.0\r\n"));
}

fn source_file() -> MemorySource {
    MemorySource::builder()
        .version(15)
        .object(
            1,
            Object::dict(vec![("Type", Object::name("Catalog")), ("Pages", Object::reference(2))]),
        )
        .object(
            2,
            Object::dict(vec![
                ("Type", Object::name("Pages")),
                ("Kids", Object::Array(vec![])),
                ("Count", Object::Integer(0)),
            ]),
        )
        .object_with_generation(3, 2, Object::dict(vec![("Producer", Object::string("old"))]))
        .compressed_object(5, Object::dict(vec![("Type", Object::name("Font"))]))
        .null_object(6)
        .root(1)
        .id(vec![0xAA; 16], vec![0xBB; 16])
        .trailer_entry("Custom", Object::name("Kept"))
        .build()
        .unwrap()
}

#[test]
fn test_full_rewrite_of_source() {
    init();
    let source = source_file();
    let raw_catalog = source.raw_object(1).unwrap();
    let mut doc = Document::from_source(Box::new(source));
    if let Some(dict) = doc.get_mut(2).and_then(|o| o.as_dict_mut()) {
        dict.insert("Count".to_string(), Object::Integer(1));
    }
    let added = doc.add_object(Object::string("new"));
    assert_eq!(added, 7);

    let pdf = write(&mut doc, &SaveOptions::full_rewrite().with_id_seed(1));
    let text = String::from_utf8_lossy(&pdf).to_string();

    assert!(pdf.starts_with(b"%PDF-1.5\r\n"));
    // untouched objects are copied byte for byte
    assert!(find(&pdf, &raw_catalog).is_some());
    assert!(text.contains("3 2 obj\r\n"));
    assert!(text.contains("/Count 1>>"));
    assert!(text.contains("5 0 obj <</Type /Font>>\r\nendobj\r\n"));
    assert!(text.contains("7 0 obj\r\n(new)\r\nendobj\r\n"));
    assert!(!text.contains("6 0 obj"));

    let entries = classic_entries(&pdf, startxref(&pdf));
    let numbers: Vec<u32> = entries.iter().map(|&(n, _)| n).collect();
    assert_eq!(numbers, vec![1, 2, 3, 5, 7]);
    assert!(text.contains("\r\n5 1\r\n"));
    assert!(text.contains("\r\n7 1\r\n"));
    assert_offsets_point_at_objects(&pdf);

    assert!(text.contains("trailer\r\n<</Root 1 0 R/Custom /Kept/Size 8/ID[<AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA>"));
    assert!(!text.contains("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"));
}

#[test]
fn test_version_update_forces_reserialization() {
    let source = MemorySource::builder()
        .version(14)
        .version_updated(true)
        .object(1, Object::dict(vec![("Type", Object::name("Catalog"))]))
        .object_with_generation(2, 3, Object::Integer(5))
        .root(1)
        .build()
        .unwrap();
    let mut doc = Document::from_source(Box::new(source));
    let pdf = write(&mut doc, &SaveOptions::full_rewrite().with_version(17));
    let text = String::from_utf8_lossy(&pdf).to_string();
    assert!(pdf.starts_with(b"%PDF-1.7\r\n"));
    assert!(text.contains("2 0 obj\r\n5\r\nendobj"));
    assert!(!text.contains("2 3 obj"));
    // materialized copies are dropped again
    assert!(!doc.is_resident(2));
}
