//! Integration tests: full rewrite and incremental update on disk

use std::fs;
use std::path::Path;

use pdf_skeleton::{DataType, Object, ObjectId, PDFError, PDFParser, PDFResult, Stream};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn io_err(e: std::io::Error) -> PDFError {
    PDFError::io(0, e)
}

/// Catalog, page tree, one page and its content stream
fn build_document(path: &Path) -> PDFResult<()> {
    let mut parser = PDFParser::with_version(1, 7);

    let mut catalog = Object::new(1, 0);
    catalog.insert("Type", DataType::name("Catalog"));
    catalog.insert("Pages", DataType::reference(2, 0));
    parser.add_object(catalog);

    let mut pages = Object::new(2, 0);
    pages.insert("Type", DataType::name("Pages"));
    pages.insert("Kids", DataType::Array(vec![DataType::reference(3, 0)]));
    pages.insert("Count", DataType::integer(1));
    parser.add_object(pages);

    let mut page = Object::new(3, 0);
    page.insert("Type", DataType::name("Page"));
    page.insert("Parent", DataType::reference(2, 0));
    page.insert("Contents", DataType::reference(4, 0));
    page.insert(
        "MediaBox",
        DataType::Array(vec![
            DataType::integer(0),
            DataType::integer(0),
            DataType::real(612.5),
            DataType::integer(792),
        ]),
    );
    parser.add_object(page);

    let mut content = Object::new(4, 0);
    content.insert("Length", DataType::integer(0));
    content.data_mut().push(DataType::Stream(Stream::from_data(Vec::new())));
    content.set_stream_data(b"BT /F1 24 Tf 72 700 Td (Hello) Tj ET".to_vec())?;
    parser.add_object(content);

    parser.trailer_mut().insert("Root", DataType::reference(1, 0));
    parser.write(path, false)
}

fn workspace() -> PDFResult<TempDir> {
    tempfile::tempdir().map_err(io_err)
}

#[test]
fn test_built_document_parses_back() -> PDFResult<()> {
    let dir = workspace()?;
    let path = dir.path().join("built.pdf");
    build_document(&path)?;

    let mut parser = PDFParser::new();
    parser.parse(&path)?;

    assert_eq!(parser.version(), (1, 7));
    assert_eq!(parser.objects().len(), 4);
    assert_eq!(parser.xref_table().len(), 5);
    assert_eq!(parser.trailer().dictionary().get_integer("Size"), Some(5));

    let page = parser.get_object(3, 0).expect("page");
    assert_eq!(
        page.get("MediaBox"),
        Some(&DataType::Array(vec![
            DataType::integer(0),
            DataType::integer(0),
            DataType::real(612.5),
            DataType::integer(792),
        ]))
    );

    let content = parser.get_object(4, 0).and_then(Object::stream).expect("content");
    assert_eq!(content.data()?, b"BT /F1 24 Tf 72 700 Td (Hello) Tj ET");

    // Every xref entry points at its object
    for entry in parser.xref_table().entries().iter().filter(|e| e.used()) {
        let object = parser
            .get_object(entry.object_id(), entry.generation_number())
            .expect("xref target");
        assert_eq!(object.offset(), entry.offset());
        assert_eq!(entry.object(), Some(object.id()));
    }
    Ok(())
}

#[test]
fn test_incremental_update_appends() -> PDFResult<()> {
    let dir = workspace()?;
    let original = dir.path().join("original.pdf");
    build_document(&original)?;
    let original_bytes = fs::read(&original).map_err(io_err)?;

    let mut parser = PDFParser::new();
    parser.parse(&original)?;
    let original_xref = parser.xref_offset().expect("xref offset");

    let mut info = Object::new(parser.next_object_id()?, 0);
    info.insert("Title", DataType::text_string(b"Updated (draft)"));
    parser.add_object(info);
    parser.trailer_mut().insert("Info", DataType::reference(5, 0));

    let updated = dir.path().join("updated.pdf");
    parser.write(&updated, true)?;
    let updated_bytes = fs::read(&updated).map_err(io_err)?;

    assert!(updated_bytes.len() > original_bytes.len());
    assert_eq!(&updated_bytes[..original_bytes.len()], original_bytes.as_slice());

    let mut reparsed = PDFParser::new();
    reparsed.parse(&updated)?;
    let trailer = reparsed.trailer().dictionary();
    assert_eq!(trailer.get_integer("Prev"), Some(original_xref as i32));
    assert_eq!(trailer.get_integer("Size"), Some(6));
    assert_eq!(trailer.get_reference("Info"), Some(ObjectId::new(5, 0)));

    let info = reparsed.get_object(5, 0).expect("info");
    assert_eq!(
        info.get("Title").and_then(DataType::unescaped_string),
        Some(b"Updated (draft)".to_vec())
    );
    assert!(reparsed.xref_offset().expect("new xref") > original_xref);
    Ok(())
}

#[test]
fn test_update_of_existing_target_appends_again() -> PDFResult<()> {
    let dir = workspace()?;
    let path = dir.path().join("doc.pdf");
    build_document(&path)?;
    let before = fs::read(&path).map_err(io_err)?;

    let mut parser = PDFParser::new();
    parser.parse(&path)?;
    let page = parser.get_object_mut(3, 0).expect("page");
    page.insert("Rotate", DataType::integer(90));
    page.update();

    // Target is the parsed file itself
    parser.write_update(&path)?;
    let after = fs::read(&path).map_err(io_err)?;
    assert_eq!(&after[..before.len()], before.as_slice());

    let mut reparsed = PDFParser::new();
    reparsed.parse(&path)?;
    let rotations: Vec<Option<i32>> = reparsed
        .objects()
        .iter()
        .filter(|o| o.object_id() == 3)
        .map(|o| o.dictionary().get_integer("Rotate"))
        .collect();
    assert_eq!(rotations, vec![None, Some(90)]);
    Ok(())
}

#[test]
fn test_no_op_update_leaves_file_untouched() -> PDFResult<()> {
    let dir = workspace()?;
    let path = dir.path().join("doc.pdf");
    build_document(&path)?;
    let before = fs::read(&path).map_err(io_err)?;

    let mut parser = PDFParser::new();
    parser.parse(&path)?;
    parser.write(&path, true)?;

    assert_eq!(fs::read(&path).map_err(io_err)?, before);
    Ok(())
}

#[test]
fn test_stream_replacement_survives_full_rewrite() -> PDFResult<()> {
    let dir = workspace()?;
    let source = dir.path().join("source.pdf");
    let target = dir.path().join("target.pdf");
    build_document(&source)?;

    let mut parser = PDFParser::new();
    parser.parse(&source)?;
    parser
        .get_object_mut(4, 0)
        .expect("content")
        .set_stream_data(b"q Q".to_vec())?;
    parser.remove_object(ObjectId::new(3, 0));
    parser.write(&target, false)?;

    let mut reparsed = PDFParser::new();
    reparsed.parse(&target)?;
    let content = reparsed.get_object(4, 0).expect("content");
    assert_eq!(content.dictionary().get_integer("Length"), Some(3));
    assert_eq!(content.stream().expect("stream").data()?, b"q Q");
    assert!(reparsed.get_object(3, 0).is_none());
    Ok(())
}

#[test]
fn test_streams_outlive_reparse() -> PDFResult<()> {
    let dir = workspace()?;
    let first = dir.path().join("first.pdf");
    build_document(&first)?;

    let mut parser = PDFParser::new();
    parser.parse(&first)?;
    let stream = parser
        .get_object(4, 0)
        .and_then(Object::stream)
        .expect("stream")
        .clone();

    parser.parse_bytes(b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n".to_vec())?;
    assert_eq!(stream.data()?, b"BT /F1 24 Tf 72 700 Td (Hello) Tj ET");
    Ok(())
}
