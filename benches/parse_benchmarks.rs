//! Parse and write throughput over generated documents

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_skeleton::{DataType, Object, PDFParser, Stream};

/// Document with `count` page objects, each with a small content stream
fn build_pdf(count: u32) -> Vec<u8> {
    let mut parser = PDFParser::with_version(1, 6);

    let mut catalog = Object::new(1, 0);
    catalog.insert("Type", DataType::name("Catalog"));
    catalog.insert("Pages", DataType::reference(2, 0));
    parser.add_object(catalog);

    let kids = (0..count)
        .map(|i| DataType::reference(3 + i * 2, 0))
        .collect::<Vec<_>>();
    let mut pages = Object::new(2, 0);
    pages.insert("Type", DataType::name("Pages"));
    pages.insert("Kids", DataType::Array(kids));
    pages.insert("Count", DataType::integer(count as i32));
    parser.add_object(pages);

    for i in 0..count {
        let page_id = 3 + i * 2;
        let mut page = Object::new(page_id, 0);
        page.insert("Type", DataType::name("Page"));
        page.insert("Parent", DataType::reference(2, 0));
        page.insert("Contents", DataType::reference(page_id + 1, 0));
        parser.add_object(page);

        let mut content = Object::new(page_id + 1, 0);
        content.insert("Length", DataType::integer(0));
        content.data_mut().push(DataType::Stream(Stream::from_data(Vec::new())));
        let text = format!("BT /F1 12 Tf 72 700 Td (Page {}) Tj ET", i + 1);
        if content.set_stream_data(text.into_bytes()).is_err() {
            panic!("content object has no stream");
        }
        parser.add_object(content);
    }

    parser.trailer_mut().insert("Root", DataType::reference(1, 0));
    let mut output = Vec::new();
    if let Err(e) = parser.write_full_to(&mut output) {
        panic!("failed to build fixture: {}", e);
    }
    output
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for count in [10u32, 100, 1000] {
        let data = build_pdf(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            b.iter(|| {
                let mut parser = PDFParser::new();
                parser.parse_bytes(black_box(data.clone())).ok();
                black_box(parser.objects().len())
            })
        });
    }
    group.finish();
}

fn bench_full_rewrite(c: &mut Criterion) {
    let data = build_pdf(100);
    let mut parser = PDFParser::new();
    if let Err(e) = parser.parse_bytes(data) {
        panic!("failed to parse fixture: {}", e);
    }

    c.bench_function("full_rewrite_100_pages", |b| {
        b.iter(|| {
            let mut output = Vec::with_capacity(64 * 1024);
            parser.write_full_to(&mut output).ok();
            black_box(output.len())
        })
    });
}

criterion_group!(benches, bench_parse, bench_full_rewrite);
criterion_main!(benches);
