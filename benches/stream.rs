use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use xmlstream::{Reader, StreamParser};

const SMALL_XML: &str =
    "<catalog><item id=\"1\">A</item><item id=\"2\">B</item></catalog>";

fn large_xml(items: usize) -> String {
    let mut xml = String::from("<export><catalog>");
    for i in 0..items {
        xml.push_str(&format!(
            "<item id=\"{i}\" kind=\"book\"><title>title {i}</title><price>9.99</price></item>"
        ));
    }
    xml.push_str("</catalog></export>");
    xml
}

fn bench_small(c: &mut Criterion) {
    c.bench_function("xmlstream_small", |b| {
        b.iter(|| {
            StreamParser::new(Reader::from_str(black_box(SMALL_XML)))
                .with_skip_elements(0)
                .collect_all()
        })
    });
}

fn bench_large(c: &mut Criterion) {
    let xml = large_xml(1000);
    c.bench_function("xmlstream_large", |b| {
        b.iter(|| StreamParser::new(Reader::from_str(black_box(&xml))).collect_all())
    });
}

criterion_group!(benches, bench_small, bench_large);
criterion_main!(benches);
