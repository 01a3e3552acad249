use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ion_decoder::{BufferConfiguration, BytePipe, LookaheadBuffer, ReaderOptions};
use ion_tests::{Element, Value, decode_chunked, decode_whole, encode};

fn payload(records: usize) -> Vec<u8> {
    let elements: Vec<Element> = (0..records)
        .map(|i| {
            let mut fields = vec![
                Element::new(Value::Int(i64::try_from(i).unwrap_or_default())),
                Element::new(Value::String(format!("record number {i}"))),
                Element::new(Value::Blob(vec![0xAB; 64])),
            ];
            for (sid, field) in [4, 5, 6].into_iter().zip(&mut fields) {
                field.field = Some(sid);
            }
            Element::new(Value::Struct(fields))
        })
        .collect();
    encode(&elements)
}

fn bench_decode_whole(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_whole");
    for records in [10, 1000] {
        let bytes = payload(records);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &bytes, |b, bytes| {
            b.iter(|| decode_whole(bytes).unwrap());
        });
    }
    group.finish();
}

fn bench_decode_chunked(c: &mut Criterion) {
    let bytes = payload(200);
    let mut group = c.benchmark_group("decode_chunked");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    for size in [1, 16, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| decode_chunked(&bytes, &[size], ReaderOptions::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_lookahead_units(c: &mut Criterion) {
    let bytes = payload(200);
    c.bench_function("lookahead_units", |b| {
        b.iter(|| {
            let mut lookahead =
                LookaheadBuffer::new(BytePipe::unbounded(1024), BufferConfiguration::default())
                    .unwrap();
            lookahead.source_mut().receive(&bytes).unwrap();
            let mut units = 0;
            loop {
                lookahead.fill_input().unwrap();
                if lookahead.more_data_required() {
                    break;
                }
                lookahead.consume();
                units += 1;
            }
            units
        });
    });
}

criterion_group!(
    benches,
    bench_decode_whole,
    bench_decode_chunked,
    bench_lookahead_units
);
criterion_main!(benches);
