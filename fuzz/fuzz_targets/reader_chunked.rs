#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ion_decoder::{DecodeError, IncrementalReader, ReaderOptions};
use ion_wire::IVM;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    chunk: u8,
    body: Vec<u8>,
}

/// Types of every value, depth first, or the first error.
fn walk<R: std::io::Read>(reader: &mut IncrementalReader<R>, out: &mut Vec<String>) -> Result<(), DecodeError> {
    while let Some(ion_type) = reader.next()? {
        out.push(format!("{}:{}", reader.depth(), ion_type));
        if ion_type.is_container() && !reader.is_null() {
            reader.step_in()?;
            walk(reader, out)?;
            reader.step_out()?;
        }
    }
    Ok(())
}

// Fuzz target: reading whole and reading in chunks agree.
//
// The body is prefixed with a version marker and read once from a
// single buffer and once pushed in `chunk`-sized pieces. Both routes
// must yield the same values and agree on whether the stream is valid.
fuzz_target!(|input: FuzzInput| {
    let mut bytes = IVM.to_vec();
    bytes.extend_from_slice(&input.body);

    let mut whole_values = Vec::new();
    let mut whole = IncrementalReader::from_bytes(&bytes);
    let whole_ok = walk(&mut whole, &mut whole_values).and_then(|()| whole.end_stream()).is_ok();

    let mut chunked_values = Vec::new();
    let mut chunked = IncrementalReader::push(ReaderOptions::default()).unwrap();
    let size = usize::from(input.chunk.max(1));
    let mut chunked_ok = true;
    for piece in bytes.chunks(size) {
        chunked.receive(piece).unwrap();
        if walk(&mut chunked, &mut chunked_values).is_err() {
            chunked_ok = false;
            break;
        }
    }
    let chunked_ok = chunked_ok
        && walk(&mut chunked, &mut chunked_values).and_then(|()| chunked.end_stream()).is_ok();

    if whole_ok && chunked_ok {
        assert_eq!(whole_values, chunked_values);
    }
});
