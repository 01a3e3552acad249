//! The incremental reader fed one unit at a time by a lookahead buffer.

use std::sync::Arc;

use ion_decoder::{
    BufferConfiguration, BytePipe, DecodeError, IncrementalReader, LookaheadBuffer, Marker,
};
use ion_encoder::{BinaryWriter, LocalTableDecl};
use ion_tests::HandlerLog;
use ion_types::{IonType, MemoryCatalog};

fn reader_over(bytes: &[u8], config: BufferConfiguration) -> IncrementalReader<LookaheadBuffer> {
    let mut lookahead = LookaheadBuffer::new(BytePipe::unbounded(16), config).unwrap();
    lookahead.source_mut().receive(bytes).unwrap();
    IncrementalReader::with_lookahead(lookahead, Arc::new(MemoryCatalog::new())).unwrap()
}

/// Two units: the first carries the version marker and a table declaring
/// "a", the second appends "b" and refers to it.
fn appending_stream() -> Vec<u8> {
    BinaryWriter::new()
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(["a"]))
        .symbol_id(10)
        .symbol_table(&LocalTableDecl::with_symbols(["b"]).appending())
        .symbol_id(11)
        .finish()
        .unwrap()
}

#[test]
fn units_are_read_one_at_a_time() {
    let mut reader = reader_over(&appending_stream(), BufferConfiguration::default());

    reader.fill_input().unwrap();
    let lookahead = reader.lookahead_mut();
    assert!(!lookahead.more_data_required());
    assert_eq!(lookahead.ivm_marker(), Some(Marker { start: 0, end: 4 }));
    assert_eq!(lookahead.symbol_table_markers().len(), 1);
    let value = lookahead.value_marker().unwrap();
    assert_eq!(value.len(), 2);
    assert_eq!(value.end, lookahead.unit().len());

    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("a"));
    assert_eq!(reader.next().unwrap(), None);
    assert!(reader.more_data_required());

    reader.fill_input().unwrap();
    assert_eq!(reader.lookahead_mut().ivm_marker(), None);
    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("b"));
    assert_eq!(reader.symbol_table().max_id(), 11);

    reader.fill_input().unwrap();
    assert!(reader.lookahead_mut().more_data_required());
    assert_eq!(reader.next().unwrap(), None);
    reader.lookahead_mut().end_stream().unwrap();
}

#[test]
fn rewind_replays_the_append_and_duplicates_locals() {
    let mut reader = reader_over(&appending_stream(), BufferConfiguration::default());
    reader.fill_input().unwrap();
    reader.next().unwrap();
    reader.next().unwrap();

    reader.fill_input().unwrap();
    reader.lookahead_mut().mark();
    reader.next().unwrap();
    assert_eq!(reader.symbol_table().declared_symbol_count(), 2);

    reader.lookahead_mut().rewind().unwrap();
    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("b"));
    let table = reader.symbol_table();
    assert_eq!(table.declared_symbol_count(), 3);
    assert_eq!(table.max_id(), 12);
    assert_eq!(table.text(12).unwrap().as_deref(), Some("b"));
}

#[test]
fn rewind_to_value_start_leaves_the_table_alone() {
    let mut reader = reader_over(&appending_stream(), BufferConfiguration::default());
    reader.fill_input().unwrap();
    reader.next().unwrap();
    reader.next().unwrap();

    reader.fill_input().unwrap();
    reader.next().unwrap();
    for _ in 0..3 {
        reader.lookahead_mut().rewind_to_value_start().unwrap();
        assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
        assert_eq!(reader.symbol_id().unwrap(), 11);
    }
    assert_eq!(reader.symbol_table().declared_symbol_count(), 2);
}

#[test]
fn oversized_table_invalidates_the_reader() {
    let big: Vec<String> = (0..16).map(|i| format!("s{i}")).collect();
    let bytes = BinaryWriter::new()
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(big))
        .symbol_id(10)
        .int(3)
        .finish()
        .unwrap();
    let log = HandlerLog::new();
    let mut reader = reader_over(&bytes, log.config(8, 24).unwrap());

    reader.fill_input().unwrap();
    // The table and the version marker before it are gone.
    assert_eq!(reader.lookahead_mut().unit(), &[0x71, 0x0A]);
    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert!(matches!(
        reader.symbol_value(),
        Err(DecodeError::SymbolTableInvalidated { sid: 10 })
    ));

    reader.fill_input().unwrap();
    assert_eq!(reader.next().unwrap(), Some(IonType::Int));
    assert_eq!(reader.int_value().unwrap(), 3);
    assert_eq!(log.counts().oversized_symbol_tables, 1);
}

#[test]
fn units_wait_for_their_value() {
    let bytes = appending_stream();
    let mut lookahead =
        LookaheadBuffer::new(BytePipe::unbounded(16), BufferConfiguration::default()).unwrap();

    let mut units = Vec::new();
    for byte in &bytes {
        lookahead.source_mut().receive(std::slice::from_ref(byte)).unwrap();
        lookahead.fill_input().unwrap();
        if !lookahead.more_data_required() {
            units.push(lookahead.unit().to_vec());
            lookahead.consume();
        }
    }
    assert_eq!(units.len(), 2);
    assert_eq!(units.concat(), bytes);
}
