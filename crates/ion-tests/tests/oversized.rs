//! Values and symbol tables larger than the maximum buffer size.

use ion_decoder::{DecodeError, IncrementalReader, LookaheadBuffer, ReaderOptions};
use ion_encoder::{BinaryWriter, LocalTableDecl};
use ion_tests::{Element, HandlerLog, Value, decode_chunked, decode_through_lookahead, encode};
use ion_types::IonType;
use proptest::prelude::*;

const MAXIMUM: usize = 32;

fn long_string(len: usize) -> String {
    "x".repeat(len)
}

#[test]
fn oversized_values_are_skipped_and_the_rest_is_read() {
    let elements = vec![
        Element::new(Value::Int(1)),
        Element::new(Value::String(long_string(100))),
        Element::new(Value::Int(2)),
        Element::new(Value::Blob(vec![0; 1000])),
        Element::new(Value::String(long_string(10))),
    ];
    let bytes = encode(&elements);

    for size in [1, 7, 64, bytes.len()] {
        let log = HandlerLog::new();
        let options = ReaderOptions::default().with_buffer(log.config(8, MAXIMUM).unwrap());
        let decoded = decode_chunked(&bytes, &[size], options).unwrap();
        assert_eq!(
            decoded,
            vec![
                Element::new(Value::Int(1)),
                Element::new(Value::Int(2)),
                Element::new(Value::String(long_string(10))),
            ],
            "chunk size {size}"
        );
        let counts = log.counts();
        assert_eq!(counts.oversized_values, 2, "chunk size {size}");
        assert_eq!(counts.oversized_symbol_tables, 0);
        assert_eq!(counts.data, bytes.len(), "chunk size {size}");
    }
}

#[test]
fn value_that_exactly_fits_is_kept() {
    // A 2-byte header plus 30 bytes of body, 32 in all.
    let mut writer = BinaryWriter::new();
    writer.string(&long_string(30));
    let bytes = writer.finish().unwrap();
    assert_eq!(bytes.len(), MAXIMUM);

    let log = HandlerLog::new();
    let options = ReaderOptions::default().with_buffer(log.config(4, MAXIMUM).unwrap());
    let decoded = decode_chunked(&bytes, &[5], options).unwrap();
    assert_eq!(decoded, vec![Element::new(Value::String(long_string(30)))]);
    assert_eq!(log.counts().oversized_values, 0);
}

#[test]
fn oversized_symbol_table_blocks_local_symbols_until_an_ivm() {
    let big: Vec<String> = (0..20).map(|i| format!("sym{i}")).collect();
    let bytes = BinaryWriter::new()
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(big))
        .symbol_id(4)
        .symbol_id(10)
        .int(5)
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(["small"]))
        .symbol_id(10)
        .finish()
        .unwrap();

    let log = HandlerLog::new();
    let options = ReaderOptions::default().with_buffer(log.config(8, MAXIMUM).unwrap());
    let mut reader = IncrementalReader::push(options).unwrap();
    reader.receive(&bytes).unwrap();

    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("name"));

    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    let err = reader.symbol_value().unwrap_err();
    assert!(matches!(err, DecodeError::SymbolTableInvalidated { sid: 10 }));

    // Values that need no symbols are unaffected.
    assert_eq!(reader.next().unwrap(), Some(IonType::Int));
    assert_eq!(reader.int_value().unwrap(), 5);

    assert_eq!(reader.next().unwrap(), Some(IonType::Symbol));
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("small"));
    assert_eq!(reader.next().unwrap(), None);

    let counts = log.counts();
    assert_eq!(counts.oversized_symbol_tables, 1);
    assert_eq!(counts.oversized_values, 0);
    assert_eq!(counts.data, bytes.len());
}

#[test]
fn lookahead_skips_the_same_values_as_the_reader() {
    let elements = vec![
        Element::new(Value::String(long_string(50))),
        Element::new(Value::Bool(true)),
    ];
    let bytes = encode(&elements);
    let log = HandlerLog::new();
    let mut lookahead = LookaheadBuffer::new(
        ion_decoder::BytePipe::unbounded(8),
        log.config(8, MAXIMUM).unwrap(),
    )
    .unwrap();

    lookahead.source_mut().receive(&bytes).unwrap();
    lookahead.fill_input().unwrap();
    assert!(!lookahead.more_data_required());
    // The version marker stays with the first unit that fits.
    assert_eq!(lookahead.unit(), &[0xE0, 0x01, 0x00, 0xEA, 0x11]);
    assert_eq!(log.counts().oversized_values, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_value_is_either_read_or_reported(
        lens in proptest::collection::vec(0usize..80, 1..10),
        chunk in 1usize..40,
    ) {
        let elements: Vec<Element> = lens
            .iter()
            .map(|&len| Element::new(Value::String(long_string(len))))
            .collect();
        let bytes = encode(&elements);
        let log = HandlerLog::new();
        let options = ReaderOptions::default().with_buffer(log.config(8, MAXIMUM).unwrap());
        let decoded = decode_chunked(&bytes, &[chunk], options).unwrap();

        // A string of `len` bytes is `len + 1` bytes encoded below 14,
        // `len + 2` from 14 to 127. The version marker belongs to the
        // unit of the first string that fits.
        let encoded = |len: usize| if len < 14 { len + 1 } else { len + 2 };
        let mut prefix = 4;
        let expected: Vec<Element> = elements
            .iter()
            .zip(&lens)
            .filter(|&(_, &len)| {
                let fits = encoded(len) + prefix <= MAXIMUM;
                if fits {
                    prefix = 0;
                }
                fits
            })
            .map(|(element, _)| element.clone())
            .collect();
        let counts = log.counts();
        prop_assert_eq!(counts.oversized_values, elements.len() - expected.len());
        prop_assert_eq!(decoded, expected);
        prop_assert_eq!(counts.data, bytes.len());
    }
}

#[test]
fn symbol_table_prefix_counts_towards_the_value() {
    // 4 + 12 bytes of prefix, then a 22-byte string: 38 in all.
    let bytes = BinaryWriter::new()
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(["s0", "s1"]))
        .string(&long_string(20))
        .int(7)
        .finish()
        .unwrap();

    let pushed = HandlerLog::new();
    let options = ReaderOptions::default().with_buffer(pushed.config(8, MAXIMUM).unwrap());
    let from_push = decode_chunked(&bytes, &[bytes.len()], options).unwrap();

    let buffered = HandlerLog::new();
    let from_lookahead =
        decode_through_lookahead(&bytes, &[bytes.len()], buffered.config(8, MAXIMUM).unwrap())
            .unwrap();

    assert_eq!(from_push, vec![Element::new(Value::Int(7))]);
    assert_eq!(from_lookahead, from_push);
    assert_eq!(pushed.counts().oversized_values, 1);
    assert_eq!(pushed.counts(), buffered.counts());
}

#[derive(Clone, Debug)]
enum Item {
    Ivm,
    Table(usize),
    Pad(usize),
    Text(usize),
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        1 => Just(Item::Ivm),
        2 => (0usize..6).prop_map(Item::Table),
        1 => (1usize..6).prop_map(Item::Pad),
        5 => (0usize..40).prop_map(Item::Text),
    ]
}

fn write_items(items: &[Item]) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.ivm();
    for item in items {
        match *item {
            Item::Ivm => {
                writer.ivm();
            }
            Item::Table(n) => {
                let symbols = (0..n).map(|i| format!("sym{i}"));
                writer.symbol_table(&LocalTableDecl::with_symbols(symbols));
            }
            Item::Pad(n) => {
                writer.nop_pad(n);
            }
            Item::Text(len) => {
                writer.string(&long_string(len));
            }
        }
    }
    writer.finish().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn push_and_lookahead_readers_skip_the_same_values(
        items in proptest::collection::vec(item(), 0..16),
        chunk in 1usize..48,
    ) {
        let bytes = write_items(&items);

        let pushed = HandlerLog::new();
        let options = ReaderOptions::default().with_buffer(pushed.config(8, MAXIMUM).unwrap());
        let from_push = decode_chunked(&bytes, &[chunk], options).unwrap();

        let buffered = HandlerLog::new();
        let from_lookahead =
            decode_through_lookahead(&bytes, &[chunk], buffered.config(8, MAXIMUM).unwrap())
                .unwrap();

        prop_assert_eq!(from_lookahead, from_push);
        prop_assert_eq!(pushed.counts(), buffered.counts());
        prop_assert_eq!(pushed.counts().data, bytes.len());
    }
}
