//! The async adapter over a socket-like duplex pipe.

use ion_decoder::{BufferConfiguration, DecodeError, IncrementalReader, ReaderOptions, StreamingReader};
use ion_encoder::{BinaryWriter, LocalTableDecl};
use ion_tests::{Element, HandlerLog, Value, drain, encode};
use tokio::io::AsyncWriteExt;

fn elements() -> Vec<Element> {
    (0..20)
        .map(|i| {
            if i % 3 == 0 {
                Element::new(Value::String(format!("value {i}")))
            } else {
                Element::new(Value::List(vec![
                    Element::new(Value::Int(i)),
                    Element::new(Value::Blob(vec![7; 40])),
                ]))
            }
        })
        .collect()
}

/// Write `bytes` into the duplex in `chunk`-sized pieces from another task.
fn spawn_writer(bytes: Vec<u8>, chunk: usize) -> tokio::io::DuplexStream {
    let (client, mut server) = tokio::io::duplex(64);
    tokio::spawn(async move {
        for piece in bytes.chunks(chunk) {
            server.write_all(piece).await.unwrap();
        }
        server.shutdown().await.unwrap();
    });
    client
}

#[tokio::test]
async fn units_decode_to_the_written_values() {
    let expected = elements();
    let bytes = encode(&expected);
    let mut stream = StreamingReader::new(spawn_writer(bytes.clone(), 5), BufferConfiguration::default()).unwrap();

    let mut reader = IncrementalReader::push(ReaderOptions::default()).unwrap();
    let mut decoded = Vec::new();
    let mut total = 0;
    while let Some(unit) = stream.next().await {
        let unit = unit.unwrap();
        total += unit.bytes.len();
        reader.receive(&unit.bytes).unwrap();
        drain(&mut reader, &mut decoded).unwrap();
    }
    reader.end_stream().unwrap();

    assert_eq!(decoded, expected);
    assert_eq!(total, bytes.len());
}

#[tokio::test]
async fn each_unit_stands_alone() {
    let bytes = BinaryWriter::new()
        .ivm()
        .symbol_table(&LocalTableDecl::with_symbols(["left", "right"]))
        .symbol_id(11)
        .symbol_id(10)
        .finish()
        .unwrap();
    let mut stream = StreamingReader::new(spawn_writer(bytes, 1), BufferConfiguration::default()).unwrap();

    let first = stream.next().await.unwrap().unwrap();
    let mut reader = IncrementalReader::from_bytes(&first.bytes);
    reader.next().unwrap();
    assert_eq!(reader.symbol_value().unwrap().text.as_deref(), Some("right"));
    assert_eq!(first.value(), &[0x71, 0x0B][..]);

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.value_start, 0);
    assert_eq!(&second.bytes[..], &[0x71, 0x0A]);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn oversized_values_never_reach_the_caller() {
    let mut writer = BinaryWriter::new();
    writer.ivm().string(&"x".repeat(200)).int(1).blob(&[0; 300]).int(2);
    let bytes = writer.finish().unwrap();
    let log = HandlerLog::new();
    let mut stream = StreamingReader::new(spawn_writer(bytes.clone(), 16), log.config(16, 64).unwrap()).unwrap();

    let mut values = Vec::new();
    while let Some(unit) = stream.next().await {
        values.push(unit.unwrap().value().to_vec());
    }
    assert_eq!(values, vec![vec![0x21, 0x01], vec![0x21, 0x02]]);
    let counts = log.counts();
    assert_eq!(counts.oversized_values, 2);
    assert_eq!(counts.data, bytes.len());
}

#[tokio::test]
async fn source_closing_mid_value_is_reported() {
    let bytes = encode(&elements());
    let cut = bytes.len() - 3;
    let mut stream =
        StreamingReader::new(spawn_writer(bytes[..cut].to_vec(), 7), BufferConfiguration::default()).unwrap();

    let mut last = None;
    while let Some(unit) = stream.next().await {
        last = Some(unit);
    }
    assert!(matches!(last, Some(Err(DecodeError::UnexpectedEof { .. }))));
}
