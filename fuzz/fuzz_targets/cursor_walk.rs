#![no_main]

use libfuzzer_sys::fuzz_target;
use ion_decoder::{BinaryCursor, Event};

// Fuzz target: walk every value of arbitrary bytes with the cursor.
//
// Catches bugs in:
// - Length fields that overrun their container
// - Annotation wrapper validation
// - NOP pads at every depth
// - Version markers below the top level
fuzz_target!(|data: &[u8]| {
    let mut cursor = BinaryCursor::from_bytes(data);
    // Bounded so a malformed stream cannot spin forever.
    for _ in 0..10_000 {
        let event = match cursor.next_value() {
            Ok(event) => event,
            Err(_) => return,
        };
        let step = match event {
            Event::StartContainer if !cursor.is_null() => cursor.step_into_container(),
            Event::StartScalar | Event::StartContainer => cursor.value_bytes().map(|_| event),
            Event::EndContainer => cursor.step_out_of_container(),
            Event::NeedsData => return,
            Event::NeedsInstruction | Event::ValueReady => Ok(event),
        };
        if step.is_err() {
            return;
        }
    }
});
