#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: VarUInt and VarInt decoding.
//
// Catches bugs in:
// - Runs with no terminal byte
// - Encodings longer than 10 bytes or wider than 64 bits
// - Negative zero in VarInts
fuzz_target!(|data: &[u8]| {
    if let Ok((_, len)) = ion_wire::varint::decode_var_uint(data) {
        assert!(len >= 1 && len <= data.len());
    }
    let _ = ion_wire::varint::decode_var_int(data);
    let _ = ion_wire::varint::decode_uint(data);
    let _ = ion_wire::varint::decode_int(data);
});
